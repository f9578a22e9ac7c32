//! Voice conversation runtime
//!
//! Composes a [`RealtimeSession`] with a [`Conversation`]: session signals
//! become conversation events, and the reducer's `EndSession` effect hangs
//! the session up. Every way out of a session goes through the same
//! teardown.

use super::Conversation;
use crate::state_machine::{ConvContext, Effect, Event, TransitionError};
use crate::transport::peer::{ConnectionState, PeerError};
use crate::transport::realtime::{RealtimeSession, SessionPhase};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Drives one [`Conversation`] against a realtime voice session
pub struct VoiceRuntime {
    conversation: Conversation,
    session: Arc<RealtimeSession>,
}

impl VoiceRuntime {
    pub fn new(context: ConvContext, session: RealtimeSession) -> Self {
        Self {
            conversation: Conversation::new(context),
            session: Arc::new(session),
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase()
    }

    /// Start connecting.
    ///
    /// Negotiation runs on its own task so [`cancel`](Self::cancel) can
    /// interrupt it. Hand the task's result to
    /// [`on_negotiated`](Self::on_negotiated).
    pub fn start(&mut self) -> Result<JoinHandle<Result<(), PeerError>>, TransitionError> {
        let effects = self.conversation.apply(Event::SessionConnecting)?;
        self.execute(effects);

        let session = self.session.clone();
        Ok(tokio::spawn(async move { session.connect().await }))
    }

    /// Negotiation finished. Returns the error to surface, if any.
    pub fn on_negotiated(&mut self, result: Result<(), PeerError>) -> Option<String> {
        match result {
            Ok(()) | Err(PeerError::Cancelled) => None,
            Err(e) => self.session_failed(&e),
        }
    }

    /// The control channel opened
    pub fn on_channel_open(&mut self) -> Option<String> {
        match self.session.on_channel_open() {
            Ok(events) => self.feed(events),
            Err(e) => self.session_failed(&e),
        }
    }

    /// One inbound control channel message
    pub fn handle_message(&mut self, raw: &str) -> Option<String> {
        let events = self.session.handle_message(raw);
        self.feed(events)
    }

    pub fn on_connection_state(&mut self, state: ConnectionState) -> Option<String> {
        let events = self.session.on_connection_state(state).into_iter().collect();
        self.feed(events)
    }

    /// Hang up, at any point from `Connecting` on
    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        let effects = self.conversation.apply(Event::Cancel)?;
        self.execute(effects);
        Ok(())
    }

    /// The session released its resources before reporting `error`
    fn session_failed(&mut self, error: &PeerError) -> Option<String> {
        if !self.conversation.state().is_in_session() {
            return None;
        }
        self.feed(vec![
            Event::SessionError {
                message: error.to_string(),
            },
            Event::SessionClosed,
        ])
    }

    fn feed(&mut self, events: Vec<Event>) -> Option<String> {
        let mut surfaced = None;
        for event in events {
            match self.conversation.apply(event) {
                Ok(effects) => {
                    if let Some(message) = self.execute(effects) {
                        surfaced = Some(message);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Session event rejected"),
            }
        }
        surfaced
    }

    /// Run I/O effects; returns the error to surface, if any
    fn execute(&mut self, effects: Vec<Effect>) -> Option<String> {
        let mut surfaced = None;
        for effect in effects {
            match effect {
                Effect::EndSession => {
                    tracing::info!(
                        conversation_id = %self.conversation.context().conversation_id,
                        "Ending voice session"
                    );
                    // Already Idle, so the closing event changes nothing
                    let closed = self.session.hangup();
                    if let Err(e) = self.conversation.apply(closed) {
                        tracing::debug!(error = %e, "Close after hangup ignored");
                    }
                }
                Effect::SurfaceError { message } => {
                    tracing::warn!(%message, "Voice session error");
                    surfaced = Some(message);
                }
                Effect::NotifyStateChange { state } => {
                    tracing::debug!(state, "State changed");
                }
                _ => {}
            }
        }
        surfaced
    }
}

impl Drop for VoiceRuntime {
    fn drop(&mut self) {
        // A negotiation task may still hold the session
        self.session.hangup();
    }
}
