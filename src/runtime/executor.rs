//! Conversation runtime executor

use super::traits::ChatTransport;
use super::Conversation;
use crate::state_machine::{ConvContext, ConvState, Effect, Event, TransitionError};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// What a renderer needs to know after each accepted transport event
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Fragment {
        message_id: String,
        text: String,
    },
    ToolCall {
        name: String,
        input: Value,
    },
    ToolResult {
        name: String,
        output: Value,
        is_error: bool,
    },
    /// The reply finished; `None` when the response carried no content
    Finished { message_id: Option<String> },
    /// The request failed; any partial reply stays visible
    Failed { message: String },
}

/// An in-flight request and the token that tears it down
struct InFlight {
    request_id: String,
    cancel: CancellationToken,
}

/// Drives one [`Conversation`] against a [`ChatTransport`]
pub struct ConversationRuntime<T: ChatTransport + 'static> {
    conversation: Conversation,
    transport: Arc<T>,
    event_tx: mpsc::Sender<Event>,
    event_rx: mpsc::Receiver<Event>,
    in_flight: Option<InFlight>,
}

impl<T: ChatTransport + 'static> ConversationRuntime<T> {
    pub fn new(context: ConvContext, transport: T) -> Self {
        let (event_tx, event_rx) = mpsc::channel(64);
        Self {
            conversation: Conversation::new(context),
            transport: Arc::new(transport),
            event_tx,
            event_rx,
            in_flight: None,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_busy(&self) -> bool {
        self.conversation.state().is_awaiting_response()
    }

    /// Submit user text. Rejected while a request is outstanding or when the
    /// text is blank.
    pub fn submit(&mut self, text: &str) -> Result<(), TransitionError> {
        let effects = self.conversation.apply(Event::user_submit(text))?;
        self.execute(effects);
        Ok(())
    }

    /// Cancel the outstanding request, keeping any partial reply
    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        let effects = self.conversation.apply(Event::Cancel)?;
        self.execute(effects);
        Ok(())
    }

    /// Wait for the next accepted transport event.
    ///
    /// Returns `None` once no request is outstanding. Events left over from
    /// a request that already ended are dropped here.
    pub async fn next_update(&mut self) -> Option<Update> {
        loop {
            if !self.is_busy() {
                return None;
            }
            let event = self.event_rx.recv().await?;
            let update = self.describe(&event);

            match self.conversation.apply(event) {
                Ok(effects) => {
                    if let Some(message) = self.execute(effects) {
                        return Some(Update::Failed { message });
                    }
                    if update.is_some() {
                        return update;
                    }
                }
                Err(TransitionError::StaleEvent(request_id)) => {
                    tracing::debug!(%request_id, "Dropping event for finished request");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Transport event rejected");
                }
            }
        }
    }

    /// Submit and drive the request to completion, reporting each update
    #[cfg(test)]
    pub async fn run_turn(
        &mut self,
        text: &str,
        mut on_update: impl FnMut(&Update),
    ) -> Result<(), TransitionError> {
        self.submit(text)?;
        while let Some(update) = self.next_update().await {
            on_update(&update);
        }
        Ok(())
    }

    fn describe(&self, event: &Event) -> Option<Update> {
        match event {
            Event::Fragment { request_id, text } => Some(Update::Fragment {
                message_id: crate::state_machine::state::reply_id(request_id),
                text: text.clone(),
            }),
            Event::ToolCall { name, input, .. } => Some(Update::ToolCall {
                name: name.clone(),
                input: input.clone(),
            }),
            Event::ToolResult {
                name,
                output,
                is_error,
                ..
            } => Some(Update::ToolResult {
                name: name.clone(),
                output: output.clone(),
                is_error: *is_error,
            }),
            Event::Complete { .. } => Some(Update::Finished {
                message_id: match self.conversation.state() {
                    ConvState::Streaming { message_id, .. } => Some(message_id.clone()),
                    _ => None,
                },
            }),
            _ => None,
        }
    }

    /// Run I/O effects; returns the error to surface, if any
    fn execute(&mut self, effects: Vec<Effect>) -> Option<String> {
        let mut surfaced = None;
        for effect in effects {
            match effect {
                Effect::SendRequest { request_id } => self.start_request(request_id),
                Effect::AbortTransport { request_id } => self.abort(&request_id),
                Effect::SurfaceError { message } => {
                    tracing::warn!(%message, "Request failed");
                    surfaced = Some(message);
                }
                Effect::NotifyStateChange { state } => {
                    tracing::debug!(conversation_id = %self.conversation.context().conversation_id, state, "State changed");
                }
                Effect::EndSession => {
                    tracing::debug!("No realtime session attached to this runtime");
                }
                _ => {}
            }
        }
        if !self.is_busy() {
            self.in_flight = None;
        }
        surfaced
    }

    fn start_request(&mut self, request_id: String) {
        let cancel = CancellationToken::new();
        self.in_flight = Some(InFlight {
            request_id: request_id.clone(),
            cancel: cancel.clone(),
        });

        let transport = self.transport.clone();
        let history = self.conversation.messages().to_vec();
        let events = self.event_tx.clone();
        tracing::info!(%request_id, messages = history.len(), "Sending request");
        tokio::spawn(async move {
            transport.send(request_id, history, events, cancel).await;
        });
    }

    fn abort(&mut self, request_id: &str) {
        match self.in_flight.take() {
            Some(in_flight) if in_flight.request_id == request_id => {
                tracing::info!(%request_id, "Aborting request");
                in_flight.cancel.cancel();
            }
            other => self.in_flight = other,
        }
    }
}

impl<T: ChatTransport + 'static> Drop for ConversationRuntime<T> {
    fn drop(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageStatus, Role};
    use crate::runtime::testing::{ScriptStep, ScriptedTransport, StalledTransport};
    use serde_json::json;
    use std::time::Duration;

    fn runtime_with(transport: ScriptedTransport) -> ConversationRuntime<ScriptedTransport> {
        ConversationRuntime::new(ConvContext::new("test-conv"), transport)
    }

    #[tokio::test]
    async fn test_streamed_reply_completes() {
        let transport = ScriptedTransport::new(vec![
            ScriptStep::Fragment("We build ".to_string()),
            ScriptStep::Fragment("web and mobile apps.".to_string()),
            ScriptStep::Complete,
        ]);
        let mut runtime = runtime_with(transport);

        let mut updates = Vec::new();
        runtime
            .run_turn("What services do you offer?", |u| updates.push(u.clone()))
            .await
            .unwrap();

        let messages = runtime.conversation().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].text(), "We build web and mobile apps.");
        assert_eq!(messages[1].status, MessageStatus::Complete);
        assert_eq!(runtime.conversation().state(), &ConvState::Idle);
        assert!(matches!(
            updates.last(),
            Some(Update::Finished { message_id: Some(_) })
        ));
    }

    #[tokio::test]
    async fn test_history_includes_new_user_message() {
        let transport = ScriptedTransport::new(vec![ScriptStep::Complete]);
        let histories = transport.histories();
        let mut runtime = runtime_with(transport);

        runtime.run_turn("Hello", |_| {}).await.unwrap();

        let sent = histories.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].len(), 1);
        assert_eq!(sent[0][0].text(), "Hello");
    }

    #[tokio::test]
    async fn test_failure_mid_stream_keeps_partial() {
        let transport = ScriptedTransport::new(vec![
            ScriptStep::Fragment("Our rates ".to_string()),
            ScriptStep::Fail("Connection reset".to_string()),
        ]);
        let mut runtime = runtime_with(transport);

        let mut updates = Vec::new();
        runtime
            .run_turn("Pricing?", |u| updates.push(u.clone()))
            .await
            .unwrap();

        assert!(updates.contains(&Update::Failed {
            message: "Connection reset".to_string()
        }));
        let reply = &runtime.conversation().messages()[1];
        assert_eq!(reply.text(), "Our rates ");
        assert_eq!(reply.status, MessageStatus::Incomplete);
        assert!(!runtime.is_busy());
    }

    #[tokio::test]
    async fn test_tool_parts_are_rendered_in_order() {
        let transport = ScriptedTransport::new(vec![
            ScriptStep::ToolCall("list_services".to_string(), json!({})),
            ScriptStep::ToolResult("list_services".to_string(), json!({"services": []})),
            ScriptStep::Fragment("Here is what we offer.".to_string()),
            ScriptStep::Complete,
        ]);
        let mut runtime = runtime_with(transport);
        runtime.run_turn("Services?", |_| {}).await.unwrap();

        let reply = &runtime.conversation().messages()[1];
        assert_eq!(reply.parts.len(), 3);
        assert_eq!(reply.text(), "Here is what we offer.");
    }

    #[tokio::test]
    async fn test_submit_while_busy_is_rejected() {
        let transport = StalledTransport::new("Thinking");
        let mut runtime = ConversationRuntime::new(ConvContext::new("c"), transport);

        runtime.submit("first").unwrap();
        assert_eq!(runtime.submit("second"), Err(TransitionError::Busy));
        assert_eq!(runtime.conversation().messages().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_tears_down_transport_and_freezes_partial() {
        let transport = StalledTransport::new("Partial answer");
        let cancelled = transport.cancelled();
        let mut runtime = ConversationRuntime::new(ConvContext::new("c"), transport);

        runtime.submit("Tell me everything").unwrap();
        let first = runtime.next_update().await;
        assert!(matches!(first, Some(Update::Fragment { .. })));

        runtime.cancel().unwrap();
        tokio::time::timeout(Duration::from_secs(1), cancelled.notified())
            .await
            .expect("transport observed cancellation");

        assert!(!runtime.is_busy());
        assert_eq!(runtime.next_update().await, None);
        let reply = &runtime.conversation().messages()[1];
        assert_eq!(reply.text(), "Partial answer");
        assert_eq!(reply.status, MessageStatus::Incomplete);
    }

    #[tokio::test]
    async fn test_late_events_from_cancelled_request_are_dropped() {
        let transport = StalledTransport::new("first").with_late_fragment("LATE");
        let cancelled = transport.cancelled();
        let mut runtime = ConversationRuntime::new(ConvContext::new("c"), transport);

        runtime.submit("one").unwrap();
        runtime.next_update().await;
        runtime.cancel().unwrap();
        tokio::time::timeout(Duration::from_secs(1), cancelled.notified())
            .await
            .unwrap();
        let frozen = runtime.conversation().messages()[1].clone();

        // The second turn stalls too; its first update must be its own
        runtime.submit("two").unwrap();
        let update = runtime.next_update().await;
        assert!(matches!(update, Some(Update::Fragment { text, .. }) if text == "first"));
        assert_eq!(runtime.conversation().messages()[1], frozen);
        runtime.cancel().unwrap();
    }
}
