//! Pure state transition function

use super::state::reply_id;
use super::{ConvContext, ConvState, Effect, Event};
use crate::message::{Message, MessagePart, MessageStatus, Role};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition. A rejected event changes nothing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A response is still in progress")]
    Busy,
    #[error("Message is empty")]
    EmptyInput,
    #[error("Event for request {0} arrived after that request ended")]
    StaleEvent(String),
    #[error("Nothing to cancel")]
    NothingToCancel,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs this always produces the same outputs, with no I/O.
pub fn transition(
    state: &ConvState,
    _context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    // Transport events only count for the request currently in flight
    if let Some(request_id) = event.request_id() {
        if state.active_request() != Some(request_id) {
            return Err(TransitionError::StaleEvent(request_id.to_string()));
        }
    }

    let mut result = step(state, event)?;
    if result.new_state.name() != state.name() {
        let name = result.new_state.name();
        result.effects.push(Effect::NotifyStateChange { state: name });
    }
    Ok(result)
}

#[allow(clippy::too_many_lines)]
fn step(state: &ConvState, event: Event) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // User Submission
        // ============================================================
        (ConvState::Idle, Event::UserSubmit { text, message_id }) => {
            if text.trim().is_empty() {
                return Err(TransitionError::EmptyInput);
            }
            Ok(TransitionResult::new(ConvState::Submitted {
                request_id: message_id.clone(),
            })
            .with_effect(Effect::AppendMessage(Message::user(message_id.clone(), text)))
            .with_effect(Effect::SendRequest {
                request_id: message_id,
            }))
        }

        // At most one outstanding request; sessions own the conversation too
        (_, Event::UserSubmit { .. }) => Err(TransitionError::Busy),

        // ============================================================
        // Streaming Content
        // ============================================================
        (
            ConvState::Submitted { request_id } | ConvState::Streaming { request_id, .. },
            Event::Fragment { text, .. },
        ) => Ok(deliver(state, request_id, MessagePart::text(text))),

        (
            ConvState::Submitted { request_id } | ConvState::Streaming { request_id, .. },
            Event::ToolCall {
                call_id,
                name,
                input,
                ..
            },
        ) => Ok(deliver(
            state,
            request_id,
            MessagePart::ToolInvocation {
                call_id,
                name,
                input,
            },
        )),

        (
            ConvState::Submitted { request_id } | ConvState::Streaming { request_id, .. },
            Event::ToolResult {
                call_id,
                name,
                output,
                is_error,
                ..
            },
        ) => Ok(deliver(
            state,
            request_id,
            MessagePart::ToolResult {
                call_id,
                name,
                output,
                is_error,
            },
        )),

        // ============================================================
        // Completion, Failure, Cancellation
        // ============================================================
        (ConvState::Streaming { message_id, .. }, Event::Complete { .. }) => {
            Ok(TransitionResult::new(ConvState::Idle)
                .with_effect(Effect::finalize(message_id.clone(), MessageStatus::Complete)))
        }

        // Response finished without content
        (ConvState::Submitted { .. }, Event::Complete { .. }) => {
            Ok(TransitionResult::new(ConvState::Idle))
        }

        (
            ConvState::Submitted { .. } | ConvState::Streaming { .. },
            Event::TransportError { message, .. },
        ) => Ok(TransitionResult::new(ConvState::Idle)
            .with_effects(finalize_partial(state))
            .with_effect(Effect::surface_error(message))),

        (
            ConvState::Submitted { request_id } | ConvState::Streaming { request_id, .. },
            Event::Cancel,
        ) => Ok(TransitionResult::new(ConvState::Idle)
            .with_effects(finalize_partial(state))
            .with_effect(Effect::AbortTransport {
                request_id: request_id.clone(),
            })),

        (
            ConvState::Connecting
            | ConvState::ConnectedIdle
            | ConvState::UserSpeaking
            | ConvState::AiSpeaking,
            Event::Cancel,
        ) => Ok(TransitionResult::new(ConvState::Idle).with_effect(Effect::EndSession)),

        (ConvState::Idle, Event::Cancel) => Err(TransitionError::NothingToCancel),

        // ============================================================
        // Realtime Session
        // ============================================================
        (ConvState::Idle, Event::SessionConnecting) => {
            Ok(TransitionResult::new(ConvState::Connecting))
        }

        (ConvState::Submitted { .. } | ConvState::Streaming { .. }, Event::SessionConnecting) => {
            Err(TransitionError::Busy)
        }

        (ConvState::Connecting, Event::SessionConnected) => {
            Ok(TransitionResult::new(ConvState::ConnectedIdle))
        }

        // Speech states are mutually exclusive; the latest signal wins
        (s, Event::UserSpeechStarted) if s.is_connected() => {
            Ok(TransitionResult::new(ConvState::UserSpeaking))
        }

        (ConvState::UserSpeaking, Event::UserSpeechStopped) => {
            Ok(TransitionResult::new(ConvState::ConnectedIdle))
        }

        // Stop for speech that was already superseded
        (s, Event::UserSpeechStopped) if s.is_connected() => {
            Ok(TransitionResult::new(s.clone()))
        }

        (s, Event::AiSpeechStarted) if s.is_connected() => {
            Ok(TransitionResult::new(ConvState::AiSpeaking))
        }

        (
            s,
            Event::TurnCommitted {
                message_id,
                role,
                text,
            },
        ) if s.is_connected() => {
            let new_state = if role == Role::Assistant && *s == ConvState::AiSpeaking {
                ConvState::ConnectedIdle
            } else {
                s.clone()
            };
            let result = TransitionResult::new(new_state);
            if text.trim().is_empty() {
                return Ok(result);
            }
            Ok(result.with_effect(Effect::AppendMessage(Message::committed(
                message_id, role, text,
            ))))
        }

        // Provider errors do not end the session by themselves
        (s, Event::SessionError { message }) if s.is_in_session() => {
            Ok(TransitionResult::new(s.clone()).with_effect(Effect::surface_error(message)))
        }

        (s, Event::SessionClosed) if s.is_in_session() => {
            Ok(TransitionResult::new(ConvState::Idle))
        }

        // Teardown is idempotent
        (ConvState::Idle, Event::SessionClosed) => Ok(TransitionResult::new(ConvState::Idle)),

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {state:?} with event {event:?}"
        ))),
    }
}

/// Route a piece of response content into the reply message, opening the
/// reply on first content.
fn deliver(state: &ConvState, request_id: &str, part: MessagePart) -> TransitionResult {
    if let ConvState::Streaming { message_id, .. } = state {
        let effect = match part {
            MessagePart::Text { text } => Effect::AppendText {
                message_id: message_id.clone(),
                text,
            },
            part => Effect::AppendPart {
                message_id: message_id.clone(),
                part,
            },
        };
        return TransitionResult::new(state.clone()).with_effect(effect);
    }

    let message_id = reply_id(request_id);
    let reply = Message::assistant(message_id.clone()).with_part(part);
    TransitionResult::new(ConvState::Streaming {
        request_id: request_id.to_string(),
        message_id,
    })
    .with_effect(Effect::AppendMessage(reply))
}

/// Whatever text already arrived stays visible, marked incomplete
fn finalize_partial(state: &ConvState) -> Option<Effect> {
    match state {
        ConvState::Streaming { message_id, .. } => Some(Effect::finalize(
            message_id.clone(),
            MessageStatus::Incomplete,
        )),
        _ => None,
    }
}
