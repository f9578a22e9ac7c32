//! Events that can occur in a conversation

use crate::message::Role;
use serde_json::Value;

/// Events that trigger state transitions
///
/// Transport events carry the `request_id` of the submission they answer so
/// that anything arriving after a teardown is recognizably stale.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // User events
    UserSubmit {
        text: String,
        /// Becomes the id of the user message and of the request
        message_id: String,
    },
    Cancel,

    // HTTP transport events
    Fragment {
        request_id: String,
        text: String,
    },
    ToolCall {
        request_id: String,
        call_id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        request_id: String,
        call_id: String,
        name: String,
        output: Value,
        is_error: bool,
    },
    Complete {
        request_id: String,
    },
    TransportError {
        request_id: String,
        message: String,
        retryable: bool,
    },

    // Realtime session events
    SessionConnecting,
    SessionConnected,
    UserSpeechStarted,
    UserSpeechStopped,
    AiSpeechStarted,
    TurnCommitted {
        message_id: String,
        role: Role,
        text: String,
    },
    SessionError {
        message: String,
    },
    SessionClosed,
}

impl Event {
    pub fn user_submit(text: impl Into<String>) -> Self {
        Event::UserSubmit {
            text: text.into(),
            message_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// The request this event answers, for transport events
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Event::Fragment { request_id, .. }
            | Event::ToolCall { request_id, .. }
            | Event::ToolResult { request_id, .. }
            | Event::Complete { request_id }
            | Event::TransportError { request_id, .. } => Some(request_id),
            _ => None,
        }
    }
}
