//! Effects produced by state transitions

use crate::message::{Message, MessagePart, MessageStatus};

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Push a message onto the history
    AppendMessage(Message),

    /// Extend the trailing text of an in-progress message
    AppendText { message_id: String, text: String },

    /// Add a structured part to an in-progress message
    AppendPart {
        message_id: String,
        part: MessagePart,
    },

    /// Move a message to a terminal status; it is immutable afterwards
    FinalizeMessage {
        message_id: String,
        status: MessageStatus,
    },

    /// Issue the request carrying the current history
    SendRequest { request_id: String },

    /// Tear down the in-flight request
    AbortTransport { request_id: String },

    /// Hang up the realtime session
    EndSession,

    /// Show an error to the user
    SurfaceError { message: String },

    /// Tell the renderer the interaction state changed
    NotifyStateChange { state: &'static str },
}

impl Effect {
    pub fn finalize(message_id: impl Into<String>, status: MessageStatus) -> Self {
        Effect::FinalizeMessage {
            message_id: message_id.into(),
            status,
        }
    }

    pub fn surface_error(message: impl Into<String>) -> Self {
        Effect::SurfaceError {
            message: message.into(),
        }
    }

    /// Whether the runtime applies this to the message list itself
    pub fn is_message_effect(&self) -> bool {
        matches!(
            self,
            Effect::AppendMessage(_)
                | Effect::AppendText { .. }
                | Effect::AppendPart { .. }
                | Effect::FinalizeMessage { .. }
        )
    }
}
