//! Conversation state types

use serde::{Deserialize, Serialize};

/// What the UI should currently render. Exactly one holds at a time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvState {
    /// Ready for input, no request outstanding
    #[default]
    Idle,

    /// Request sent, no content received yet
    Submitted { request_id: String },

    /// Content arriving into an in-progress assistant message
    Streaming {
        request_id: String,
        message_id: String,
    },

    /// Realtime session negotiating
    Connecting,

    /// Realtime session open, nobody speaking
    ConnectedIdle,

    /// Realtime session open, user speech detected
    UserSpeaking,

    /// Realtime session open, assistant utterance in progress
    AiSpeaking,
}

impl ConvState {
    /// Name used in state-change notifications
    pub fn name(&self) -> &'static str {
        match self {
            ConvState::Idle => "idle",
            ConvState::Submitted { .. } => "submitted",
            ConvState::Streaming { .. } => "streaming",
            ConvState::Connecting => "connecting",
            ConvState::ConnectedIdle => "connected_idle",
            ConvState::UserSpeaking => "user_speaking",
            ConvState::AiSpeaking => "ai_speaking",
        }
    }

    /// A text request is outstanding
    pub fn is_awaiting_response(&self) -> bool {
        matches!(self, ConvState::Submitted { .. } | ConvState::Streaming { .. })
    }

    /// A realtime session is negotiating or open
    pub fn is_in_session(&self) -> bool {
        matches!(
            self,
            ConvState::Connecting
                | ConvState::ConnectedIdle
                | ConvState::UserSpeaking
                | ConvState::AiSpeaking
        )
    }

    /// Speech states only exist once the session is connected
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            ConvState::ConnectedIdle | ConvState::UserSpeaking | ConvState::AiSpeaking
        )
    }

    /// The request id a transport event must carry to be accepted
    pub fn active_request(&self) -> Option<&str> {
        match self {
            ConvState::Submitted { request_id } | ConvState::Streaming { request_id, .. } => {
                Some(request_id)
            }
            _ => None,
        }
    }
}

/// Context for a conversation (immutable configuration)
///
/// Each widget instance owns one of these; nothing about a conversation
/// lives in process-wide state.
#[derive(Debug, Clone)]
pub struct ConvContext {
    pub conversation_id: String,
}

impl ConvContext {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
        }
    }

    /// Fresh context with a random session id
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }
}

/// Id of the assistant reply to a given request
pub fn reply_id(request_id: &str) -> String {
    format!("{request_id}:assistant")
}
