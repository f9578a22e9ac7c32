//! Conversation message model
//!
//! Shared by the client runtime (which builds and renders messages) and the
//! proxy endpoints (which receive the history as JSON).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle of a message. `Complete` and `Incomplete` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    InProgress,
    #[default]
    Complete,
    /// Stream failed or was cancelled; whatever arrived is kept
    Incomplete,
}

impl MessageStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, MessageStatus::InProgress)
    }
}

/// Typed content fragment within a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    Text {
        text: String,
    },
    ToolInvocation {
        call_id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        call_id: String,
        name: String,
        output: Value,
        #[serde(default)]
        is_error: bool,
    },
}

impl MessagePart {
    pub fn text(s: impl Into<String>) -> Self {
        MessagePart::Text { text: s.into() }
    }
}

/// One turn in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub parts: Vec<MessagePart>,
    #[serde(default)]
    pub status: MessageStatus,
}

impl Message {
    /// A user turn; terminal as soon as it exists
    pub fn user(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            parts: vec![MessagePart::text(text)],
            status: MessageStatus::Complete,
        }
    }

    /// An empty assistant turn that is still receiving content
    pub fn assistant(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            parts: Vec::new(),
            status: MessageStatus::InProgress,
        }
    }

    /// A finished turn with a single text part
    pub fn committed(id: impl Into<String>, role: Role, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            parts: vec![MessagePart::text(text)],
            status: MessageStatus::Complete,
        }
    }

    pub fn with_part(mut self, part: MessagePart) -> Self {
        self.parts.push(part);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Concatenated text parts, in order
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Append to the trailing text part, starting a new one if the last part
    /// is structured (a tool call or result).
    pub fn append_text(&mut self, fragment: &str) {
        if let Some(MessagePart::Text { text }) = self.parts.last_mut() {
            text.push_str(fragment);
        } else {
            self.parts.push(MessagePart::text(fragment));
        }
    }
}
