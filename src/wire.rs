//! Events streamed from the proxy to the client
//!
//! Each event travels as one SSE frame whose `event:` name equals the
//! serde tag and whose `data:` is the JSON encoding.

use crate::sse_codec::SseFrame;
use crate::state_machine::Event;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Fragment {
        text: String,
    },
    ToolCall {
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
    Complete,
    Error {
        message: String,
    },
}

impl StreamEvent {
    pub fn fragment(text: impl Into<String>) -> Self {
        StreamEvent::Fragment { text: text.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
        }
    }

    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Fragment { .. } => "fragment",
            StreamEvent::ToolCall { .. } => "tool_call",
            StreamEvent::ToolResult { .. } => "tool_result",
            StreamEvent::Complete => "complete",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// Whether this ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete | StreamEvent::Error { .. })
    }

    pub fn from_frame(frame: &SseFrame) -> Result<Self, serde_json::Error> {
        serde_json::from_str(&frame.data)
    }

    /// The conversation event this produces for a given request
    pub fn into_event(self, request_id: &str) -> Event {
        let request_id = request_id.to_string();
        match self {
            StreamEvent::Fragment { text } => Event::Fragment { request_id, text },
            StreamEvent::ToolCall {
                call_id,
                name,
                input,
            } => Event::ToolCall {
                request_id,
                call_id,
                name,
                input,
            },
            StreamEvent::ToolResult {
                call_id,
                name,
                output,
                is_error,
            } => Event::ToolResult {
                request_id,
                call_id,
                name,
                output,
                is_error,
            },
            StreamEvent::Complete => Event::Complete { request_id },
            StreamEvent::Error { message } => Event::TransportError {
                request_id,
                message,
                retryable: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tag_matches_event_name() {
        let events = [
            StreamEvent::fragment("hi"),
            StreamEvent::ToolCall {
                call_id: "c".to_string(),
                name: "get_pricing".to_string(),
                input: json!({"service": "web"}),
            },
            StreamEvent::Complete,
            StreamEvent::error("boom"),
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.name());
        }
    }

    #[test]
    fn test_error_frame_becomes_non_retryable_transport_error() {
        let frame = SseFrame {
            event: Some("error".to_string()),
            data: r#"{"type":"error","message":"Upstream timed out"}"#.to_string(),
        };
        let event = StreamEvent::from_frame(&frame).unwrap().into_event("r1");
        assert_eq!(
            event,
            Event::TransportError {
                request_id: "r1".to_string(),
                message: "Upstream timed out".to_string(),
                retryable: false,
            }
        );
    }
}
