//! Mock transports for testing
//!
//! These drive the executor without a network.

use super::traits::ChatTransport;
use crate::message::Message;
use crate::state_machine::Event;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Scripted Transport
// ============================================================================

/// One step of a scripted response
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Fragment(String),
    ToolCall(String, Value),
    ToolResult(String, Value),
    Complete,
    Fail(String),
}

/// Replays the same script for every request and records what was sent
pub struct ScriptedTransport {
    script: Vec<ScriptStep>,
    histories: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script,
            histories: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Histories received, one entry per request
    pub fn histories(&self) -> Arc<Mutex<Vec<Vec<Message>>>> {
        self.histories.clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn send(
        &self,
        request_id: String,
        history: Vec<Message>,
        events: mpsc::Sender<Event>,
        cancel: CancellationToken,
    ) {
        self.histories.lock().unwrap().push(history);

        for (index, step) in self.script.iter().enumerate() {
            if cancel.is_cancelled() {
                return;
            }
            let call_id = format!("call-{index}");
            let event = match step.clone() {
                ScriptStep::Fragment(text) => Event::Fragment {
                    request_id: request_id.clone(),
                    text,
                },
                ScriptStep::ToolCall(name, input) => Event::ToolCall {
                    request_id: request_id.clone(),
                    call_id,
                    name,
                    input,
                },
                ScriptStep::ToolResult(name, output) => Event::ToolResult {
                    request_id: request_id.clone(),
                    call_id,
                    name,
                    output,
                    is_error: false,
                },
                ScriptStep::Complete => Event::Complete {
                    request_id: request_id.clone(),
                },
                ScriptStep::Fail(message) => Event::TransportError {
                    request_id: request_id.clone(),
                    message,
                    retryable: false,
                },
            };
            if events.send(event).await.is_err() {
                return;
            }
        }
    }
}

// ============================================================================
// Stalled Transport
// ============================================================================

/// Sends one fragment, then waits until cancelled.
///
/// Optionally misbehaves by emitting a fragment after cancellation, which
/// the runtime must ignore.
pub struct StalledTransport {
    first: String,
    late: Option<String>,
    cancelled: Arc<Notify>,
}

impl StalledTransport {
    pub fn new(first: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            late: None,
            cancelled: Arc::new(Notify::new()),
        }
    }

    pub fn with_late_fragment(mut self, text: impl Into<String>) -> Self {
        self.late = Some(text.into());
        self
    }

    /// Notified each time a request observes cancellation
    pub fn cancelled(&self) -> Arc<Notify> {
        self.cancelled.clone()
    }
}

#[async_trait]
impl ChatTransport for StalledTransport {
    async fn send(
        &self,
        request_id: String,
        _history: Vec<Message>,
        events: mpsc::Sender<Event>,
        cancel: CancellationToken,
    ) {
        let _ = events
            .send(Event::Fragment {
                request_id: request_id.clone(),
                text: self.first.clone(),
            })
            .await;

        cancel.cancelled().await;

        if let Some(text) = &self.late {
            let _ = events
                .send(Event::Fragment {
                    request_id,
                    text: text.clone(),
                })
                .await;
        }
        self.cancelled.notify_one();
    }
}
