//! HTTP streaming transport
//!
//! Posts the history to a proxy endpoint and turns the SSE response into
//! conversation events. No retries: every failure ends the request.

use crate::message::Message;
use crate::runtime::ChatTransport;
use crate::sse_codec::{SseDecoder, SseFrame};
use crate::state_machine::Event;
use crate::wire::StreamEvent;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Serialize)]
struct ChatPayload<'a> {
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Whether the stream has more to say
enum Flow {
    Continue,
    Done,
}

pub struct HttpStreamTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpStreamTransport {
    pub fn new(endpoint: Url) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    /// Run the request to its terminal event. `Err` carries the message for
    /// a `TransportError` the caller still has to emit.
    async fn stream(
        &self,
        request_id: &str,
        history: &[Message],
        events: &mpsc::Sender<Event>,
    ) -> Result<(), String> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&ChatPayload { messages: history })
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(%request_id, error = %e, "Request failed before response");
                "Could not reach the server".to_string()
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map_or_else(|_| format!("Request failed ({status})"), |body| body.error);
            return Err(message);
        }

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| {
                tracing::warn!(%request_id, error = %e, "Stream dropped");
                "Connection lost".to_string()
            })?;
            for frame in decoder.push(&chunk) {
                if let Flow::Done = forward(request_id, &frame, events).await {
                    return Ok(());
                }
            }
        }
        if let Some(frame) = decoder.finish() {
            if let Flow::Done = forward(request_id, &frame, events).await {
                return Ok(());
            }
        }

        Err("Response ended unexpectedly".to_string())
    }
}

/// Emit the event a frame carries
async fn forward(request_id: &str, frame: &SseFrame, events: &mpsc::Sender<Event>) -> Flow {
    let event = match StreamEvent::from_frame(frame) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(%request_id, error = %e, event = ?frame.event, "Skipping malformed frame");
            return Flow::Continue;
        }
    };
    let terminal = event.is_terminal();
    if events.send(event.into_event(request_id)).await.is_err() {
        // Nobody is listening anymore
        return Flow::Done;
    }
    if terminal {
        Flow::Done
    } else {
        Flow::Continue
    }
}

#[async_trait]
impl ChatTransport for HttpStreamTransport {
    async fn send(
        &self,
        request_id: String,
        history: Vec<Message>,
        events: mpsc::Sender<Event>,
        cancel: CancellationToken,
    ) {
        let outcome = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                tracing::info!(%request_id, "Request aborted, response dropped");
                return;
            }

            outcome = self.stream(&request_id, &history, &events) => outcome,
        };

        if let Err(message) = outcome {
            let _ = events
                .send(Event::TransportError {
                    request_id,
                    message,
                    retryable: false,
                })
                .await;
        }
    }
}
