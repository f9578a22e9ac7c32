//! AI provider abstraction
//!
//! Chat completion (whole and streamed), speech, and realtime session
//! negotiation, each behind its own trait so handlers can be tested with
//! mocks.

mod config;
mod error;
mod openai;
mod types;

#[cfg(test)]
pub mod testing;

pub use config::LlmConfig;
pub use error::{LlmError, LlmErrorKind};
pub use openai::OpenAIService;
pub use types::*;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;

/// Incremental text from a streamed completion
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

/// Common interface for chat completion providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Make a completion request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Start a streamed completion. Errors before the first delta are
    /// returned here; later failures arrive as stream items.
    async fn stream(&self, request: &LlmRequest) -> Result<TextStream, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Speech-to-text and text-to-speech
#[async_trait]
pub trait SpeechService: Send + Sync {
    async fn transcribe(&self, audio: AudioUpload) -> Result<String, LlmError>;
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, LlmError>;
}

/// Exchanges a realtime SDP offer for the provider's answer
#[async_trait]
pub trait RealtimeNegotiator: Send + Sync {
    async fn negotiate(&self, offer_sdp: &str) -> Result<String, LlmError>;
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    tool_calls = response.tool_uses().len(),
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "LLM request failed"
                );
            }
        }

        result
    }

    async fn stream(&self, request: &LlmRequest) -> Result<TextStream, LlmError> {
        let start = std::time::Instant::now();
        let model = self.model_id.clone();
        match self.inner.stream(request).await {
            Ok(stream) => {
                tracing::info!(
                    model = %model,
                    duration_ms = %start.elapsed().as_millis(),
                    "LLM stream opened"
                );
                let mut fragments = 0_usize;
                Ok(stream
                    .inspect(move |item| match item {
                        Ok(_) => fragments += 1,
                        Err(e) => tracing::error!(
                            model = %model,
                            fragments,
                            error = %e.message,
                            "LLM stream failed"
                        ),
                    })
                    .boxed())
            }
            Err(e) => {
                tracing::error!(
                    model = %model,
                    duration_ms = %start.elapsed().as_millis(),
                    error = %e.message,
                    "LLM stream request failed"
                );
                Err(e)
            }
        }
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
