//! Mock providers for testing

use super::{
    AudioUpload, LlmError, LlmRequest, LlmResponse, LlmService, RealtimeNegotiator,
    SpeechService, SynthesizedAudio, TextStream,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ============================================================================
// Mock LLM
// ============================================================================

/// Mock LLM that returns queued responses and records requests
pub struct MockLlm {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    streams: Mutex<VecDeque<Result<Vec<Result<String, LlmError>>, LlmError>>>,
    /// Returned once the queue is empty, if set
    fallback: Option<LlmResponse>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            streams: Mutex::new(VecDeque::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every unqueued completion with this response
    pub fn always(response: LlmResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::new()
        }
    }

    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Queue a stream of deltas
    pub fn queue_stream(&self, items: Vec<Result<String, LlmError>>) {
        self.streams.lock().unwrap().push_back(Ok(items));
    }

    /// Queue a failure to open a stream
    pub fn queue_stream_error(&self, error: LlmError) {
        self.streams.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmService for MockLlm {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let queued = self.responses.lock().unwrap().pop_front();
        match (queued, &self.fallback) {
            (Some(result), _) => result,
            (None, Some(response)) => Ok(response.clone()),
            (None, None) => Err(LlmError::network("No mock response queued")),
        }
    }

    async fn stream(&self, request: &LlmRequest) -> Result<TextStream, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let queued = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock stream queued")))?;
        Ok(futures::stream::iter(queued).boxed())
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

// ============================================================================
// Mock Speech
// ============================================================================

pub struct MockSpeech {
    pub transcript: String,
    pub fail_synthesis: bool,
}

impl MockSpeech {
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            fail_synthesis: false,
        }
    }
}

#[async_trait]
impl SpeechService for MockSpeech {
    async fn transcribe(&self, audio: AudioUpload) -> Result<String, LlmError> {
        if audio.bytes.is_empty() {
            return Err(LlmError::invalid_request("empty audio"));
        }
        Ok(self.transcript.clone())
    }

    async fn synthesize(&self, _text: &str) -> Result<SynthesizedAudio, LlmError> {
        if self.fail_synthesis {
            return Err(LlmError::server_error("TTS unavailable"));
        }
        Ok(SynthesizedAudio {
            bytes: b"ID3mock".to_vec(),
            format: "mp3".to_string(),
        })
    }
}

// ============================================================================
// Mock Negotiator
// ============================================================================

pub struct MockNegotiator {
    answer: Result<String, String>,
    calls: AtomicUsize,
}

impl MockNegotiator {
    pub fn answering(answer: impl Into<String>) -> Self {
        Self {
            answer: Ok(answer.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            answer: Err(message.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RealtimeNegotiator for MockNegotiator {
    async fn negotiate(&self, _offer_sdp: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone().map_err(LlmError::server_error)
    }
}
