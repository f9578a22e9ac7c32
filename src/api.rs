//! HTTP API for the portfolio's AI proxy endpoints
//!
//! Every handler is stateless: it shapes one outbound provider request from
//! the caller's input and relays the result.

mod handlers;
mod sse;
mod types;
pub mod validation;

pub use handlers::create_router;

use crate::config::ProxyLimits;
use crate::extract::ContentExtractor;
use crate::llm::{LlmService, RealtimeNegotiator, SpeechService};
use crate::store::SubmissionStore;
use crate::tools::ToolRegistry;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<dyn LlmService>,
    pub speech: Arc<dyn SpeechService>,
    pub realtime: Arc<dyn RealtimeNegotiator>,
    pub extractor: Arc<dyn ContentExtractor>,
    pub tools: Arc<ToolRegistry>,
    pub store: Arc<SubmissionStore>,
    pub limits: ProxyLimits,
}
