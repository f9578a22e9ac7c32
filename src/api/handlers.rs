//! HTTP request handlers

use super::sse::event_stream;
use super::types::{
    estimate_schema, lead_schema, ChatRequest, ErrorResponse, Estimate, ExtractRequest,
    ExtractResponse, LeadAssessment, LeadResearchRequest, LeadResearchResponse, Questionnaire,
    VoiceResponse,
};
use super::validation::{
    truncate_history, validate_company, validate_history, validate_questionnaire,
};
use super::AppState;
use crate::agent::{run_agent, AgentOutcome, AgentRequest};
use crate::extract::{parse_http_url, ExtractError, ResearchHit};
use crate::llm::{AudioUpload, LlmError, LlmMessage, LlmRequest, ResponseFormat, TextStream};
use crate::message::Message;
use crate::store::SubmissionRecord;
use crate::system_prompt;
use crate::wire::StreamEvent;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, FromRequest, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use futures::StreamExt;
use std::fmt::Write;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Largest accepted voice upload
const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

/// Most search hits handed to the lead-research prompt
const MAX_RESEARCH_HITS: usize = 5;

const STREAM_FAILED: &str = "The response was interrupted. Please try again.";
const STREAM_TIMED_OUT: &str = "The response took too long and was stopped.";

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Streaming chat
        .route("/api/chat", post(chat))
        // Agent with tools
        .route("/api/agent", post(agent))
        // Web content extraction
        .route("/api/extract", post(extract))
        // Structured outputs
        .route("/api/lead-research", post(lead_research))
        .route("/api/estimate", post(estimate))
        // Voice
        .route(
            "/api/voice",
            post(voice).layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES)),
        )
        .route("/api/realtime/session", post(realtime_session))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Chat
// ============================================================

fn history_request(system: String, history: &[Message], max_tokens: u32) -> LlmRequest {
    LlmRequest {
        system,
        messages: history.iter().filter_map(LlmMessage::from_history).collect(),
        max_tokens: Some(max_tokens),
        ..LlmRequest::default()
    }
}

async fn chat(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_history(&req.messages).map_err(AppError::BadRequest)?;
    let window = truncate_history(&req.messages, state.limits.chat_history_window);
    let request = history_request(
        system_prompt::chat_prompt(),
        window,
        state.limits.max_output_tokens,
    );

    // Open the upstream stream before answering so a refusal is still a 502
    let upstream = state
        .llm
        .stream(&request)
        .await
        .map_err(|e| AppError::upstream("The assistant is unavailable right now", &e))?;

    tracing::info!(
        forwarded = request.messages.len(),
        received = req.messages.len(),
        "Chat stream started"
    );

    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(relay_text(upstream, tx, state.limits.request_ceiling));
    Ok(event_stream(rx))
}

/// Forward upstream deltas as fragments, ending with exactly one terminal
/// event unless the client has gone away.
async fn relay_text(mut upstream: TextStream, tx: mpsc::Sender<StreamEvent>, ceiling: Duration) {
    let deadline = Instant::now() + ceiling;
    loop {
        let event = match tokio::time::timeout_at(deadline, upstream.next()).await {
            Err(_) => {
                tracing::warn!(ceiling_secs = ceiling.as_secs(), "Chat stream hit the deadline");
                StreamEvent::error(STREAM_TIMED_OUT)
            }
            Ok(None) => StreamEvent::Complete,
            Ok(Some(Ok(text))) if text.is_empty() => continue,
            Ok(Some(Ok(text))) => StreamEvent::fragment(text),
            Ok(Some(Err(e))) => {
                tracing::warn!(error = %e, kind = ?e.kind, "Upstream stream failed");
                StreamEvent::error(STREAM_FAILED)
            }
        };

        let terminal = event.is_terminal();
        if tx.send(event).await.is_err() {
            tracing::debug!("Client disconnected mid-stream");
            return;
        }
        if terminal {
            return;
        }
    }
}

// ============================================================
// Agent
// ============================================================

async fn agent(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_history(&req.messages).map_err(AppError::BadRequest)?;
    let window = truncate_history(&req.messages, state.limits.agent_history_window);
    let request = AgentRequest {
        system: system_prompt::agent_prompt(&state.tools),
        messages: window.iter().filter_map(LlmMessage::from_history).collect(),
        max_tokens: state.limits.max_output_tokens,
    };

    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        let limits = state.limits;
        let run = run_agent(
            state.llm.as_ref(),
            &state.tools,
            request,
            limits.max_tool_rounds,
            &tx,
        );
        let terminal = match tokio::time::timeout(limits.request_ceiling, run).await {
            Ok(Ok(AgentOutcome::Completed { rounds } | AgentOutcome::RoundLimit { rounds })) => {
                tracing::info!(rounds, "Agent finished");
                StreamEvent::Complete
            }
            Ok(Ok(AgentOutcome::Abandoned)) => {
                tracing::debug!("Client disconnected from agent stream");
                return;
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, kind = ?e.kind, "Agent run failed");
                StreamEvent::error(STREAM_FAILED)
            }
            Err(_) => {
                tracing::warn!("Agent run hit the deadline");
                StreamEvent::error(STREAM_TIMED_OUT)
            }
        };
        let _ = tx.send(terminal).await;
    });

    Ok(event_stream(rx))
}

// ============================================================
// Extraction
// ============================================================

async fn extract(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ExtractRequest>,
) -> Result<Json<ExtractResponse>, AppError> {
    let url = parse_http_url(&req.url).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let content = state.extractor.extract(&url).await.map_err(|e| {
        tracing::warn!(%url, error = %e, "Extraction failed");
        match e {
            ExtractError::Upstream(_) => {
                AppError::Upstream("Content extraction is unavailable right now".to_string())
            }
            _ => AppError::BadRequest(format!("Could not extract content from {url}")),
        }
    })?;

    Ok(Json(ExtractResponse {
        url: url.to_string(),
        content,
        extracted_at: chrono::Utc::now(),
    }))
}

// ============================================================
// Lead Research
// ============================================================

fn research_brief(company: &str, hits: &[ResearchHit]) -> String {
    let mut brief = format!("Company: {company}\n\nSearch results:\n");
    if hits.is_empty() {
        brief.push_str("(none found)\n");
    }
    for (i, hit) in hits.iter().enumerate() {
        let _ = writeln!(brief, "{}. {} - {}", i + 1, hit.title, hit.url);
    }
    brief
}

/// Clamp a model-reported score into 0..=100
fn clamp_score(score: i64) -> u8 {
    u8::try_from(score.clamp(0, 100)).unwrap_or(100)
}

async fn lead_research(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LeadResearchRequest>,
) -> Result<Json<LeadResearchResponse>, AppError> {
    let company = validate_company(&req.company).map_err(AppError::BadRequest)?;

    // Research is best effort; the model is told when nothing was found
    let research: Vec<ResearchHit> = match state.extractor.search(&company).await {
        Ok(hits) => hits.into_iter().take(MAX_RESEARCH_HITS).collect(),
        Err(e) => {
            tracing::warn!(%company, error = %e, "Company search failed");
            Vec::new()
        }
    };

    let request = LlmRequest {
        system: system_prompt::lead_research_prompt(),
        messages: vec![LlmMessage::user(research_brief(&company, &research))],
        max_tokens: Some(state.limits.max_output_tokens.saturating_mul(2)),
        response_format: Some(ResponseFormat::json_schema("lead_assessment", lead_schema())),
        ..LlmRequest::default()
    };
    let assessment: LeadAssessment = state
        .llm
        .complete(&request)
        .await
        .and_then(|response| response.parse_json())
        .map_err(|e| AppError::upstream("Lead research failed. Please try again.", &e))?;

    Ok(Json(LeadResearchResponse {
        company,
        research,
        score: clamp_score(assessment.score),
        summary: assessment.summary,
        insights: assessment.insights,
        email: assessment.email,
    }))
}

// ============================================================
// Estimate
// ============================================================

async fn estimate(
    State(state): State<AppState>,
    ApiJson(questionnaire): ApiJson<Questionnaire>,
) -> Result<Json<Estimate>, AppError> {
    validate_questionnaire(&questionnaire).map_err(AppError::BadRequest)?;

    let request = LlmRequest {
        system: system_prompt::estimate_prompt(),
        messages: vec![LlmMessage::user(questionnaire.brief())],
        max_tokens: Some(state.limits.max_output_tokens.saturating_mul(3)),
        response_format: Some(ResponseFormat::json_schema("project_estimate", estimate_schema())),
        ..LlmRequest::default()
    };
    let estimate = state
        .llm
        .complete(&request)
        .await
        .and_then(|response| response.parse_json::<Estimate>())
        .map_err(|e| AppError::upstream("Could not generate an estimate. Please try again.", &e))?
        .normalized();

    let record = SubmissionRecord::new(
        serde_json::to_value(&questionnaire.contact).unwrap_or_default(),
        questionnaire.answers(),
        serde_json::to_value(&estimate).unwrap_or_default(),
    );
    if let Err(e) = state.store.append(&record).await {
        tracing::error!(id = %record.id, error = %e, "Failed to store submission");
    }

    Ok(Json(estimate))
}

// ============================================================
// Voice
// ============================================================

async fn voice(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<VoiceResponse>, AppError> {
    let mut audio: Option<AudioUpload> = None;
    let mut history: Vec<Message> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid form data: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("audio") => {
                let filename = field.file_name().unwrap_or("speech.webm").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid audio upload: {e}")))?;
                audio = Some(AudioUpload {
                    bytes: bytes.to_vec(),
                    filename,
                    content_type,
                });
            }
            Some("history") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid history: {e}")))?;
                if !raw.trim().is_empty() {
                    history = serde_json::from_str(&raw)
                        .map_err(|e| AppError::BadRequest(format!("Invalid history: {e}")))?;
                }
            }
            _ => {}
        }
    }

    let audio = audio
        .filter(|a| !a.bytes.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing audio file".to_string()))?;

    let user_text = state
        .speech
        .transcribe(audio)
        .await
        .map_err(|e| AppError::upstream("Could not transcribe audio", &e))?;
    let user_text = user_text.trim().to_string();
    if user_text.is_empty() {
        return Err(AppError::BadRequest("No speech detected".to_string()));
    }

    history.push(Message::user(uuid::Uuid::new_v4().to_string(), user_text.clone()));
    let window = truncate_history(&history, state.limits.chat_history_window);
    let request = history_request(
        system_prompt::voice_prompt(),
        window,
        state.limits.max_output_tokens,
    );
    let ai_response = state
        .llm
        .complete(&request)
        .await
        .map_err(|e| AppError::upstream("The assistant is unavailable right now", &e))?
        .text();

    // Text still answers the user if speech synthesis fails
    let (audio_base64, audio_format) = match state.speech.synthesize(&ai_response).await {
        Ok(speech) => (
            Some(base64::engine::general_purpose::STANDARD.encode(&speech.bytes)),
            Some(speech.format),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Speech synthesis failed, replying with text only");
            (None, None)
        }
    };

    Ok(Json(VoiceResponse {
        user_text,
        ai_response,
        audio_base64,
        audio_format,
    }))
}

// ============================================================
// Realtime Session
// ============================================================

async fn realtime_session(State(state): State<AppState>, offer: String) -> Response {
    if offer.trim().is_empty() {
        return AppError::BadRequest("Missing SDP offer".to_string()).into_response();
    }

    match state.realtime.negotiate(&offer).await {
        Ok(answer) => ([(header::CONTENT_TYPE, "application/sdp")], answer).into_response(),
        Err(e) => AppError::upstream("Could not start the voice session", &e).into_response(),
    }
}

async fn get_version() -> &'static str {
    concat!("folio ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

/// JSON body extractor whose rejections render as `{ error }`
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
struct ApiJson<T>(T);

enum AppError {
    BadRequest(String),
    Upstream(String),
}

impl AppError {
    /// Log provider detail and keep it away from the caller
    fn upstream(user_message: &str, error: &LlmError) -> Self {
        tracing::error!(error = %error, kind = ?error.kind, "{user_message}");
        AppError::Upstream(user_message.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
