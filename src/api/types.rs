//! API request and response types
//!
//! Field names follow the browser client's camelCase convention.

use crate::extract::ResearchHit;
use crate::message::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Body of the chat and agent endpoints
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    pub url: String,
    pub content: String,
    pub extracted_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct LeadResearchRequest {
    pub company: String,
}

/// Structured model output for a lead
#[derive(Debug, Deserialize)]
pub struct LeadAssessment {
    pub score: i64,
    pub summary: String,
    #[serde(default)]
    pub insights: Vec<String>,
    pub email: EmailDraft,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailDraft {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct LeadResearchResponse {
    pub company: String,
    pub research: Vec<ResearchHit>,
    /// Always within 0..=100
    pub score: u8,
    pub summary: String,
    pub insights: Vec<String>,
    pub email: EmailDraft,
}

pub fn lead_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "score": { "type": "integer", "minimum": 0, "maximum": 100 },
            "summary": { "type": "string" },
            "insights": { "type": "array", "items": { "type": "string" } },
            "email": {
                "type": "object",
                "properties": {
                    "subject": { "type": "string" },
                    "body": { "type": "string" }
                },
                "required": ["subject", "body"],
                "additionalProperties": false
            }
        },
        "required": ["score", "summary", "insights", "email"],
        "additionalProperties": false
    })
}

// ============================================================
// Estimate
// ============================================================

/// Estimate questionnaire. Every field defaults so that missing input
/// reaches validation and produces a readable message.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Questionnaire {
    pub project_type: String,
    pub description: String,
    pub platforms: Vec<String>,
    pub features: Vec<String>,
    pub timeline: String,
    pub budget: String,
    pub contact: ContactInfo,
}

impl Questionnaire {
    /// Everything except contact details
    pub fn answers(&self) -> Value {
        json!({
            "projectType": self.project_type,
            "description": self.description,
            "platforms": self.platforms,
            "features": self.features,
            "timeline": self.timeline,
            "budget": self.budget,
        })
    }

    /// Prompt text describing the project
    pub fn brief(&self) -> String {
        format!(
            "Project type: {}\nDescription: {}\nPlatforms: {}\nRequested features: {}\nDesired timeline: {}\nBudget: {}",
            self.project_type,
            self.description.trim(),
            self.platforms.join(", "),
            if self.features.is_empty() {
                "none listed".to_string()
            } else {
                self.features.join(", ")
            },
            self.timeline,
            self.budget,
        )
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactInfo {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
    Enterprise,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekRange {
    pub min_weeks: u32,
    pub max_weeks: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRange {
    pub min: u64,
    pub max: u64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureEstimate {
    pub name: String,
    pub effort: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Estimate {
    pub summary: String,
    pub timeline: WeekRange,
    pub cost: CostRange,
    pub complexity: Complexity,
    pub features: Vec<FeatureEstimate>,
    pub recommendations: Vec<String>,
}

impl Estimate {
    /// Repair ranges the model returned upside down
    pub fn normalized(mut self) -> Self {
        if self.timeline.min_weeks > self.timeline.max_weeks {
            std::mem::swap(&mut self.timeline.min_weeks, &mut self.timeline.max_weeks);
        }
        if self.cost.min > self.cost.max {
            std::mem::swap(&mut self.cost.min, &mut self.cost.max);
        }
        self
    }
}

pub fn estimate_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "summary": { "type": "string" },
            "timeline": {
                "type": "object",
                "properties": {
                    "minWeeks": { "type": "integer", "minimum": 1 },
                    "maxWeeks": { "type": "integer", "minimum": 1 }
                },
                "required": ["minWeeks", "maxWeeks"],
                "additionalProperties": false
            },
            "cost": {
                "type": "object",
                "properties": {
                    "min": { "type": "integer", "minimum": 0 },
                    "max": { "type": "integer", "minimum": 0 },
                    "currency": { "type": "string", "enum": ["USD"] }
                },
                "required": ["min", "max", "currency"],
                "additionalProperties": false
            },
            "complexity": {
                "type": "string",
                "enum": ["simple", "moderate", "complex", "enterprise"]
            },
            "features": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "effort": { "type": "string", "enum": ["low", "medium", "high"] },
                        "notes": { "type": "string" }
                    },
                    "required": ["name", "effort", "notes"],
                    "additionalProperties": false
                }
            },
            "recommendations": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["summary", "timeline", "cost", "complexity", "features", "recommendations"],
        "additionalProperties": false
    })
}

// ============================================================
// Voice
// ============================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceResponse {
    pub user_text: String,
    pub ai_response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_format: Option<String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
