//! Discovery call booking requests

use super::{Tool, ToolOutput};
use crate::api::validation::is_valid_email;
use serde::Deserialize;
use serde_json::{json, Value};

/// Records a request for a discovery call. Nothing is scheduled; the
/// response tells the visitor what happens next.
pub struct BookCallTool;

#[derive(Debug, Deserialize)]
struct BookCallInput {
    name: String,
    email: String,
    #[serde(default)]
    preferred_time: Option<String>,
    #[serde(default)]
    topic: Option<String>,
}

impl Tool for BookCallTool {
    fn name(&self) -> &'static str {
        "book_call"
    }

    fn description(&self) -> &'static str {
        "Request a 30-minute discovery call. Ask the visitor for their name and email first."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["name", "email"],
            "properties": {
                "name": { "type": "string" },
                "email": { "type": "string" },
                "preferred_time": {
                    "type": "string",
                    "description": "Free-form, e.g. 'Tuesday afternoon CET'"
                },
                "topic": { "type": "string" }
            }
        })
    }

    fn run(&self, input: Value) -> ToolOutput {
        let input: BookCallInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutput::error(format!("Invalid input: {e}")),
        };
        if input.name.trim().is_empty() {
            return ToolOutput::error("A name is required");
        }
        if !is_valid_email(&input.email) {
            return ToolOutput::error("A valid email is required");
        }

        let reference: String = uuid::Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(8)
            .collect();
        ToolOutput::success(json!({
            "status": "requested",
            "reference": format!("CALL-{}", reference.to_uppercase()),
            "name": input.name.trim(),
            "email": input.email.trim(),
            "preferred_time": input.preferred_time,
            "topic": input.topic,
            "next_step": "A confirmation email with available slots will follow within one business day.",
        }))
    }
}
