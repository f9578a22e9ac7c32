//! Catalog lookups

use super::catalog::{self, SERVICES};
use super::{Tool, ToolOutput};
use serde::Deserialize;
use serde_json::{json, Value};

pub struct ListServicesTool;

impl Tool for ListServicesTool {
    fn name(&self) -> &'static str {
        "list_services"
    }

    fn description(&self) -> &'static str {
        "List the services on offer with a one-line summary of each."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn run(&self, _input: Value) -> ToolOutput {
        let services: Vec<Value> = SERVICES
            .iter()
            .map(|s| json!({ "id": s.id, "name": s.name, "summary": s.summary }))
            .collect();
        ToolOutput::success(json!({ "services": services }))
    }
}

pub struct GetPricingTool;

#[derive(Debug, Deserialize)]
struct PricingInput {
    service: String,
}

impl Tool for GetPricingTool {
    fn name(&self) -> &'static str {
        "get_pricing"
    }

    fn description(&self) -> &'static str {
        "Get the indicative price range and delivery time for one service."
    }

    fn input_schema(&self) -> Value {
        let ids: Vec<&str> = SERVICES.iter().map(|s| s.id).collect();
        json!({
            "type": "object",
            "required": ["service"],
            "properties": {
                "service": {
                    "type": "string",
                    "enum": ids,
                    "description": "Service id from list_services"
                }
            }
        })
    }

    fn run(&self, input: Value) -> ToolOutput {
        let input: PricingInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutput::error(format!("Invalid input: {e}")),
        };
        match catalog::find(&input.service) {
            Some(s) => ToolOutput::success(json!({
                "service": s.id,
                "name": s.name,
                "price": { "min": s.price_from, "max": s.price_to, "currency": "USD" },
                "timeline": { "minWeeks": s.weeks_from, "maxWeeks": s.weeks_to },
            })),
            None => ToolOutput::error(format!("Unknown service: {}", input.service)),
        }
    }
}
