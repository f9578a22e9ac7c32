//! Tools the agent endpoint can invoke
//!
//! The set is closed: [`ToolRegistry::standard`] is the only way to build a
//! registry, and names outside it are never executed.

mod booking;
pub mod catalog;
mod services;

pub use booking::BookCallTool;
pub use services::{GetPricingTool, ListServicesTool};

use crate::llm::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Result from tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub output: Value,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(output: Value) -> Self {
        Self {
            output,
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            output: serde_json::json!({ "error": message.into() }),
            is_error: true,
        }
    }
}

/// A capability the model may request by name
///
/// Tools are stateless and run synchronously; everything they need arrives
/// in `input`.
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    /// Tool description for LLM
    fn description(&self) -> &'static str;

    /// JSON schema for tool input
    fn input_schema(&self) -> Value;

    fn run(&self, input: Value) -> ToolOutput;
}

/// The fixed collection of tools available to the agent
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn standard() -> Self {
        Self {
            tools: vec![
                Arc::new(ListServicesTool),
                Arc::new(GetPricingTool),
                Arc::new(BookCallTool),
            ],
        }
    }

    /// Get all tool definitions for LLM
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name() == name)
    }

    /// Execute a tool by name. `None` when the name is not registered.
    pub fn execute(&self, name: &str, input: Value) -> Option<ToolOutput> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|tool| tool.run(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_standard_registry_is_the_closed_set() {
        let registry = ToolRegistry::standard();
        let names: Vec<_> = registry
            .definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["list_services", "get_pricing", "book_call"]);
    }

    #[test]
    fn test_unknown_tool_is_not_executed() {
        let registry = ToolRegistry::standard();
        assert!(registry.execute("delete_database", json!({})).is_none());
        assert!(!registry.contains("delete_database"));
    }

    #[test]
    fn test_schemas_are_objects() {
        for def in ToolRegistry::standard().definitions() {
            assert_eq!(def.input_schema["type"], "object", "{}", def.name);
        }
    }
}
