//! Bounded tool-calling loop for the agent endpoint
//!
//! A round is one model call plus execution of every tool it requested.
//! The loop stops when the model answers without tools or the round budget
//! runs out, whichever comes first.

use crate::llm::{ContentBlock, LlmError, LlmMessage, LlmRequest, LlmService, MessageRole};
use crate::tools::{ToolOutput, ToolRegistry};
use crate::wire::StreamEvent;
use tokio::sync::mpsc;

/// How the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentOutcome {
    /// The model produced a final answer
    Completed { rounds: usize },
    /// The round budget ran out; whatever was produced stands
    RoundLimit { rounds: usize },
    /// The client stopped listening
    Abandoned,
}

pub struct AgentRequest {
    pub system: String,
    pub messages: Vec<LlmMessage>,
    pub max_tokens: u32,
}

/// Drive the agent, streaming fragments, tool calls and tool results into
/// `sink` in the order they happen.
pub async fn run_agent(
    llm: &dyn LlmService,
    tools: &ToolRegistry,
    request: AgentRequest,
    max_rounds: usize,
    sink: &mpsc::Sender<StreamEvent>,
) -> Result<AgentOutcome, LlmError> {
    let mut messages = request.messages;
    let definitions = tools.definitions();

    for round in 1..=max_rounds {
        let llm_request = LlmRequest {
            system: request.system.clone(),
            messages: messages.clone(),
            tools: definitions.clone(),
            max_tokens: Some(request.max_tokens),
            response_format: None,
        };
        let response = llm.complete(&llm_request).await?;

        let text = response.text();
        if !text.is_empty() && sink.send(StreamEvent::fragment(text)).await.is_err() {
            return Ok(AgentOutcome::Abandoned);
        }

        let calls: Vec<(String, String, serde_json::Value)> = response
            .tool_uses()
            .into_iter()
            .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
            .collect();
        if calls.is_empty() {
            return Ok(AgentOutcome::Completed { rounds: round });
        }

        messages.push(LlmMessage {
            role: MessageRole::Assistant,
            content: response.content,
        });

        let mut results = Vec::with_capacity(calls.len());
        for (call_id, name, input) in calls {
            let call = StreamEvent::ToolCall {
                call_id: call_id.clone(),
                name: name.clone(),
                input: input.clone(),
            };
            if sink.send(call).await.is_err() {
                return Ok(AgentOutcome::Abandoned);
            }

            let output = tools.execute(&name, input).unwrap_or_else(|| {
                tracing::warn!(tool = %name, "Model requested an unregistered tool");
                ToolOutput::error(format!("Unknown tool: {name}"))
            });
            tracing::debug!(tool = %name, round, is_error = output.is_error, "Tool executed");

            results.push(ContentBlock::tool_result(
                call_id.clone(),
                output.output.to_string(),
                output.is_error,
            ));
            let result = StreamEvent::ToolResult {
                call_id,
                name,
                output: output.output,
                is_error: output.is_error,
            };
            if sink.send(result).await.is_err() {
                return Ok(AgentOutcome::Abandoned);
            }
        }

        messages.push(LlmMessage {
            role: MessageRole::User,
            content: results,
        });
    }

    tracing::info!(max_rounds, "Agent stopped at round limit");
    Ok(AgentOutcome::RoundLimit { rounds: max_rounds })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::MockLlm;
    use crate::llm::LlmResponse;
    use serde_json::json;

    fn tool_response(name: &str) -> LlmResponse {
        LlmResponse {
            content: vec![ContentBlock::tool_use("call_1", name, json!({}))],
            ..LlmResponse::default()
        }
    }

    fn text_response(text: &str) -> LlmResponse {
        LlmResponse {
            content: vec![ContentBlock::text(text)],
            end_turn: true,
            ..LlmResponse::default()
        }
    }

    fn request() -> AgentRequest {
        AgentRequest {
            system: "You are an agent.".to_string(),
            messages: vec![LlmMessage::user("What do you offer?")],
            max_tokens: 500,
        }
    }

    async fn drain(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_tool_round_then_answer() {
        let llm = MockLlm::new();
        llm.queue_response(tool_response("list_services"));
        llm.queue_response(text_response("We offer web, mobile and AI work."));
        let (tx, rx) = mpsc::channel(32);

        let outcome = run_agent(&llm, &ToolRegistry::standard(), request(), 3, &tx)
            .await
            .unwrap();
        drop(tx);
        let events = drain(rx).await;

        assert_eq!(outcome, AgentOutcome::Completed { rounds: 2 });
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], StreamEvent::ToolCall { name, .. } if name == "list_services"));
        assert!(matches!(&events[1], StreamEvent::ToolResult { is_error: false, .. }));
        assert_eq!(events[2], StreamEvent::fragment("We offer web, mobile and AI work."));

        // The second call carries the tool exchange
        let second = &llm.recorded_requests()[1];
        assert_eq!(second.messages.len(), 3);
        assert!(matches!(
            &second.messages[2].content[0],
            ContentBlock::ToolResult { tool_use_id, .. } if tool_use_id == "call_1"
        ));
    }

    #[tokio::test]
    async fn test_endless_tool_requests_stop_at_round_limit() {
        let llm = MockLlm::always(tool_response("get_pricing"));
        let (tx, rx) = mpsc::channel(64);

        let outcome = run_agent(&llm, &ToolRegistry::standard(), request(), 3, &tx)
            .await
            .unwrap();
        drop(tx);
        let events = drain(rx).await;

        assert_eq!(outcome, AgentOutcome::RoundLimit { rounds: 3 });
        assert_eq!(llm.call_count(), 3);
        let results = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::ToolResult { .. }))
            .count();
        assert_eq!(results, 3);
    }

    #[tokio::test]
    async fn test_unknown_tool_gets_error_result() {
        let llm = MockLlm::new();
        llm.queue_response(tool_response("rm_rf"));
        llm.queue_response(text_response("Sorry, I can't do that."));
        let (tx, rx) = mpsc::channel(32);

        run_agent(&llm, &ToolRegistry::standard(), request(), 3, &tx)
            .await
            .unwrap();
        drop(tx);
        let events = drain(rx).await;

        assert!(matches!(
            &events[1],
            StreamEvent::ToolResult { is_error: true, output, .. } if output["error"] == "Unknown tool: rm_rf"
        ));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let llm = MockLlm::new();
        llm.queue_error(LlmError::server_error("down"));
        let (tx, _rx) = mpsc::channel(8);

        let err = run_agent(&llm, &ToolRegistry::standard(), request(), 3, &tx)
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::llm::LlmErrorKind::ServerError);
    }
}
