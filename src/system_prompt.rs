//! Fixed system prompts for each AI endpoint
//!
//! Prompts are assembled from a shared persona plus the service catalog so
//! every endpoint quotes the same offering.

use crate::tools::{catalog, ToolRegistry};
use std::fmt::Write;

/// Persona shared by every conversational surface
const PERSONA: &str = r"You are the assistant on a software studio's portfolio site. You help visitors understand what the studio builds, what it costs and how to get started.

Be friendly and concise. Never invent services, prices or client names that are not listed below. If a visitor wants to start a project, suggest booking a call.";

const VOICE_SUFFIX: &str = r"

You are speaking out loud. Keep every answer to two or three short sentences, avoid lists and markdown, and spell out numbers the way a person would say them.";

const LEAD_RESEARCH_PROMPT: &str = r"You qualify inbound leads for a software studio. Given a company name and web search results about it, summarize what the company does, judge how likely it is to need custom software, AI integration or automation work, and draft a short personalised outreach email.

Score the lead from 0 (no fit) to 100 (ideal fit). Base every claim on the search results; say so when information is missing.";

const ESTIMATE_PROMPT: &str = r"You produce preliminary project estimates for a software studio from a client questionnaire. Use the studio's published price and timeline ranges as anchors, break the project into features with an effort level (low, medium or high), and list concrete recommendations.

Costs are in USD. Be realistic rather than optimistic; note assumptions in the recommendations.";

fn push_services(prompt: &mut String) {
    prompt.push_str("\n\n<services>\n");
    prompt.push_str(&catalog::summary_lines());
    if !prompt.ends_with('\n') {
        prompt.push('\n');
    }
    prompt.push_str("</services>");
}

/// Prompt for the streaming chat endpoint
pub fn chat_prompt() -> String {
    let mut prompt = String::from(PERSONA);
    push_services(&mut prompt);
    prompt
}

/// Prompt for the agent endpoint, naming the tools it may call
pub fn agent_prompt(tools: &ToolRegistry) -> String {
    let mut prompt = chat_prompt();
    prompt.push_str("\n\n<tools>\n");
    for def in tools.definitions() {
        let _ = writeln!(prompt, "- {}: {}", def.name, def.description);
    }
    prompt.push_str("</tools>\n\nUse the tools for pricing and bookings instead of guessing. Only book a call once you have the visitor's name and email.");
    prompt
}

/// Prompt for spoken replies, both the voice endpoint and realtime sessions
pub fn voice_prompt() -> String {
    let mut prompt = chat_prompt();
    prompt.push_str(VOICE_SUFFIX);
    prompt
}

pub fn lead_research_prompt() -> String {
    let mut prompt = String::from(LEAD_RESEARCH_PROMPT);
    push_services(&mut prompt);
    prompt
}

pub fn estimate_prompt() -> String {
    let mut prompt = String::from(ESTIMATE_PROMPT);
    push_services(&mut prompt);
    prompt
}
