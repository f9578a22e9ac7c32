//! Input validation for the proxy endpoints

use super::types::Questionnaire;
use crate::message::{Message, Role};
use regex::Regex;
use std::sync::OnceLock;

pub const MAX_COMPANY_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 5_000;

fn email_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
}

pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_some_and(|re| re.is_match(email.trim()))
}

/// The history must end with a user turn that has something to answer
pub fn validate_history(messages: &[Message]) -> Result<(), String> {
    let Some(last) = messages.last() else {
        return Err("messages must not be empty".to_string());
    };
    if last.role != Role::User {
        return Err("Last message must come from the user".to_string());
    }
    if last.text().trim().is_empty() {
        return Err("Last message must contain text".to_string());
    }
    Ok(())
}

/// The most recent `window` messages, in their original order
pub fn truncate_history(messages: &[Message], window: usize) -> &[Message] {
    let start = messages.len().saturating_sub(window);
    &messages[start..]
}

pub fn validate_company(company: &str) -> Result<String, String> {
    let company = company.trim();
    if company.is_empty() {
        return Err("company is required".to_string());
    }
    if company.chars().count() > MAX_COMPANY_CHARS {
        return Err(format!(
            "company must be at most {MAX_COMPANY_CHARS} characters"
        ));
    }
    Ok(company.to_string())
}

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Every problem with the questionnaire, joined with `"; "`
pub fn validate_questionnaire(q: &Questionnaire) -> Result<(), String> {
    let mut problems = Vec::new();

    if blank(&q.project_type) {
        problems.push("projectType is required".to_string());
    }
    if blank(&q.description) {
        problems.push("description is required".to_string());
    } else if q.description.chars().count() > MAX_DESCRIPTION_CHARS {
        problems.push(format!(
            "description must be at most {MAX_DESCRIPTION_CHARS} characters"
        ));
    }
    if q.platforms.iter().all(|p| blank(p)) {
        problems.push("at least one platform is required".to_string());
    }
    if blank(&q.timeline) {
        problems.push("timeline is required".to_string());
    }
    if blank(&q.budget) {
        problems.push("budget is required".to_string());
    }
    if blank(&q.contact.name) {
        problems.push("contact name is required".to_string());
    }
    if blank(&q.contact.email) {
        problems.push("contact email is required".to_string());
    } else if !is_valid_email(&q.contact.email) {
        problems.push("contact email is not a valid email address".to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("; "))
    }
}
