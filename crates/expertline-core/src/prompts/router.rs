//! Routing prompts: pick the single best real-world expert for a question.
//!
//! The router is told to re-evaluate from scratch on every question; staying
//! with the current expert has to be earned, not defaulted to.

use crate::types::{Message, Role};

/// History entries included in the routing excerpt.
pub const HISTORY_SNIPPET_LIMIT: usize = 6;

/// System instruction for the routing model.
pub const ROUTER_SYSTEM: &str = r#"You are an expert routing system for software engineering conversations. Your goal is to identify the single best real-world person to answer the user's specific question.

Selection Criteria:
1. **Domain Authority:** Choose the person most recognized for the specific topic (e.g., the creator of the tool, the author of the seminal book, or the primary maintainer).
2. **Temporal Consistency:** Ensure the expert is historically appropriate. Do not select an expert who died before the technology or concept was invented.
3. **Zero Bias:** Evaluate the question in isolation. Do not default to the previously active expert unless they are truly the best fit for the *new* question.

Return ONLY valid JSON (no markdown, no code blocks):
{
  "expertName": "Full name of the real expert",
  "expertiseAreas": ["area1", "area2", "area3"],
  "reasoning": "Brief explanation of why this expert is the absolute best authority for this specific topic",
  "gender": "male" | "female" | "neutral"
}

If the question is too vague or general, choose a well-rounded, contemporary software engineering leader."#;

/// "Role (Expert Name): content" with whitespace collapsed to one line.
pub fn format_history_entry(message: &Message) -> String {
    let role = match message.role {
        Role::User => "User",
        Role::Expert => "Expert",
        Role::Assistant => "Assistant",
        Role::System => "System",
    };
    let persona = message
        .expert_name
        .as_deref()
        .map(|name| format!(" ({})", name))
        .unwrap_or_default();
    let text = message.content.split_whitespace().collect::<Vec<_>>().join(" ");
    format!("{}{}: {}", role, persona, text)
}

/// Assemble the router's user prompt: recent history, the current binding,
/// then the question itself.
pub fn router_user_prompt(
    question: &str,
    history: &[Message],
    current_expert: Option<&str>,
) -> String {
    let start = history.len().saturating_sub(HISTORY_SNIPPET_LIMIT);
    let excerpt = history[start..]
        .iter()
        .map(format_history_entry)
        .collect::<Vec<_>>()
        .join("\n");

    let history_section = if excerpt.is_empty() {
        "No conversation history yet.".to_string()
    } else {
        format!("Conversation history:\n{}", excerpt)
    };
    let expert_line = match current_expert {
        Some(name) => format!("Current expert: {}", name),
        None => "No expert is currently assigned.".to_string(),
    };

    format!(
        "{}\n\n{}\n\nCurrent question: {}",
        history_section, expert_line, question
    )
}
