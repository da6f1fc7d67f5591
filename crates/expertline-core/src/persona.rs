//! Persona answer generation: in-character streaming replies.

use crate::error::CoreResult;
use crate::llm::{ChatClient, ChatMessage, TokenStream};
use crate::prompts::persona_system_prompt;
use crate::types::{Expert, Message, Role};
use async_trait::async_trait;

/// Recent conversation entries forwarded to the persona model.
pub const HISTORY_WINDOW: usize = 5;
const PERSONA_TEMPERATURE: f32 = 0.7;
/// Voice answers stay short; this bounds them server-side.
const MAX_ANSWER_TOKENS: u32 = 220;

/// Streaming answer source for the orchestrator. One call, one single-pass
/// stream; regenerate by calling again.
#[async_trait]
pub trait GenerateResponse: Send + Sync {
    async fn stream_response(
        &self,
        question: &str,
        expert: &Expert,
        history: &[Message],
    ) -> CoreResult<TokenStream>;
}

/// Build the chat transcript for the persona model: the in-character system
/// prompt, the last [`HISTORY_WINDOW`] conversational entries (system and
/// status messages excluded, expert turns mapped to `assistant`), then the
/// question.
pub fn build_expert_messages(
    question: &str,
    expert: &Expert,
    history: &[Message],
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(persona_system_prompt(
        &expert.name,
        &expert.expertise_areas,
    ))];

    let relevant: Vec<&Message> = history
        .iter()
        .filter(|m| !matches!(m.role, Role::System))
        .collect();
    let start = relevant.len().saturating_sub(HISTORY_WINDOW);
    for entry in &relevant[start..] {
        match entry.role {
            Role::User => messages.push(ChatMessage::user(entry.content.clone())),
            Role::Expert | Role::Assistant => {
                messages.push(ChatMessage::assistant(entry.content.clone()))
            }
            Role::System => {}
        }
    }

    messages.push(ChatMessage::user(question.to_string()));
    messages
}

/// LLM-backed persona generator.
pub struct PersonaGenerator {
    chat: ChatClient,
}

impl PersonaGenerator {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }

    pub fn from_env() -> CoreResult<Self> {
        Ok(Self {
            chat: ChatClient::from_env()?,
        })
    }
}

#[async_trait]
impl GenerateResponse for PersonaGenerator {
    async fn stream_response(
        &self,
        question: &str,
        expert: &Expert,
        history: &[Message],
    ) -> CoreResult<TokenStream> {
        let messages = build_expert_messages(question, expert, history);
        self.chat
            .stream_chat(messages, PERSONA_TEMPERATURE, Some(MAX_ANSWER_TOKENS))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Gender;

    fn expert() -> Expert {
        Expert {
            id: "grace-hopper".to_string(),
            name: "Grace Hopper".to_string(),
            title: None,
            expertise_areas: vec!["compilers".to_string()],
            reasoning: "test".to_string(),
            gender: Gender::Female,
            voice_id: None,
        }
    }

    #[test]
    fn transcript_starts_with_system_and_ends_with_question() {
        let messages = build_expert_messages("What is a compiler?", &expert(), &[]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("Grace Hopper"));
        assert_eq!(messages.last().unwrap().role, "user");
        assert_eq!(messages.last().unwrap().content, "What is a compiler?");
    }

    #[test]
    fn history_is_capped_to_window() {
        let history: Vec<Message> = (0..12)
            .map(|i| Message::user(format!("question {i}")))
            .collect();
        let messages = build_expert_messages("latest", &expert(), &history);
        // system + HISTORY_WINDOW entries + question
        assert_eq!(messages.len(), 1 + HISTORY_WINDOW + 1);
        assert_eq!(messages[1].content, "question 7");
    }

    #[test]
    fn system_entries_are_excluded_before_capping() {
        let mut history = Vec::new();
        for i in 0..4 {
            history.push(Message::user(format!("question {i}")));
            let mut status = Message::user(format!("status {i}"));
            status.role = Role::System;
            history.push(status);
        }
        let messages = build_expert_messages("latest", &expert(), &history);
        assert!(messages.iter().all(|m| !m.content.starts_with("status")));
        assert_eq!(messages.len(), 1 + 4 + 1);
    }

    #[test]
    fn expert_turns_speak_as_assistant() {
        let history = vec![
            Message::user("hello"),
            Message::expert("hi there", "Grace Hopper"),
        ];
        let messages = build_expert_messages("next", &expert(), &history);
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[2].content, "hi there");
    }
}
