//! Expert routing: ask the model who should answer, never fail the turn.
//!
//! Routing failures of any kind (transport, malformed verdicts, blank
//! names) collapse to one fixed default persona so the call always has
//! somebody to speak with.

use crate::error::{CoreError, CoreResult};
use crate::llm::ChatClient;
use crate::prompts::{router_user_prompt, ROUTER_SYSTEM};
use crate::types::{Expert, Gender, Message};
use async_trait::async_trait;
use serde::Deserialize;

const ENV_ROUTER_MODEL: &str = "EXPERTLINE_ROUTER_MODEL";
const DEFAULT_ROUTER_MODEL: &str = "gpt-4o-mini";
const ROUTER_TEMPERATURE: f32 = 0.3;

/// What the orchestrator needs from a router: a persona, unconditionally.
#[async_trait]
pub trait RouteExpert: Send + Sync {
    async fn route(
        &self,
        question: &str,
        history: &[Message],
        current_expert: Option<&str>,
    ) -> Expert;
}

/// Raw routing verdict as returned by the model.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouterVerdict {
    #[serde(default)]
    expert_name: String,
    #[serde(default)]
    expertise_areas: Vec<String>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    gender: Option<String>,
}

/// LLM-backed expert router.
pub struct ExpertRouter {
    chat: ChatClient,
}

impl ExpertRouter {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }

    /// Build from environment; EXPERTLINE_ROUTER_MODEL overrides the chat model.
    pub fn from_env() -> CoreResult<Self> {
        let model =
            std::env::var(ENV_ROUTER_MODEL).unwrap_or_else(|_| DEFAULT_ROUTER_MODEL.to_string());
        Ok(Self {
            chat: ChatClient::from_env()?.with_model(&model),
        })
    }

    /// The persona every routing failure collapses to. Deterministic so
    /// callers and tests can rely on it.
    pub fn default_expert() -> Expert {
        Expert {
            id: "martin-fowler".to_string(),
            name: "Martin Fowler".to_string(),
            title: Some("Author and Chief Scientist at Thoughtworks".to_string()),
            expertise_areas: vec![
                "software architecture".to_string(),
                "design patterns".to_string(),
                "refactoring".to_string(),
            ],
            reasoning: "Default expert for general software engineering questions".to_string(),
            gender: Gender::Male,
            voice_id: None,
        }
    }

    fn parse_verdict(raw: &str) -> CoreResult<Expert> {
        let verdict: RouterVerdict = serde_json::from_str(raw).map_err(|e| {
            CoreError::InvalidResponse(format!("router returned malformed JSON: {e}"))
        })?;

        let name = verdict.expert_name.trim();
        if name.is_empty() {
            return Err(CoreError::InvalidResponse(
                "router returned no expert name".to_string(),
            ));
        }

        let areas: Vec<String> = verdict
            .expertise_areas
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        let reasoning = match verdict.reasoning.trim() {
            "" => "Expert selected based on routing heuristics.".to_string(),
            r => r.to_string(),
        };
        let gender = match verdict.gender.as_deref().map(str::trim) {
            Some("male") => Gender::Male,
            Some("female") => Gender::Female,
            Some("neutral") => Gender::Neutral,
            _ => Gender::Unknown,
        };

        Ok(Expert {
            id: Expert::slug(name),
            name: name.to_string(),
            title: None,
            expertise_areas: if areas.is_empty() {
                vec!["software engineering".to_string()]
            } else {
                areas
            },
            reasoning,
            gender,
            voice_id: None,
        })
    }
}

#[async_trait]
impl RouteExpert for ExpertRouter {
    async fn route(
        &self,
        question: &str,
        history: &[Message],
        current_expert: Option<&str>,
    ) -> Expert {
        let user_prompt = router_user_prompt(question, history, current_expert);
        let routed = match self
            .chat
            .complete_json(ROUTER_SYSTEM, &user_prompt, ROUTER_TEMPERATURE)
            .await
        {
            Ok(raw) => Self::parse_verdict(&raw),
            Err(e) => Err(e),
        };

        match routed {
            Ok(expert) => expert,
            Err(e) => {
                tracing::warn!(
                    target: "expertline::router",
                    "routing failed, using default expert: {e}"
                );
                Self::default_expert()
            }
        }
    }
}
