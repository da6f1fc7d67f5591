//! Prompt templates for expert routing and persona answers.

pub mod persona;
pub mod router;

pub use persona::{persona_system_prompt, PERSONA_SYSTEM_TEMPLATE};
pub use router::{
    format_history_entry, router_user_prompt, HISTORY_SNIPPET_LIMIT, ROUTER_SYSTEM,
};
