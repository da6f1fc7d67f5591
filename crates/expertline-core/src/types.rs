//! Shared domain types: experts, sessions, and conversation history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Voice category derived from the routed persona. `Unknown` means the
/// router could not classify and the global default voice applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Neutral,
    #[default]
    Unknown,
}

/// A routed subject-matter expert. Immutable once selected for a turn; a
/// session may switch experts between turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expert {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub expertise_areas: Vec<String>,
    pub reasoning: String,
    #[serde(default)]
    pub gender: Gender,
    /// Explicit synthesis voice. When absent the gender-keyed default is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

impl Expert {
    /// Lowercase hyphenated id derived from a display name
    /// ("Grace Hopper" -> "grace-hopper").
    pub fn slug(name: &str) -> String {
        let mut out = String::with_capacity(name.len());
        let mut pending_dash = false;
        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(c.to_ascii_lowercase());
            } else {
                pending_dash = true;
            }
        }
        out
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Expert,
    System,
    Assistant,
}

/// An image surfaced alongside an expert answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    pub image_url: String,
    pub caption: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
}

/// One entry in a session's conversation history. Entries are appended in
/// chronological order and never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<MediaItem>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            expert_name: None,
            media: Vec::new(),
        }
    }

    pub fn expert(content: impl Into<String>, expert_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Expert,
            content: content.into(),
            timestamp: Utc::now(),
            expert_name: Some(expert_name.into()),
            media: Vec::new(),
        }
    }
}

/// A live call: the bound expert plus the running transcript. Volatile and
/// single-process; deleted when the call ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub expert: Option<Expert>,
    pub history: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            expert: None,
            history: Vec::new(),
            created_at: Utc::now(),
        }
    }
}
