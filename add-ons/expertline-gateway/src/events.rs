//! Wire protocol: the NDJSON event stream emitted while a turn runs.
//!
//! One JSON object per line. Exactly one `metadata` opens a turn's stream,
//! `text_delta`/`audio_chunk` follow in emission order, at most one
//! `complete` closes a successful turn, and `done` is always the last line,
//! including on failure.

use expertline_core::Expert;
use serde::{Deserialize, Serialize};

/// Expert identity surfaced to the client when a turn opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpertSummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expertise_areas: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl From<&Expert> for ExpertSummary {
    fn from(expert: &Expert) -> Self {
        Self {
            name: expert.name.clone(),
            expertise_areas: expert.expertise_areas.clone(),
            reasoning: Some(expert.reasoning.clone()),
        }
    }
}

/// One line of the turn stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    #[serde(rename_all = "camelCase")]
    Metadata {
        transcript: String,
        expert: ExpertSummary,
    },
    #[serde(rename_all = "camelCase")]
    TextDelta { delta: String },
    /// `index` is 1-based and strictly increasing; the payload decodes to an
    /// even number of bytes (16-bit sample alignment).
    #[serde(rename_all = "camelCase")]
    AudioChunk { index: u64, audio_base64: String },
    #[serde(rename_all = "camelCase")]
    Complete {
        text: String,
        processing_time_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    Error { message: String },
    Done,
}

impl StreamEvent {
    /// Serialize as one newline-terminated NDJSON line.
    pub fn to_ndjson(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","message":"event serialization failed"}"#.to_string()
        });
        line.push('\n');
        line
    }
}
