//! Voice configuration loaded from `.env`.
//!
//! Maps the router's gender classification onto synthesis voice ids, with a
//! single global fallback. Change voices without code edits.

use crate::types::{Expert, Gender};

/// Fallback voice used whenever no more specific binding is configured.
const DEFAULT_EXPERT_VOICE_ID: &str = "EXAVITQu4vr4xnSDxMaL";

/// Synthesis voice bindings.
///
/// | Env | Default | Description |
/// |-----|---------|-------------|
/// | ELEVENLABS_EXPERT_VOICE_ID | EXAVITQu4vr4xnSDxMaL | Global default voice. |
/// | ELEVENLABS_MALE_EXPERT_VOICE_ID | global default | Voice for `male` personas. |
/// | ELEVENLABS_FEMALE_EXPERT_VOICE_ID | global default | Voice for `female` personas. |
/// | ELEVENLABS_NEUTRAL_EXPERT_VOICE_ID | global default | Voice for `neutral` personas. |
/// | ELEVENLABS_CONCIERGE_VOICE_ID | global default | Voice for the call-start greeting. |
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub default_voice: String,
    pub male_voice: String,
    pub female_voice: String,
    pub neutral_voice: String,
    pub concierge_voice: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            default_voice: DEFAULT_EXPERT_VOICE_ID.to_string(),
            male_voice: DEFAULT_EXPERT_VOICE_ID.to_string(),
            female_voice: DEFAULT_EXPERT_VOICE_ID.to_string(),
            neutral_voice: DEFAULT_EXPERT_VOICE_ID.to_string(),
            concierge_voice: DEFAULT_EXPERT_VOICE_ID.to_string(),
        }
    }
}

impl VoiceConfig {
    /// Load voice bindings from environment. Unset or blank => defaults.
    pub fn from_env() -> Self {
        let default_voice = env_or("ELEVENLABS_EXPERT_VOICE_ID", DEFAULT_EXPERT_VOICE_ID);
        Self {
            male_voice: env_or("ELEVENLABS_MALE_EXPERT_VOICE_ID", &default_voice),
            female_voice: env_or("ELEVENLABS_FEMALE_EXPERT_VOICE_ID", &default_voice),
            neutral_voice: env_or("ELEVENLABS_NEUTRAL_EXPERT_VOICE_ID", &default_voice),
            concierge_voice: env_or("ELEVENLABS_CONCIERGE_VOICE_ID", &default_voice),
            default_voice,
        }
    }

    /// Voice resolution order: explicit voice on the expert, then the
    /// gender-keyed binding, then the global default.
    pub fn resolve(&self, expert: &Expert) -> String {
        if let Some(voice) = expert.voice_id.as_deref().filter(|v| !v.trim().is_empty()) {
            return voice.to_string();
        }
        match expert.gender {
            Gender::Female => self.female_voice.clone(),
            Gender::Male => self.male_voice.clone(),
            Gender::Neutral => self.neutral_voice.clone(),
            Gender::Unknown => self.default_voice.clone(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
