//! Shared gateway state: the session store, speech and model backends, and
//! the in-flight turn registry.

use dashmap::DashMap;
use expertline_core::{
    ExpertRouter, GenerateResponse, InMemorySessionStore, InteractionLog, PersonaGenerator,
    RouteExpert, SessionLocks, SessionStore, VoiceConfig,
};
use expertline_voice::{DeepgramStt, ElevenLabsTts, SynthesisBackend, TranscriptionBackend};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const ENV_DB_PATH: &str = "EXPERTLINE_DB_PATH";
const DEFAULT_DB_PATH: &str = "data/expertline.db";

/// Cancellation tokens for in-flight turns, keyed by session id.
/// `/call/end` cancels; a finishing turn clears its own entry.
#[derive(Default)]
pub struct TurnRegistry {
    active: DashMap<String, CancellationToken>,
}

impl TurnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh token for the session's next turn.
    pub fn begin(&self, session_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.active.insert(session_id.to_string(), token.clone());
        token
    }

    pub fn finish(&self, session_id: &str) {
        self.active.remove(session_id);
    }

    /// Cancel whatever turn is in flight for the session, if any.
    pub fn cancel(&self, session_id: &str) {
        if let Some((_, token)) = self.active.remove(session_id) {
            token.cancel();
        }
    }
}

/// Everything the route handlers share. Backends sit behind trait objects so
/// tests can swap them for scripted fakes.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionStore>,
    pub locks: Arc<SessionLocks>,
    pub turns: Arc<TurnRegistry>,
    pub router: Arc<dyn RouteExpert>,
    pub generator: Arc<dyn GenerateResponse>,
    pub stt: Arc<dyn TranscriptionBackend>,
    pub tts: Arc<dyn SynthesisBackend>,
    pub voices: VoiceConfig,
    pub interactions: Option<Arc<InteractionLog>>,
    /// Greeting audio synthesized once and reused for every call start.
    pub greeting_audio: Arc<tokio::sync::OnceCell<Vec<u8>>>,
}

impl AppState {
    /// Wire the production backends from the environment.
    pub fn from_env() -> Result<Self, String> {
        let router = ExpertRouter::from_env().map_err(|e| format!("router init failed: {e}"))?;
        let generator =
            PersonaGenerator::from_env().map_err(|e| format!("generator init failed: {e}"))?;
        let stt = DeepgramStt::from_env().map_err(|e| format!("STT init failed: {e}"))?;
        let tts = ElevenLabsTts::from_env().map_err(|e| format!("TTS init failed: {e}"))?;

        // The log is best-effort: a broken path disables it, never the gateway.
        let db_path = std::env::var(ENV_DB_PATH)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let interactions = match InteractionLog::new(PathBuf::from(&db_path)) {
            Ok(log) => Some(Arc::new(log)),
            Err(e) => {
                tracing::warn!(
                    target: "expertline::gateway",
                    "interaction log disabled ({db_path}): {e}"
                );
                None
            }
        };

        Ok(Self {
            sessions: Arc::new(InMemorySessionStore::new()),
            locks: Arc::new(SessionLocks::new()),
            turns: Arc::new(TurnRegistry::new()),
            router: Arc::new(router),
            generator: Arc::new(generator),
            stt: Arc::new(stt),
            tts: Arc::new(tts),
            voices: VoiceConfig::from_env(),
            interactions,
            greeting_audio: Arc::new(tokio::sync::OnceCell::new()),
        })
    }
}
