//! **Text-to-speech** — streaming PCM synthesis with bounded retry and
//! cooperative cancellation.
//!
//! The vendor streams raw `pcm_16000` bytes over HTTP. Request initiation is
//! retried under a [`RetryPolicy`] (rate limits and server errors); once the
//! body stream is open, failures surface as stream items so the caller can
//! keep the text answer it already has.

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use expertline_core::RetryPolicy;
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

const ENV_TTS_API_URL: &str = "EXPERTLINE_TTS_API_URL";
const ENV_TTS_API_KEY: &str = "ELEVENLABS_API_KEY";
const ENV_TTS_MODEL: &str = "EXPERTLINE_TTS_MODEL";
const DEFAULT_API_URL: &str = "https://api.elevenlabs.io";
const DEFAULT_MODEL_ID: &str = "eleven_flash_v2_5";
/// Raw 16-bit PCM at 16 kHz; the alignment invariant downstream depends on it.
const OUTPUT_FORMAT: &str = "pcm_16000";

/// Stability/similarity knobs forwarded with every synthesis request.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct VoiceSettings {
    pub stability: f32,
    #[serde(rename = "similarity_boost")]
    pub similarity_boost: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
        }
    }
}

/// Raw synthesized audio bytes as they arrive from the vendor.
pub type AudioStream = Pin<Box<dyn Stream<Item = VoiceResult<Vec<u8>>> + Send>>;

/// Backend that turns finished text into a byte stream of speech.
#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    /// Start streaming speech for the full text. The stream ends early
    /// (without an error item) once `cancel` fires.
    async fn stream_speech(
        &self,
        text: &str,
        voice_id: &str,
        cancel: CancellationToken,
    ) -> VoiceResult<AudioStream>;

    /// Buffered variant for short clips (the greeting, `/speak`).
    async fn synthesize(&self, text: &str, voice_id: &str) -> VoiceResult<Vec<u8>> {
        let mut stream = self
            .stream_speech(text, voice_id, CancellationToken::new())
            .await?;
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }
}

/// Pull a humanized message out of the vendor's error body when present.
fn error_detail(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| match v.get("detail") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Object(o)) => o
                .get("message")
                .and_then(|m| m.as_str())
                .map(String::from),
            _ => None,
        });
    detail.unwrap_or_else(|| format!("synthesis API error {status}"))
}

/// ElevenLabs-style HTTP streaming synthesis.
/// Uses `EXPERTLINE_TTS_API_URL`, `ELEVENLABS_API_KEY`, and `EXPERTLINE_TTS_MODEL`.
#[derive(Debug, Clone)]
pub struct ElevenLabsTts {
    base_url: String,
    api_key: String,
    model_id: String,
    settings: VoiceSettings,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl ElevenLabsTts {
    /// Build from environment. Fails without an API key.
    pub fn from_env() -> VoiceResult<Self> {
        let base_url =
            std::env::var(ENV_TTS_API_URL).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_key = std::env::var(ENV_TTS_API_KEY)
            .map_err(|_| VoiceError::Config("synthesis requires ELEVENLABS_API_KEY".to_string()))?;
        let model_id =
            std::env::var(ENV_TTS_MODEL).unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string());
        Ok(Self::new(base_url, api_key, model_id))
    }

    /// Create with explicit config.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model_id: model_id.into(),
            settings: VoiceSettings::default(),
            retry: RetryPolicy::default(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_settings(mut self, settings: VoiceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self, voice_id: &str) -> String {
        format!(
            "{}/v1/text-to-speech/{}/stream?output_format={}",
            self.base_url.trim_end_matches('/'),
            voice_id,
            OUTPUT_FORMAT
        )
    }

    /// POST the synthesis request, retrying per policy before giving up.
    async fn request_stream(&self, text: &str, voice_id: &str) -> VoiceResult<reqwest::Response> {
        let url = self.endpoint(voice_id);
        let body = serde_json::json!({
            "text": text,
            "model_id": self.model_id,
            "voice_settings": self.settings,
        });

        let mut attempt = 0u32;
        loop {
            let response = self
                .client
                .post(&url)
                .header("xi-api-key", &self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| VoiceError::Tts(e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            if self.retry.should_retry(status.as_u16(), attempt) {
                let delay = self.retry.delay_for(attempt);
                attempt += 1;
                tracing::warn!(
                    target: "expertline::tts",
                    status = %status,
                    "synthesis request rejected, retrying in {:?} (attempt {}/{})",
                    delay,
                    attempt,
                    self.retry.max_retries
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let detail = response.text().await.unwrap_or_default();
            return Err(VoiceError::Tts(error_detail(status.as_u16(), &detail)));
        }
    }
}

#[async_trait]
impl SynthesisBackend for ElevenLabsTts {
    async fn stream_speech(
        &self,
        text: &str,
        voice_id: &str,
        cancel: CancellationToken,
    ) -> VoiceResult<AudioStream> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VoiceError::Tts(
                "text is required to generate speech".to_string(),
            ));
        }
        if voice_id.trim().is_empty() {
            return Err(VoiceError::Tts(
                "voice id is required to generate speech".to_string(),
            ));
        }

        let response = self.request_stream(text, voice_id).await?;
        let mut inner = response.bytes_stream();

        let stream = async_stream::stream! {
            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::debug!(target: "expertline::tts", "synthesis cancelled mid-stream");
                        break;
                    }
                    chunk = inner.next() => chunk,
                };
                match next {
                    Some(Ok(bytes)) => yield Ok(bytes.to_vec()),
                    Some(Err(e)) => {
                        yield Err(VoiceError::Tts(format!("synthesis stream failed: {e}")));
                        break;
                    }
                    None => break,
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_includes_voice_and_output_format() {
        let tts = ElevenLabsTts::new("https://api.elevenlabs.io/", "key", "model-x");
        assert_eq!(
            tts.endpoint("voice-1"),
            "https://api.elevenlabs.io/v1/text-to-speech/voice-1/stream?output_format=pcm_16000"
        );
    }

    #[test]
    fn error_detail_prefers_nested_message() {
        let body = r#"{"detail": {"message": "quota exceeded", "status": "quota_exceeded"}}"#;
        assert_eq!(error_detail(401, body), "quota exceeded");
    }

    #[test]
    fn error_detail_accepts_plain_string_detail() {
        assert_eq!(error_detail(422, r#"{"detail": "bad voice id"}"#), "bad voice id");
    }

    #[test]
    fn error_detail_falls_back_to_status() {
        assert_eq!(error_detail(500, "not json"), "synthesis API error 500");
        assert_eq!(error_detail(503, "{}"), "synthesis API error 503");
    }

    #[test]
    fn voice_settings_serialize_with_vendor_field_names() {
        let json = serde_json::to_value(VoiceSettings::default()).unwrap();
        assert_eq!(json["stability"], 0.5);
        assert_eq!(json["similarity_boost"], 0.75);
    }

    #[tokio::test]
    async fn empty_text_is_rejected_before_any_request() {
        let tts = ElevenLabsTts::new("http://127.0.0.1:1", "key", "model");
        let err = tts
            .stream_speech("   ", "voice-1", CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("text is required"));
    }

    #[tokio::test]
    async fn blank_voice_is_rejected_before_any_request() {
        let tts = ElevenLabsTts::new("http://127.0.0.1:1", "key", "model");
        let err = tts
            .stream_speech("hello", " ", CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("voice id is required"));
    }
}
