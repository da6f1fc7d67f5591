//! **Speech-to-text** — turn caller audio into a transcript.
//!
//! Implement [`TranscriptionBackend`] for any REST transcription vendor; the
//! gateway only talks to the trait so turns stay testable without a network.

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use serde::Deserialize;

const ENV_STT_API_URL: &str = "EXPERTLINE_STT_API_URL";
const ENV_STT_API_KEY: &str = "DEEPGRAM_API_KEY";
const ENV_STT_MODEL: &str = "EXPERTLINE_STT_MODEL";
const DEFAULT_API_URL: &str = "https://api.deepgram.com/v1/listen";
const DEFAULT_MODEL: &str = "nova-2";

/// Backend that converts recorded audio into text.
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Transcribe one utterance. Fails on empty input or upstream rejection.
    async fn transcribe(&self, audio: &[u8], content_type: &str) -> VoiceResult<String>;
}

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: Option<ListenResults>,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize)]
struct ListenAlternative {
    transcript: Option<String>,
}

/// First non-blank transcript in the response, if any.
fn extract_transcript(response: ListenResponse) -> Option<String> {
    response
        .results?
        .channels
        .into_iter()
        .next()?
        .alternatives
        .into_iter()
        .next()?
        .transcript
        .filter(|t| !t.trim().is_empty())
}

/// Deepgram-style REST transcription: one POST of the raw audio bytes.
/// Uses `EXPERTLINE_STT_API_URL`, `DEEPGRAM_API_KEY`, and `EXPERTLINE_STT_MODEL`.
#[derive(Debug, Clone)]
pub struct DeepgramStt {
    api_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl DeepgramStt {
    /// Build from environment. Fails without an API key.
    pub fn from_env() -> VoiceResult<Self> {
        let api_url =
            std::env::var(ENV_STT_API_URL).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_key = std::env::var(ENV_STT_API_KEY).map_err(|_| {
            VoiceError::Config("transcription requires DEEPGRAM_API_KEY".to_string())
        })?;
        let model = std::env::var(ENV_STT_MODEL).unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Ok(Self::new(api_url, api_key, model))
    }

    /// Create with explicit config.
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TranscriptionBackend for DeepgramStt {
    async fn transcribe(&self, audio: &[u8], content_type: &str) -> VoiceResult<String> {
        if audio.is_empty() {
            return Err(VoiceError::Stt(
                "empty audio provided for transcription".to_string(),
            ));
        }

        let content_type = if content_type.trim().is_empty() {
            "application/octet-stream"
        } else {
            content_type
        };
        let response = self
            .client
            .post(&self.api_url)
            .query(&[
                ("model", self.model.as_str()),
                ("punctuate", "true"),
                ("language", "en-US"),
            ])
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", content_type)
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| VoiceError::Stt(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Stt(format!(
                "transcription failed ({}): {}",
                status, body
            )));
        }

        let parsed: ListenResponse = response
            .json()
            .await
            .map_err(|e| VoiceError::Stt(e.to_string()))?;
        extract_transcript(parsed)
            .map(|t| t.trim().to_string())
            .ok_or_else(|| {
                VoiceError::Stt("transcription response did not include a transcript".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Option<String> {
        extract_transcript(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn transcript_is_extracted_from_first_alternative() {
        let json = r#"{
            "results": {
                "channels": [
                    {"alternatives": [{"transcript": "what is dependency inversion"}]}
                ]
            }
        }"#;
        assert_eq!(parse(json).as_deref(), Some("what is dependency inversion"));
    }

    #[test]
    fn blank_transcript_counts_as_missing() {
        let json = r#"{
            "results": {"channels": [{"alternatives": [{"transcript": "   "}]}]}
        }"#;
        assert_eq!(parse(json), None);
    }

    #[test]
    fn missing_structures_are_tolerated() {
        assert_eq!(parse(r#"{}"#), None);
        assert_eq!(parse(r#"{"results": {"channels": []}}"#), None);
        assert_eq!(
            parse(r#"{"results": {"channels": [{"alternatives": []}]}}"#),
            None
        );
    }

    #[tokio::test]
    async fn empty_audio_is_rejected_before_any_request() {
        let stt = DeepgramStt::new("http://127.0.0.1:1", "key", "nova-2");
        let err = stt.transcribe(&[], "audio/webm").await.unwrap_err();
        assert!(matches!(err, VoiceError::Stt(_)));
        assert!(err.to_string().contains("empty audio"));
    }
}
