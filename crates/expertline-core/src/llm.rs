//! OpenAI-compatible chat completion client.
//!
//! Two call shapes: one-shot JSON-object completions (expert routing) and
//! SSE token streaming (persona answers). Streamed deltas are handed over a
//! channel in generation order; dropping the receiver stops consumption and
//! aborts the underlying request.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

const ENV_LLM_API_URL: &str = "EXPERTLINE_LLM_API_URL";
const ENV_LLM_API_KEY: &str = "EXPERTLINE_LLM_API_KEY";
const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const ENV_CHAT_MODEL: &str = "EXPERTLINE_CHAT_MODEL";
const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// One chat message in OpenAI wire shape.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageBody,
}

#[derive(Deserialize)]
struct ChatMessageBody {
    content: Option<String>,
}

/// Streaming chunk from the SSE data lines.
#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Stream of answer fragments. An `Err` item means generation failed
/// mid-stream and the turn must end; there is no built-in retry.
pub type TokenStream = mpsc::Receiver<CoreResult<String>>;

/// Client for an OpenAI-compatible chat completion endpoint.
#[derive(Clone)]
pub struct ChatClient {
    api_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl ChatClient {
    /// Build from environment: EXPERTLINE_LLM_API_URL, EXPERTLINE_LLM_API_KEY
    /// (or OPENAI_API_KEY), EXPERTLINE_CHAT_MODEL.
    pub fn from_env() -> CoreResult<Self> {
        let api_url =
            std::env::var(ENV_LLM_API_URL).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_key = std::env::var(ENV_LLM_API_KEY)
            .or_else(|_| std::env::var(ENV_OPENAI_API_KEY))
            .map_err(|_| {
                CoreError::Config(
                    "chat requires EXPERTLINE_LLM_API_KEY or OPENAI_API_KEY".to_string(),
                )
            })?;
        let model =
            std::env::var(ENV_CHAT_MODEL).unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string());
        Ok(Self::new(api_url, api_key, model))
    }

    /// Create with explicit config (e.g. for tests or non-env wiring).
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

    /// Swap the model (e.g. a cheaper one for routing).
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One-shot completion constrained to a JSON object response.
    pub async fn complete_json(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> CoreResult<String> {
        let messages = [ChatMessage::system(system), ChatMessage::user(user)];
        let body = ChatRequest {
            model: &self.model,
            messages: &messages,
            temperature: Some(temperature),
            max_completion_tokens: None,
            stream: None,
            response_format: Some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Llm(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CoreError::Llm(format!(
                "chat API error {}: {}",
                status, detail
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CoreError::InvalidResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| CoreError::InvalidResponse("empty completion".to_string()))
    }

    /// Streaming completion. Deltas arrive on the channel strictly in
    /// generation order; the session ends at `data: [DONE]`.
    pub async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_completion_tokens: Option<u32>,
    ) -> CoreResult<TokenStream> {
        let body = ChatRequest {
            model: &self.model,
            messages: &messages,
            temperature: Some(temperature),
            max_completion_tokens,
            stream: Some(true),
            response_format: None,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Llm(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CoreError::Llm(format!(
                "chat API error {}: {}",
                status, detail
            )));
        }
        tracing::debug!(
            target: "expertline::llm",
            model = %self.model,
            "SSE stream established"
        );

        let (tx, rx) = mpsc::channel::<CoreResult<String>>(64);
        tokio::spawn(async move {
            use futures_util::StreamExt;
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();

            loop {
                let bytes = match stream.next().await {
                    Some(Ok(bytes)) => bytes,
                    Some(Err(e)) => {
                        let _ = tx
                            .send(Err(CoreError::Llm(format!("stream read failed: {e}"))))
                            .await;
                        return;
                    }
                    None => return,
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                // Process complete SSE lines; a partial line stays buffered.
                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    if data == "[DONE]" {
                        tracing::debug!(target: "expertline::llm", "stream completed");
                        return;
                    }
                    match serde_json::from_str::<StreamChunk>(data) {
                        Ok(chunk) => {
                            let content = chunk
                                .choices
                                .first()
                                .and_then(|c| c.delta.content.as_deref())
                                .unwrap_or_default();
                            if !content.is_empty()
                                && tx.send(Ok(content.to_string())).await.is_err()
                            {
                                // Receiver dropped, stop consuming.
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(
                                target: "expertline::llm",
                                "unparseable stream chunk: {} - data: {}",
                                e,
                                data
                            );
                        }
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_chunk_parses_delta_content() {
        let data = r#"{"choices":[{"delta":{"content":"Hello"}}]}"#;
        let chunk: StreamChunk = serde_json::from_str(data).unwrap();
        assert_eq!(
            chunk.choices[0].delta.content.as_deref(),
            Some("Hello")
        );
    }

    #[test]
    fn stream_chunk_tolerates_missing_delta() {
        let data = r#"{"choices":[{"finish_reason":"stop"}]}"#;
        let chunk: StreamChunk = serde_json::from_str(data).unwrap();
        assert!(chunk.choices[0].delta.content.is_none());
    }

    #[test]
    fn request_serializes_optional_fields_sparsely() {
        let messages = [ChatMessage::user("hi")];
        let body = ChatRequest {
            model: "test-model",
            messages: &messages,
            temperature: None,
            max_completion_tokens: None,
            stream: None,
            response_format: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("temperature").is_none());
        assert!(json.get("stream").is_none());
        assert_eq!(json["model"], "test-model");
    }
}
