//! Standalone speech utilities: transcription and synthesis endpoints.

use super::error_response;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use expertline_voice::{SynthesisBackend, TranscriptionBackend};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

const TARGET: &str = "expertline::speech";

const BODY_LIMIT: usize = 25 * 1024 * 1024;

/// POST /api/v1/transcribe — multipart (`audio` field) or raw audio bytes in,
/// `{success, transcript}` out.
pub async fn transcribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let (audio, audio_type) = if content_type.starts_with("multipart/form-data") {
        let mut multipart = match Multipart::from_request(request, &()).await {
            Ok(multipart) => multipart,
            Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid multipart body."),
        };
        let mut found = None;
        while let Ok(Some(field)) = multipart.next_field().await {
            if field.name() == Some("audio") {
                let field_type = field
                    .content_type()
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                match field.bytes().await {
                    Ok(bytes) => {
                        found = Some((bytes.to_vec(), field_type));
                        break;
                    }
                    Err(_) => {
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            "Invalid audio file payload.",
                        )
                    }
                }
            }
        }
        match found {
            Some(pair) => pair,
            None => return error_response(StatusCode::BAD_REQUEST, "No audio file provided."),
        }
    } else {
        let bytes = match axum::body::to_bytes(request.into_body(), BODY_LIMIT).await {
            Ok(bytes) => bytes,
            Err(_) => return error_response(StatusCode::BAD_REQUEST, "Failed to read request body."),
        };
        let audio_type = if content_type.is_empty() {
            "application/octet-stream".to_string()
        } else {
            content_type
        };
        (bytes.to_vec(), audio_type)
    };

    if audio.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No audio file provided.");
    }

    match state.stt.transcribe(&audio, &audio_type).await {
        Ok(transcript) => Json(json!({ "success": true, "transcript": transcript })).into_response(),
        Err(e) => {
            warn!(target: TARGET, "transcription failed: {e}");
            error_response(StatusCode::BAD_GATEWAY, "Failed to transcribe audio.")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SpeakBody {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "voiceId")]
    voice_id: Option<String>,
}

/// POST /api/v1/speak — synthesize arbitrary text with an explicit voice.
/// Responds with the synthesizer's native PCM bytes.
pub async fn speak(State(state): State<AppState>, Json(body): Json<SpeakBody>) -> Response {
    let Some(text) = body.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Text is required.");
    };
    let Some(voice_id) = body
        .voice_id
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    else {
        return error_response(StatusCode::BAD_REQUEST, "Voice ID is required.");
    };

    match state.tts.synthesize(text, voice_id).await {
        Ok(audio) => {
            match Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .header(header::CONTENT_LENGTH, audio.len())
                .header(header::CACHE_CONTROL, "no-store")
                .body(Body::from(audio))
            {
                Ok(response) => response,
                Err(e) => {
                    error!(target: TARGET, "failed to build audio response: {e}");
                    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate speech.")
                }
            }
        }
        Err(e) => {
            warn!(target: TARGET, "synthesis failed: {e}");
            error_response(StatusCode::BAD_GATEWAY, "Failed to generate speech.")
        }
    }
}
