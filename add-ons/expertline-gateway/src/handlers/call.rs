//! Call lifecycle routes: start a call, stream one turn, end a call.

use super::error_response;
use crate::state::AppState;
use crate::turn::{self, TurnInput};
use axum::body::Body;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use expertline_core::SessionStore;
use expertline_voice::SynthesisBackend;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

const TARGET: &str = "expertline::call";

const SESSION_HEADER: &str = "x-session-id";
const USER_HEADER: &str = "x-user-name";

/// Uploaded audio cap; a minute of compressed speech is far below this.
const BODY_LIMIT: usize = 25 * 1024 * 1024;

const GREETING_TEXT: &str = "Hello! I'm your concierge. I'm here to connect you with expert \
software engineers. What would you like to know about software engineering today?";

/// POST /api/v1/call/start — create a session and return the spoken greeting.
/// Greeting audio is synthesized once and cached; a synthesis failure
/// degrades to a text-only greeting rather than failing the call.
pub async fn start(State(state): State<AppState>) -> Response {
    let session_id = uuid::Uuid::new_v4().to_string();
    state.sessions.create(&session_id);
    info!(target: TARGET, session = %session_id, "call started");

    let greeting = state
        .greeting_audio
        .get_or_try_init(|| async {
            state
                .tts
                .synthesize(GREETING_TEXT, &state.voices.concierge_voice)
                .await
        })
        .await;
    let audio_base64 = match greeting {
        Ok(bytes) => Some(BASE64_STANDARD.encode(bytes)),
        Err(e) => {
            warn!(target: TARGET, "greeting synthesis failed, starting text-only: {e}");
            None
        }
    };

    Json(json!({
        "success": true,
        "sessionId": session_id,
        "greetingText": GREETING_TEXT,
        "audioBase64": audio_base64,
    }))
    .into_response()
}

#[derive(Debug, Default, Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "audioBase64")]
    audio_base64: Option<String>,
}

/// POST /api/v1/call/message — one full turn, streamed as NDJSON.
///
/// Session id rides in `x-session-id` (generated when absent), the caller
/// display name in `x-user-name`. Accepts JSON `{message?, audioBase64?}`,
/// multipart (`message` and/or `audio` file), or raw audio bytes. Validation
/// failures return plain JSON before the stream opens; after that every
/// failure is an in-stream `error` event.
pub async fn message(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
) -> Response {
    let caller_name = header_value(&headers, USER_HEADER);
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let session_id = match header_value(&headers, SESSION_HEADER) {
        Some(id) => id,
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            state.sessions.create(&id);
            info!(target: TARGET, session = %id, "no session provided, created a new one");
            id
        }
    };

    let mut input = TurnInput {
        session_id: session_id.clone(),
        caller_name,
        ..TurnInput::default()
    };

    if content_type.starts_with("application/json") {
        let bytes = match axum::body::to_bytes(request.into_body(), BODY_LIMIT).await {
            Ok(bytes) => bytes,
            Err(_) => return error_response(StatusCode::BAD_REQUEST, "Failed to read request body."),
        };
        let body: MessageBody = match serde_json::from_slice(&bytes) {
            Ok(body) => body,
            Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid JSON body."),
        };
        input.message = body.message;
        if let Some(encoded) = body.audio_base64 {
            match BASE64_STANDARD.decode(encoded.as_bytes()) {
                Ok(audio) => {
                    input.audio = Some(audio);
                    input.audio_content_type = Some("audio/webm".to_string());
                }
                Err(_) => {
                    return error_response(
                        StatusCode::BAD_REQUEST,
                        "audioBase64 is not valid base64.",
                    )
                }
            }
        }
    } else if content_type.starts_with("multipart/form-data") {
        let mut multipart = match Multipart::from_request(request, &()).await {
            Ok(multipart) => multipart,
            Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid multipart body."),
        };
        while let Ok(Some(field)) = multipart.next_field().await {
            let name = field.name().map(|n| n.to_string());
            match name.as_deref() {
                Some("message") => {
                    input.message = field.text().await.ok();
                }
                Some("audio") => {
                    let field_type = field
                        .content_type()
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "audio/webm".to_string());
                    match field.bytes().await {
                        Ok(bytes) => {
                            input.audio = Some(bytes.to_vec());
                            input.audio_content_type = Some(field_type);
                        }
                        Err(_) => {
                            return error_response(
                                StatusCode::BAD_REQUEST,
                                "Invalid audio file payload.",
                            )
                        }
                    }
                }
                _ => {}
            }
        }
    } else if content_type.starts_with("audio/")
        || content_type.starts_with("application/octet-stream")
    {
        let bytes = match axum::body::to_bytes(request.into_body(), BODY_LIMIT).await {
            Ok(bytes) => bytes,
            Err(_) => return error_response(StatusCode::BAD_REQUEST, "Failed to read request body."),
        };
        input.audio = Some(bytes.to_vec());
        input.audio_content_type = Some(content_type.clone());
    }
    // Any other content type falls through with neither message nor audio
    // and is rejected by prepare() below.

    // One turn at a time per session; the guard rides inside the body stream
    // until the last event is out.
    let guard = state.locks.acquire(&session_id).await;
    let cancel = state.turns.begin(&session_id);

    let prepared = match turn::prepare(&state, input).await {
        Ok(prepared) => prepared,
        Err(rejection) => {
            state.turns.finish(&session_id);
            drop(guard);
            let status = StatusCode::from_u16(rejection.status)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return error_response(status, &rejection.message);
        }
    };

    let events = turn::run(state.clone(), prepared, cancel);
    let turns = state.turns.clone();
    let body = Body::from_stream(async_stream::stream! {
        futures_util::pin_mut!(events);
        while let Some(event) = events.next().await {
            yield Ok::<_, std::convert::Infallible>(event.to_ndjson());
        }
        turns.finish(&session_id);
        drop(guard);
    });

    match Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-store")
        .body(body)
    {
        Ok(response) => response,
        Err(e) => {
            error!(target: TARGET, "failed to build stream response: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to process message.")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EndCallBody {
    #[serde(default, rename = "sessionId")]
    session_id: Option<String>,
}

/// POST /api/v1/call/end — cancel any in-flight turn and drop the session.
pub async fn end(State(state): State<AppState>, Json(body): Json<EndCallBody>) -> Response {
    if let Some(id) = body
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        state.turns.cancel(id);
        state.sessions.delete(id);
        state.locks.remove(id);
        info!(target: TARGET, session = %id, "call ended");
    }
    Json(json!({ "success": true })).into_response()
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
