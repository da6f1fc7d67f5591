//! The call-turn orchestrator: one utterance in, an ordered event stream out.
//!
//! A turn runs in two phases. [`prepare`] does everything that can still
//! fail with a plain HTTP error: input validation, transcription, recording
//! the user message, routing and binding the expert. [`run`] then produces
//! the NDJSON stream (`metadata`, the generator's `text_delta`s, the
//! sample-aligned `audio_chunk`s, `complete`) with `done` as the final
//! event on every path. Synthesis failures are advisory; the text answer
//! already on the wire always stands.

use crate::events::{ExpertSummary, StreamEvent};
use crate::state::AppState;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use expertline_core::{
    Expert, GenerateResponse, InteractionRecord, Message, RouteExpert, SessionStore,
};
use expertline_voice::{SampleAligner, SynthesisBackend, TranscriptionBackend};
use futures_util::{Stream, StreamExt};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const TARGET: &str = "expertline::turn";

const AUDIO_RETRY_MESSAGE: &str = "Unable to process audio. Please try again.";
const GENERATION_FAILED_MESSAGE: &str =
    "The expert could not answer right now. Please try again.";
const SYNTHESIS_FAILED_MESSAGE: &str =
    "Audio generation failed. Text response is still available.";

/// Raw turn input as accepted by the message route.
#[derive(Debug, Default)]
pub struct TurnInput {
    pub session_id: String,
    pub caller_name: Option<String>,
    pub message: Option<String>,
    pub audio: Option<Vec<u8>>,
    pub audio_content_type: Option<String>,
}

/// Pre-stream rejection: returned before any NDJSON line is written.
#[derive(Debug)]
pub struct TurnRejection {
    pub status: u16,
    pub message: String,
}

impl TurnRejection {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: 500,
            message: message.into(),
        }
    }
}

/// A validated, routed turn ready to stream.
pub struct PreparedTurn {
    pub session_id: String,
    pub caller_name: Option<String>,
    pub transcript: String,
    pub expert: Expert,
    pub voice_id: String,
    /// History as it stood before this turn's user message.
    history: Vec<Message>,
    started: Instant,
}

/// Steps before the stream opens: resolve the session, transcribe audio,
/// record the user turn, route and bind the expert.
pub async fn prepare(state: &AppState, input: TurnInput) -> Result<PreparedTurn, TurnRejection> {
    let started = Instant::now();
    let session_id = input.session_id;
    info!(
        target: TARGET,
        session = %session_id,
        user = %input.caller_name.as_deref().unwrap_or("anonymous"),
        "processing message"
    );

    let message = input.message.as_deref().map(str::trim).filter(|m| !m.is_empty());
    let has_audio = input.audio.as_deref().is_some_and(|a| !a.is_empty());
    if message.is_none() && !has_audio {
        return Err(TurnRejection::bad_request(
            "Either message or audio is required.",
        ));
    }

    let transcript = match message {
        Some(text) => text.to_string(),
        None => {
            let audio = input.audio.as_deref().unwrap_or_default();
            let content_type = input.audio_content_type.as_deref().unwrap_or("audio/webm");
            let transcription_started = Instant::now();
            match state.stt.transcribe(audio, content_type).await {
                Ok(text) => {
                    info!(
                        target: TARGET,
                        session = %session_id,
                        elapsed_ms = transcription_started.elapsed().as_millis() as u64,
                        "transcribed {} audio bytes",
                        audio.len()
                    );
                    text
                }
                Err(e) => {
                    warn!(target: TARGET, session = %session_id, "transcription failed: {e}");
                    return Err(TurnRejection::bad_request(AUDIO_RETRY_MESSAGE));
                }
            }
        }
    };
    let transcript = transcript.trim().to_string();
    if transcript.is_empty() {
        return Err(TurnRejection::bad_request(AUDIO_RETRY_MESSAGE));
    }

    // A stale or unknown id means "start a new call", not an error.
    if state.sessions.get(&session_id).is_none() {
        state.sessions.create(&session_id);
    }
    let session = state
        .sessions
        .get(&session_id)
        .ok_or_else(|| TurnRejection::internal("failed to initialize session"))?;
    let history = session.history.clone();
    let previous_expert = session.expert.as_ref().map(|e| e.name.clone());

    // The user turn is recorded before anything downstream can fail.
    state
        .sessions
        .append_message(&session_id, Message::user(transcript.clone()));

    let route_started = Instant::now();
    let routed_history = state
        .sessions
        .get(&session_id)
        .map(|s| s.history)
        .unwrap_or_default();
    let expert = state
        .router
        .route(&transcript, &routed_history, previous_expert.as_deref())
        .await;
    state.sessions.set_expert(&session_id, expert.clone());

    let route_ms = route_started.elapsed().as_millis() as u64;
    match previous_expert.as_deref() {
        None => info!(
            target: TARGET,
            session = %session_id,
            expert = %expert.name,
            elapsed_ms = route_ms,
            "selected expert: {}",
            expert.reasoning
        ),
        Some(name) if name == expert.name => info!(
            target: TARGET,
            session = %session_id,
            expert = %expert.name,
            elapsed_ms = route_ms,
            "continuing with expert: {}",
            expert.reasoning
        ),
        Some(name) => info!(
            target: TARGET,
            session = %session_id,
            from = %name,
            to = %expert.name,
            elapsed_ms = route_ms,
            "switched expert: {}",
            expert.reasoning
        ),
    }

    let voice_id = state.voices.resolve(&expert);

    Ok(PreparedTurn {
        session_id,
        caller_name: input.caller_name,
        transcript,
        expert,
        voice_id,
        history,
        started,
    })
}

/// The event stream itself. Once an abort is observed no further events are
/// emitted; on every other path the stream closes with exactly one `done`.
pub fn run(
    state: AppState,
    turn: PreparedTurn,
    cancel: CancellationToken,
) -> impl Stream<Item = StreamEvent> {
    async_stream::stream! {
        let PreparedTurn {
            session_id,
            caller_name,
            transcript,
            expert,
            voice_id,
            history,
            started,
        } = turn;

        yield StreamEvent::Metadata {
            transcript: transcript.clone(),
            expert: ExpertSummary::from(&expert),
        };

        let mut full_response = String::new();
        let mut failed = false;

        let generation_started = Instant::now();
        match state
            .generator
            .stream_response(&transcript, &expert, &history)
            .await
        {
            Ok(mut tokens) => loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!(target: TARGET, session = %session_id, "turn cancelled during generation");
                        return;
                    }
                    next = tokens.recv() => next,
                };
                match next {
                    Some(Ok(delta)) => {
                        if delta.is_empty() {
                            continue;
                        }
                        full_response.push_str(&delta);
                        yield StreamEvent::TextDelta { delta };
                    }
                    Some(Err(e)) => {
                        error!(target: TARGET, session = %session_id, "generation failed mid-stream: {e}");
                        yield StreamEvent::Error {
                            message: GENERATION_FAILED_MESSAGE.to_string(),
                        };
                        failed = true;
                        break;
                    }
                    None => break,
                }
            },
            Err(e) => {
                error!(target: TARGET, session = %session_id, "generation failed to start: {e}");
                yield StreamEvent::Error {
                    message: GENERATION_FAILED_MESSAGE.to_string(),
                };
                failed = true;
            }
        }

        if !failed {
            info!(
                target: TARGET,
                session = %session_id,
                elapsed_ms = generation_started.elapsed().as_millis() as u64,
                "generation complete, {} chars",
                full_response.len()
            );

            let answer = full_response.trim().to_string();
            if !answer.is_empty() {
                let synthesis_started = Instant::now();
                match state.tts.stream_speech(&answer, &voice_id, cancel.clone()).await {
                    Ok(mut audio) => {
                        let mut aligner = SampleAligner::new();
                        let mut index: u64 = 0;
                        while let Some(chunk) = audio.next().await {
                            match chunk {
                                Ok(bytes) => {
                                    if let Some(data) = aligner.push(&bytes) {
                                        index += 1;
                                        yield StreamEvent::AudioChunk {
                                            index,
                                            audio_base64: BASE64_STANDARD.encode(&data),
                                        };
                                    }
                                }
                                Err(e) => {
                                    warn!(target: TARGET, session = %session_id, "synthesis stream failed: {e}");
                                    yield StreamEvent::Error {
                                        message: SYNTHESIS_FAILED_MESSAGE.to_string(),
                                    };
                                    break;
                                }
                            }
                        }
                        if aligner.finish().is_some() {
                            tracing::debug!(
                                target: TARGET,
                                session = %session_id,
                                "dropped trailing odd byte from synthesis stream"
                            );
                        }
                        info!(
                            target: TARGET,
                            session = %session_id,
                            chunks = index,
                            elapsed_ms = synthesis_started.elapsed().as_millis() as u64,
                            "synthesis finished"
                        );
                    }
                    Err(e) => {
                        warn!(target: TARGET, session = %session_id, "synthesis unavailable: {e}");
                        yield StreamEvent::Error {
                            message: format!(
                                "Audio generation failed: {e}. Text response is still available."
                            ),
                        };
                    }
                }
            }

            if cancel.is_cancelled() {
                info!(target: TARGET, session = %session_id, "turn cancelled, closing stream");
                return;
            }

            state
                .sessions
                .append_message(&session_id, Message::expert(answer.clone(), expert.name.clone()));

            let processing_time_ms = started.elapsed().as_millis() as u64;
            yield StreamEvent::Complete {
                text: answer.clone(),
                processing_time_ms,
            };
            info!(
                target: TARGET,
                session = %session_id,
                elapsed_ms = processing_time_ms,
                "turn complete"
            );

            if let Some(log) = &state.interactions {
                log.save_detached(InteractionRecord {
                    session_id: session_id.clone(),
                    user_question: transcript.clone(),
                    expert_answer: answer,
                    expert_name: Some(expert.name.clone()),
                    user_name: caller_name.clone(),
                });
            }
        }

        yield StreamEvent::Done;
    }
}
