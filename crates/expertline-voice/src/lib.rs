//! # Expertline Voice
//!
//! The speech edge of the Expertline call service: transcription of caller
//! audio, streaming text-to-speech with retry and cancellation, and 16-bit
//! PCM sample alignment for the wire.
//!
//! ## Architecture
//!
//! ```text
//! caller audio ──► TranscriptionBackend ──► transcript
//!                                               │
//!                               (routing + generation, expertline-core)
//!                                               │
//! answer text ──► SynthesisBackend ──► raw PCM ──► SampleAligner ──► client
//! ```

pub mod error;
pub mod frame;
pub mod synthesize;
pub mod transcribe;

pub use error::{VoiceError, VoiceResult};
pub use frame::SampleAligner;
pub use synthesize::{AudioStream, ElevenLabsTts, SynthesisBackend, VoiceSettings};
pub use transcribe::{DeepgramStt, TranscriptionBackend};
