//! Speech channel: continuous recognition plus synthesis.
//!
//! # Architecture
//!
//! ```text
//!   Recognizer ──┐                                      ┌─▶ when_i_hear(phrase)  (hat)
//!                ├─ SpeechEvent ─▶ mpsc ─▶ Arbiter ─────┼─▶ latest_speech()      (reporter)
//!   Synthesizer ─┘                                      └─▶ speak(text) → UtteranceHandle
//! ```
//!
//! The arbiter is the only writer of the transcript buffer and the listening
//! state.  Engines report back exclusively through [`SpeechEvent`]s.

pub mod arbiter;
pub mod engine;
pub mod voices;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use arbiter::{ListeningState, RecognitionSynthesisArbiter, UtteranceHandle, UtteranceOutcome};
pub use engine::{Recognizer, SpeechError, SpeechEvent, Synthesizer, UtteranceId};
pub use voices::{Voice, VoicePolicy, DEFAULT_VOICE, RANDOM_VOICE};
