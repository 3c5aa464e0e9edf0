//! Speech engine boundary.
//!
//! Both engines are fire-and-forget: calls return as soon as the request is
//! accepted, and everything that happens afterwards (transcripts, session
//! ends, utterance ends) comes back as a [`SpeechEvent`] on the channel the
//! engine was constructed with.

use thiserror::Error;

use super::voices::Voice;

// ---------------------------------------------------------------------------
// SpeechError
// ---------------------------------------------------------------------------

/// Errors reported synchronously by a speech engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpeechError {
    /// The recognizer refused to start or stop (already running, no
    /// microphone permission, ...).
    #[error("recognizer error: {0}")]
    Recognizer(String),

    /// The synthesizer rejected the utterance.
    #[error("synthesis error: {0}")]
    Synthesis(String),
}

/// Identifies one synthesis request; echoed back in utterance events.
pub type UtteranceId = u64;

// ---------------------------------------------------------------------------
// SpeechEvent
// ---------------------------------------------------------------------------

/// Asynchronous callbacks from the engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// A recognition result.  `alternatives` are ordered best first.
    Transcript {
        alternatives: Vec<String>,
        is_final: bool,
    },
    /// The recognizer ended its session (periodic, or after `stop`).
    SessionEnded,
    /// The utterance finished playing or was cancelled.
    UtteranceEnded(UtteranceId),
    /// The utterance errored out.
    UtteranceFailed(UtteranceId, String),
}

// ---------------------------------------------------------------------------
// Engine traits
// ---------------------------------------------------------------------------

/// Continuous speech recognizer.
pub trait Recognizer: Send + Sync {
    /// Begin a listening session.
    fn start(&self) -> Result<(), SpeechError>;

    /// End the current session.  A [`SpeechEvent::SessionEnded`] follows.
    fn stop(&self) -> Result<(), SpeechError>;
}

/// Speech synthesizer.
pub trait Synthesizer: Send + Sync {
    /// Voices the platform offers.
    fn voices(&self) -> Vec<Voice>;

    /// Start speaking `text`.  `voice` of `None` means the platform default.
    fn speak(&self, id: UtteranceId, text: &str, voice: Option<&Voice>) -> Result<(), SpeechError>;

    /// Stop whatever is playing.
    fn cancel(&self);
}

// Compile-time assertion: both engines are usable as trait objects.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Recognizer>, _: Box<dyn Synthesizer>) {}
};
