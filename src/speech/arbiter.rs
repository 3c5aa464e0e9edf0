//! Keeps recognition and synthesis from hearing each other.
//!
//! ```text
//!            speak()                      UtteranceEnded/Failed(current id)
//!   Active ───────────▶ SuppressedForSynthesis ───────────────────▶ Active
//!     ▲  stop listening        │   speak() again: cancel current,      │ restart listening
//!     │                        │   resolve it Preempted, stay here      │ (failure recorded,
//!     │                        ▼                                        │  never propagated)
//!     └── SessionEnded: restart only while Active ◀─────────────────────┘
//! ```
//!
//! Transcripts that arrive while suppressed are dropped, not buffered, so
//! the hat never matches the program's own voice.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};

use super::engine::{Recognizer, SpeechError, SpeechEvent, Synthesizer, UtteranceId};
use super::voices::{Voice, VoicePolicy, RANDOM_VOICE};
use crate::lock;
use crate::predicate::transcript_matches;

// ---------------------------------------------------------------------------
// ListeningState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListeningState {
    Active,
    SuppressedForSynthesis,
}

impl Default for ListeningState {
    fn default() -> Self {
        ListeningState::Active
    }
}

// ---------------------------------------------------------------------------
// UtteranceHandle
// ---------------------------------------------------------------------------

/// How an utterance ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceOutcome {
    Completed,
    Failed(String),
    /// A later `speak` cancelled it.
    Preempted,
}

/// Single-completion signal for one `speak` call.
#[derive(Debug)]
pub struct UtteranceHandle {
    id: UtteranceId,
    rx: oneshot::Receiver<UtteranceOutcome>,
}

impl UtteranceHandle {
    pub fn id(&self) -> UtteranceId {
        self.id
    }

    /// Resolves once the utterance's end, failure or preemption is seen.
    pub async fn finished(self) -> UtteranceOutcome {
        self.rx
            .await
            .unwrap_or_else(|_| UtteranceOutcome::Failed("speech arbiter dropped".into()))
    }
}

// ---------------------------------------------------------------------------
// Arbiter
// ---------------------------------------------------------------------------

struct ArbiterState {
    listening: ListeningState,
    started: bool,
    transcripts: Vec<String>,
    latest_speech: String,
    current: Option<(UtteranceId, oneshot::Sender<UtteranceOutcome>)>,
    next_id: UtteranceId,
    voice_name: String,
    last_restart_error: Option<String>,
}

/// Owner of the listening state, the transcript buffer and the current
/// utterance.  Share it behind an `Arc`; [`run`](Self::run) takes one.
pub struct RecognitionSynthesisArbiter {
    recognizer: Box<dyn Recognizer>,
    synthesizer: Box<dyn Synthesizer>,
    policy: VoicePolicy,
    state: Mutex<ArbiterState>,
}

impl RecognitionSynthesisArbiter {
    pub fn new(
        recognizer: Box<dyn Recognizer>,
        synthesizer: Box<dyn Synthesizer>,
        policy: VoicePolicy,
        voice_name: impl Into<String>,
    ) -> Self {
        Self {
            recognizer,
            synthesizer,
            policy,
            state: Mutex::new(ArbiterState {
                listening: ListeningState::Active,
                started: false,
                transcripts: Vec::new(),
                latest_speech: String::new(),
                current: None,
                next_id: 1,
                voice_name: voice_name.into(),
                last_restart_error: None,
            }),
        }
    }

    /// Begin continuous listening.  Later calls are no-ops.
    pub fn start(&self) -> Result<(), SpeechError> {
        let mut st = lock(&self.state);
        if st.started {
            return Ok(());
        }
        self.recognizer.start()?;
        st.started = true;
        log::info!("speech: listening");
        Ok(())
    }

    pub fn listening_state(&self) -> ListeningState {
        lock(&self.state).listening
    }

    /// Last failure to resume listening after an utterance, if the most
    /// recent attempt failed.
    pub fn last_restart_error(&self) -> Option<String> {
        lock(&self.state).last_restart_error.clone()
    }

    /// Top alternative of the most recent accepted transcript.
    pub fn latest_speech(&self) -> String {
        lock(&self.state).latest_speech.clone()
    }

    /// Speak `text`, suppressing recognition until the utterance ends.
    ///
    /// A still-playing utterance is cancelled and its handle resolves
    /// `Preempted`; listening stays suppressed for the new one.
    pub fn speak(&self, text: &str) -> UtteranceHandle {
        let text = text.to_lowercase();
        let (tx, rx) = oneshot::channel();

        let mut st = lock(&self.state);
        let id = st.next_id;
        st.next_id += 1;

        if let Some((previous, waiter)) = st.current.take() {
            log::debug!("speech: utterance {previous} preempted by {id}");
            self.synthesizer.cancel();
            let _ = waiter.send(UtteranceOutcome::Preempted);
        }

        if st.listening == ListeningState::Active {
            st.listening = ListeningState::SuppressedForSynthesis;
            if st.started {
                if let Err(e) = self.recognizer.stop() {
                    log::warn!("speech: could not stop listening: {e}");
                }
            }
        }

        let voice = self.policy.resolve(&st.voice_name, &self.synthesizer.voices());
        match self.synthesizer.speak(id, &text, voice.as_ref()) {
            Ok(()) => {
                log::debug!("speech: utterance {id} started");
                st.current = Some((id, tx));
            }
            Err(e) => {
                log::warn!("speech: utterance {id} rejected: {e}");
                self.resume_listening(&mut st);
                let _ = tx.send(UtteranceOutcome::Failed(e.to_string()));
            }
        }

        UtteranceHandle { id, rx }
    }

    /// Hat predicate: `true` iff the current transcripts contain `phrase`.
    /// A match consumes the transcripts.
    pub fn when_i_hear(&self, phrase: &str) -> bool {
        let mut st = lock(&self.state);
        if !st.started || st.listening == ListeningState::SuppressedForSynthesis {
            return false;
        }
        transcript_matches(&mut st.transcripts, phrase)
    }

    /// Voices programs may pick from.
    pub fn available_voices(&self) -> Vec<Voice> {
        self.policy.filter(self.synthesizer.voices())
    }

    /// Select the voice for later utterances.  `"Random"` picks one of
    /// [`available_voices`](Self::available_voices).  Returns the name now
    /// in effect.
    pub fn set_voice(&self, name: &str) -> String {
        let chosen = if name == RANDOM_VOICE {
            match self.policy.pick_random(self.synthesizer.voices()) {
                Some(voice) => voice.name,
                None => {
                    log::warn!("speech: no voices available for a random pick");
                    return self.voice();
                }
            }
        } else {
            name.to_string()
        };

        log::debug!("speech: voice set to {chosen:?}");
        lock(&self.state).voice_name = chosen.clone();
        chosen
    }

    pub fn voice(&self) -> String {
        lock(&self.state).voice_name.clone()
    }

    /// Apply one engine callback.
    pub fn handle_event(&self, event: SpeechEvent) {
        let mut st = lock(&self.state);
        match event {
            SpeechEvent::Transcript { alternatives, is_final } => {
                if st.listening == ListeningState::SuppressedForSynthesis {
                    log::debug!("speech: transcript discarded during synthesis");
                    return;
                }
                let lowered: Vec<String> = alternatives.iter().map(|a| a.to_lowercase()).collect();
                if let Some(top) = lowered.first() {
                    log::debug!("speech: heard {top:?} (final: {is_final})");
                    st.latest_speech = top.clone();
                }
                st.transcripts = lowered;
            }
            SpeechEvent::SessionEnded => {
                if !st.started || st.listening == ListeningState::SuppressedForSynthesis {
                    return;
                }
                if let Err(e) = self.recognizer.start() {
                    log::warn!("speech: could not restart listening: {e}");
                    st.last_restart_error = Some(e.to_string());
                }
            }
            SpeechEvent::UtteranceEnded(id) => self.finish(&mut st, id, UtteranceOutcome::Completed),
            SpeechEvent::UtteranceFailed(id, reason) => {
                log::warn!("speech: utterance {id} failed: {reason}");
                self.finish(&mut st, id, UtteranceOutcome::Failed(reason));
            }
        }
    }

    /// Consume engine events until the channel closes.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<SpeechEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        log::info!("speech: event channel closed");
    }

    fn finish(&self, st: &mut ArbiterState, id: UtteranceId, outcome: UtteranceOutcome) {
        match st.current.take() {
            Some((current, waiter)) if current == id => {
                self.resume_listening(st);
                let _ = waiter.send(outcome);
            }
            other => {
                log::debug!("speech: ignoring end of stale utterance {id}");
                st.current = other;
            }
        }
    }

    fn resume_listening(&self, st: &mut ArbiterState) {
        if st.listening != ListeningState::SuppressedForSynthesis {
            return;
        }
        st.listening = ListeningState::Active;
        if !st.started {
            return;
        }
        match self.recognizer.start() {
            Ok(()) => st.last_restart_error = None,
            Err(e) => {
                log::warn!("speech: could not resume listening: {e}");
                st.last_restart_error = Some(e.to_string());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl Log {
        fn push(&self, entry: impl Into<String>) {
            lock(&self.0).push(entry.into());
        }

        fn entries(&self) -> Vec<String> {
            lock(&self.0).clone()
        }

        fn count(&self, entry: &str) -> usize {
            lock(&self.0).iter().filter(|e| *e == entry).count()
        }
    }

    struct MockRecognizer {
        log: Arc<Log>,
        fail_start: Arc<AtomicBool>,
    }

    impl Recognizer for MockRecognizer {
        fn start(&self) -> Result<(), SpeechError> {
            if self.fail_start.load(Ordering::SeqCst) {
                return Err(SpeechError::Recognizer("already started".into()));
            }
            self.log.push("start");
            Ok(())
        }

        fn stop(&self) -> Result<(), SpeechError> {
            self.log.push("stop");
            Ok(())
        }
    }

    struct MockSynthesizer {
        log: Arc<Log>,
        reject: bool,
    }

    impl Synthesizer for MockSynthesizer {
        fn voices(&self) -> Vec<Voice> {
            vec![Voice::new("Alex", "en-US"), Voice::new("Karen", "en-AU")]
        }

        fn speak(&self, id: UtteranceId, text: &str, voice: Option<&Voice>) -> Result<(), SpeechError> {
            if self.reject {
                return Err(SpeechError::Synthesis("no audio device".into()));
            }
            let voice = voice.map(|v| v.name.as_str()).unwrap_or("default");
            self.log.push(format!("speak {id} {text} ({voice})"));
            Ok(())
        }

        fn cancel(&self) {
            self.log.push("cancel");
        }
    }

    struct Fixture {
        arbiter: RecognitionSynthesisArbiter,
        log: Arc<Log>,
        fail_start: Arc<AtomicBool>,
    }

    fn fixture() -> Fixture {
        fixture_with(false)
    }

    fn fixture_with(reject_speech: bool) -> Fixture {
        let log = Arc::new(Log::default());
        let fail_start = Arc::new(AtomicBool::new(false));
        let arbiter = RecognitionSynthesisArbiter::new(
            Box::new(MockRecognizer {
                log: Arc::clone(&log),
                fail_start: Arc::clone(&fail_start),
            }),
            Box::new(MockSynthesizer {
                log: Arc::clone(&log),
                reject: reject_speech,
            }),
            VoicePolicy::default(),
            "default",
        );
        arbiter.start().unwrap();
        Fixture {
            arbiter,
            log,
            fail_start,
        }
    }

    fn heard(text: &str) -> SpeechEvent {
        SpeechEvent::Transcript {
            alternatives: vec![text.to_string()],
            is_final: true,
        }
    }

    // -----------------------------------------------------------------------
    // Listening
    // -----------------------------------------------------------------------

    #[test]
    fn start_is_idempotent() {
        let f = fixture();
        f.arbiter.start().unwrap();
        assert_eq!(f.log.count("start"), 1);
    }

    #[test]
    fn not_started_never_matches() {
        let log = Arc::new(Log::default());
        let arbiter = RecognitionSynthesisArbiter::new(
            Box::new(MockRecognizer {
                log: Arc::clone(&log),
                fail_start: Arc::new(AtomicBool::new(false)),
            }),
            Box::new(MockSynthesizer { log, reject: false }),
            VoicePolicy::default(),
            "default",
        );
        arbiter.handle_event(heard("hi scratch"));
        assert!(!arbiter.when_i_hear("hi scratch"));
    }

    #[test]
    fn transcripts_are_lowercased_and_reported() {
        let f = fixture();
        f.arbiter.handle_event(SpeechEvent::Transcript {
            alternatives: vec!["Hi Scratch".into(), "High Scratch".into()],
            is_final: false,
        });
        assert_eq!(f.arbiter.latest_speech(), "hi scratch");
        assert!(!f.arbiter.when_i_hear("Hi, Scratch!"));
        assert!(f.arbiter.when_i_hear("HI SCRATCH"));
    }

    #[test]
    fn match_consumes_transcripts_but_keeps_latest_speech() {
        let f = fixture();
        f.arbiter.handle_event(heard("pick up the crowbar"));
        assert!(f.arbiter.when_i_hear("crowbar"));
        assert!(!f.arbiter.when_i_hear("crowbar"));
        assert_eq!(f.arbiter.latest_speech(), "pick up the crowbar");
    }

    #[test]
    fn session_end_restarts_while_active() {
        let f = fixture();
        f.arbiter.handle_event(SpeechEvent::SessionEnded);
        f.arbiter.handle_event(SpeechEvent::SessionEnded);
        assert_eq!(f.log.count("start"), 3);
    }

    #[test]
    fn session_end_restart_failure_is_recorded() {
        let f = fixture();
        f.fail_start.store(true, Ordering::SeqCst);
        f.arbiter.handle_event(SpeechEvent::SessionEnded);
        assert_eq!(f.arbiter.last_restart_error().as_deref(), Some("recognizer error: already started"));
    }

    // -----------------------------------------------------------------------
    // Synthesis
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn speak_suppresses_until_utterance_ends() {
        let f = fixture();
        let handle = f.arbiter.speak("Hello");

        assert_eq!(f.arbiter.listening_state(), ListeningState::SuppressedForSynthesis);
        assert_eq!(f.log.entries(), vec!["start", "stop", "speak 1 hello (default)"]);

        // The stop above ends the session; no restart while suppressed.
        f.arbiter.handle_event(SpeechEvent::SessionEnded);
        assert_eq!(f.log.count("start"), 1);

        f.arbiter.handle_event(SpeechEvent::UtteranceEnded(handle.id()));
        assert_eq!(f.arbiter.listening_state(), ListeningState::Active);
        assert_eq!(f.log.count("start"), 2);
        assert_eq!(handle.finished().await, UtteranceOutcome::Completed);
    }

    /// A transcript of the program's own voice arrives before the utterance
    /// ends: it is dropped, not matched later.
    #[tokio::test]
    async fn transcript_during_synthesis_is_discarded() {
        let f = fixture();
        let handle = f.arbiter.speak("hello");

        f.arbiter.handle_event(heard("hello world"));
        assert!(!f.arbiter.when_i_hear("hello"));

        f.arbiter.handle_event(SpeechEvent::UtteranceEnded(handle.id()));
        assert!(!f.arbiter.when_i_hear("hello"));
        assert_eq!(f.arbiter.latest_speech(), "");
        assert_eq!(handle.finished().await, UtteranceOutcome::Completed);
    }

    #[tokio::test]
    async fn restart_failure_does_not_fail_the_utterance() {
        let f = fixture();
        let handle = f.arbiter.speak("hello");
        f.fail_start.store(true, Ordering::SeqCst);

        f.arbiter.handle_event(SpeechEvent::UtteranceEnded(handle.id()));

        assert_eq!(handle.finished().await, UtteranceOutcome::Completed);
        assert_eq!(f.arbiter.listening_state(), ListeningState::Active);
        assert!(f.arbiter.last_restart_error().is_some());
    }

    #[tokio::test]
    async fn utterance_failure_resumes_listening() {
        let f = fixture();
        let handle = f.arbiter.speak("hello");
        f.arbiter
            .handle_event(SpeechEvent::UtteranceFailed(handle.id(), "interrupted".into()));

        assert_eq!(f.arbiter.listening_state(), ListeningState::Active);
        assert_eq!(handle.finished().await, UtteranceOutcome::Failed("interrupted".into()));
    }

    #[tokio::test]
    async fn second_speak_preempts_and_keeps_pairing() {
        let f = fixture();
        let first = f.arbiter.speak("one");
        let second = f.arbiter.speak("two");

        assert_eq!(first.finished().await, UtteranceOutcome::Preempted);
        assert_eq!(f.log.count("cancel"), 1);
        assert_eq!(f.log.count("stop"), 1);
        assert_eq!(f.arbiter.listening_state(), ListeningState::SuppressedForSynthesis);

        // The cancelled utterance's end event must not resume listening.
        f.arbiter.handle_event(SpeechEvent::UtteranceEnded(1));
        assert_eq!(f.arbiter.listening_state(), ListeningState::SuppressedForSynthesis);

        f.arbiter.handle_event(SpeechEvent::UtteranceEnded(second.id()));
        assert_eq!(f.arbiter.listening_state(), ListeningState::Active);
        assert_eq!(f.log.count("start"), 2);
        assert_eq!(second.finished().await, UtteranceOutcome::Completed);
    }

    #[tokio::test]
    async fn rejected_utterance_resolves_immediately() {
        let f = fixture_with(true);
        let handle = f.arbiter.speak("hello");

        assert_eq!(f.arbiter.listening_state(), ListeningState::Active);
        assert!(matches!(handle.finished().await, UtteranceOutcome::Failed(_)));
        assert_eq!(f.log.count("start"), 2);
    }

    #[test]
    fn selected_voice_is_passed_to_the_synthesizer() {
        let f = fixture();
        assert_eq!(f.arbiter.set_voice("Karen"), "Karen");
        let _ = f.arbiter.speak("g'day");
        assert!(f.log.entries().contains(&"speak 1 g'day (Karen)".to_string()));
    }

    #[test]
    fn random_voice_is_one_of_the_available_voices() {
        let f = fixture();
        let chosen = f.arbiter.set_voice(RANDOM_VOICE);
        assert!(f.arbiter.available_voices().iter().any(|v| v.name == chosen));
        assert_eq!(f.arbiter.voice(), chosen);
    }

    #[tokio::test]
    async fn run_applies_events_until_channel_closes() {
        let f = fixture();
        let arbiter = Arc::new(f.arbiter);
        let (tx, rx) = mpsc::channel(4);

        tx.send(heard("Use the Hammer")).await.unwrap();
        drop(tx);
        Arc::clone(&arbiter).run(rx).await;

        assert_eq!(arbiter.latest_speech(), "use the hammer");
    }
}
