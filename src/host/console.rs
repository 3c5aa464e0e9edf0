//! Console stand-ins for the platform speech engines.
//!
//! [`ConsoleRecognizer`] turns typed lines into transcripts while a session
//! is open.  [`ConsoleSynthesizer`] prints the utterance and reports it
//! finished after a reading-speed delay, so the suppression window is as
//! real as with an audio device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::SpeechConfig;
use crate::lock;
use crate::speech::{Recognizer, SpeechError, SpeechEvent, Synthesizer, UtteranceId, Voice};

/// Voices the console synthesizer claims to have.
pub const CONSOLE_VOICES: [&str; 6] = ["Alex", "Samantha", "Daniel", "Karen", "Ralph", "Zarvox"];

// ---------------------------------------------------------------------------
// ConsoleRecognizer
// ---------------------------------------------------------------------------

/// Cheap to clone; clones share the session flag.
#[derive(Clone)]
pub struct ConsoleRecognizer {
    events: mpsc::Sender<SpeechEvent>,
    listening: Arc<AtomicBool>,
}

impl ConsoleRecognizer {
    pub fn new(events: mpsc::Sender<SpeechEvent>) -> Self {
        Self {
            events,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Deliver `text` as a final transcript.  Returns `false` (and drops the
    /// text) when no session is open.
    pub fn hear(&self, text: &str) -> bool {
        if !self.is_listening() {
            log::debug!("console: not listening; dropped {text:?}");
            return false;
        }
        self.send(SpeechEvent::Transcript {
            alternatives: vec![text.to_string()],
            is_final: true,
        })
    }

    fn send(&self, event: SpeechEvent) -> bool {
        match self.events.try_send(event) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("console: speech event dropped: {e}");
                false
            }
        }
    }
}

impl Recognizer for ConsoleRecognizer {
    fn start(&self) -> Result<(), SpeechError> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return Err(SpeechError::Recognizer("recognition has already started".into()));
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), SpeechError> {
        if self.listening.swap(false, Ordering::SeqCst) {
            self.send(SpeechEvent::SessionEnded);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ConsoleSynthesizer
// ---------------------------------------------------------------------------

pub struct ConsoleSynthesizer {
    events: mpsc::Sender<SpeechEvent>,
    chars_per_sec: u32,
    runtime: Handle,
    playing: Mutex<Option<(UtteranceId, JoinHandle<()>)>>,
}

impl ConsoleSynthesizer {
    pub fn new(events: mpsc::Sender<SpeechEvent>, config: &SpeechConfig, runtime: Handle) -> Self {
        Self {
            events,
            chars_per_sec: config.console_chars_per_sec.max(1),
            runtime,
            playing: Mutex::new(None),
        }
    }

    /// How long `text` takes to "say".
    pub fn duration_of(&self, text: &str) -> Duration {
        let chars = text.chars().count().max(1) as u64;
        Duration::from_millis(chars * 1000 / u64::from(self.chars_per_sec))
    }
}

impl Synthesizer for ConsoleSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        CONSOLE_VOICES.iter().map(|name| Voice::new(*name, "en-US")).collect()
    }

    fn speak(&self, id: UtteranceId, text: &str, voice: Option<&Voice>) -> Result<(), SpeechError> {
        let voice = voice.map(|v| v.name.as_str()).unwrap_or("default");
        println!("[{voice}] {text}");

        let events = self.events.clone();
        let delay = self.duration_of(text);
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(SpeechEvent::UtteranceEnded(id)).await;
        });

        if let Some((_, previous)) = lock(&self.playing).replace((id, task)) {
            previous.abort();
        }
        Ok(())
    }

    fn cancel(&self) {
        if let Some((id, task)) = lock(&self.playing).take() {
            task.abort();
            let _ = self.events.try_send(SpeechEvent::UtteranceEnded(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recognizer_only_hears_while_listening() {
        let (tx, mut rx) = mpsc::channel(8);
        let recognizer = ConsoleRecognizer::new(tx);

        assert!(!recognizer.hear("too early"));
        recognizer.start().unwrap();
        assert!(recognizer.start().is_err());
        assert!(recognizer.hear("Hello"));
        recognizer.stop().unwrap();
        recognizer.stop().unwrap();

        assert_eq!(
            rx.recv().await,
            Some(SpeechEvent::Transcript {
                alternatives: vec!["Hello".into()],
                is_final: true
            })
        );
        assert_eq!(rx.recv().await, Some(SpeechEvent::SessionEnded));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn synthesizer_reports_end_after_reading_time() {
        let (tx, mut rx) = mpsc::channel(8);
        let config = SpeechConfig {
            console_chars_per_sec: 100,
            ..SpeechConfig::default()
        };
        let synth = ConsoleSynthesizer::new(tx, &config, Handle::current());
        assert_eq!(synth.duration_of("hello"), Duration::from_millis(50));

        synth.speak(3, "hello", None).unwrap();
        assert_eq!(rx.recv().await, Some(SpeechEvent::UtteranceEnded(3)));
    }

    #[tokio::test]
    async fn cancel_ends_the_playing_utterance_at_once() {
        let (tx, mut rx) = mpsc::channel(8);
        let config = SpeechConfig {
            console_chars_per_sec: 1,
            ..SpeechConfig::default()
        };
        let synth = ConsoleSynthesizer::new(tx, &config, Handle::current());

        synth.speak(1, "a very long sentence indeed", None).unwrap();
        synth.cancel();
        synth.cancel();

        assert_eq!(rx.recv().await, Some(SpeechEvent::UtteranceEnded(1)));
        assert!(rx.try_recv().is_err());
    }
}
