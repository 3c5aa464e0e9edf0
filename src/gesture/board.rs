//! Pulse board: one [`PulseFlag`] per gesture.
//!
//! The push channel carries no "gesture ended" message, so every arrival
//! opens a fixed window during which the matching hat reads true.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::{Gesture, GestureEvent};
use crate::config::GestureConfig;
use crate::lock;
use crate::predicate::PulseFlag;

// ---------------------------------------------------------------------------
// GestureBoard
// ---------------------------------------------------------------------------

/// Shared gesture state.  Cheap to clone; clones share the flags.
#[derive(Clone)]
pub struct GestureBoard {
    pulses: Arc<Mutex<[PulseFlag; Gesture::ALL.len()]>>,
    window: Duration,
}

impl GestureBoard {
    /// Create a board whose pulses last `window`.
    pub fn new(window: Duration) -> Self {
        Self {
            pulses: Arc::new(Mutex::new([PulseFlag::default(); Gesture::ALL.len()])),
            window,
        }
    }

    pub fn from_config(config: &GestureConfig) -> Self {
        Self::new(Duration::from_millis(config.pulse_window_ms))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record an event arriving now.  Returns the gesture, or `None` for an
    /// unknown class index (logged and ignored).
    pub fn record(&self, event: GestureEvent) -> Option<Gesture> {
        self.record_at(event, Instant::now())
    }

    /// Record an event arriving at `now`.
    pub fn record_at(&self, event: GestureEvent, now: Instant) -> Option<Gesture> {
        let Some(gesture) = Gesture::from_class(event.gesture_class) else {
            log::warn!("gesture: unknown gesture class {}", event.gesture_class);
            return None;
        };
        log::debug!("gesture: {}", gesture.name());
        lock(&self.pulses)[gesture.index()].trigger_at(now, self.window);
        Some(gesture)
    }

    /// `true` while the gesture's pulse is open.
    pub fn is_triggered(&self, gesture: Gesture) -> bool {
        self.is_triggered_at(gesture, Instant::now())
    }

    pub fn is_triggered_at(&self, gesture: Gesture, now: Instant) -> bool {
        lock(&self.pulses)[gesture.index()].is_set_at(now)
    }

    /// Consume events until the channel closes.
    ///
    /// This is an `async fn` and should be spawned as a tokio task next to
    /// whatever task decodes the push channel.
    pub async fn run(self, mut events: mpsc::Receiver<GestureEvent>) {
        while let Some(event) = events.recv().await {
            self.record(event);
        }
        log::info!("gesture: event channel closed");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(200);

    #[test]
    fn event_opens_a_pulse_for_that_gesture_only() {
        let board = GestureBoard::new(WINDOW);
        let t = Instant::now();

        let g = board.record_at(GestureEvent { gesture_class: 8 }, t);
        assert_eq!(g, Some(Gesture::PanLeft));

        assert!(board.is_triggered_at(Gesture::PanLeft, t));
        assert!(!board.is_triggered_at(Gesture::PanRight, t));
    }

    #[test]
    fn pulse_reads_true_inside_window_and_false_at_deadline() {
        let board = GestureBoard::new(WINDOW);
        let t = Instant::now();
        board.record_at(GestureEvent { gesture_class: 13 }, t);

        for ms in [0u64, 50, 120, 199] {
            assert!(board.is_triggered_at(Gesture::Push, t + Duration::from_millis(ms)));
        }
        assert!(!board.is_triggered_at(Gesture::Push, t + WINDOW));
        assert!(!board.is_triggered_at(Gesture::Push, t + Duration::from_millis(500)));
    }

    #[test]
    fn unknown_class_is_ignored() {
        let board = GestureBoard::new(WINDOW);
        let t = Instant::now();
        assert_eq!(board.record_at(GestureEvent { gesture_class: 99 }, t), None);
        assert!(Gesture::ALL.iter().all(|g| !board.is_triggered_at(*g, t)));
    }

    #[test]
    fn window_comes_from_config() {
        let board = GestureBoard::from_config(&GestureConfig::default());
        assert_eq!(board.window(), Duration::from_millis(200));
    }

    #[tokio::test]
    async fn run_records_events_until_channel_closes() {
        let board = GestureBoard::new(Duration::from_secs(60));
        let (tx, rx) = mpsc::channel(4);

        tx.send(GestureEvent { gesture_class: 0 }).await.unwrap();
        tx.send(GestureEvent { gesture_class: 12 }).await.unwrap();
        drop(tx);

        board.clone().run(rx).await;

        assert!(board.is_triggered(Gesture::FlickRightLeftHand));
        assert!(board.is_triggered(Gesture::Pull));
        assert!(!board.is_triggered(Gesture::Push));
    }
}
