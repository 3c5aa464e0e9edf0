//! Gesture remote: phone gestures delivered over a push channel.
//!
//! The transport (a socket session identified by
//! [`GestureConfig::session_key`](crate::config::GestureConfig)) is external;
//! this module starts where a decoded [`GestureEvent`] arrives.
//!
//! ```text
//! push channel ──{gestureClass: n}──▶ GestureBoard::run(rx)
//!                                         │
//!                                         ▼
//!                                  PulseFlag[n].trigger_at(now, window)
//!                                         │
//! host poll ─▶ whengesture(name) ─▶ GestureBoard::is_triggered(gesture)
//! ```

pub mod board;

pub use board::GestureBoard;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Gesture
// ---------------------------------------------------------------------------

/// The gestures the remote classifies, in wire order: a
/// [`GestureEvent::gesture_class`] is an index into [`Gesture::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    FlickRightLeftHand,
    FlickLeftLeftHand,
    FlickRightRightHand,
    FlickLeftRightHand,
    FlipCloseLeftHand,
    FlipOpenLeftHand,
    FlipCloseRightHand,
    FlipOpenRightHand,
    PanLeft,
    PanRight,
    PanUp,
    PanDown,
    Pull,
    Push,
}

impl Gesture {
    pub const ALL: [Gesture; 14] = [
        Gesture::FlickRightLeftHand,
        Gesture::FlickLeftLeftHand,
        Gesture::FlickRightRightHand,
        Gesture::FlickLeftRightHand,
        Gesture::FlipCloseLeftHand,
        Gesture::FlipOpenLeftHand,
        Gesture::FlipCloseRightHand,
        Gesture::FlipOpenRightHand,
        Gesture::PanLeft,
        Gesture::PanRight,
        Gesture::PanUp,
        Gesture::PanDown,
        Gesture::Pull,
        Gesture::Push,
    ];

    /// Gesture for a wire class index.
    pub fn from_class(class: usize) -> Option<Self> {
        Self::ALL.get(class).copied()
    }

    /// Position in [`Gesture::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Menu value used by programs (e.g. `"flick_right_lh"`).
    pub fn name(self) -> &'static str {
        match self {
            Gesture::FlickRightLeftHand => "flick_right_lh",
            Gesture::FlickLeftLeftHand => "flick_left_lh",
            Gesture::FlickRightRightHand => "flick_right_rh",
            Gesture::FlickLeftRightHand => "flick_left_rh",
            Gesture::FlipCloseLeftHand => "flip_close_lh",
            Gesture::FlipOpenLeftHand => "flip_open_lh",
            Gesture::FlipCloseRightHand => "flip_close_rh",
            Gesture::FlipOpenRightHand => "flip_open_rh",
            Gesture::PanLeft => "pan_left",
            Gesture::PanRight => "pan_right",
            Gesture::PanUp => "pan_up",
            Gesture::PanDown => "pan_down",
            Gesture::Pull => "pull",
            Gesture::Push => "push",
        }
    }

    /// Label shown in the block menu.
    pub fn friendly_name(self) -> &'static str {
        match self {
            Gesture::FlickRightLeftHand => "Flick right with left hand",
            Gesture::FlickLeftLeftHand => "Flick left with left hand",
            Gesture::FlickRightRightHand => "Flick right with right hand",
            Gesture::FlickLeftRightHand => "Flick left with right hand",
            Gesture::FlipCloseLeftHand => "Flip close with left hand",
            Gesture::FlipOpenLeftHand => "Flip open with left hand",
            Gesture::FlipCloseRightHand => "Flip close with right hand",
            Gesture::FlipOpenRightHand => "Flip open with right hand",
            Gesture::PanLeft => "Pan left",
            Gesture::PanRight => "Pan right",
            Gesture::PanUp => "Pan up",
            Gesture::PanDown => "Pan down",
            Gesture::Pull => "Pull",
            Gesture::Push => "Push",
        }
    }

    /// Parse a menu value or, leniently, a friendly name.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|g| g.name() == value || g.friendly_name().eq_ignore_ascii_case(value))
    }
}

// ---------------------------------------------------------------------------
// GestureEvent
// ---------------------------------------------------------------------------

/// One message from the gesture push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestureEvent {
    #[serde(rename = "gestureClass")]
    pub gesture_class: usize,
}

impl GestureEvent {
    /// Decode a JSON message body.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
