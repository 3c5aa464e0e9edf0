//! Sense blocks: language, speech and gesture integrations for a
//! block-based programming runtime.
//!
//! ```text
//!            host poll loop (never blocks)
//!   ┌──────────────┬──────────────┬──────────────┐
//!   │ language     │ speech       │ gestureRemote│   blocks::Extension
//!   └──────┬───────┴──────┬───────┴──────┬───────┘
//!          │              │              │
//!   ResultLatch +   Recognition-    GestureBoard
//!   ModelLifecycle  Synthesis-      (PulseFlag per gesture)
//!          │        Arbiter              │
//!          ▼              ▼              ▼
//!    classifier     speech engines   push channel
//!    (LUIS HTTP)    (SpeechEvent)    (GestureEvent)
//! ```

pub mod blocks;
pub mod classifier;
pub mod config;
pub mod gesture;
pub mod host;
pub mod latch;
pub mod lifecycle;
pub mod predicate;
pub mod speech;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock `mutex`, recovering the data if a panicking holder poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
