//! Single-flight request latch.
//!
//! [`ResultLatch`] turns a slow asynchronous call (classifier request, OS
//! speech call) into a pollable "most recent result" cell:
//!
//! ```text
//! submit(call) ──pending?──yes──▶ Busy (call dropped, never polled)
//!        │
//!        no
//!        ▼
//!  pending = true, latched = None, spawn(call)
//!        │
//!        ├─ Ok(v)  → pending = false, latched = Some(v)
//!        └─ Err(e) → pending = false, latched stays None, warn!
//! ```
//!
//! Nothing is returned to the submitter except whether the call was
//! dispatched.  Readers on the host's poll loop call [`ResultLatch::latest`]
//! every tick.  Pending flag and latched value live under one mutex so a
//! reader never observes one without the other.

use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;

use crate::lock;

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// What [`ResultLatch::submit`] did with a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The call was spawned; its outcome will land in the latch.
    Dispatched,
    /// A call was already outstanding; this one was dropped unpolled.
    Busy,
}

// ---------------------------------------------------------------------------
// ResultLatch
// ---------------------------------------------------------------------------

struct LatchCell<T> {
    pending: bool,
    latched: Option<Arc<T>>,
}

/// Single-flight wrapper for one recognition channel.
///
/// Cheap to clone; clones share the same cell.
///
/// ```rust,no_run
/// use sense_blocks::latch::{ResultLatch, Submission};
///
/// # async fn example() {
/// let latch: ResultLatch<String> = ResultLatch::new("echo", tokio::runtime::Handle::current());
/// let first = latch.submit(async { Ok::<_, std::io::Error>("hello".to_string()) });
/// assert_eq!(first, Submission::Dispatched);
/// // ... later, on a poll tick:
/// if let Some(text) = latch.latest() {
///     println!("{text}");
/// }
/// # }
/// ```
pub struct ResultLatch<T> {
    channel: Arc<str>,
    cell: Arc<Mutex<LatchCell<T>>>,
    runtime: Handle,
}

impl<T> Clone for ResultLatch<T> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
            cell: Arc::clone(&self.cell),
            runtime: self.runtime.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> ResultLatch<T> {
    /// Create an idle latch for `channel`; calls are spawned on `runtime`.
    pub fn new(channel: &str, runtime: Handle) -> Self {
        Self {
            channel: Arc::from(channel),
            cell: Arc::new(Mutex::new(LatchCell {
                pending: false,
                latched: None,
            })),
            runtime,
        }
    }

    /// Channel name used in log lines.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Dispatch `call` unless one is already outstanding.
    ///
    /// On dispatch the previous result is cleared, so readers see "in flight,
    /// no stale answer" until the call completes.  A busy latch drops `call`
    /// without polling it; the host retries naturally on its next tick.
    pub fn submit<F, E>(&self, call: F) -> Submission
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        {
            let mut cell = lock(&self.cell);
            if cell.pending {
                log::debug!("latch[{}]: busy, request dropped", self.channel);
                return Submission::Busy;
            }
            cell.pending = true;
            cell.latched = None;
        }

        let cell = Arc::clone(&self.cell);
        let channel = Arc::clone(&self.channel);
        self.runtime.spawn(async move {
            let outcome = call.await;
            let mut cell = lock(&cell);
            cell.pending = false;
            match outcome {
                Ok(value) => {
                    cell.latched = Some(Arc::new(value));
                    log::debug!("latch[{channel}]: result latched");
                }
                Err(e) => {
                    log::warn!("latch[{channel}]: call failed: {e}");
                }
            }
        });

        Submission::Dispatched
    }

    /// The most recent completed result, if any.
    pub fn latest(&self) -> Option<Arc<T>> {
        lock(&self.cell).latched.clone()
    }

    /// `true` while a call is outstanding.
    pub fn is_pending(&self) -> bool {
        lock(&self.cell).pending
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
