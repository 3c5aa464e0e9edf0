//! Classifier model lifecycle.
//!
//! Resolves "which trained model does this program use" once, no matter how
//! many blocks ask at the same time:
//!
//! ```text
//!  block ─ensure_ready()─▶ ModelLifecycle ──(one driver task)──▶ ModelService
//!  block ─ensure_ready()─┘      │   ▲                              │
//!                               │   └──── ModelSelector ◀──────────┘ list
//!                               ▼
//!                         ModelRefStore  (stage state "Scratch.language")
//! ```
//!
//! - [`state`]   : [`ModelState`] and its legal transitions.
//! - [`machine`] : [`ModelLifecycle`], the coalescing driver.
//! - [`selector`]: [`ModelSelector`] hook and [`ConfiguredSelector`].
//! - [`store`]   : [`ModelRefStore`] hook and the stage-state store.

pub mod machine;
pub mod selector;
pub mod state;
pub mod store;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use machine::{LifecycleError, ModelLifecycle, Readiness};
pub use selector::{ConfiguredSelector, ModelSelector, Selection};
pub use state::{ModelState, ProvisioningStage};
pub use store::{LanguageState, ModelRefStore, StageState, StageStore, StoreError, LANGUAGE_STATE_KEY};
