//! Model lifecycle states and the legal transitions between them.
//!
//! ```text
//! Unselected ──resolve──▶ Selecting ──existing ref──▶ Loading(ref) ──ok──▶ Ready(ref)
//!      │                      │                           └──err──▶ Failed
//!      │ persisted ref        └──create new──▶ Provisioning(Created)
//!      └──────────────▶ Loading(ref)             ──data loaded──▶ Provisioning(Training)
//!                                                ──trained──────▶ Provisioning(Published)
//!                                                ──published────▶ Ready(ref)
//!                                          any step failure ──▶ Failed(reason)
//! Ready / Failed ──reset (program load)──▶ Unselected
//! ```

use std::fmt;

use crate::classifier::ModelRef;

// ---------------------------------------------------------------------------
// ProvisioningStage
// ---------------------------------------------------------------------------

/// Progress of a freshly created model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningStage {
    /// The empty model exists remotely.
    Created,
    /// Training data is uploaded; training has been requested.
    Training,
    /// Training finished; the model is being published.
    Published,
}

// ---------------------------------------------------------------------------
// ModelState
// ---------------------------------------------------------------------------

/// Where model resolution currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelState {
    /// Nothing chosen yet (fresh program load).
    Unselected,
    /// Waiting for the operator to pick a model or ask for a new one.
    Selecting,
    /// Fetching an existing model.
    Loading(ModelRef),
    /// Building a new model.
    Provisioning(ProvisioningStage),
    /// A usable model is available.
    Ready(ModelRef),
    /// Resolution failed; stable until reset.
    Failed(String),
}

impl ModelState {
    /// `true` while a resolution is running and callers must wait.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            ModelState::Selecting | ModelState::Loading(_) | ModelState::Provisioning(_)
        )
    }

    /// `true` for `Ready` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ModelState::Ready(_) | ModelState::Failed(_))
    }

    /// The model reference, present exactly when `Ready`.
    pub fn model_ref(&self) -> Option<&ModelRef> {
        match self {
            ModelState::Ready(model) => Some(model),
            _ => None,
        }
    }

    /// Whether `self → next` is an edge of the state machine.
    pub fn can_transition_to(&self, next: &ModelState) -> bool {
        use ModelState::*;
        use ProvisioningStage::*;

        match (self, next) {
            (Unselected, Selecting) | (Unselected, Loading(_)) => true,
            (Selecting, Loading(_)) | (Selecting, Provisioning(Created)) => true,
            (Selecting, Failed(_)) => true,
            (Loading(from), Ready(to)) => from == to,
            (Loading(_), Failed(_)) => true,
            (Provisioning(Created), Provisioning(Training)) => true,
            (Provisioning(Training), Provisioning(Published)) => true,
            (Provisioning(Published), Ready(_)) => true,
            (Provisioning(_), Failed(_)) => true,
            (Ready(_), Unselected) | (Failed(_), Unselected) => true,
            _ => false,
        }
    }

    /// A short label for logs and status displays.
    pub fn label(&self) -> &'static str {
        match self {
            ModelState::Unselected => "Unselected",
            ModelState::Selecting => "Selecting",
            ModelState::Loading(_) => "Loading",
            ModelState::Provisioning(ProvisioningStage::Created) => "Provisioning (created)",
            ModelState::Provisioning(ProvisioningStage::Training) => "Provisioning (training)",
            ModelState::Provisioning(ProvisioningStage::Published) => "Provisioning (publishing)",
            ModelState::Ready(_) => "Ready",
            ModelState::Failed(_) => "Failed",
        }
    }
}

impl Default for ModelState {
    fn default() -> Self {
        ModelState::Unselected
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelState::Loading(model) | ModelState::Ready(model) => {
                write!(f, "{} ({model})", self.label())
            }
            ModelState::Failed(reason) => write!(f, "Failed: {reason}"),
            _ => f.write_str(self.label()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
