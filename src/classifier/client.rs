//! Boundary traits of the remote classifier service.
//!
//! Three seams, all async and object-safe:
//!
//! * [`IntentClassifier`]: classify one utterance against a model.
//! * [`ModelService`]: list, fetch and create models.
//! * [`RemoteModel`]: the provisioning steps of a freshly created model.
//!
//! Every call can fail with a [`ClassifierError`]; callers in this crate
//! never let those errors reach the host's poll loop.

use async_trait::async_trait;
use thiserror::Error;

use super::types::{ModelCatalog, ModelRef, ModelSummary, Recognition};

// ---------------------------------------------------------------------------
// ClassifierError
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to the classifier service.
#[derive(Debug, Clone, Error)]
pub enum ClassifierError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("classifier request timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("classifier returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be parsed.
    #[error("failed to parse classifier response: {0}")]
    Parse(String),

    /// No key configured for the requested operation.
    #[error("no {0} key configured")]
    MissingKey(&'static str),

    /// Remote training reported failure or never finished.
    #[error("training failed: {0}")]
    Training(String),
}

impl From<reqwest::Error> for ClassifierError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClassifierError::Timeout
        } else {
            ClassifierError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Classifies utterances.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn recognize(&self, model: &ModelRef, text: &str) -> Result<Recognition, ClassifierError>;
}

/// Model management side of the service.
#[async_trait]
pub trait ModelService: Send + Sync {
    /// List the models the operator may choose from.
    async fn list_models(&self) -> Result<Vec<ModelSummary>, ClassifierError>;

    /// Fetch an existing model, confirming it is usable.
    async fn fetch_model(&self, model: &ModelRef) -> Result<ModelCatalog, ClassifierError>;

    /// Create an empty model.  Not idempotent: every call creates a new one.
    async fn create_model(&self) -> Result<Box<dyn RemoteModel>, ClassifierError>;
}

/// A model created by [`ModelService::create_model`] that still has to be
/// filled, trained and published.
#[async_trait]
pub trait RemoteModel: Send + Sync {
    fn model_ref(&self) -> &ModelRef;

    /// Intents and entities the model is being trained with.
    fn catalog(&self) -> ModelCatalog;

    async fn load_data(&self) -> Result<(), ClassifierError>;
    async fn start_training(&self) -> Result<(), ClassifierError>;
    async fn wait_for_training_to_complete(&self) -> Result<(), ClassifierError>;
    async fn publish(&self) -> Result<(), ClassifierError>;
}

// Compile-time assertion: the boundary traits must stay object-safe.
const _: fn() = || {
    fn _assert_object_safe(
        _: Box<dyn IntentClassifier>,
        _: Box<dyn ModelService>,
        _: Box<dyn RemoteModel>,
    ) {
    }
};
