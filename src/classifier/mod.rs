//! Remote intent classifier boundary.
//!
//! This module provides:
//! * [`IntentClassifier`]: async trait classifying one utterance.
//! * [`ModelService`] / [`RemoteModel`]: model listing, creation and the
//!   provisioning steps (load data, train, wait, publish).
//! * [`LuisClient`]: HTTP implementation of all three for a LUIS-compatible
//!   service.
//! * [`Recognition`], [`ModelRef`], [`ModelSummary`], [`ModelCatalog`]:
//!   wire and domain types.
//! * [`ClassifierError`]: error variants for classifier operations.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use sense_blocks::classifier::{IntentClassifier, LuisClient, ModelRef};
//! use sense_blocks::config::AppConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let client = LuisClient::from_config(&config.classifier);
//!
//!     let model = ModelRef::new("dd176c9e-a275-42e1-967c-47323280031b");
//!     let recognition = client.recognize(&model, "pick up the crowbar").await.unwrap();
//!     println!("{} {:?}", recognition.intent(), recognition.entity("object"));
//! }
//! ```

pub mod client;
pub mod luis;
pub mod types;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{ClassifierError, IntentClassifier, ModelService, RemoteModel};
pub use luis::LuisClient;
pub use types::{Entity, ModelCatalog, ModelRef, ModelSummary, Recognition, ScoredIntent};
