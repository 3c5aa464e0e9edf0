//! Wire and domain types of the remote intent classifier.
//!
//! [`Recognition`] mirrors the prediction response body (camelCase field
//! names on the wire).  [`ModelRef`] is the opaque identifier persisted with
//! program state; nothing in the crate looks inside it.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ModelRef
// ---------------------------------------------------------------------------

/// Opaque identifier of a remote classifier model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelRef(String);

impl ModelRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ModelSummary / ModelCatalog
// ---------------------------------------------------------------------------

/// One entry of the remote model listing, shown to the operator during
/// model selection.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSummary {
    pub model_ref: ModelRef,
    pub name: String,
}

/// Intent and entity names a model was trained with.
///
/// Drives the data-driven parts of the language blocks (intent menu, one
/// reporter per entity).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelCatalog {
    pub intents: Vec<String>,
    pub entities: Vec<String>,
}

// ---------------------------------------------------------------------------
// Recognition
// ---------------------------------------------------------------------------

/// An intent together with the classifier's confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredIntent {
    pub intent: String,
    #[serde(default)]
    pub score: Option<f32>,
}

/// An entity extracted from the utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// The matched words.
    pub entity: String,
    /// Entity type name (e.g. `"tool"`).
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub start_index: Option<usize>,
    #[serde(default)]
    pub end_index: Option<usize>,
    #[serde(default)]
    pub score: Option<f32>,
}

/// Result of classifying one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recognition {
    #[serde(default)]
    pub query: String,
    pub top_scoring_intent: ScoredIntent,
    #[serde(default)]
    pub intents: Vec<ScoredIntent>,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl Recognition {
    /// Build a recognition by hand (test doubles, offline hosts).
    pub fn new(query: &str, intent: &str, entities: &[(&str, &str)]) -> Self {
        Self {
            query: query.into(),
            top_scoring_intent: ScoredIntent {
                intent: intent.into(),
                score: None,
            },
            intents: Vec::new(),
            entities: entities
                .iter()
                .map(|(kind, entity)| Entity {
                    entity: (*entity).into(),
                    kind: (*kind).into(),
                    start_index: None,
                    end_index: None,
                    score: None,
                })
                .collect(),
        }
    }

    /// Name of the top scoring intent.
    pub fn intent(&self) -> &str {
        &self.top_scoring_intent.intent
    }

    /// First entity of type `kind`, if any.
    pub fn entity(&self, kind: &str) -> Option<&str> {
        self.entities
            .iter()
            .find(|e| e.kind == kind)
            .map(|e| e.entity.as_str())
    }
}
