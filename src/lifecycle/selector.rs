//! Model selection: asking the host which model to use.
//!
//! When a program has no persisted model, the lifecycle lists the remote
//! models and hands the list to a [`ModelSelector`].  The answer may take
//! arbitrarily long (a human picks from a dialog), which is why concurrent
//! callers are queued rather than starting their own resolution.

use async_trait::async_trait;

use crate::classifier::{ModelRef, ModelSummary};

/// The operator's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Use this existing model.
    Existing(ModelRef),
    /// Create, train and publish a new model.
    CreateNew,
    /// No model; resolution fails.
    Cancel,
}

/// Solicits a model choice from the host.
#[async_trait]
pub trait ModelSelector: Send + Sync {
    async fn choose(&self, available: &[ModelSummary]) -> Selection;
}

// ---------------------------------------------------------------------------
// ConfiguredSelector
// ---------------------------------------------------------------------------

/// Unattended policy: use the model named in config when it exists,
/// otherwise provision a new one.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredSelector {
    model_name: Option<String>,
}

impl ConfiguredSelector {
    pub fn new(model_name: Option<String>) -> Self {
        Self { model_name }
    }
}

#[async_trait]
impl ModelSelector for ConfiguredSelector {
    async fn choose(&self, available: &[ModelSummary]) -> Selection {
        let Some(wanted) = self.model_name.as_deref() else {
            return Selection::CreateNew;
        };
        match available.iter().find(|m| m.name == wanted) {
            Some(model) => Selection::Existing(model.model_ref.clone()),
            None => {
                log::info!("lifecycle: no remote model named {wanted:?}; creating one");
                Selection::CreateNew
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> Vec<ModelSummary> {
        vec![
            ModelSummary {
                model_ref: ModelRef::new("a1"),
                name: "adventure".into(),
            },
            ModelSummary {
                model_ref: ModelRef::new("b2"),
                name: "pets".into(),
            },
        ]
    }

    #[tokio::test]
    async fn picks_model_by_name() {
        let selector = ConfiguredSelector::new(Some("pets".into()));
        assert_eq!(
            selector.choose(&listing()).await,
            Selection::Existing(ModelRef::new("b2"))
        );
    }

    #[tokio::test]
    async fn unknown_name_creates_new() {
        let selector = ConfiguredSelector::new(Some("space".into()));
        assert_eq!(selector.choose(&listing()).await, Selection::CreateNew);
    }

    #[tokio::test]
    async fn no_name_creates_new() {
        let selector = ConfiguredSelector::default();
        assert_eq!(selector.choose(&listing()).await, Selection::CreateNew);
    }
}
