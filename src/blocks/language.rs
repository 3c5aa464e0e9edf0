//! `language` extension: understand a sentence, hat on its intent, report
//! its entities.
//!
//! `understand` never waits.  Until the model lifecycle is `Ready` it only
//! kicks off resolution; afterwards it submits the sentence to the
//! `classifier` latch.  While the latch is busy or the model is still being
//! resolved the block yields, so the host retries it on the next tick.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use super::{
    arg, ArgSpec, BlockArgs, BlockKind, BlockSpec, BlockValue, CommandStatus, Extension,
    ExtensionInfo, MenuItem,
};
use crate::classifier::{IntentClassifier, ModelCatalog, Recognition};
use crate::latch::{ResultLatch, Submission};
use crate::lifecycle::{ModelLifecycle, ModelState};
use crate::predicate::{entity_value, intent_matches};

/// Intent menu used before a model is ready.
pub const DEFAULT_INTENTS: [&str; 5] = ["None", "Describe surroundings", "Help", "Pick up", "Use tool"];

/// Entity reporters used before a model is ready.
pub const DEFAULT_ENTITIES: [&str; 2] = ["tool", "object"];

/// Latch channel name for classifier requests.
pub const CLASSIFIER_CHANNEL: &str = "classifier";

pub struct LanguageExtension {
    classifier: Arc<dyn IntentClassifier>,
    lifecycle: ModelLifecycle,
    latch: ResultLatch<Recognition>,
    catalog: OnceLock<ModelCatalog>,
}

impl LanguageExtension {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        lifecycle: ModelLifecycle,
        latch: ResultLatch<Recognition>,
    ) -> Self {
        Self {
            classifier,
            lifecycle,
            latch,
            catalog: OnceLock::new(),
        }
    }

    pub fn lifecycle(&self) -> &ModelLifecycle {
        &self.lifecycle
    }

    /// Most recent successful recognition.
    pub fn latest(&self) -> Option<Arc<Recognition>> {
        self.latch.latest()
    }

    /// Send `sentence` to the classifier.  Returns `None` when no model is
    /// ready yet (resolution is started instead).
    pub fn understand(&self, sentence: &str) -> Option<Submission> {
        let Some(model) = self.lifecycle.model_ref() else {
            if self.lifecycle.begin() {
                log::info!("language: no model yet; resolving one");
            } else {
                log::debug!("language: model not ready ({})", self.lifecycle.state());
            }
            return None;
        };

        let classifier = Arc::clone(&self.classifier);
        let sentence = sentence.to_string();
        Some(self.latch.submit(async move { classifier.recognize(&model, &sentence).await }))
    }

    /// The model's intents and entities, fixed the first time a ready
    /// model's catalog is seen.
    fn catalog(&self) -> Option<&ModelCatalog> {
        if let Some(catalog) = self.catalog.get() {
            return Some(catalog);
        }
        let ready = self.lifecycle.catalog()?;
        Some(self.catalog.get_or_init(|| ready))
    }

    fn intents(&self) -> Vec<String> {
        match self.catalog() {
            Some(c) if !c.intents.is_empty() => c.intents.clone(),
            _ => DEFAULT_INTENTS.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn entities(&self) -> Vec<String> {
        match self.catalog() {
            Some(c) if !c.entities.is_empty() => c.entities.clone(),
            _ => DEFAULT_ENTITIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Extension for LanguageExtension {
    fn info(&self) -> ExtensionInfo {
        let mut blocks = vec![
            BlockSpec::new("understand", BlockKind::Command, "understand [SENTENCE]")
                .arg(ArgSpec::text("SENTENCE", "Open the door with the crowbar")),
            BlockSpec::new("whenrecognized", BlockKind::Hat, "when sentence means [INTENT]")
                .arg(ArgSpec::menu("INTENT", "intent", "Use tool")),
        ];
        blocks.extend(
            self.entities()
                .into_iter()
                .map(|entity| BlockSpec::new(entity.clone(), BlockKind::Reporter, entity)),
        );

        let mut menus = BTreeMap::new();
        menus.insert("intent", self.intents().into_iter().map(MenuItem::plain).collect());

        ExtensionInfo {
            id: "language",
            name: "Language",
            blocks,
            menus,
        }
    }

    fn evaluate(&self, opcode: &str, args: &BlockArgs) -> BlockValue {
        let latest = self.latch.latest();
        match opcode {
            "whenrecognized" => BlockValue::Bool(intent_matches(latest.as_deref(), arg(args, "INTENT"))),
            entity if self.entities().iter().any(|e| e == entity) => {
                BlockValue::Text(entity_value(latest.as_deref(), entity))
            }
            other => {
                log::debug!("language: unknown block {other:?}");
                BlockValue::Empty
            }
        }
    }

    fn execute(&self, opcode: &str, args: &BlockArgs) -> CommandStatus {
        match opcode {
            "understand" => match self.understand(arg(args, "SENTENCE")) {
                Some(Submission::Dispatched) => CommandStatus::Done,
                Some(Submission::Busy) => CommandStatus::Yield,
                None if matches!(self.lifecycle.state(), ModelState::Failed(_)) => {
                    log::warn!("language: no model ({}); sentence dropped", self.lifecycle.state());
                    CommandStatus::Done
                }
                None => CommandStatus::Yield,
            },
            other => {
                log::debug!("language: unknown command {other:?}");
                CommandStatus::Done
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::runtime::Handle;
    use tokio::sync::Semaphore;

    use crate::classifier::{ClassifierError, ModelRef, ModelService, ModelSummary, RemoteModel};
    use crate::lifecycle::{ConfiguredSelector, StageState, StageStore};

    #[derive(Default)]
    struct KeywordClassifier {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        /// When set, each call holds until a permit is added.
        gate: Option<Semaphore>,
    }

    #[async_trait]
    impl IntentClassifier for KeywordClassifier {
        async fn recognize(&self, _model: &ModelRef, text: &str) -> Result<Recognition, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.acquire().await.expect("gate closed").forget();
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if text.starts_with("pick up") {
                let object = text.rsplit(' ').next().unwrap_or_default();
                return Ok(Recognition::new(text, "Pick up", &[("object", object)]));
            }
            if text.starts_with("help") {
                return Ok(Recognition::new(text, "Help", &[]));
            }
            Ok(Recognition::new(text, "None", &[]))
        }
    }

    struct OneModel;

    #[async_trait]
    impl ModelService for OneModel {
        async fn list_models(&self) -> Result<Vec<ModelSummary>, ClassifierError> {
            Ok(vec![ModelSummary {
                model_ref: ModelRef::new("adv-1"),
                name: "adventure".into(),
            }])
        }

        async fn fetch_model(&self, _model: &ModelRef) -> Result<ModelCatalog, ClassifierError> {
            Ok(ModelCatalog {
                intents: vec!["None".into(), "Pick up".into(), "Help".into()],
                entities: vec!["object".into(), "weapon".into()],
            })
        }

        async fn create_model(&self) -> Result<Box<dyn RemoteModel>, ClassifierError> {
            Err(ClassifierError::Training("not in this test".into()))
        }
    }

    fn extension() -> (LanguageExtension, Arc<KeywordClassifier>) {
        build(KeywordClassifier::default(), "adventure")
    }

    fn build(classifier: KeywordClassifier, model_name: &str) -> (LanguageExtension, Arc<KeywordClassifier>) {
        let classifier = Arc::new(classifier);
        let lifecycle = ModelLifecycle::new(
            Arc::new(OneModel),
            Arc::new(ConfiguredSelector::new(Some(model_name.into()))),
            Arc::new(StageStore::in_memory(StageState::default())),
            Handle::current(),
        );
        let ext = LanguageExtension::new(
            Arc::clone(&classifier) as Arc<dyn IntentClassifier>,
            lifecycle,
            ResultLatch::new(CLASSIFIER_CHANNEL, Handle::current()),
        );
        (ext, classifier)
    }

    fn args(pairs: &[(&str, &str)]) -> BlockArgs {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    async fn settle(ext: &LanguageExtension) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while ext.latch.is_pending() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("classifier call never finished");
    }

    #[tokio::test]
    async fn understand_before_ready_starts_resolution_only() {
        let (ext, classifier) = extension();

        assert_eq!(ext.understand("pick up the crowbar"), None);
        assert_ne!(ext.lifecycle().state(), ModelState::Unselected);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);

        assert_eq!(ext.lifecycle().ensure_ready().await, Ok(ModelRef::new("adv-1")));
    }

    #[tokio::test]
    async fn understand_yields_while_the_model_resolves() {
        let (ext, classifier) = extension();
        let sentence = args(&[("SENTENCE", "pick up the crowbar")]);

        assert!(matches!(ext.execute("understand", &sentence), CommandStatus::Yield));
        assert!(matches!(ext.execute("understand", &sentence), CommandStatus::Yield));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);

        ext.lifecycle().ensure_ready().await.unwrap();
        assert!(matches!(ext.execute("understand", &sentence), CommandStatus::Done));
        settle(&ext).await;
        assert_eq!(ext.latest().map(|r| r.query.clone()), Some("pick up the crowbar".into()));
    }

    #[tokio::test]
    async fn understand_gives_up_once_the_model_failed() {
        let (ext, classifier) = build(KeywordClassifier::default(), "no such model");
        assert!(ext.lifecycle().ensure_ready().await.is_err());

        let sentence = args(&[("SENTENCE", "help me")]);
        assert!(matches!(ext.execute("understand", &sentence), CommandStatus::Done));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn back_to_back_understand_retries_until_classified() {
        let (ext, classifier) = build(
            KeywordClassifier {
                gate: Some(Semaphore::new(0)),
                ..KeywordClassifier::default()
            },
            "adventure",
        );
        ext.lifecycle().ensure_ready().await.unwrap();
        let gate = classifier.gate.as_ref().expect("gated");
        let lamp = args(&[("SENTENCE", "pick up the lamp")]);
        let help = args(&[("SENTENCE", "help me")]);

        assert!(matches!(ext.execute("understand", &lamp), CommandStatus::Done));
        assert!(matches!(ext.execute("understand", &help), CommandStatus::Yield));
        tokio::task::yield_now().await;
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);

        gate.add_permits(1);
        settle(&ext).await;
        assert!(ext.evaluate("whenrecognized", &args(&[("INTENT", "Pick up")])).is_true());

        // The host runs the yielded block again on the next tick.
        assert!(matches!(ext.execute("understand", &help), CommandStatus::Done));
        gate.add_permits(1);
        settle(&ext).await;

        assert!(ext.evaluate("whenrecognized", &args(&[("INTENT", "Help")])).is_true());
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
        assert_eq!(classifier.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recognized_intent_fires_matching_hat_only() {
        let (ext, _) = extension();
        ext.lifecycle().ensure_ready().await.unwrap();

        ext.execute("understand", &args(&[("SENTENCE", "pick up the crowbar")]));
        settle(&ext).await;

        assert!(ext.evaluate("whenrecognized", &args(&[("INTENT", "Pick up")])).is_true());
        assert!(!ext.evaluate("whenrecognized", &args(&[("INTENT", "Help")])).is_true());
        assert_eq!(ext.evaluate("object", &BlockArgs::new()), BlockValue::Text("crowbar".into()));
        assert_eq!(ext.evaluate("weapon", &BlockArgs::new()), BlockValue::Text(String::new()));
    }

    #[tokio::test]
    async fn hats_and_reporters_are_neutral_before_any_result() {
        let (ext, _) = extension();
        assert!(!ext.evaluate("whenrecognized", &args(&[("INTENT", "None")])).is_true());
        assert_eq!(ext.evaluate("tool", &BlockArgs::new()), BlockValue::Text(String::new()));
        assert_eq!(ext.evaluate("nonsense", &BlockArgs::new()), BlockValue::Empty);
    }

    #[tokio::test]
    async fn entity_reporters_follow_the_ready_model() {
        let (ext, _) = extension();
        let before: Vec<_> = ext.info().blocks.into_iter().map(|b| b.opcode).collect();
        assert_eq!(before, vec!["understand", "whenrecognized", "tool", "object"]);

        ext.lifecycle().ensure_ready().await.unwrap();
        let info = ext.info();
        let after: Vec<_> = info.blocks.iter().map(|b| b.opcode.as_str()).collect();
        assert_eq!(after, vec!["understand", "whenrecognized", "object", "weapon"]);
        assert_eq!(info.menus["intent"].len(), 3);

        // Fixed once seen, even across a reset.
        ext.lifecycle().reset();
        assert_eq!(ext.info().blocks.len(), 4);
        assert!(ext.info().block("weapon").is_some());
    }

    #[tokio::test]
    async fn whenrecognized_is_the_only_hat() {
        let (ext, _) = extension();
        let hats = ext.hats();
        assert_eq!(hats.len(), 1);
        assert_eq!(hats[0].opcode, "whenrecognized");
        assert!(hats[0].edge_triggered);
    }
}
