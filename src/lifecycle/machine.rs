//! The model lifecycle driver.
//!
//! [`ModelLifecycle`] resolves "is a usable classifier model available" to a
//! [`ModelRef`], running at most one resolution at a time:
//!
//! ```text
//! ensure_ready() ──Ready(ref)──────────▶ Ok(ref)            (immediate)
//!        │       ──Failed(reason)──────▶ Err(Failed)        (immediate)
//!        │       ──Selecting/Loading/Provisioning──▶ queue waiter
//!        │       ──Unselected──▶ queue waiter + spawn driver
//!        ▼
//! driver: one awaited step per state, then transition()
//!        └─ terminal state ─▶ every queued waiter released, FIFO, same outcome
//! ```
//!
//! The driver runs as its own tokio task, so a caller that stops waiting
//! does not cancel provisioning for everybody else.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use super::selector::{ModelSelector, Selection};
use super::state::{ModelState, ProvisioningStage};
use super::store::ModelRefStore;
use crate::classifier::{ModelCatalog, ModelRef, ModelService, RemoteModel};
use crate::lock;

// ---------------------------------------------------------------------------
// LifecycleError / Readiness
// ---------------------------------------------------------------------------

/// Why a caller did not get a model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// Resolution reached `Failed`; the reason is the recorded one.
    #[error("model resolution failed: {0}")]
    Failed(String),

    /// The driver went away without reaching a terminal state (runtime
    /// shutdown).
    #[error("model resolution was abandoned")]
    Abandoned,
}

/// Outcome delivered to every waiter of one resolution.
pub type Readiness = Result<ModelRef, LifecycleError>;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct Inner {
    state: ModelState,
    waiters: VecDeque<oneshot::Sender<Readiness>>,
    catalog: Option<ModelCatalog>,
    resolutions: u64,
}

struct Shared {
    inner: Mutex<Inner>,
    service: Arc<dyn ModelService>,
    selector: Arc<dyn ModelSelector>,
    store: Arc<dyn ModelRefStore>,
}

// ---------------------------------------------------------------------------
// ModelLifecycle
// ---------------------------------------------------------------------------

/// Coalescing model resolver.  Cheap to clone; clones share one state
/// machine.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use sense_blocks::classifier::LuisClient;
/// use sense_blocks::config::AppConfig;
/// use sense_blocks::lifecycle::{ConfiguredSelector, ModelLifecycle, StageState, StageStore};
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let lifecycle = ModelLifecycle::new(
///     Arc::new(LuisClient::from_config(&config.classifier)),
///     Arc::new(ConfiguredSelector::new(config.lifecycle.model_name.clone())),
///     Arc::new(StageStore::in_memory(StageState::default())),
///     tokio::runtime::Handle::current(),
/// );
///
/// match lifecycle.ensure_ready().await {
///     Ok(model) => println!("using model {model}"),
///     Err(e) => eprintln!("{e}"),
/// }
/// # }
/// ```
#[derive(Clone)]
pub struct ModelLifecycle {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl ModelLifecycle {
    /// Create a lifecycle in `Unselected`.
    ///
    /// `store` is consulted when a resolution starts and written when one
    /// succeeds; the driver task is spawned on `runtime`.
    pub fn new(
        service: Arc<dyn ModelService>,
        selector: Arc<dyn ModelSelector>,
        store: Arc<dyn ModelRefStore>,
        runtime: Handle,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: ModelState::Unselected,
                    waiters: VecDeque::new(),
                    catalog: None,
                    resolutions: 0,
                }),
                service,
                selector,
                store,
            }),
            runtime,
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> ModelState {
        lock(&self.shared.inner).state.clone()
    }

    /// The model reference when `Ready`.
    pub fn model_ref(&self) -> Option<ModelRef> {
        lock(&self.shared.inner).state.model_ref().cloned()
    }

    /// Intents and entities of the ready model.
    pub fn catalog(&self) -> Option<ModelCatalog> {
        lock(&self.shared.inner).catalog.clone()
    }

    /// Number of resolutions started since construction.
    pub fn resolutions(&self) -> u64 {
        lock(&self.shared.inner).resolutions
    }

    /// Number of callers currently queued.
    pub fn waiting(&self) -> usize {
        lock(&self.shared.inner).waiters.len()
    }

    /// Start resolving without waiting for the outcome.
    ///
    /// For poll-side callers that must return immediately.  Returns `true`
    /// if this call started a resolution.
    pub fn begin(&self) -> bool {
        let mut inner = lock(&self.shared.inner);
        self.start_locked(&mut inner)
    }

    /// Wait until a model is ready or resolution fails.
    ///
    /// Callers arriving while a resolution runs join its waiter queue; only
    /// a caller arriving in `Unselected` starts one.
    pub async fn ensure_ready(&self) -> Readiness {
        let rx = {
            let mut inner = lock(&self.shared.inner);
            match &inner.state {
                ModelState::Ready(model) => return Ok(model.clone()),
                ModelState::Failed(reason) => return Err(LifecycleError::Failed(reason.clone())),
                _ => {}
            }
            let (tx, rx) = oneshot::channel();
            inner.waiters.push_back(tx);
            self.start_locked(&mut inner);
            rx
        };
        rx.await.unwrap_or(Err(LifecycleError::Abandoned))
    }

    /// Return to `Unselected` (new program load).
    ///
    /// Only `Ready` and `Failed` can be reset; returns `false` and changes
    /// nothing while a resolution is running.
    pub fn reset(&self) -> bool {
        let mut inner = lock(&self.shared.inner);
        if !inner.state.is_terminal() {
            log::debug!("lifecycle: reset ignored in {}", inner.state);
            return false;
        }
        log::info!("lifecycle: {} -> Unselected (reset)", inner.state);
        inner.state = ModelState::Unselected;
        inner.catalog = None;
        true
    }

    fn start_locked(&self, inner: &mut Inner) -> bool {
        if inner.state != ModelState::Unselected {
            return false;
        }

        let first = match self.shared.store.load() {
            Some(model) => ModelState::Loading(model),
            None => ModelState::Selecting,
        };
        log::info!("lifecycle: Unselected -> {first}");
        inner.state = first;
        inner.resolutions += 1;

        self.runtime.spawn(Arc::clone(&self.shared).drive());
        true
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

impl Shared {
    /// Run one resolution from its first in-flight state to a terminal one.
    async fn drive(self: Arc<Self>) {
        let mut created: Option<Box<dyn RemoteModel>> = None;

        loop {
            let current = lock(&self.inner).state.clone();
            let (next, catalog) = match current {
                ModelState::Selecting => (self.select(&mut created).await, None),
                ModelState::Loading(model) => self.load(model).await,
                ModelState::Provisioning(stage) => match created.as_deref() {
                    Some(remote) => self.provision(stage, remote).await,
                    None => (
                        ModelState::Failed("provisioned model handle missing".into()),
                        None,
                    ),
                },
                other => {
                    log::debug!("lifecycle: driver stopped in {other}");
                    return;
                }
            };

            if !self.transition(next, catalog) {
                return;
            }
        }
    }

    async fn select(&self, created: &mut Option<Box<dyn RemoteModel>>) -> ModelState {
        let available = match self.service.list_models().await {
            Ok(models) => models,
            Err(e) => return ModelState::Failed(format!("listing models: {e}")),
        };

        match self.selector.choose(&available).await {
            Selection::Existing(model) => ModelState::Loading(model),
            Selection::CreateNew => match self.service.create_model().await {
                Ok(remote) => {
                    *created = Some(remote);
                    ModelState::Provisioning(ProvisioningStage::Created)
                }
                Err(e) => ModelState::Failed(format!("creating model: {e}")),
            },
            Selection::Cancel => ModelState::Failed("model selection cancelled".into()),
        }
    }

    async fn load(&self, model: ModelRef) -> (ModelState, Option<ModelCatalog>) {
        match self.service.fetch_model(&model).await {
            Ok(catalog) => (ModelState::Ready(model), Some(catalog)),
            Err(e) => (ModelState::Failed(format!("loading model {model}: {e}")), None),
        }
    }

    async fn provision(
        &self,
        stage: ProvisioningStage,
        remote: &dyn RemoteModel,
    ) -> (ModelState, Option<ModelCatalog>) {
        let step = match stage {
            ProvisioningStage::Created => remote
                .load_data()
                .await
                .map(|()| ModelState::Provisioning(ProvisioningStage::Training)),
            ProvisioningStage::Training => match remote.start_training().await {
                Ok(()) => remote
                    .wait_for_training_to_complete()
                    .await
                    .map(|()| ModelState::Provisioning(ProvisioningStage::Published)),
                Err(e) => Err(e),
            },
            ProvisioningStage::Published => remote
                .publish()
                .await
                .map(|()| ModelState::Ready(remote.model_ref().clone())),
        };

        match step {
            Ok(next @ ModelState::Ready(_)) => (next, Some(remote.catalog())),
            Ok(next) => (next, None),
            Err(e) => (
                ModelState::Failed(format!("provisioning {}: {e}", remote.model_ref())),
                None,
            ),
        }
    }

    /// Apply `next`.  Returns `true` while the resolution should continue.
    fn transition(&self, next: ModelState, catalog: Option<ModelCatalog>) -> bool {
        let mut inner = lock(&self.inner);
        let next = if inner.state.can_transition_to(&next) {
            next
        } else {
            log::error!("lifecycle: illegal transition {} -> {}", inner.state, next);
            ModelState::Failed(format!("illegal transition from {}", inner.state.label()))
        };

        if let ModelState::Ready(model) = &next {
            if let Err(e) = self.store.save(model) {
                log::warn!("lifecycle: model {model} ready but not persisted: {e}");
            }
        }

        log::info!("lifecycle: {} -> {}", inner.state, next);
        inner.state = next.clone();
        if catalog.is_some() {
            inner.catalog = catalog;
        }

        let outcome = match next {
            ModelState::Ready(model) => Ok(model),
            ModelState::Failed(reason) => Err(LifecycleError::Failed(reason)),
            _ => return true,
        };

        let released = inner.waiters.len();
        for waiter in inner.waiters.drain(..) {
            let _ = waiter.send(outcome.clone());
        }
        log::debug!("lifecycle: released {released} waiters");
        false
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
