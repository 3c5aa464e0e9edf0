//! Persisted model reference.
//!
//! The chosen classifier model is remembered with the program itself, in the
//! stage-level custom state under [`LANGUAGE_STATE_KEY`].  [`StageState`] is
//! that program-level state; [`StageStore`] wraps it behind the
//! [`ModelRefStore`] hooks the lifecycle is constructed with, and optionally
//! writes it through to a JSON program file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::ModelRef;
use crate::lock;

/// Custom-state key under which the language extension keeps its state.
pub const LANGUAGE_STATE_KEY: &str = "Scratch.language";

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to persist program state: {0}")]
    Persist(String),
}

// ---------------------------------------------------------------------------
// LanguageState / StageState
// ---------------------------------------------------------------------------

/// The language extension's slice of stage state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_ref: Option<ModelRef>,
}

/// Program-level (stage) state, serialised with the rest of the program.
///
/// Extensions own one entry each in `custom_state`; entries this crate does
/// not understand are preserved verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageState {
    #[serde(default)]
    pub custom_state: BTreeMap<String, serde_json::Value>,
}

impl StageState {
    /// The language state, initialised with the default when absent.
    ///
    /// A missing or unreadable entry is replaced by a default one, so later
    /// reads see the same value.
    pub fn language_state(&mut self) -> LanguageState {
        if let Some(value) = self.custom_state.get(LANGUAGE_STATE_KEY) {
            match serde_json::from_value::<LanguageState>(value.clone()) {
                Ok(state) => return state,
                Err(e) => log::warn!("store: unreadable language state ({e}); resetting"),
            }
        }
        let state = LanguageState::default();
        self.set_language_state(&state);
        state
    }

    pub fn set_language_state(&mut self, state: &LanguageState) {
        let value = serde_json::to_value(state).unwrap_or(serde_json::Value::Null);
        self.custom_state.insert(LANGUAGE_STATE_KEY.to_string(), value);
    }

    /// Load from a JSON program file.  A missing file is an empty program.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save as JSON, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ModelRefStore
// ---------------------------------------------------------------------------

/// Load/save hooks for the persisted model reference.
pub trait ModelRefStore: Send + Sync {
    /// The persisted reference, if the program has one.
    fn load(&self) -> Option<ModelRef>;

    /// Persist `model` as the program's reference.
    fn save(&self, model: &ModelRef) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// StageStore
// ---------------------------------------------------------------------------

/// [`ModelRefStore`] over a [`StageState`], optionally written through to a
/// program file on every save.
pub struct StageStore {
    state: Mutex<StageState>,
    path: Option<PathBuf>,
}

impl StageStore {
    /// Keep state in memory only; the host serialises it with the program.
    pub fn in_memory(state: StageState) -> Self {
        Self {
            state: Mutex::new(state),
            path: None,
        }
    }

    /// Load the program file at `path` and write through to it on save.
    pub fn with_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = StageState::load_from(&path)?;
        Ok(Self {
            state: Mutex::new(state),
            path: Some(path),
        })
    }

    /// Copy of the current stage state.
    pub fn snapshot(&self) -> StageState {
        lock(&self.state).clone()
    }

    /// Swap in the state of a newly loaded program.
    pub fn replace(&self, state: StageState) {
        *lock(&self.state) = state;
    }

    /// Write the current state to the backing file, if there is one.
    pub fn flush(&self) -> Result<()> {
        match &self.path {
            Some(path) => self.snapshot().save_to(path),
            None => Ok(()),
        }
    }
}

impl ModelRefStore for StageStore {
    fn load(&self) -> Option<ModelRef> {
        lock(&self.state).language_state().model_ref
    }

    fn save(&self, model: &ModelRef) -> Result<(), StoreError> {
        {
            let mut state = lock(&self.state);
            let mut language = state.language_state();
            language.model_ref = Some(model.clone());
            state.set_language_state(&language);
        }
        self.flush()
            .map_err(|e| StoreError::Persist(format!("{e:#}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
