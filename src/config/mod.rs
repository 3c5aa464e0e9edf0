//! Configuration module for sense-blocks.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each sense
//! integration, `AppPaths` for cross-platform data directories, and TOML
//! persistence via `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, ClassifierConfig, EntityLabel, GestureConfig, HostConfig, LifecycleConfig,
    SpeechConfig, TrainingExample,
};
