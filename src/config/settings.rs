//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`, so a hand-edited `settings.toml`
//! only needs to mention the keys it overrides.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// Training data
// ---------------------------------------------------------------------------

/// An entity occurrence inside a [`TrainingExample`].
///
/// `phrase` must appear verbatim in the example text; the character span is
/// computed when the example is uploaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityLabel {
    /// Entity type name (e.g. `"tool"`).
    pub entity: String,
    /// The words in the example that carry this entity (e.g. `"crowbar"`).
    pub phrase: String,
}

/// One labelled utterance uploaded when a new classifier model is provisioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    /// Example utterance.
    pub text: String,
    /// Intent the utterance should map to.
    pub intent: String,
    /// Entity occurrences inside `text`.
    #[serde(default)]
    pub entities: Vec<EntityLabel>,
}

impl TrainingExample {
    fn new(text: &str, intent: &str, entities: &[(&str, &str)]) -> Self {
        Self {
            text: text.into(),
            intent: intent.into(),
            entities: entities
                .iter()
                .map(|(entity, phrase)| EntityLabel {
                    entity: (*entity).into(),
                    phrase: (*phrase).into(),
                })
                .collect(),
        }
    }
}

/// The starter training set: the adventure-game intents the language blocks
/// ship with (`None`, `Describe surroundings`, `Help`, `Pick up`, `Use tool`)
/// and the `tool` / `object` entities.
fn default_training() -> Vec<TrainingExample> {
    vec![
        TrainingExample::new("pick up the crowbar", "Pick up", &[("object", "crowbar")]),
        TrainingExample::new("grab the lamp", "Pick up", &[("object", "lamp")]),
        TrainingExample::new(
            "open the door with the crowbar",
            "Use tool",
            &[("tool", "crowbar"), ("object", "door")],
        ),
        TrainingExample::new(
            "use the key on the chest",
            "Use tool",
            &[("tool", "key"), ("object", "chest")],
        ),
        TrainingExample::new("what can I see", "Describe surroundings", &[]),
        TrainingExample::new("look around", "Describe surroundings", &[]),
        TrainingExample::new("help", "Help", &[]),
        TrainingExample::new("what should I do now", "Help", &[]),
        TrainingExample::new("the weather is nice today", "None", &[]),
    ]
}

// ---------------------------------------------------------------------------
// ClassifierConfig
// ---------------------------------------------------------------------------

/// Settings for the remote intent classifier (LUIS-compatible service).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Prediction endpoint base URL.
    pub endpoint: String,
    /// Authoring endpoint base URL (model listing, creation, training).
    pub authoring_endpoint: String,
    /// Prediction subscription key: `None` disables prediction calls.
    pub subscription_key: Option<String>,
    /// Authoring key: falls back to `subscription_key` when `None`.
    pub authoring_key: Option<String>,
    /// Culture of newly created models.
    pub culture: String,
    /// Version identifier used for newly created models.
    pub version_id: String,
    /// Name given to newly created models.
    pub new_model_name: String,
    /// Maximum seconds to wait for one HTTP request.
    pub timeout_secs: u64,
    /// Interval between training-status polls, in milliseconds.
    pub training_poll_ms: u64,
    /// Number of training-status polls before training is declared failed.
    pub training_max_polls: u32,
    /// Labelled utterances uploaded to a freshly created model.
    pub training: Vec<TrainingExample>,
}

impl ClassifierConfig {
    /// Key used for authoring calls.
    pub fn effective_authoring_key(&self) -> Option<&str> {
        fn non_empty(k: &Option<String>) -> Option<&str> {
            k.as_deref().filter(|k| !k.is_empty())
        }
        non_empty(&self.authoring_key).or(non_empty(&self.subscription_key))
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://westus.api.cognitive.microsoft.com".into(),
            authoring_endpoint: "https://westus.api.cognitive.microsoft.com".into(),
            subscription_key: None,
            authoring_key: None,
            culture: "en-us".into(),
            version_id: "0.1".into(),
            new_model_name: "scratch-language".into(),
            timeout_secs: 10,
            training_poll_ms: 1_000,
            training_max_polls: 120,
            training: default_training(),
        }
    }
}

// ---------------------------------------------------------------------------
// LifecycleConfig
// ---------------------------------------------------------------------------

/// Controls how a classifier model is chosen when the program has none.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Ask the operator on the console instead of applying the policy below.
    pub interactive: bool,
    /// Existing remote model to use when not interactive.  `None` (or no
    /// model with that name) provisions a new one.
    pub model_name: Option<String>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            interactive: true,
            model_name: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Speech recognition / synthesis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Voice used for synthesis; `"default"` lets the engine choose.
    pub voice: String,
    /// Voices offered to programs.  Empty means every voice the engine has.
    pub allowed_voices: Vec<String>,
    /// Speaking rate of the console synthesizer, in characters per second.
    pub console_chars_per_sec: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            voice: "default".into(),
            allowed_voices: [
                "Alex", "Samantha", "Whisper", "Zarvox", "Bad News", "Daniel", "Pipe Organ",
                "Boing", "Karen", "Ralph", "Trinoids",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
            console_chars_per_sec: 15,
        }
    }
}

// ---------------------------------------------------------------------------
// GestureConfig
// ---------------------------------------------------------------------------

/// Gesture remote settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// How long a gesture hat stays true after the event arrives.
    pub pulse_window_ms: u64,
    /// URL of the gesture push service.
    pub service_url: String,
    /// Session key identifying this program's event channel.
    pub session_key: String,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            pulse_window_ms: 200,
            service_url: "http://localhost:3000".into(),
            session_key: "scratch".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// HostConfig
// ---------------------------------------------------------------------------

/// Settings of the bundled headless host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Scheduler poll ticks per second.
    pub tick_hz: u32,
    /// Phrases the host watches with `when I hear` hats.
    pub hear_phrases: Vec<String>,
    /// Program file to open instead of the default `project.json`.
    pub project_file: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_hz: 30,
            hear_phrases: vec!["Hi, Scratch!".into(), "hello".into()],
            project_file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use sense_blocks::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Remote classifier settings.
    pub classifier: ClassifierConfig,
    /// Model selection policy.
    pub lifecycle: LifecycleConfig,
    /// Speech settings.
    pub speech: SpeechConfig,
    /// Gesture remote settings.
    pub gesture: GestureConfig,
    /// Headless host settings.
    pub host: HostConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// so callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.classifier.endpoint, loaded.classifier.endpoint);
        assert_eq!(original.classifier.subscription_key, loaded.classifier.subscription_key);
        assert_eq!(original.classifier.version_id, loaded.classifier.version_id);
        assert_eq!(original.classifier.training, loaded.classifier.training);
        assert_eq!(original.lifecycle.interactive, loaded.lifecycle.interactive);
        assert_eq!(original.speech.allowed_voices, loaded.speech.allowed_voices);
        assert_eq!(original.gesture.pulse_window_ms, loaded.gesture.pulse_window_ms);
        assert_eq!(original.host.tick_hz, loaded.host.tick_hz);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.gesture.pulse_window_ms, 200);
        assert_eq!(config.speech.voice, "default");
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.gesture.pulse_window_ms, 200);
        assert_eq!(cfg.gesture.session_key, "scratch");
        assert_eq!(cfg.gesture.service_url, "http://localhost:3000");
        assert!(cfg.classifier.subscription_key.is_none());
        assert_eq!(cfg.classifier.culture, "en-us");
        assert_eq!(cfg.host.tick_hz, 30);
        assert_eq!(cfg.host.hear_phrases[0], "Hi, Scratch!");
        assert_eq!(cfg.host.project_file, None);
        assert_eq!(cfg.speech.allowed_voices.len(), 11);
        assert!(cfg.lifecycle.interactive);
    }

    #[test]
    fn default_training_covers_every_menu_intent() {
        let cfg = ClassifierConfig::default();
        for intent in ["None", "Describe surroundings", "Help", "Pick up", "Use tool"] {
            assert!(
                cfg.training.iter().any(|t| t.intent == intent),
                "no example for intent {intent}"
            );
        }
        for example in &cfg.training {
            for label in &example.entities {
                assert!(example.text.contains(&label.phrase));
            }
        }
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[gesture]\npulse_window_ms = 350\n").expect("write");

        let cfg = AppConfig::load_from(&path).expect("load");
        assert_eq!(cfg.gesture.pulse_window_ms, 350);
        assert_eq!(cfg.gesture.session_key, "scratch");
        assert_eq!(cfg.host.tick_hz, 30);
    }

    #[test]
    fn authoring_key_falls_back_to_subscription_key() {
        let mut cfg = ClassifierConfig::default();
        assert_eq!(cfg.effective_authoring_key(), None);

        cfg.subscription_key = Some("sub".into());
        assert_eq!(cfg.effective_authoring_key(), Some("sub"));

        cfg.authoring_key = Some("auth".into());
        assert_eq!(cfg.effective_authoring_key(), Some("auth"));

        cfg.authoring_key = Some(String::new());
        cfg.subscription_key = None;
        assert_eq!(cfg.effective_authoring_key(), None);
    }

    #[test]
    fn blank_authoring_key_does_not_hide_subscription_key() {
        let cfg: ClassifierConfig = toml::from_str(
            r#"
            authoring_key = ""
            subscription_key = "sub"
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.effective_authoring_key(), Some("sub"));
    }
}
