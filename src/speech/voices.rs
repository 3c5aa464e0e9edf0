//! Synthesis voices and the voice allow-list.

use rand::seq::SliceRandom;

use crate::config::SpeechConfig;

/// Voice name meaning "whatever the platform uses".
pub const DEFAULT_VOICE: &str = "default";

/// Voice name that picks one of the permitted voices at random.
pub const RANDOM_VOICE: &str = "Random";

/// A voice offered by the synthesizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    pub lang: String,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// VoicePolicy
// ---------------------------------------------------------------------------

/// Which platform voices programs may use.  An empty allow-list permits all.
#[derive(Debug, Clone, Default)]
pub struct VoicePolicy {
    allowed: Vec<String>,
}

impl VoicePolicy {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    pub fn from_config(config: &SpeechConfig) -> Self {
        Self::new(config.allowed_voices.clone())
    }

    pub fn permits(&self, name: &str) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|a| a == name)
    }

    /// Keep only permitted voices, in platform order.
    pub fn filter(&self, voices: Vec<Voice>) -> Vec<Voice> {
        voices.into_iter().filter(|v| self.permits(&v.name)).collect()
    }

    /// The permitted voice called `name`, if any.
    pub fn resolve(&self, name: &str, voices: &[Voice]) -> Option<Voice> {
        if name == DEFAULT_VOICE || !self.permits(name) {
            return None;
        }
        voices.iter().find(|v| v.name == name).cloned()
    }

    /// A random permitted voice, or `None` when nothing is permitted.
    pub fn pick_random(&self, voices: Vec<Voice>) -> Option<Voice> {
        self.filter(voices).choose(&mut rand::thread_rng()).cloned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn platform() -> Vec<Voice> {
        vec![
            Voice::new("Alex", "en-US"),
            Voice::new("Google Deutsch", "de-DE"),
            Voice::new("Zarvox", "en-US"),
        ]
    }

    #[test]
    fn empty_allow_list_permits_everything() {
        let policy = VoicePolicy::default();
        assert_eq!(policy.filter(platform()).len(), 3);
        assert!(policy.permits("anything"));
    }

    #[test]
    fn configured_allow_list_filters_platform_voices() {
        let policy = VoicePolicy::from_config(&SpeechConfig::default());
        let names: Vec<_> = policy.filter(platform()).into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["Alex", "Zarvox"]);
    }

    #[test]
    fn resolve_ignores_default_and_unlisted_voices() {
        let policy = VoicePolicy::new(vec!["Alex".into()]);
        let voices = platform();
        assert_eq!(policy.resolve("Alex", &voices), Some(Voice::new("Alex", "en-US")));
        assert_eq!(policy.resolve(DEFAULT_VOICE, &voices), None);
        assert_eq!(policy.resolve("Zarvox", &voices), None);
        assert_eq!(policy.resolve("Nobody", &voices), None);
    }

    #[test]
    fn random_pick_stays_inside_allow_list() {
        let policy = VoicePolicy::new(vec!["Zarvox".into()]);
        for _ in 0..10 {
            assert_eq!(policy.pick_random(platform()).unwrap().name, "Zarvox");
        }
        assert_eq!(VoicePolicy::new(vec!["Nobody".into()]).pick_random(platform()), None);
    }
}
