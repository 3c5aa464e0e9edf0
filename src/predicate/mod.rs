//! Hat predicates evaluated once per scheduler poll.
//!
//! Every function here is a plain function of the latched state and the
//! block argument.  None of them block, await or spawn; "not yet" is
//! expressed by returning `false` and being asked again on the next tick.
//!
//! | Channel  | Predicate              | State read                       |
//! |----------|------------------------|----------------------------------|
//! | language | [`intent_matches`]     | latched [`Recognition`]          |
//! | speech   | [`transcript_matches`] | transcript buffer (consumed)     |
//! | gesture  | [`PulseFlag::is_set_at`] | deadline compared at read time |

use std::time::{Duration, Instant};

use crate::classifier::Recognition;

// ---------------------------------------------------------------------------
// Language channel
// ---------------------------------------------------------------------------

/// `true` iff a recognition is latched and its top intent equals `intent`.
pub fn intent_matches(latched: Option<&Recognition>, intent: &str) -> bool {
    latched.is_some_and(|r| r.intent() == intent)
}

/// Value of the first entity of type `kind` in the latched recognition.
///
/// Returns an empty string when nothing is latched or the entity is absent,
/// so reporters degrade to an empty value.
pub fn entity_value(latched: Option<&Recognition>, kind: &str) -> String {
    latched
        .and_then(|r| r.entity(kind))
        .map(str::to_string)
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Speech channel
// ---------------------------------------------------------------------------

/// Case-fold a trigger phrase and strip `.`, `?`, `!` and outer whitespace.
///
/// ```
/// use sense_blocks::predicate::normalize_phrase;
///
/// assert_eq!(normalize_phrase("  Hi, Scratch! "), "hi, scratch");
/// assert_eq!(normalize_phrase("?!."), "");
/// ```
pub fn normalize_phrase(phrase: &str) -> String {
    phrase
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '.' | '?' | '!'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// `true` iff any transcript alternative contains the normalised `phrase`.
///
/// A match clears `transcripts` so the same utterance cannot fire again on
/// a later poll.  A phrase that normalises to nothing never matches.
pub fn transcript_matches(transcripts: &mut Vec<String>, phrase: &str) -> bool {
    let needle = normalize_phrase(phrase);
    if needle.is_empty() {
        return false;
    }

    if transcripts.iter().any(|t| t.contains(&needle)) {
        transcripts.clear();
        return true;
    }
    false
}

// ---------------------------------------------------------------------------
// Gesture channel
// ---------------------------------------------------------------------------

/// A boolean that reads true for a fixed window after being triggered.
///
/// No timer clears it: the deadline is compared against the read time, so
/// the answer does not depend on when the host happens to poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PulseFlag {
    deadline: Option<Instant>,
}

impl PulseFlag {
    /// Set the flag at `now` for `window`.  Re-triggering extends the pulse.
    pub fn trigger_at(&mut self, now: Instant, window: Duration) {
        self.deadline = Some(now + window);
    }

    /// `true` iff triggered at `T` and `now` lies in `[T, T + window)`.
    pub fn is_set_at(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now < deadline)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
