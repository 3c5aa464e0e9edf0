//! Edge detection for hats.
//!
//! Every hat is registered edge-triggered: the host starts its script when
//! the predicate goes false→true and not again until it has read false.

use std::collections::HashMap;

use crate::blocks::BlockArgs;

/// Remembers the last value of each hat instance.
#[derive(Debug, Default)]
pub struct EdgeDetector {
    last: HashMap<String, bool>,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` for the hat instance `key`; `true` iff it just rose.
    pub fn update(&mut self, key: &str, value: bool) -> bool {
        let previous = self.last.insert(key.to_string(), value).unwrap_or(false);
        value && !previous
    }

    /// Forget every hat (new program load).
    pub fn clear(&mut self) {
        self.last.clear();
    }
}

/// Stable key for one hat instance: extension, opcode and sorted arguments.
pub fn hat_key(extension: &str, opcode: &str, args: &BlockArgs) -> String {
    let mut pairs: Vec<_> = args.iter().collect();
    pairs.sort();
    let args = pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("{extension}.{opcode}({args})")
}
