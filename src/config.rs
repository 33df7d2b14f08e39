//! Unit configuration.
//!
//! Every knob has a default; a config document only needs the fields it
//! overrides:
//!
//! ```ignore
//! let config = UnitConfig::from_json(r#"{ "debounce_ms": 50 }"#)?;
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConfig {
    /// Debounce window coalescing bursts of model writes into one render.
    pub debounce_ms: u64,
    /// Largest child-count difference the reconciler pads over before it
    /// treats two element nodes as incompatible.
    pub child_count_tolerance: usize,
    /// Reuse iteration output when the iterated collection is unchanged.
    pub loop_memo: bool,
    /// Number of diagnostics kept for inspection.
    pub diagnostic_capacity: usize,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 16,
            child_count_tolerance: 8,
            loop_memo: true,
            diagnostic_capacity: 256,
        }
    }
}

impl UnitConfig {
    /// Parse a JSON config document. Missing fields keep their defaults.
    pub fn from_json(source: &str) -> Result<Self> {
        serde_json::from_str(source).map_err(|e| Error::InvalidConfig {
            message: e.to_string(),
        })
    }

    #[inline]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce_ms = u64::try_from(debounce.as_millis()).unwrap_or(u64::MAX);
        self
    }
}
