//! Runtime configuration for the sync layer.

use std::time::Duration;

/// Environment variable overriding [`SyncConfig::debounce`], in milliseconds.
pub const DEBOUNCE_ENV: &str = "DCTMD_DEBOUNCE_MS";

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Configuration for recompute coalescing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Quiet period after the last source-data change before recomputing
    pub debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

impl SyncConfig {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Defaults, with `DCTMD_DEBOUNCE_MS` applied when set and numeric.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(DEBOUNCE_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.debounce = Duration::from_millis(ms),
                Err(_) => tracing::warn!(
                    value = %raw,
                    "ignoring non-numeric {DEBOUNCE_ENV}, using {}ms",
                    DEFAULT_DEBOUNCE.as_millis()
                ),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_debounce() {
        assert_eq!(SyncConfig::default().debounce, Duration::from_millis(300));
    }

    #[test]
    fn test_env_override() {
        let config = SyncConfig::from_lookup(|k| (k == DEBOUNCE_ENV).then(|| "25".to_string()));
        assert_eq!(config.debounce, Duration::from_millis(25));
    }

    #[test]
    fn test_bad_env_value_keeps_default() {
        let config = SyncConfig::from_lookup(|_| Some("soon".to_string()));
        assert_eq!(config, SyncConfig::default());
    }
}
