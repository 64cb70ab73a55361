//! Engine configuration.
//!
//! Defaults can be overridden from the environment:
//! - `HWGRAPH_PROBING_FREQUENCY_MS`: interval between probe ticks (default 1000)
//! - `HWGRAPH_PROBING_PERIOD_MS`: total probing duration (default 60000)
//!
//! Command-line flags override both.

use std::time::Duration;

use crate::error::EngineError;

pub const PROBING_FREQUENCY_ENV: &str = "HWGRAPH_PROBING_FREQUENCY_MS";
pub const PROBING_PERIOD_ENV: &str = "HWGRAPH_PROBING_PERIOD_MS";

pub const DEFAULT_PROBING_FREQUENCY: Duration = Duration::from_millis(1000);
pub const DEFAULT_PROBING_PERIOD: Duration = Duration::from_millis(60_000);

/// Settings for the dynamic probing loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Whether to re-probe after the initial build.
    pub dynamic_probing: bool,
    pub probing_frequency: Duration,
    pub probing_period: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            dynamic_probing: false,
            probing_frequency: DEFAULT_PROBING_FREQUENCY,
            probing_period: DEFAULT_PROBING_PERIOD,
        }
    }
}

impl EngineConfig {
    /// Defaults with any environment overrides applied.
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults with overrides read through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EngineError> {
        let mut config = EngineConfig::default();
        if let Some(value) = lookup(PROBING_FREQUENCY_ENV) {
            config.probing_frequency = parse_millis(PROBING_FREQUENCY_ENV, &value)?;
        }
        if let Some(value) = lookup(PROBING_PERIOD_ENV) {
            config.probing_period = parse_millis(PROBING_PERIOD_ENV, &value)?;
        }
        Ok(config)
    }

    pub fn with_dynamic_probing(mut self, frequency: Option<Duration>) -> Self {
        self.dynamic_probing = true;
        if let Some(frequency) = frequency {
            self.probing_frequency = frequency;
        }
        self
    }

    pub fn with_probing_period(mut self, period: Duration) -> Self {
        self.probing_period = period;
        self
    }

    /// Rejects a zero tick interval, which `tokio::time::interval` panics on.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.probing_frequency.is_zero() {
            return Err(EngineError::Config {
                name: PROBING_FREQUENCY_ENV,
                value: "0".to_string(),
                reason: "probing frequency must be positive".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_millis(name: &'static str, value: &str) -> Result<Duration, EngineError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| EngineError::Config {
            name,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.probing_frequency, Duration::from_millis(1000));
        assert_eq!(config.probing_period, Duration::from_millis(60_000));
        assert!(!config.dynamic_probing);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[
            (PROBING_FREQUENCY_ENV, "250"),
            (PROBING_PERIOD_ENV, " 5000 "),
        ]))
        .unwrap();
        assert_eq!(config.probing_frequency, Duration::from_millis(250));
        assert_eq!(config.probing_period, Duration::from_millis(5000));
    }

    #[test]
    fn malformed_value_names_the_variable() {
        let err = EngineConfig::from_lookup(lookup(&[(PROBING_PERIOD_ENV, "soon")])).unwrap_err();
        assert!(err.to_string().contains(PROBING_PERIOD_ENV));
    }

    #[test]
    fn builder_methods_override() {
        let config = EngineConfig::default()
            .with_dynamic_probing(Some(Duration::from_millis(10)))
            .with_probing_period(Duration::from_millis(100));
        assert!(config.dynamic_probing);
        assert_eq!(config.probing_frequency, Duration::from_millis(10));
        assert!(config.validate().is_ok());
        let zero = EngineConfig::default().with_dynamic_probing(Some(Duration::ZERO));
        assert!(zero.validate().is_err());
    }
}
