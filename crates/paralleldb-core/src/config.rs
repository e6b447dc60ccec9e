//! Validator configuration.

use crate::error::Error;

/// Environment variable overriding [`ValidatorConfig::parallel_threshold`].
///
/// Accepts a number, or `disabled`/`max` to turn parallel batches off.
pub const PARALLEL_THRESHOLD_ENV: &str = "PARALLELDB_PARALLEL_THRESHOLD";

/// Environment variable setting [`ValidatorConfig::max_violations_per_tuple`].
pub const MAX_VIOLATIONS_ENV: &str = "PARALLELDB_MAX_VIOLATIONS";

/// Default minimum batch size before tuple checks fan out across threads.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 512;

/// Configuration for batch validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Whether batches may be checked on the rayon pool.
    pub parallel: bool,

    /// Minimum batch size before checks run in parallel.
    pub parallel_threshold: usize,

    /// Cap on violations reported per tuple. None reports all of them.
    pub max_violations_per_tuple: Option<usize>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            max_violations_per_tuple: None,
        }
    }
}

impl ValidatorConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration that never leaves the calling thread.
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Default::default()
        }
    }

    /// Read overrides from the process environment.
    ///
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(PARALLEL_THRESHOLD_ENV) {
            let raw = raw.trim().to_lowercase();
            if raw == "disabled" || raw == "max" {
                config.parallel = false;
                config.parallel_threshold = usize::MAX;
            } else if let Ok(threshold) = raw.parse::<usize>() {
                config.parallel_threshold = threshold;
            }
        }

        if let Some(raw) = lookup(MAX_VIOLATIONS_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(max) if max > 0 => config.max_violations_per_tuple = Some(max),
                _ => {}
            }
        }

        config
    }

    /// Enable or disable parallel batches.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the parallel threshold.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Cap the number of violations reported per tuple.
    pub fn with_max_violations_per_tuple(mut self, max: usize) -> Self {
        self.max_violations_per_tuple = Some(max);
        self
    }

    /// Check the configuration for values that cannot work.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_violations_per_tuple == Some(0) {
            return Err(Error::Config(
                "max_violations_per_tuple must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a batch of `len` tuples should be checked in parallel.
    pub fn should_parallelize(&self, len: usize) -> bool {
        self.parallel && len >= self.parallel_threshold && rayon::current_num_threads() > 1
    }
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
    fn test_defaults() {
        let config = ValidatorConfig::default();
        assert!(config.parallel);
        assert_eq!(config.parallel_threshold, DEFAULT_PARALLEL_THRESHOLD);
        assert_eq!(config.max_violations_per_tuple, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ValidatorConfig::new()
            .with_parallel_threshold(10)
            .with_max_violations_per_tuple(3);

        assert_eq!(config.parallel_threshold, 10);
        assert_eq!(config.max_violations_per_tuple, Some(3));
        assert!(!ValidatorConfig::sequential().should_parallelize(usize::MAX));
        assert!(!config.should_parallelize(9));
    }

    #[test]
    fn test_env_overrides() {
        let config = ValidatorConfig::from_lookup(lookup(&[
            (PARALLEL_THRESHOLD_ENV, "64"),
            (MAX_VIOLATIONS_ENV, "5"),
        ]));
        assert_eq!(config.parallel_threshold, 64);
        assert_eq!(config.max_violations_per_tuple, Some(5));

        let config = ValidatorConfig::from_lookup(lookup(&[(PARALLEL_THRESHOLD_ENV, " Disabled ")]));
        assert!(!config.parallel);
        assert!(!config.should_parallelize(1_000_000));
    }

    #[test]
    fn test_invalid_env_falls_back() {
        let config = ValidatorConfig::from_lookup(lookup(&[
            (PARALLEL_THRESHOLD_ENV, "lots"),
            (MAX_VIOLATIONS_ENV, "0"),
        ]));
        assert_eq!(config, ValidatorConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero_cap() {
        let config = ValidatorConfig::new().with_max_violations_per_tuple(0);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
