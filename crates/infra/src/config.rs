//! Runtime configuration.

use std::time::Duration;

use thiserror::Error;

use orderdesk_core::PageRequest;

pub const LOCK_TIMEOUT_ENV: &str = "ORDERDESK_LOCK_TIMEOUT_MS";
pub const DEFAULT_PAGE_SIZE_ENV: &str = "ORDERDESK_DEFAULT_PAGE_SIZE";
pub const MAX_PAGE_SIZE_ENV: &str = "ORDERDESK_MAX_PAGE_SIZE";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },

    #[error("default page size {default} exceeds max page size {max}")]
    PageSizeBounds { default: usize, max: usize },
}

/// Order core configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Upper bound on waiting for one row lock; exceeding it fails with
    /// `ConcurrencyFailure`.
    pub lock_timeout: Duration,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(3000),
            default_page_size: 20,
            max_page_size: 2000,
        }
    }
}

impl Config {
    /// Load from `ORDERDESK_*` environment variables; unset ones keep their default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(ms) = parse_positive(&lookup, LOCK_TIMEOUT_ENV)? {
            config.lock_timeout = Duration::from_millis(ms as u64);
        }
        if let Some(size) = parse_positive(&lookup, DEFAULT_PAGE_SIZE_ENV)? {
            config.default_page_size = size;
        }
        if let Some(size) = parse_positive(&lookup, MAX_PAGE_SIZE_ENV)? {
            config.max_page_size = size;
        }

        if config.default_page_size > config.max_page_size {
            return Err(ConfigError::PageSizeBounds {
                default: config.default_page_size,
                max: config.max_page_size,
            });
        }
        Ok(config)
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Size 0 means "default"; sizes above the max are clamped.
    pub fn normalize(&self, page: PageRequest) -> PageRequest {
        let size = match page.size {
            0 => self.default_page_size,
            n => n.min(self.max_page_size),
        };
        PageRequest::new(page.page, size)
    }
}

fn parse_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<usize>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(ConfigError::InvalidNumber { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.lock_timeout, Duration::from_secs(3));
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            (LOCK_TIMEOUT_ENV, "250"),
            (DEFAULT_PAGE_SIZE_ENV, "10"),
            (MAX_PAGE_SIZE_ENV, "50"),
        ]))
        .unwrap();
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.max_page_size, 50);
    }

    #[test]
    fn rejects_zero_and_garbage() {
        let err = Config::from_lookup(lookup(&[(LOCK_TIMEOUT_ENV, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { key: LOCK_TIMEOUT_ENV, .. }));

        let err = Config::from_lookup(lookup(&[(MAX_PAGE_SIZE_ENV, "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));

        let err = Config::from_lookup(lookup(&[(MAX_PAGE_SIZE_ENV, "5")])).unwrap_err();
        assert_eq!(err, ConfigError::PageSizeBounds { default: 20, max: 5 });
    }

    #[test]
    fn normalize_fills_default_and_clamps() {
        let config = Config::default();
        assert_eq!(config.normalize(PageRequest::new(3, 0)), PageRequest::new(3, 20));
        assert_eq!(config.normalize(PageRequest::new(0, 5000)), PageRequest::new(0, 2000));
        assert_eq!(config.normalize(PageRequest::new(1, 7)), PageRequest::new(1, 7));
    }
}
