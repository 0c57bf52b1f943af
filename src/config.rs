use crate::cache::DEFAULT_TTL;
use crate::client::DEFAULT_DEBOUNCE;
use crate::provider::DEFAULT_PROVIDER_URL;
use anyhow::{bail, Result};
use std::str::FromStr;
use std::time::Duration;

/// Where translated strings are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Sqlite,
    Memory,
}

impl FromStr for CacheBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => bail!("Invalid CACHE_BACKEND: {}. Expected sqlite or memory", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,
    pub api_key: Option<String>,

    // Cache
    pub cache_backend: CacheBackend,
    pub database_url: String,
    pub cache_ttl: Duration,

    // Provider
    pub provider_url: String,
    pub provider_timeout: Duration,

    // Client
    pub server_url: String,
    pub debounce: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let port = lookup("PORT")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(8080);

        let cache_backend = match lookup("CACHE_BACKEND") {
            Some(value) => value.parse()?,
            None => CacheBackend::Sqlite,
        };

        Ok(Self {
            port,
            // An empty key means "no key"
            api_key: lookup("API_KEY").filter(|key| !key.trim().is_empty()),

            cache_backend,
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://translations.db".to_string()),
            cache_ttl: parsed("CACHE_TTL_HOURS")
                .and_then(|hours| hours.checked_mul(60 * 60))
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TTL),

            provider_url: lookup("PROVIDER_URL")
                .unwrap_or_else(|| DEFAULT_PROVIDER_URL.to_string()),
            provider_timeout: Duration::from_secs(parsed("PROVIDER_TIMEOUT_SECS").unwrap_or(10)),

            server_url: lookup("TRANSLATE_SERVER_URL")
                .unwrap_or_else(|| format!("http://127.0.0.1:{}", port)),
            debounce: parsed("TRANSLATE_DEBOUNCE_MS")
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_DEBOUNCE),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).expect("Defaults should load");

        assert_eq!(config.port, 8080);
        assert_eq!(config.cache_backend, CacheBackend::Sqlite);
        assert_eq!(config.database_url, "sqlite://translations.db");
        assert_eq!(config.cache_ttl, Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.provider_url, DEFAULT_PROVIDER_URL);
        assert_eq!(config.provider_timeout, Duration::from_secs(10));
        assert_eq!(config.server_url, "http://127.0.0.1:8080");
        assert_eq!(config.debounce, Duration::from_millis(50));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "9000"),
            ("CACHE_BACKEND", "Memory"),
            ("CACHE_TTL_HOURS", "2"),
            ("PROVIDER_TIMEOUT_SECS", "3"),
            ("API_KEY", "secret"),
            ("TRANSLATE_DEBOUNCE_MS", "120"),
            ("TRANSLATE_SERVER_URL", "https://shop.example.com"),
        ])
        .expect("Should load");

        assert_eq!(config.port, 9000);
        assert_eq!(config.cache_backend, CacheBackend::Memory);
        assert_eq!(config.cache_ttl, Duration::from_secs(2 * 60 * 60));
        assert_eq!(config.provider_timeout, Duration::from_secs(3));
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.debounce, Duration::from_millis(120));
        assert_eq!(config.server_url, "https://shop.example.com");
    }

    #[test]
    fn test_invalid_numbers_fall_back_to_defaults() {
        let config = config_from(&[
            ("PORT", "not-a-port"),
            ("CACHE_TTL_HOURS", "-1"),
            ("TRANSLATE_DEBOUNCE_MS", "fast"),
        ])
        .expect("Should load");

        assert_eq!(config.port, 8080);
        assert_eq!(config.cache_ttl, DEFAULT_TTL);
        assert_eq!(config.debounce, DEFAULT_DEBOUNCE);
    }

    #[test]
    fn test_huge_ttl_falls_back_to_default() {
        let config =
            config_from(&[("CACHE_TTL_HOURS", "18446744073709551615")]).expect("Should load");
        assert_eq!(config.cache_ttl, DEFAULT_TTL);
    }

    #[test]
    fn test_empty_api_key_is_none() {
        let config = config_from(&[("API_KEY", "  ")]).expect("Should load");
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_invalid_cache_backend_is_error() {
        let err = config_from(&[("CACHE_BACKEND", "redis")]).unwrap_err();
        assert!(err.to_string().contains("redis"));
    }
}
