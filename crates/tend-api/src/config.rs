use std::collections::HashMap;
use std::env;

use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_MAX_RECORDS_PER_COLLECTION: usize = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub max_records_per_collection: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_records_per_collection: DEFAULT_MAX_RECORDS_PER_COLLECTION,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "TEND_API_BIND_ADDR", DEFAULT_BIND_ADDR);

        let max_records_per_collection = match optional_trimmed(
            &lookup,
            "TEND_API_MAX_RECORDS_PER_COLLECTION",
        ) {
            Some(raw) => raw.parse::<usize>().map_err(|_| {
                ConfigError::Invalid(
                    "TEND_API_MAX_RECORDS_PER_COLLECTION must be a positive integer".to_string(),
                )
            })?,
            None => DEFAULT_MAX_RECORDS_PER_COLLECTION,
        };
        if max_records_per_collection == 0 {
            return Err(ConfigError::Invalid(
                "TEND_API_MAX_RECORDS_PER_COLLECTION must be >= 1".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            max_records_per_collection,
        })
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn config_defaults_without_environment() {
        let map: HashMap<&str, &str> = HashMap::new();
        let config =
            AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string())).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn config_reads_overrides() {
        let mut map = HashMap::new();
        map.insert("TEND_API_BIND_ADDR", " 0.0.0.0:9000 ");
        map.insert("TEND_API_MAX_RECORDS_PER_COLLECTION", "25");

        let config =
            AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string())).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.max_records_per_collection, 25);
    }

    #[test]
    fn config_rejects_invalid_cap() {
        for raw in ["0", "lots"] {
            let mut map = HashMap::new();
            map.insert("TEND_API_MAX_RECORDS_PER_COLLECTION", raw);
            let err = AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
                .unwrap_err();
            assert!(err.to_string().contains("TEND_API_MAX_RECORDS_PER_COLLECTION"));
        }
    }
}
