use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;
use std::str::FromStr;

/// Settings shared by every service binary.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

/// Read an environment variable, falling back to `default` when unset.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read and parse an optional environment variable.
///
/// Unset or empty yields `Ok(None)`; a value that does not parse is a configuration error
/// rather than a silent fallback.
pub fn env_parse<T>(key: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse::<T>().map(Some).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e))
        }),
        _ => Ok(None),
    }
}

/// Split a `key=value,key=value` list into pairs.
pub fn parse_pairs(key: &str, raw: &str) -> Result<Vec<(String, String)>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                .ok_or_else(|| {
                    AppError::ConfigError(anyhow::anyhow!(
                        "{} entry '{}' must look like key=value",
                        key,
                        entry
                    ))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pairs_accepts_whitespace_and_trailing_commas() {
        let pairs = parse_pairs("X", " a = 1 , b=2,").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn parse_pairs_rejects_entries_without_separator() {
        let err = parse_pairs("ATTACHMENT_RULES", "correction.submit").unwrap_err();
        assert!(err.to_string().contains("ATTACHMENT_RULES"));
    }
}
