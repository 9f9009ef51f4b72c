//! Configuration file parser for `rssagg.toml`, plus environment overrides.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as warnings so typos are
//! visible. `PORT` and `DB_URL` from the environment (or a `.env` file loaded
//! by the binary) override the file.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::scraper::ScraperConfig;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A value parsed but is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level server configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// TCP port for the REST API.
    pub port: u16,

    /// SQLite database file, or `:memory:`.
    pub database_path: String,

    /// Background scraper settings (`[scraper]` table).
    pub scraper: ScraperSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            database_path: "rssagg.db".to_string(),
            scraper: ScraperSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScraperSettings {
    /// Feeds fetched per cycle and in parallel. Must be at least 1.
    pub concurrency: usize,

    /// Seconds between cycle starts. Must be at least 1.
    pub interval_secs: u64,

    /// Per-feed download timeout in seconds. Must be at least 1.
    pub fetch_timeout_secs: u64,

    /// Feeds fetched more recently than this are not due. 0 = always due.
    pub min_refresh_age_secs: u64,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            concurrency: 10,
            interval_secs: 60,
            fetch_timeout_secs: 10,
            min_refresh_age_secs: 0,
        }
    }
}

impl ScraperSettings {
    pub fn scraper_config(&self) -> ScraperConfig {
        ScraperConfig {
            concurrency: self.concurrency,
            interval: Duration::from_secs(self.interval_secs),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
        }
    }

    pub fn min_refresh_age(&self) -> Duration {
        Duration::from_secs(self.min_refresh_age_secs)
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 3] = ["port", "database_path", "scraper"];
    const KNOWN_SCRAPER_KEYS: [&'static str; 4] = [
        "concurrency",
        "interval_secs",
        "fetch_timeout_secs",
        "min_refresh_age_secs",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    ///
    /// The result is not validated; call [`Config::validate`] once overrides
    /// have been applied.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Apply `PORT` and `DB_URL` overrides from `lookup`.
    ///
    /// Takes a lookup function rather than reading the process environment so
    /// callers decide the source.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").filter(|v| !v.trim().is_empty()) {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT is not a valid port: {port}")))?;
        }
        if let Some(db) = lookup("DB_URL").filter(|v| !v.trim().is_empty()) {
            self.database_path = db.trim().to_string();
        }
        Ok(())
    }

    /// Reject settings the scraper cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.trim().is_empty() {
            return Err(ConfigError::Invalid("database_path must not be empty".into()));
        }
        if self.scraper.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "scraper.concurrency must be at least 1".into(),
            ));
        }
        if self.scraper.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "scraper.interval_secs must be at least 1".into(),
            ));
        }
        if self.scraper.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "scraper.fetch_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn warn_unknown_keys(raw: &toml::Table) {
    for key in raw.keys() {
        if !Config::KNOWN_KEYS.contains(&key.as_str()) {
            tracing::warn!(key = %key, "Unknown key in config file, ignoring");
        }
    }
    if let Some(toml::Value::Table(scraper)) = raw.get("scraper") {
        for key in scraper.keys() {
            if !Config::KNOWN_SCRAPER_KEYS.contains(&key.as_str()) {
                tracing::warn!(key = %key, "Unknown key in [scraper], ignoring");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn write_config(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rssagg.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_path, "rssagg.db");
        assert_eq!(config.scraper.concurrency, 10);
        assert_eq!(config.scraper.interval_secs, 60);
        assert_eq!(config.scraper.fetch_timeout_secs, 10);
        assert_eq!(config.scraper.min_refresh_age_secs, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (_dir, path) = write_config("   \n  \n  ");
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (_dir, path) = write_config("port = 9000\n[scraper]\nconcurrency = 3\n");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.scraper.concurrency, 3);
        assert_eq!(config.scraper.interval_secs, 60);
        assert_eq!(config.database_path, "rssagg.db");
    }

    #[test]
    fn test_full_config() {
        let (_dir, path) = write_config(
            r#"
port = 3000
database_path = "/var/lib/rssagg/data.db"

[scraper]
concurrency = 4
interval_secs = 300
fetch_timeout_secs = 5
min_refresh_age_secs = 900
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_path, "/var/lib/rssagg/data.db");

        let scraper = config.scraper.scraper_config();
        assert_eq!(scraper.concurrency, 4);
        assert_eq!(scraper.interval, Duration::from_secs(300));
        assert_eq!(scraper.fetch_timeout, Duration::from_secs(5));
        assert_eq!(config.scraper.min_refresh_age(), Duration::from_secs(900));
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (_dir, path) = write_config("this is not [valid toml");

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (_dir, path) = write_config("port = \"eighty\"\n");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (_dir, path) = write_config("port = 1234\ncolour = \"blue\"\n[scraper]\nspeed = 11\n");
        assert_eq!(Config::load(&path).unwrap().port, 1234);
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (_dir, path) = write_config(&"a".repeat(1_048_577));

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::default();
        config
            .apply_env(env(&[("PORT", "9999"), ("DB_URL", "/tmp/agg.db")]))
            .unwrap();
        assert_eq!(config.port, 9999);
        assert_eq!(config.database_path, "/tmp/agg.db");
    }

    #[test]
    fn test_env_blank_values_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[("PORT", " "), ("DB_URL", "")])).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_bad_port_rejected() {
        let mut config = Config::default();
        let err = config.apply_env(env(&[("PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.scraper.concurrency = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_zero_interval_and_timeout() {
        let mut config = Config::default();
        config.scraper.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scraper.fetch_timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
