use crate::error::{CoreError, CoreResult};
use crate::request::{DEFAULT_ANALYSIS_MODEL, DEFAULT_DISCOVERY_MODEL};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV: &str = "CIVICLENS_BASE_URL";
pub const DATABASE_ENV: &str = "CIVICLENS_DB";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Poll pacing: `short` for the first waits, then `medium`, then `long` until
/// the attempt budget runs out.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub max_attempts: u32,
    pub short_interval_ms: u64,
    pub short_waits: u32,
    pub medium_interval_ms: u64,
    pub medium_waits: u32,
    pub long_interval_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            max_attempts: 40,
            short_interval_ms: 1_000,
            short_waits: 5,
            medium_interval_ms: 2_000,
            medium_waits: 10,
            long_interval_ms: 2_500,
        }
    }
}

impl PollingSettings {
    pub fn short(&self) -> Duration {
        Duration::from_millis(self.short_interval_ms)
    }

    pub fn medium(&self) -> Duration {
        Duration::from_millis(self.medium_interval_ms)
    }

    pub fn long(&self) -> Duration {
        Duration::from_millis(self.long_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub discovery_model: String,
    pub analysis_model: String,
    pub database_path: PathBuf,
    pub catalog_path: Option<PathBuf>,
    pub request_timeout_secs: u64,
    pub polling: PollingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            discovery_model: DEFAULT_DISCOVERY_MODEL.to_string(),
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
            database_path: PathBuf::from("civiclens.db"),
            catalog_path: None,
            request_timeout_secs: 60,
            polling: PollingSettings::default(),
        }
    }
}

impl Settings {
    /// Read the optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let mut settings = match path {
            Some(path) => Self::from_toml_str(&fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_toml_str(raw: &str) -> CoreResult<Self> {
        toml::from_str(raw).map_err(|err| CoreError::configuration(format!("settings: {err}")))
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.base_url = url;
        }
        if let Some(db) = lookup(DATABASE_ENV).filter(|v| !v.trim().is_empty()) {
            self.database_path = PathBuf::from(db);
        }
    }

    pub fn require_api_key(&self) -> CoreResult<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                CoreError::configuration(format!(
                    "API key not configured; set {API_KEY_ENV} or api_key in the settings file"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.polling.max_attempts, 40);
        assert_eq!(settings.analysis_model, "gpt-4.1");
        assert!(settings.require_api_key().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml_str(
            "analysis_model = \"gpt-test\"\n[polling]\nmax_attempts = 5\n",
        )
        .unwrap();
        assert_eq!(settings.analysis_model, "gpt-test");
        assert_eq!(settings.polling.max_attempts, 5);
        assert_eq!(settings.polling.short_interval_ms, 1_000);
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let err = Settings::from_toml_str("polling = 3").unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (API_KEY_ENV, "sk-env"),
            (DATABASE_ENV, "/tmp/other.db"),
            (BASE_URL_ENV, "   "),
        ]
        .into_iter()
        .collect();
        let mut settings = Settings::default();
        settings.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.require_api_key().unwrap(), "sk-env");
        assert_eq!(settings.database_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let settings = Settings {
            api_key: Some("  ".to_string()),
            ..Settings::default()
        };
        assert!(matches!(
            settings.require_api_key(),
            Err(CoreError::Configuration(_))
        ));
    }
}
