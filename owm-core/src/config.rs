use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::{
    cache::CacheConfig,
    model::{QueryParams, Units},
    provider::openweather::DEFAULT_TIMEOUT,
};

/// Per-invocation value meaning "use the configured default".
pub const DEFAULT_PRESET: &str = "default";

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// units = "metric"
/// lang = "fr"
///
/// [cache]
/// enabled = true
/// size_limit_mb = 1000
/// eviction_policy = "least-recently-stored"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,

    /// Default unit system.
    pub units: Units,

    /// Default response language; the provider's default when absent.
    pub lang: Option<String>,

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,

    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            units: Units::default(),
            lang: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    /// Returns the API key or an error telling the user how to set one.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "No OpenWeatherMap API key configured.\n\
                     Hint: run `owm configure` and enter your API key."
                )
            })
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    /// Resolve per-invocation `units`/`lang` against the configured
    /// defaults. `None` and `"default"` both select the configured value.
    pub fn resolve_params(&self, units: Option<&str>, lang: Option<&str>) -> Result<QueryParams> {
        let units = match units.filter(|u| *u != DEFAULT_PRESET) {
            Some(units) => units.parse::<Units>()?,
            None => self.units,
        };
        let lang = match lang.filter(|l| *l != DEFAULT_PRESET) {
            Some(lang) => Some(lang.to_string()),
            None => self.lang.clone(),
        };
        Ok(QueryParams::new(units, lang))
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "owm", "owm-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_api_key_errors_when_not_set() {
        let cfg = Config::default();
        let err = cfg.require_api_key().unwrap_err();

        assert!(err.to_string().contains("No OpenWeatherMap API key configured"));
        assert!(err.to_string().contains("owm configure"));
    }

    #[test]
    fn set_api_key() {
        let mut cfg = Config::default();
        cfg.set_api_key("OPEN_KEY".into());
        assert_eq!(cfg.require_api_key().unwrap(), "OPEN_KEY");
    }

    #[test]
    fn default_preset_uses_configured_values() {
        let cfg = Config {
            units: Units::Imperial,
            lang: Some("de".into()),
            ..Config::default()
        };

        let params = cfg.resolve_params(Some("default"), None).unwrap();
        assert_eq!(params, QueryParams::new(Units::Imperial, Some("de".into())));

        let params = cfg.resolve_params(Some("metric"), Some("fr")).unwrap();
        assert_eq!(params, QueryParams::new(Units::Metric, Some("fr".into())));

        assert!(cfg.resolve_params(Some("kelvinish"), None).is_err());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config {
            units: Units::Metric,
            timeout_secs: 5,
            ..Config::default()
        };
        cfg.set_api_key("KEY".into());
        cfg.cache.size_limit_mb = 10;
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_key.as_deref(), Some("KEY"));
        assert_eq!(loaded.units, Units::Metric);
        assert_eq!(loaded.timeout_secs, 5);
        assert_eq!(loaded.cache.size_limit_mb, 10);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.timeout_secs, DEFAULT_TIMEOUT.as_secs());
        assert!(cfg.cache.enabled);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: Config = toml::from_str("api_key = \"K\"\n[cache]\nenabled = false\n").unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("K"));
        assert!(!cfg.cache.enabled);
        assert_eq!(cfg.cache.eviction_policy, "least-recently-stored");
    }
}
