// Application settings
// Loaded from ~/.config/callwatch/config.toml

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const ENV_FEED_URL: &str = "CALLWATCH_FEED_URL";
pub const ENV_DB: &str = "CALLWATCH_DB";

#[derive(Debug)]
pub enum ConfigError {
    /// Settings file could not be read
    Io(String),
    /// Settings file is not valid TOML for this schema
    Parse(String),
    /// Values parsed but are unusable
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "cannot read settings: {}", msg),
            ConfigError::Parse(msg) => write!(f, "invalid settings: {}", msg),
            ConfigError::Validation(msg) => write!(f, "invalid settings: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Upstream feed connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedSettings {
    pub base_url: String,
    pub referer: String,
    pub timeout_secs: u64,
    /// Extra attempts after the first request
    pub max_retries: u32,
    pub retry_base_ms: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.chesterfield.gov/api".to_string(),
            referer: "https://www.chesterfield.gov/".to_string(),
            timeout_secs: 30,
            max_retries: 1,
            retry_base_ms: 1000,
        }
    }
}

impl FeedSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSettings {
    /// Database file. None = platform data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestSettings {
    /// Seconds between harvests in `watch` mode
    pub interval_secs: u64,
    /// Per-harvest deadline, covering fetches and writes
    pub deadline_secs: u64,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            deadline_secs: 45,
        }
    }
}

impl HarvestSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub feed: FeedSettings,
    pub store: StoreSettings,
    pub harvest: HarvestSettings,
}

impl Settings {
    /// Default settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("callwatch")
            .join("config.toml")
    }

    /// Default database path
    pub fn default_db_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("callwatch")
            .join("calls.db")
    }

    /// Load settings and apply environment overrides. Not validated: call
    /// [`Settings::validate`] once any command-line overrides are applied.
    ///
    /// An explicit `path` must exist. Without one, the default path is used
    /// when present and defaults apply otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&contents)
            .map_err(|e| match e {
                ConfigError::Parse(msg) => ConfigError::Parse(format!("{}: {}", path.display(), msg)),
                other => other,
            })
    }

    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Override from environment. `lookup` is `std::env::var` outside tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_FEED_URL).filter(|v| !v.trim().is_empty()) {
            self.feed.base_url = url.trim().to_string();
        }
        if let Some(db) = lookup(ENV_DB).filter(|v| !v.trim().is_empty()) {
            self.store.path = Some(PathBuf::from(db.trim()));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("feed.base_url must not be empty".into()));
        }
        if !self.feed.base_url.starts_with("http://") && !self.feed.base_url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "feed.base_url must be an http(s) URL, got {:?}",
                self.feed.base_url
            )));
        }
        if self.feed.timeout_secs == 0 {
            return Err(ConfigError::Validation("feed.timeout_secs must be > 0".into()));
        }
        if self.harvest.interval_secs == 0 {
            return Err(ConfigError::Validation("harvest.interval_secs must be > 0".into()));
        }
        if self.harvest.deadline_secs == 0 {
            return Err(ConfigError::Validation("harvest.deadline_secs must be > 0".into()));
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(Self::default_db_path)
    }

    /// Effective settings as TOML (for `config show`)
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let mut resolved = self.clone();
        resolved.store.path = Some(self.db_path());
        toml::to_string_pretty(&resolved).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_empty_file_is_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.feed.max_retries, 1);
        assert_eq!(settings.harvest.interval(), Duration::from_secs(60));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_sections() {
        let settings = Settings::from_toml(
            r#"
[feed]
base_url = "http://localhost:8080/api"
max_retries = 3

[harvest]
interval_secs = 15
"#,
        )
        .unwrap();
        assert_eq!(settings.feed.base_url, "http://localhost:8080/api");
        assert_eq!(settings.feed.max_retries, 3);
        assert_eq!(settings.feed.timeout_secs, 30);
        assert_eq!(settings.harvest.interval_secs, 15);
        assert_eq!(settings.harvest.deadline_secs, 45);
        assert_eq!(settings.store.path, None);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = Settings::from_toml("[feed]\napi_key = \"x\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{err:?}");
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings.apply_env(env(&[
            (ENV_FEED_URL, " http://127.0.0.1:9/api "),
            (ENV_DB, "/tmp/calls.db"),
        ]));
        assert_eq!(settings.feed.base_url, "http://127.0.0.1:9/api");
        assert_eq!(settings.db_path(), PathBuf::from("/tmp/calls.db"));
    }

    #[test]
    fn test_blank_env_ignored() {
        let mut settings = Settings::default();
        settings.apply_env(env(&[(ENV_FEED_URL, "  ")]));
        assert_eq!(settings.feed, FeedSettings::default());
    }

    #[test]
    fn test_validation() {
        let mut settings = Settings::default();
        settings.harvest.interval_secs = 0;
        assert!(matches!(settings.validate(), Err(ConfigError::Validation(_))));

        let mut settings = Settings::default();
        settings.feed.base_url = "ftp://example".into();
        assert!(matches!(settings.validate(), Err(ConfigError::Validation(_))));

        let mut settings = Settings::default();
        settings.feed.timeout_secs = 0;
        assert!(matches!(settings.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let err = Settings::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)), "{err:?}");
    }

    #[test]
    fn test_load_defers_validation_to_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[feed]\nbase_url = \"not a url\"\n").unwrap();

        let mut settings = Settings::load(Some(&path)).unwrap();
        assert!(matches!(settings.validate(), Err(ConfigError::Validation(_))));

        settings.feed.base_url = "http://127.0.0.1:9/api".into();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_from_file_and_show() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[store]\npath = \"/var/lib/callwatch/calls.db\"\n").unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.db_path(), PathBuf::from("/var/lib/callwatch/calls.db"));

        let shown = settings.to_toml().unwrap();
        let reparsed = Settings::from_toml(&shown).unwrap();
        assert_eq!(reparsed, settings);
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[harvest\n").unwrap();

        let err = Settings::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"), "{err}");
    }
}
