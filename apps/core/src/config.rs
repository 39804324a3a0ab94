use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::matcher::MatchTuning;
use crate::model::IconRef;

pub const DATA_DIR_ENV: &str = "SIFT_DATA_DIR";
pub const CONFIG_FILE_NAME: &str = "config.toml";

const MIN_PREVIEW_INLINE_LIMIT: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io failed for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to encode config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("{0}")]
    Invalid(String),
}

/// `$SIFT_DATA_DIR` when set, otherwise `<temp>/sift`.
pub fn stable_app_data_dir() -> PathBuf {
    match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => std::env::temp_dir().join("sift"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub use_pinyin: bool,
    pub memo_capacity: usize,
    pub tuning: MatchTuning,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            use_pinyin: false,
            memo_capacity: 4096,
            tuning: MatchTuning::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub silent_timeout_ms: u64,
    pub fallback_enabled: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            silent_timeout_ms: 3000,
            fallback_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultsConfig {
    /// Previews whose serialized form is larger than this many bytes are
    /// replaced by a fetch reference.
    pub preview_inline_limit: usize,
    pub refresh_granularity_ms: i64,
    pub favorite_bonus: i64,
    pub default_action_icon: IconRef,
    pub error_icon: IconRef,
    pub preview_base_url: String,
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            preview_inline_limit: 1024,
            refresh_granularity_ms: 100,
            favorite_bonus: 100_000,
            default_action_icon: IconRef::Emoji("↵".to_string()),
            error_icon: IconRef::Emoji("⚠".to_string()),
            preview_base_url: "http://127.0.0.1:34987".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageConfig {
    pub history_db_path: PathBuf,
    pub icon_cache_capacity: usize,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            history_db_path: stable_app_data_dir().join("usage.sqlite3"),
            icon_cache_capacity: 512,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub log_level: String,
    pub matching: MatchingConfig,
    pub dispatch: DispatchConfig,
    pub results: ResultsConfig,
    pub usage: UsageConfig,
    /// Where this config was loaded from; not persisted.
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let base = stable_app_data_dir();
        Self {
            config_path: base.join(CONFIG_FILE_NAME),
            data_dir: base,
            log_level: "info".to_string(),
            matching: MatchingConfig::default(),
            dispatch: DispatchConfig::default(),
            results: ResultsConfig::default(),
            usage: UsageConfig::default(),
        }
    }
}

impl Config {
    pub fn silent_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch.silent_timeout_ms)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.matching.memo_capacity == 0 {
        return Err(ConfigError::Invalid("matching.memo_capacity must be positive".into()));
    }

    if cfg.usage.icon_cache_capacity == 0 {
        return Err(ConfigError::Invalid("usage.icon_cache_capacity must be positive".into()));
    }

    if cfg.results.refresh_granularity_ms <= 0 {
        return Err(ConfigError::Invalid(
            "results.refresh_granularity_ms must be positive".into(),
        ));
    }

    if cfg.results.preview_inline_limit < MIN_PREVIEW_INLINE_LIMIT {
        return Err(ConfigError::Invalid(format!(
            "results.preview_inline_limit must be at least {MIN_PREVIEW_INLINE_LIMIT}"
        )));
    }

    if cfg.dispatch.silent_timeout_ms == 0 {
        return Err(ConfigError::Invalid("dispatch.silent_timeout_ms must be positive".into()));
    }

    if cfg.data_dir.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("data_dir is required".into()));
    }

    if cfg.usage.history_db_path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("usage.history_db_path is required".into()));
    }

    Ok(())
}

/// Reads and validates the config at `path`. A missing file yields defaults.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let mut cfg = match std::fs::read_to_string(path) {
        Ok(raw) => toml::from_str::<Config>(&raw)?,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file missing, using defaults");
            Config::default()
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    cfg.config_path = path.to_path_buf();
    validate(&cfg)?;
    Ok(cfg)
}

pub fn save(cfg: &Config) -> Result<(), ConfigError> {
    validate(cfg)?;
    let path = &cfg.config_path;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let encoded = toml::to_string_pretty(cfg)?;
    std::fs::write(path, encoded).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })
}
