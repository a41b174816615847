use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SEARCH_INDEX: &str = "job_posting";
pub const DEFAULT_LIST_LIMIT: u32 = 1000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_WIDGET_PREVIEW_COUNT: usize = 3;

pub const ENV_API_URL: &str = "JOBWATCH_API_URL";
pub const ENV_APP_ID: &str = "JOBWATCH_APP_ID";
pub const ENV_REST_KEY: &str = "JOBWATCH_REST_KEY";
pub const ENV_TIMEOUT_SECS: &str = "JOBWATCH_TIMEOUT_SECS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{setting} is not set. Set it in the config file or with: export {env}=...")]
    Missing {
        setting: &'static str,
        env: &'static str,
    },

    #[error("Invalid value for {setting}: {reason}")]
    Invalid {
        setting: &'static str,
        reason: String,
    },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Settings as written in `config.json`; every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub application_id: Option<String>,
    pub rest_api_key: Option<String>,
    pub search_index: Option<String>,
    pub list_limit: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub widget_preview_count: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(parsed))
    }
}

/// Values given on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub application_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the Parse server, always ending in `/`.
    pub api_url: String,
    pub application_id: String,
    pub rest_api_key: Option<String>,
    pub search_index: String,
    pub list_limit: u32,
    pub request_timeout: Duration,
    pub widget_preview_count: usize,
}

impl Config {
    pub fn default_path() -> PathBuf {
        // Use XDG config directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobwatch") {
            proj_dirs.config_dir().join("config.json")
        } else {
            PathBuf::from("jobwatch.json")
        }
    }

    /// Loads from the default config file and the process environment.
    pub fn load(overrides: Overrides) -> Result<Self, ConfigError> {
        let file = FileConfig::load(&Self::default_path())?;
        Self::resolve(file, |key| std::env::var(key).ok(), overrides)
    }

    /// Merges defaults < file < environment < overrides.
    pub fn resolve(
        file: Option<FileConfig>,
        env: impl Fn(&str) -> Option<String>,
        overrides: Overrides,
    ) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_default();
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let api_url = overrides
            .api_url
            .or_else(|| env(ENV_API_URL))
            .or(file.api_url)
            .ok_or(ConfigError::Missing {
                setting: "api_url",
                env: ENV_API_URL,
            })?;
        let application_id = overrides
            .application_id
            .or_else(|| env(ENV_APP_ID))
            .or(file.application_id)
            .ok_or(ConfigError::Missing {
                setting: "application_id",
                env: ENV_APP_ID,
            })?;

        let timeout_secs = match env(ENV_TIMEOUT_SECS) {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                setting: "request_timeout_secs",
                reason: format!("'{}' ({})", raw, e),
            })?,
            None => file.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        };
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                setting: "request_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        let list_limit = file.list_limit.unwrap_or(DEFAULT_LIST_LIMIT);
        if list_limit == 0 {
            return Err(ConfigError::Invalid {
                setting: "list_limit",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            api_url: normalize_base_url(&api_url)?,
            application_id: application_id.trim().to_string(),
            rest_api_key: env(ENV_REST_KEY).or(file.rest_api_key),
            search_index: file
                .search_index
                .unwrap_or_else(|| DEFAULT_SEARCH_INDEX.to_string()),
            list_limit,
            request_timeout: Duration::from_secs(timeout_secs),
            widget_preview_count: file
                .widget_preview_count
                .unwrap_or(DEFAULT_WIDGET_PREVIEW_COUNT),
        })
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::Invalid {
            setting: "api_url",
            reason: format!("'{}' is not an http(s) URL", trimmed),
        });
    }
    if trimmed.ends_with('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{}/", trimmed))
    }
}
