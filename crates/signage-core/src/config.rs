use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::platform;

/// Daemon configuration, loaded once at startup and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the signage server. Required; trailing slashes trimmed.
    pub server_url: String,
    #[serde(default = "default_player_id")]
    pub player_id: String,
    /// mpv video output selector: "auto", "drm", "gbm", ...
    #[serde(default = "default_output_backend")]
    pub output_backend: String,
    /// Waiting-screen placeholder image.
    #[serde(default = "platform::waiting_image_path")]
    pub waiting_image: PathBuf,
}

fn default_player_id() -> String {
    "lite_1".to_string()
}

fn default_output_backend() -> String {
    "auto".to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found (looked for {0})")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("config is missing required field `server_url`")]
    MissingServerUrl,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    fn from_json(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(content)?;
        config.server_url = config.server_url.trim_end_matches('/').to_string();
        if config.server_url.is_empty() {
            return Err(ConfigError::MissingServerUrl);
        }
        Ok(config)
    }

    /// Config file location: env-overridden directory, else /etc/signage/,
    /// falling back to the per-user directory when the file is absent there.
    pub fn config_path() -> PathBuf {
        let dir = std::env::var(platform::CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| platform::system_config_dir());
        let path = dir.join("config.json");
        if path.is_file() {
            path
        } else {
            platform::user_config_dir().join("config.json")
        }
    }
}
