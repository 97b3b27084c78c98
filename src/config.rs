//! Persisted client settings stored as TOML in the app directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize, de::Error as SerdeDeError};
use thiserror::Error;
use url::Url;

use crate::app_dirs;

/// Default filename used to store the app configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// Environment variable that replaces the configured classifier endpoint.
pub const CLASSIFIER_URL_ENV: &str = "PLATESCAN_CLASSIFIER_URL";

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/predict";
const DEFAULT_FIELD_NAME: &str = "file";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_RESPONSE_BYTES: usize = 256 * 1024;
const DEFAULT_PREVIEW_MAX_DIMENSION: u32 = 512;

/// Top-level settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub classifier: ClassifierSettings,
    #[serde(default)]
    pub preview: PreviewSettings,
}

/// Where and how images are sent for classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSettings {
    /// Full URL of the prediction endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Multipart field the service reads the image from.
    #[serde(default = "default_field_name")]
    pub field_name: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Optional deadline for a whole classify request. Unset means wait indefinitely.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Upper bound on response bodies read from the service.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            field_name: default_field_name(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: None,
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

impl ClassifierSettings {
    /// Parse the endpoint, rejecting anything that is not http(s).
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(self.endpoint.trim()).map_err(|source| ConfigError::InvalidEndpoint {
            value: self.endpoint.clone(),
            source,
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Preview decoding knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewSettings {
    /// Longest edge, in pixels, of the generated preview thumbnail.
    #[serde(default = "default_preview_max_dimension")]
    pub max_dimension: u32,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            max_dimension: default_preview_max_dimension(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    #[error("Classifier endpoint {value:?} is not a valid URL: {source}")]
    InvalidEndpoint {
        value: String,
        source: url::ParseError,
    },
    #[error("Classifier endpoint must use http or https, not {0}")]
    UnsupportedScheme(String),
    #[error("No suitable config directory found")]
    NoConfigDir,
}

/// Resolve the configuration file path, ensuring the parent directory exists.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir().map_err(map_app_dir_error)?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load settings from disk, falling back to defaults when no file exists.
///
/// Environment overrides are applied after the file is read, and the
/// resulting endpoint is validated before returning.
pub fn load_or_default() -> Result<AppConfig, ConfigError> {
    let path = config_path()?;
    let mut config = load_from(&path)?;
    apply_env_overrides(&mut config);
    config.classifier.endpoint_url()?;
    Ok(config)
}

/// Persist settings to the default location.
pub fn save(config: &AppConfig) -> Result<(), ConfigError> {
    let path = config_path()?;
    save_to_path(config, &path)
}

/// Save settings to a specific path, creating parent directories as needed.
pub fn save_to_path(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let data = toml::to_string_pretty(config).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, data).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        tracing::info!("No config at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source: SerdeDeError::custom(source),
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(endpoint) = std::env::var(CLASSIFIER_URL_ENV) {
        let endpoint = endpoint.trim();
        if !endpoint.is_empty() {
            tracing::info!("{CLASSIFIER_URL_ENV} set, classifying against {endpoint}");
            config.classifier.endpoint = endpoint.to_string();
        }
    }
}

fn map_app_dir_error(error: app_dirs::AppDirError) -> ConfigError {
    match error {
        app_dirs::AppDirError::NoBaseDir => ConfigError::NoConfigDir,
        app_dirs::AppDirError::CreateDir { path, source } => ConfigError::CreateDir { path, source },
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_field_name() -> String {
    DEFAULT_FIELD_NAME.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_max_response_bytes() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}

fn default_preview_max_dimension() -> u32 {
    DEFAULT_PREVIEW_MAX_DIMENSION
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let loaded = load_from(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(loaded, AppConfig::default());
        assert_eq!(loaded.classifier.endpoint, "http://127.0.0.1:8000/predict");
        assert_eq!(loaded.classifier.field_name, "file");
        assert_eq!(loaded.classifier.request_timeout(), None);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "[classifier]\nendpoint = \"https://food.example/predict\"\nrequest_timeout_secs = 15\n",
        )
        .unwrap();
        let loaded = load_from(&path).unwrap();
        assert_eq!(loaded.classifier.endpoint, "https://food.example/predict");
        assert_eq!(
            loaded.classifier.request_timeout(),
            Some(Duration::from_secs(15))
        );
        assert_eq!(loaded.classifier.field_name, "file");
        assert_eq!(loaded.preview.max_dimension, 512);
    }

    #[test]
    fn saves_and_reloads_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let mut cfg = AppConfig::default();
        cfg.preview.max_dimension = 128;
        cfg.classifier.max_response_bytes = 4096;
        save_to_path(&cfg, &path).unwrap();
        assert_eq!(load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn rejects_malformed_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[classifier\nendpoint = ").unwrap();
        assert!(matches!(
            load_from(&path),
            Err(ConfigError::ParseToml { .. })
        ));
    }

    #[test]
    fn endpoint_validation_requires_http() {
        let mut settings = ClassifierSettings::default();
        assert!(settings.endpoint_url().is_ok());
        settings.endpoint = "ftp://food.example/predict".into();
        assert!(matches!(
            settings.endpoint_url(),
            Err(ConfigError::UnsupportedScheme(scheme)) if scheme == "ftp"
        ));
        settings.endpoint = "not a url".into();
        assert!(matches!(
            settings.endpoint_url(),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn zero_request_timeout_means_none() {
        let settings = ClassifierSettings {
            request_timeout_secs: Some(0),
            ..ClassifierSettings::default()
        };
        assert_eq!(settings.request_timeout(), None);
    }
}
