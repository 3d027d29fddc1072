//! Application-level configuration loading: operating mode, storage backend and the rules
//! assistant endpoint.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::model::Mode;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "RUMMYQ_CONFIG_PATH";
/// Environment variable holding the rules assistant API key.
const ASSISTANT_KEY_ENV: &str = "ASSISTANT_API_KEY";

const DEFAULT_SNAPSHOT_DIR: &str = "data";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(3_000);
const DEFAULT_ASSISTANT_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_ASSISTANT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Which queue store implementation backs connected mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// CouchDB over HTTP, configured through `COUCH_*` environment variables.
    #[default]
    Couch,
    /// In-process store; state is shared by the clients of this host only.
    Memory,
}

/// Hosted text-generation endpoint used by the rules assistant.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_ASSISTANT_MODEL.to_string(),
            endpoint: DEFAULT_ASSISTANT_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub mode: Mode,
    pub backend: Backend,
    /// Directory holding the local-only snapshot files.
    pub snapshot_dir: PathBuf,
    /// Upper bound on the initial storage connection check.
    pub connect_timeout: Duration,
    pub assistant: AssistantConfig,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    ///
    /// The assistant API key is always taken from the environment.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        mode = ?app_config.mode,
                        backend = ?app_config.backend,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        config.assistant.api_key = env::var(ASSISTANT_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty());
        config
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            backend: Backend::default(),
            snapshot_dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            assistant: AssistantConfig::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    mode: Option<Mode>,
    backend: Option<Backend>,
    snapshot_dir: Option<String>,
    connect_timeout_ms: Option<u64>,
    assistant: Option<RawAssistant>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAssistant {
    model: Option<String>,
    endpoint: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        let assistant = value.assistant.unwrap_or_default();
        Self {
            mode: value.mode.unwrap_or(defaults.mode),
            backend: value.backend.unwrap_or(defaults.backend),
            snapshot_dir: value
                .snapshot_dir
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_dir),
            connect_timeout: value
                .connect_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.connect_timeout),
            assistant: AssistantConfig {
                api_key: None,
                model: assistant.model.unwrap_or(defaults.assistant.model),
                endpoint: assistant.endpoint.unwrap_or(defaults.assistant.endpoint),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_defaults_for_missing_fields() {
        let raw: RawConfig = serde_json::from_str(r#"{"mode":"local_only"}"#).unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.mode, Mode::LocalOnly);
        assert_eq!(config.backend, Backend::Couch);
        assert_eq!(config.snapshot_dir, PathBuf::from("data"));
        assert_eq!(config.connect_timeout, Duration::from_millis(3_000));
        assert_eq!(config.assistant.model, DEFAULT_ASSISTANT_MODEL);
    }

    #[test]
    fn every_field_can_be_overridden() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "mode": "connected",
                "backend": "memory",
                "snapshot_dir": "/tmp/rq",
                "connect_timeout_ms": 250,
                "assistant": {"model": "m", "endpoint": "http://localhost:9"}
            }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.snapshot_dir, PathBuf::from("/tmp/rq"));
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.assistant.endpoint, "http://localhost:9");
    }

    #[test]
    fn unknown_modes_are_rejected() {
        assert!(serde_json::from_str::<RawConfig>(r#"{"mode":"offline"}"#).is_err());
    }
}
