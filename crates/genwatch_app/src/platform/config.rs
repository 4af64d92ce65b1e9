use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use genwatch_core::OrderingPolicy;
use genwatch_engine::{EngineSettings, ReconnectPolicy, DEFAULT_API_BASE};
use genwatch_logging::{gw_info, LevelFilter, LogDestination};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Config file picked up from the working directory when `--config` is absent.
pub const CONFIG_FILENAME: &str = "genwatch.ron";

pub const ENV_API_URL: &str = "GENWATCH_API_URL";
pub const ENV_WS_URL: &str = "GENWATCH_WS_URL";
pub const ENV_TOKEN: &str = "GENWATCH_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid log level {0:?}")]
    LogLevel(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Ordering {
    #[default]
    LastReceivedWins,
    RejectStale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogTarget {
    #[default]
    File,
    Terminal,
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub stable_after_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            max_retries: policy.max_retries,
            initial_delay_ms: policy.initial_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            stable_after_ms: policy.stable_after.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub destination: LogTarget,
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            destination: LogTarget::File,
            level: "info".to_string(),
        }
    }
}

/// Application settings as stored in `genwatch.ron`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_url: String,
    pub ws_url: Option<String>,
    pub access_token: Option<String>,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub reconnect: ReconnectConfig,
    pub ordering: Ordering,
    pub preview: bool,
    pub preview_max_chars: usize,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let engine = EngineSettings::default();
        Self {
            api_url: DEFAULT_API_BASE.to_string(),
            ws_url: None,
            access_token: None,
            connect_timeout_ms: engine.connect_timeout.as_millis() as u64,
            request_timeout_ms: engine.request_timeout.as_millis() as u64,
            reconnect: ReconnectConfig::default(),
            ordering: Ordering::default(),
            preview: true,
            preview_max_chars: engine.preview_max_chars,
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads `path`, or `./genwatch.ron` when no path is given.
    ///
    /// An explicit path must exist; the implicit file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::read(path),
            None => {
                let implicit = Path::new(CONFIG_FILENAME);
                if implicit.is_file() {
                    Self::read(implicit)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = ron::from_str(&content).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        gw_info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Overrides fields from `GENWATCH_*` variables; blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(api_url) = lookup(ENV_API_URL) {
            self.api_url = api_url;
        }
        if let Some(ws_url) = lookup(ENV_WS_URL) {
            self.ws_url = Some(ws_url);
        }
        if let Some(token) = lookup(ENV_TOKEN) {
            self.access_token = Some(token);
        }
    }

    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        self.log
            .level
            .parse()
            .map_err(|_| ConfigError::LogLevel(self.log.level.clone()))
    }

    pub fn log_destination(&self) -> LogDestination {
        match self.log.destination {
            LogTarget::File => LogDestination::File,
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::Both => LogDestination::Both,
        }
    }

    pub fn ordering_policy(&self) -> OrderingPolicy {
        match self.ordering {
            Ordering::LastReceivedWins => OrderingPolicy::LastReceivedWins,
            Ordering::RejectStale => OrderingPolicy::RejectStale,
        }
    }

    pub fn to_engine_settings(&self) -> EngineSettings {
        EngineSettings {
            api_base: self.api_url.clone(),
            ws_base: self.ws_url.clone(),
            access_token: self.access_token.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            reconnect: ReconnectPolicy {
                max_retries: self.reconnect.max_retries,
                initial_delay: Duration::from_millis(self.reconnect.initial_delay_ms),
                max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
                stable_after: Duration::from_millis(self.reconnect.stable_after_ms),
            },
            preview_max_chars: self.preview_max_chars,
        }
    }
}
