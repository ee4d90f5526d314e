// Configuration file and local state locations for the habits CLI.
//
// Config file: `<config dir>/habits/config.toml` (overridable with `-c`)
// Local state: `<cache dir>/habits/` (cron checkpoint and HTTP cache)

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use habits_core::boundary::CronSchedule;
use habits_core::client::{ClientConfig, Credentials};
use serde::Deserialize;
use url::Url;

use crate::exit_code::UsageError;

const APP_DIR: &str = "habits";

/// Path to the default config file: `<config dir>/habits/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// Default directory for the cron checkpoint and response cache.
pub fn default_state_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join(APP_DIR))
}

/// Where local state lives under a state directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub cron_checkpoint: PathBuf,
    pub http_cache: PathBuf,
}

impl StatePaths {
    pub fn under(state_dir: &Path) -> Self {
        Self { cron_checkpoint: state_dir.join("cron"), http_cache: state_dir.join("http.cache") }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub auth: AuthConfig,
    /// Short names for task ids.
    #[serde(default)]
    pub alias: BTreeMap<String, String>,
    #[serde(default)]
    pub cron: CronConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Clone, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AuthConfig {
    pub api_user: String,
    pub api_key: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_user", &self.api_user)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// When the service starts a new day. Both keys fall back to the
/// service's own schedule (04:00 US Eastern).
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct CronConfig {
    /// `HH:MM` or `HH:MM:SS`.
    pub reset_time: Option<String>,
    /// IANA zone name, e.g. `America/New_York`.
    pub zone: Option<String>,
}

impl CronConfig {
    pub fn schedule(&self) -> Result<CronSchedule, ConfigError> {
        let mut schedule = CronSchedule::default();
        if let Some(raw) = &self.reset_time {
            schedule.reset_time = parse_reset_time(raw).ok_or_else(|| ConfigError::Invalid {
                key: "cron.reset-time",
                message: format!("`{raw}` is not a time of day (expected HH:MM or HH:MM:SS)"),
            })?;
        }
        if let Some(raw) = &self.zone {
            schedule.zone = raw.parse::<Tz>().map_err(|error| ConfigError::Invalid {
                key: "cron.zone",
                message: format!("`{raw}`: {error}"),
            })?;
        }
        Ok(schedule)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    /// Value for the `x-client` header; not sent when unset.
    pub client: Option<String>,
    pub user_agent: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct CacheConfig {
    /// Overrides the platform cache directory.
    pub dir: Option<PathBuf>,
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        toml::from_str(&contents)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        let credentials = Credentials::new(&self.auth.api_user, &self.auth.api_key);
        let mut config =
            ClientConfig::new(credentials).with_client_id(self.api.client.clone());
        if let Some(raw) = &self.api.base_url {
            let url = Url::parse(raw).map_err(|error| ConfigError::Invalid {
                key: "api.base-url",
                message: format!("`{raw}`: {error}"),
            })?;
            config = config.with_base_url(url);
        }
        if let Some(user_agent) = &self.api.user_agent {
            config = config.with_user_agent(user_agent);
        }
        if let Some(secs) = self.api.timeout {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    key: "api.timeout",
                    message: "must be at least one second".to_string(),
                });
            }
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub fn state_dir(&self) -> Result<PathBuf, ConfigError> {
        self.cache.dir.clone().or_else(default_state_dir).ok_or(ConfigError::NoStateDir)
    }

    /// Map every alias to its task id, failing on the first unknown one
    /// before anything is sent.
    pub fn resolve_aliases(&self, names: &[String]) -> Result<Vec<String>, UsageError> {
        names
            .iter()
            .map(|name| {
                self.alias
                    .get(name)
                    .cloned()
                    .ok_or_else(|| UsageError::new(format!("{name}: unknown task")))
            })
            .collect()
    }
}

fn parse_reset_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
    Invalid { key: &'static str, message: String },
    NoConfigDir,
    NoStateDir,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config file {}: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "invalid config file {}: {source}", path.display())
            }
            Self::Invalid { key, message } => write!(f, "invalid `{key}` setting: {message}"),
            Self::NoConfigDir => {
                f.write_str("could not determine the config directory; pass --config")
            }
            Self::NoStateDir => {
                f.write_str("could not determine a cache directory; set `cache.dir` in the config")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid { .. } | Self::NoConfigDir | Self::NoStateDir => None,
        }
    }
}
