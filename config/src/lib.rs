//! `~/.buildlink/config.toml` loading.
//!
//! Every section is optional; a missing file means defaults everywhere.
//! String values that name paths or commands may reference environment
//! variables as `${NAME}`.

use std::env;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "BUILDLINK_CONFIG";

const fn default_max_attempts() -> u32 {
    30
}

const fn default_retry_interval_ms() -> u64 {
    2000
}

const fn default_failure_cache_capacity() -> usize {
    16
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_shutdown_timeout_secs() -> u64 {
    2
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Invalid {
        path: PathBuf,
        reason: String,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, .. } => write!(f, "failed to read {}", path.display()),
            ConfigError::Parse { path, .. } => write!(f, "failed to parse {}", path.display()),
            ConfigError::Invalid { path, reason } => {
                write!(f, "invalid config {}: {reason}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid { .. } => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BuildlinkConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    /// Launch the build server as a child process instead of dialing its pipe.
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

impl TransportConfig {
    #[must_use]
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    /// Tasks remembered as having failed compilation.
    #[serde(default = "default_failure_cache_capacity")]
    pub failure_cache_capacity: usize,
    /// Drop test-framework and reflection frames from failure stack traces.
    #[serde(default)]
    pub filter_stack_traces: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            failure_cache_capacity: default_failure_cache_capacity(),
            filter_stack_traces: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LinkConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl LinkConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkspaceConfig {
    /// Project roots used to map build targets back to projects.
    #[serde(default)]
    pub roots: Vec<String>,
}

impl WorkspaceConfig {
    /// Roots with `${VAR}` references expanded. Empty entries are dropped.
    #[must_use]
    pub fn roots(&self) -> Vec<PathBuf> {
        self.roots
            .iter()
            .map(|root| expand_env_vars(root))
            .filter(|root| !root.trim().is_empty())
            .map(PathBuf::from)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub working_dir: Option<String>,
}

impl ServerConfig {
    #[must_use]
    pub fn command(&self) -> String {
        expand_env_vars(&self.command)
    }

    #[must_use]
    pub fn args(&self) -> Vec<String> {
        self.args.iter().map(|arg| expand_env_vars(arg)).collect()
    }

    #[must_use]
    pub fn working_dir(&self) -> Option<PathBuf> {
        self.working_dir
            .as_deref()
            .map(|dir| PathBuf::from(expand_env_vars(dir)))
    }
}

/// Replace `${NAME}` with the variable's value; unset variables expand to
/// nothing and an unclosed `${` is kept verbatim.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        if !name.is_empty() {
            out.push_str(&env::var(name).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

impl BuildlinkConfig {
    /// Load from [`config_path`]. `Ok(None)` when there is no config file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        Self::parse(&content, path).map(Some)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = match toml::from_str(content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                return Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };
        if self.transport.max_attempts == 0 {
            return Err(invalid("transport.max_attempts must be at least 1"));
        }
        if self.client.failure_cache_capacity == 0 {
            return Err(invalid("client.failure_cache_capacity must be at least 1"));
        }
        if self.link.request_timeout_secs == 0 {
            return Err(invalid("link.request_timeout_secs must be at least 1"));
        }
        if let Some(server) = &self.server
            && server.command.trim().is_empty()
        {
            return Err(invalid("server.command must not be empty"));
        }
        Ok(())
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }
}

/// `$BUILDLINK_CONFIG` if set, else `~/.buildlink/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV).filter(|path| !path.is_empty()) {
        return Some(PathBuf::from(path));
    }
    buildlink_home().map(|home| home.join("config.toml"))
}

/// `~/.buildlink`, home of the config file and logs.
pub fn buildlink_home() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".buildlink"))
}
