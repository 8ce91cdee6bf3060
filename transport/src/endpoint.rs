//! Random rendezvous names for the local pipe.
//!
//! The name is briefly a shared secret between the two processes, so the
//! random portion comes from the thread-local CSPRNG and is never shorter
//! than [`MIN_RANDOM_CHARS`] hex characters.

use std::env;
use std::fmt;
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::error::TransportError;

/// Upper bound on random hex characters in a generated name.
pub const MAX_RANDOM_CHARS: usize = 32;
/// Below this the name is too guessable to use.
pub const MIN_RANDOM_CHARS: usize = 16;

const SOCKET_SUFFIX: &str = ".sock";
const PIPE_PREFIX: &str = r"\\.\pipe\";
const PIPE_SUFFIX: &str = "-sock";

/// `sun_path` limits, minus the trailing NUL.
const LINUX_PATH_LIMIT: usize = 107;
const MACOS_PATH_LIMIT: usize = 103;

/// One end of the local channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeEndpoint {
    /// Unix domain socket path.
    Socket(PathBuf),
    /// Windows named pipe name (`\\.\pipe\...`).
    NamedPipe(String),
}

impl PipeEndpoint {
    /// The name published to the peer before dialing.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Socket(path) => path.display().to_string(),
            Self::NamedPipe(name) => name.clone(),
        }
    }
}

impl fmt::Display for PipeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Socket(path) => write!(f, "{}", path.display()),
            Self::NamedPipe(name) => f.write_str(name),
        }
    }
}

/// Generates socket paths under a base directory within a path-length limit.
#[derive(Debug, Clone)]
pub struct SocketNamer {
    base_dir: PathBuf,
    path_limit: Option<usize>,
}

impl SocketNamer {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>, path_limit: Option<usize>) -> Self {
        Self {
            base_dir: base_dir.into(),
            path_limit,
        }
    }

    /// `$XDG_RUNTIME_DIR` when set and non-empty, otherwise the system temp
    /// dir, with the limit of the current platform.
    #[must_use]
    pub fn from_env() -> Self {
        let base_dir = env::var_os("XDG_RUNTIME_DIR")
            .filter(|dir| !dir.is_empty())
            .map_or_else(env::temp_dir, PathBuf::from);
        // Symlinked temp dirs (macOS /var -> /private/var) would otherwise
        // make the peer see a different path than the one we measured.
        let base_dir = base_dir.canonicalize().unwrap_or(base_dir);
        Self::new(base_dir, platform_path_limit())
    }

    /// Number of random characters that fit, capped at [`MAX_RANDOM_CHARS`].
    #[must_use]
    pub fn available_chars(&self) -> usize {
        let Some(limit) = self.path_limit else {
            return MAX_RANDOM_CHARS;
        };
        let fixed = "/".len() + SOCKET_SUFFIX.len();
        let base_len = self.base_dir.as_os_str().len();
        limit
            .saturating_sub(fixed)
            .saturating_sub(base_len)
            .min(MAX_RANDOM_CHARS)
    }

    pub fn generate(&self) -> Result<PipeEndpoint, TransportError> {
        let available = self.available_chars();
        if available < MIN_RANDOM_CHARS {
            return Err(TransportError::EndpointTooLong { available });
        }
        let file = format!("{}{SOCKET_SUFFIX}", random_hex(available));
        Ok(PipeEndpoint::Socket(self.base_dir.join(file)))
    }
}

/// A fresh endpoint for the current platform.
pub fn generate_endpoint() -> Result<PipeEndpoint, TransportError> {
    if cfg!(windows) {
        Ok(named_pipe())
    } else {
        SocketNamer::from_env().generate()
    }
}

fn named_pipe() -> PipeEndpoint {
    PipeEndpoint::NamedPipe(format!(
        "{PIPE_PREFIX}{}{PIPE_SUFFIX}",
        random_hex(MAX_RANDOM_CHARS)
    ))
}

fn platform_path_limit() -> Option<usize> {
    if cfg!(target_os = "linux") {
        Some(LINUX_PATH_LIMIT)
    } else if cfg!(target_os = "macos") {
        Some(MACOS_PATH_LIMIT)
    } else {
        None
    }
}

fn random_hex(len: usize) -> String {
    let bytes: [u8; MAX_RANDOM_CHARS / 2] = rand::random();
    let mut out = String::with_capacity(MAX_RANDOM_CHARS);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out.truncate(len.min(MAX_RANDOM_CHARS));
    out
}
