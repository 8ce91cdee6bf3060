use thiserror::Error;

use crate::endpoint::MIN_RANDOM_CHARS;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The platform path limit leaves too little room for a random name.
    /// Retrying cannot help; the base directory has to change.
    #[error(
        "unable to generate a random pipe name: {available} characters available, \
         at least {MIN_RANDOM_CHARS} required"
    )]
    EndpointTooLong { available: usize },

    #[error("failed to connect to the build server pipe, max attempts: {attempts}")]
    ConnectionTimeout { attempts: u32 },

    #[error("pipe connection cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl TransportError {
    /// Number of connect attempts made before the error, if it came from the retry loop.
    #[must_use]
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::ConnectionTimeout { attempts } | Self::Cancelled { attempts } => Some(*attempts),
            Self::EndpointTooLong { .. } => None,
        }
    }
}
