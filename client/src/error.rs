use buildlink_types::UnsupportedTestStatus;
use thiserror::Error;

/// Failure to handle one build server notification.
///
/// These are surfaced, never swallowed: an unhandled payload means the
/// protocol moved and the client needs fixing.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to decode {method} payload")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported test status: {0}")]
    UnsupportedTestStatus(i64),

    #[error("{0} is not implemented")]
    Unimplemented(&'static str),

    #[error("unknown build server notification: {0}")]
    UnknownNotification(String),

    #[error("{0} arrived without params")]
    MissingParams(String),
}

impl From<UnsupportedTestStatus> for ClientError {
    fn from(err: UnsupportedTestStatus) -> Self {
        Self::UnsupportedTestStatus(err.0)
    }
}
