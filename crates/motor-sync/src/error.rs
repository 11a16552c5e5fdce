//! Error types shared by the driver boundary and the async facade.

use thiserror::Error;

/// Errors that can occur during driver operations.
///
/// Configuration problems are detected synchronously, before any network
/// activity. Transport problems are connection failures, with expired
/// deadlines as a distinguished case so callers can tell a slow server from
/// an unreachable one. Server-side rejections are operation failures and
/// carry the server's error code when it reported one.
///
/// `Error` is `Clone`: a failure from a shared in-flight connect attempt is
/// delivered to every caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Invalid construction parameters, detected before any I/O.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A transport could not be established or maintained.
    #[error("connection failure: {0}")]
    Connection(String),

    /// A deadline expired on a transport or while waiting for one.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The server rejected an operation.
    #[error("operation failure: {message}")]
    Operation {
        /// Server error code, when the server reported one.
        code: Option<i32>,
        /// Server-provided message.
        message: String,
    },

    /// A database or collection name violates the server's naming rules.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName {
        /// The offending name.
        name: String,
        /// Which rule it violates.
        reason: String,
    },

    /// An argument had the wrong shape for the API receiving it.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A server reply was missing expected fields or otherwise malformed.
    #[error("invalid server response: {0}")]
    InvalidResponse(String),

    /// The client was closed and accepts no further operations.
    #[error("client is not connected")]
    NotConnected,

    /// A driver invariant broke, e.g. a worker panicked mid-operation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error indicates transport loss, including timeouts.
    ///
    /// A connection that produced such an error must not be reused; the
    /// pool discards it instead of returning it to the idle set.
    #[must_use]
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }

    /// Check if this error is the timeout flavor of connection failure.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Get the server error code if this is an operation failure.
    #[must_use]
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Operation { code, .. } => *code,
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                Self::Timeout(err.to_string())
            }
            _ => Self::Connection(err.to_string()),
        }
    }
}

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, Error>;
