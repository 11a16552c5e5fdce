//! Pool error types.

use thiserror::Error;

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Failed to acquire a connection within the wait-queue timeout.
    #[error("connection acquisition timed out after {0:?}")]
    AcquisitionTimeout(std::time::Duration),

    /// Pool is closed.
    #[error("pool is closed")]
    PoolClosed,

    /// Pool configuration error.
    #[error("pool configuration error: {0}")]
    Configuration(String),

    /// The driver failed while establishing or operating a connection.
    #[error(transparent)]
    Driver(#[from] motor_sync::Error),
}

impl From<PoolError> for motor_sync::Error {
    /// Collapse pool failures into the shared driver taxonomy.
    ///
    /// An acquisition timeout becomes the timeout flavor of connection
    /// failure; a closed pool reads as not connected. Driver errors pass
    /// through untouched so refusals and expiries stay distinguishable.
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::AcquisitionTimeout(wait) => {
                Self::Timeout(format!("waited {wait:?} for a pooled connection"))
            }
            PoolError::PoolClosed => Self::NotConnected,
            PoolError::Configuration(message) => Self::Configuration(message),
            PoolError::Driver(err) => err,
        }
    }
}

/// Result type for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;
