//! Error types for throttle-guard.

use thiserror::Error;

use crate::throttle::ThrottleTarget;

/// Returned when a call is rejected because its target has used up the
/// quota of the current window.
///
/// The message is fixed; the target is kept for logging and inspection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Request throttled due to exceeding limit")]
pub struct ThrottledError {
    target: ThrottleTarget,
}

impl ThrottledError {
    pub(crate) fn new(target: ThrottleTarget) -> Self {
        Self { target }
    }

    /// The target whose quota was exceeded.
    pub fn target(&self) -> &ThrottleTarget {
        &self.target
    }
}

/// Main error type for throttle-guard operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid window configuration or unparseable presets
    #[error("Configuration error: {0}")]
    Config(String),

    /// A named guard preset does not exist
    #[error("Unknown guard preset: {0}")]
    UnknownGuard(String),

    /// A guarded call was rejected
    #[error(transparent)]
    Throttled(#[from] ThrottledError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for throttle-guard operations.
pub type Result<T> = std::result::Result<T, Error>;
