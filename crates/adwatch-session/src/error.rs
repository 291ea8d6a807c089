//! Session error types.

use thiserror::Error;

/// Errors raised while enforcing a verdict.
///
/// Detection itself never fails; storage faults during a check are logged
/// and treated as missing keys.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The enforcement surface rejected an action
    #[error("enforcement surface error: {0}")]
    Surface(String),
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
