//! Probe error types.

use thiserror::Error;

/// Result type alias for probe and environment operations.
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Failures inside a probe or its environment.
///
/// Never escapes a detection run: the runner turns every error into a probe
/// result.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The page is closed, detached or not loaded yet
    #[error("probe environment unavailable: {0}")]
    Unavailable(String),

    /// Inserting, measuring or removing an element failed
    #[error("DOM operation failed: {0}")]
    Dom(String),

    /// A script could not be injected
    #[error("script injection failed for {url}: {reason}")]
    Script {
        /// Script URL
        url: String,
        /// What went wrong
        reason: String,
    },

    /// The element handed to the environment cannot be built
    #[error("invalid bait element: {0}")]
    InvalidBait(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProbeError::Script {
            url: "https://ads.example/x.js".to_string(),
            reason: "page closed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "script injection failed for https://ads.example/x.js: page closed"
        );
    }
}
