use adwatch_core::StorageError;
use adwatch_probe::ProbeError;
use adwatch_session::SessionError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("script evaluation failed: {0}")]
    ScriptError(String),

    #[error("timeout: {0}")]
    Timeout(String),
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Self::ChromiumError(err.to_string())
    }
}

impl From<BrowserError> for ProbeError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::NavigationError(msg) | BrowserError::ChromiumError(msg) => {
                ProbeError::Unavailable(msg)
            }
            other => ProbeError::Dom(other.to_string()),
        }
    }
}

impl From<BrowserError> for StorageError {
    fn from(err: BrowserError) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}

impl From<BrowserError> for SessionError {
    fn from(err: BrowserError) -> Self {
        SessionError::Surface(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BrowserError::NavigationError("page not found".to_string());
        assert_eq!(err.to_string(), "navigation failed: page not found");
    }

    #[test]
    fn test_closed_page_makes_probes_unavailable() {
        let err: ProbeError = BrowserError::ChromiumError("target closed".to_string()).into();
        assert!(matches!(err, ProbeError::Unavailable(_)));

        let err: ProbeError = BrowserError::ScriptError("TypeError".to_string()).into();
        assert!(matches!(err, ProbeError::Dom(_)));
    }

    #[test]
    fn test_storage_conversion() {
        let err: StorageError = BrowserError::ScriptError("SecurityError".to_string()).into();
        assert!(err.to_string().contains("SecurityError"));
    }
}
