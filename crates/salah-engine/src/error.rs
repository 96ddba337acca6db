//! Engine-specific error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Service error ({code}): {message}")]
    Service { code: u16, message: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Notification permission denied")]
    PermissionDenied,
}

impl EngineError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Network error. Check your connection.".to_string(),
            Self::Timeout => "The timing service took too long to respond.".to_string(),
            Self::Service { .. } => "The prayer time service is unavailable.".to_string(),
            Self::Store(_) => "Local cache error".to_string(),
            Self::PermissionDenied => {
                "Enable notifications to receive prayer reminders.".to_string()
            }
        }
    }

    /// Whether a retry attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout | Self::Service { .. }
        )
    }

    /// Connectivity failures get special treatment in the fallback chain:
    /// a saved timing set is preferred over waiting out the retry budget.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }
}
