//! Error types for the shade-shot-core library.
//!
//! Each collaborator of the workflow has its own error enum so callers can
//! decide per failure mode whether it is shown to the user or only logged.
//! Startup failures (configuration, shortcut registration, UI) use
//! [`AppError`].

use std::time::Duration;
use thiserror::Error;

/// Failure of a window attribute primitive.
///
/// After any `WindowError` the window must be treated as unprotected until
/// the next successful protect call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    /// Toggling capture protection failed.
    #[error("Failed to set content protection to {enabled}: {reason}")]
    ContentProtection { enabled: bool, reason: String },

    /// Toggling taskbar visibility failed.
    #[error("Failed to set skip-taskbar to {enabled}: {reason}")]
    SkipTaskbar { enabled: bool, reason: String },
}

/// Screen capture failed. No partial artifact is ever produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Screen enumeration failed or returned nothing usable.
    #[error("Failed to enumerate screens: {0}")]
    Enumeration(String),

    /// Requested screen/monitor index was not found.
    #[error("Screen not found: index {0}")]
    ScreenNotFound(usize),

    /// The native capture call failed.
    #[error("Screen capture failed: {0}")]
    Native(String),

    /// Encoding the captured pixels failed.
    #[error("Image encoding failed: {0}")]
    Encoding(String),

    /// The capture did not finish in time.
    #[error("Screen capture timed out after {0:?}")]
    TimedOut(Duration),
}

impl CaptureError {
    /// Creates a native capture error with the given message.
    pub fn native(msg: impl Into<String>) -> Self {
        Self::Native(msg.into())
    }

    /// Creates an encoding error with the given message.
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// Short line suitable for the error view.
    pub fn user_message(&self) -> String {
        match self {
            Self::TimedOut(_) => "Screen capture took too long. Please try again.".to_string(),
            Self::ScreenNotFound(index) => {
                format!("Screen capture failed: monitor {index} is not available.")
            }
            _ => "Screen capture failed. Please try again.".to_string(),
        }
    }
}

/// The analysis backend failed or returned something unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// Transport-level failure (connection refused, DNS, TLS...).
    #[error("Analysis request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("Analysis backend returned status {0}")]
    Status(u16),

    /// The response body could not be interpreted.
    #[error("Could not parse analysis response: {0}")]
    Parse(String),

    /// The backend has no results to choose from.
    #[error("Analysis backend has no results")]
    Empty,

    /// Rate limited by the backend.
    #[error("Rate limited by analysis backend, please retry later")]
    RateLimited,

    /// The backend could not be set up (missing key, bad URL).
    #[error("Analysis backend misconfigured: {0}")]
    Config(String),

    /// The request did not finish in time.
    #[error("Analysis timed out after {0:?}")]
    TimedOut(Duration),
}

impl AnalysisError {
    /// Creates a request error with the given message.
    pub fn request(msg: impl Into<String>) -> Self {
        Self::Request(msg.into())
    }

    /// Creates a parse error with the given message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Short line suitable for the error view.
    pub fn user_message(&self) -> String {
        match self {
            Self::TimedOut(_) => "Analysis took too long. Please try again.".to_string(),
            Self::RateLimited => "Analysis is rate limited. Please wait and retry.".to_string(),
            Self::Config(_) => "Analysis backend is not configured correctly.".to_string(),
            _ => "Analysis failed. Please try again.".to_string(),
        }
    }
}

/// Writing to the clipboard failed. Only ever logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Clipboard error: {0}")]
pub struct ClipboardError(pub String);

/// Errors raised while starting up the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (missing keys, invalid values).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required environment variable was not found.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// A shortcut string could not be parsed or registered.
    #[error("Shortcut error: {0}")]
    Shortcut(String),

    /// UI-related errors (rendering, window management).
    #[error("UI error: {0}")]
    Ui(String),

    /// Screen capture setup failed.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Analysis backend setup failed.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a shortcut error with the given message.
    pub fn shortcut(msg: impl Into<String>) -> Self {
        Self::Shortcut(msg.into())
    }

    /// Creates a UI error with the given message.
    pub fn ui(msg: impl Into<String>) -> Self {
        Self::Ui(msg.into())
    }
}

/// A convenient alias for Result with [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_hide_raw_payloads() {
        let err = CaptureError::native("XGetImage failed: BadMatch (0x8)");
        assert!(!err.user_message().contains("BadMatch"));

        let err = AnalysisError::parse("expected value at line 1 column 1");
        assert!(!err.user_message().contains("column"));
    }

    #[test]
    fn timeouts_get_their_own_message() {
        let err = AnalysisError::TimedOut(Duration::from_secs(60));
        assert!(err.user_message().contains("too long"));
    }
}
