//! # Playback Error Types
//!
//! Raw failures ([`PlaybackError`]) and their user-facing classification
//! ([`CategorizedError`]). Nothing below the state machine stores a raw error;
//! it is always classified first.

use bridge_traits::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// A host primitive failed.
    #[error("Transport error: {0}")]
    Bridge(#[from] BridgeError),

    /// Transport setup did not complete.
    #[error("Transport setup failed: {0}")]
    SetupFailed(String),

    /// A newer request replaced this one before it finished.
    #[error("Request superseded by a newer play request")]
    Superseded,

    /// Reconnect or toggle was requested with nothing selected.
    #[error("No stream loaded")]
    NoStreamLoaded,

    /// The transport was destroyed.
    #[error("Transport destroyed")]
    TransportDestroyed,

    // ========================================================================
    // Metadata Errors
    // ========================================================================
    /// The now-playing feed could not be fetched or parsed.
    #[error("Now-playing feed error: {0}")]
    Feed(String),

    // ========================================================================
    // General Errors
    // ========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Host-style error name used for classification (`NotAllowedError`, `TimeoutError`, ...).
    pub fn error_name(&self) -> &str {
        match self {
            PlaybackError::Bridge(BridgeError::Media { name, .. }) => name,
            PlaybackError::Bridge(BridgeError::Timeout(_)) => "TimeoutError",
            PlaybackError::Bridge(BridgeError::NotAvailable(_)) => "NotSupportedError",
            PlaybackError::Bridge(BridgeError::Io(_)) => "IoError",
            PlaybackError::Bridge(_) => "Error",
            PlaybackError::SetupFailed(_) => "SetupError",
            PlaybackError::Superseded => "AbortError",
            PlaybackError::NoStreamLoaded => "InvalidStateError",
            PlaybackError::TransportDestroyed => "InvalidStateError",
            PlaybackError::Feed(_) => "FeedError",
            PlaybackError::InvalidConfig(_) => "ConfigError",
            PlaybackError::Internal(_) => "Error",
        }
    }

    /// Message without the name prefix.
    pub fn detail(&self) -> String {
        match self {
            PlaybackError::Bridge(BridgeError::Media { message, .. }) => message.clone(),
            PlaybackError::Bridge(BridgeError::Timeout(message))
            | PlaybackError::Bridge(BridgeError::NotAvailable(message))
            | PlaybackError::Bridge(BridgeError::OperationFailed(message)) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

// ============================================================================
// Classification
// ============================================================================

/// Failure taxonomy shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    Network,
    Autoplay,
    NotFound,
    Auth,
    Unknown,
}

impl ErrorCategory {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCategory::Network | ErrorCategory::Unknown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Network => "Network",
            ErrorCategory::Autoplay => "Autoplay",
            ErrorCategory::NotFound => "NotFound",
            ErrorCategory::Auth => "Auth",
            ErrorCategory::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message shown once network retries are exhausted.
pub const NETWORK_HINT: &str =
    "Unable to connect to the stream. Check your internet connection and try again.";

const AUTOPLAY_PHRASES: &[&str] = &[
    "notallowederror",
    "not allowed",
    "autoplay",
    "user didn't interact",
    "play() failed because the user",
];

const NETWORK_PHRASES: &[&str] = &[
    "network",
    "timeout",
    "timed out",
    "offline",
    "failed to fetch",
    "connection",
    "err_internet_disconnected",
];

const NOT_FOUND_PHRASES: &[&str] = &["404", "not found"];

const AUTH_PHRASES: &[&str] = &["401", "403", "unauthorized", "forbidden"];

/// A classified failure as stored in the playback snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedError {
    pub message: String,
    pub category: ErrorCategory,
    pub retryable: bool,
}

impl CategorizedError {
    /// Replace the message with the connectivity hint for network failures.
    pub fn with_network_hint(mut self) -> Self {
        if self.category == ErrorCategory::Network {
            self.message = NETWORK_HINT.to_string();
        }
        self
    }
}

impl fmt::Display for CategorizedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

impl From<&PlaybackError> for CategorizedError {
    fn from(error: &PlaybackError) -> Self {
        classify(error.error_name(), &error.detail())
    }
}

/// Classify a raw failure by name and message.
///
/// Phrases are matched case-insensitively in priority order: autoplay, network,
/// not-found, auth. Anything else is `Unknown` and retryable.
pub fn classify(name: &str, message: &str) -> CategorizedError {
    let haystack = format!("{} {}", name, message).to_lowercase();
    let contains_any = |phrases: &[&str]| phrases.iter().any(|p| haystack.contains(p));

    let category = if contains_any(AUTOPLAY_PHRASES) {
        ErrorCategory::Autoplay
    } else if contains_any(NETWORK_PHRASES) {
        ErrorCategory::Network
    } else if contains_any(NOT_FOUND_PHRASES) {
        ErrorCategory::NotFound
    } else if contains_any(AUTH_PHRASES) {
        ErrorCategory::Auth
    } else {
        ErrorCategory::Unknown
    };

    let message = if message.trim().is_empty() {
        name.to_string()
    } else {
        message.to_string()
    };

    CategorizedError {
        message,
        category,
        retryable: category.is_retryable(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_error_is_retryable() {
        let err = classify("NetworkError", "A network error occurred");
        assert_eq!(err.category, ErrorCategory::Network);
        assert!(err.retryable);
    }

    #[test]
    fn test_not_found_is_terminal() {
        let err = classify("Error", "404 not found");
        assert_eq!(err.category, ErrorCategory::NotFound);
        assert!(!err.retryable);
    }

    #[test]
    fn test_network_outranks_not_found() {
        let err = classify("Error", "network failure: upstream returned 404");
        assert_eq!(err.category, ErrorCategory::Network);
    }

    #[test]
    fn test_autoplay_outranks_everything() {
        let err = classify(
            "NotAllowedError",
            "play() failed because the user didn't interact with the document first",
        );
        assert_eq!(err.category, ErrorCategory::Autoplay);
        assert!(!err.retryable);
    }

    #[test]
    fn test_auth_and_unknown() {
        assert_eq!(classify("Error", "HTTP 403").category, ErrorCategory::Auth);
        assert_eq!(classify("Error", "Unauthorized").category, ErrorCategory::Auth);

        let unknown = classify("Error", "decoder exploded");
        assert_eq!(unknown.category, ErrorCategory::Unknown);
        assert!(unknown.retryable);
    }

    #[test]
    fn test_empty_message_falls_back_to_name() {
        let err = classify("NetworkError", "");
        assert_eq!(err.message, "NetworkError");
        assert_eq!(err.category, ErrorCategory::Network);
    }

    #[test]
    fn test_bridge_error_classification() {
        let timeout = PlaybackError::from(BridgeError::Timeout("load".to_string()));
        assert_eq!(CategorizedError::from(&timeout).category, ErrorCategory::Network);

        let media = PlaybackError::from(BridgeError::Media {
            name: "NotAllowedError".to_string(),
            message: "blocked".to_string(),
        });
        let categorized = CategorizedError::from(&media);
        assert_eq!(categorized.category, ErrorCategory::Autoplay);
        assert_eq!(categorized.message, "blocked");
    }

    #[test]
    fn test_network_hint_only_rewrites_network() {
        let network = classify("NetworkError", "socket closed").with_network_hint();
        assert_eq!(network.message, NETWORK_HINT);

        let auth = classify("Error", "403 forbidden").with_network_hint();
        assert_eq!(auth.message, "403 forbidden");
    }
}
