use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Bridge operation timed out: {0}")]
    Timeout(String),

    /// Failure reported by a host media primitive. `name` carries the host's
    /// error identifier (e.g. `NotAllowedError`, `NetworkError`).
    #[error("{name}: {message}")]
    Media { name: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Build a named media failure.
    pub fn media(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Media {
            name: name.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
