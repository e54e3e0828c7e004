//! Shutter error types.

use std::time::Duration;
use thiserror::Error;

/// Shutter error type.
#[derive(Error, Debug)]
pub enum RelayError {
    /// WebSocket error (connect, read or write)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Transport error not raised by the WebSocket library
    #[error("Transport error: {0}")]
    Transport(String),

    /// No open session to write to
    #[error("Not connected")]
    NotConnected,

    /// Malformed or non-protocol frame
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Reconnect attempts exhausted without reaching an open session
    #[error("Permanently disconnected after {attempts} failed connection attempts")]
    PermanentDisconnect { attempts: u32 },

    /// Orderly shutdown did not finish in time; tasks were aborted
    #[error("Shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),

    /// Configuration error
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// File watcher error
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Whether the error came from the transport and should be retried.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RelayError::WebSocket(_) | RelayError::Transport(_) | RelayError::NotConnected
        )
    }

    /// Whether the error ends the client's life.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RelayError::PermanentDisconnect { .. } | RelayError::ShutdownTimeout(_)
        )
    }
}

/// Result type alias using RelayError.
pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(RelayError::Transport("reset".into()).is_transport());
        assert!(RelayError::NotConnected.is_transport());
        assert!(!RelayError::Protocol("bad".into()).is_transport());

        assert!(RelayError::PermanentDisconnect { attempts: 10 }.is_terminal());
        assert!(RelayError::ShutdownTimeout(Duration::from_secs(5)).is_terminal());
        assert!(!RelayError::NotConnected.is_terminal());
    }

    #[test]
    fn test_error_messages() {
        let err = RelayError::PermanentDisconnect { attempts: 10 };
        assert_eq!(
            err.to_string(),
            "Permanently disconnected after 10 failed connection attempts"
        );
        assert_eq!(RelayError::NotConnected.to_string(), "Not connected");
    }
}
