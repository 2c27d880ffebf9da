//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Network      │  │     Server              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection-    │  │  ServerRejected         │ │
//! │  │  MissingDeviceId│  │    Failed       │  │  MalformedResponse      │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Local store    │  │     Queue       │  │      Engine             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Store          │  │  OperationNot-  │  │  ShuttingDown           │ │
//! │  │  Offline-       │  │    Found        │  │  ChannelError           │ │
//! │  │    Unavailable  │  │  InvalidSale    │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use norko_core::CoreError;
use norko_db::DbError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Missing device ID.
    #[error("Device ID not configured. Run initial setup first.")]
    MissingDeviceId,

    /// Invalid server URL.
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Network Errors
    // =========================================================================
    /// The server could not be reached.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The request did not complete within the client timeout.
    #[error("Request timed out")]
    Timeout,

    // =========================================================================
    // Server Errors
    // =========================================================================
    /// The server answered with a non-success status.
    #[error("Server rejected request with HTTP {status}: {body}")]
    ServerRejected { status: u16, body: String },

    /// The server answered 2xx with a body of the wrong shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    // =========================================================================
    // Local Store Errors
    // =========================================================================
    /// Local store operation failed.
    #[error("Local store error: {0}")]
    Store(#[from] DbError),

    /// Offline work is impossible without a local store.
    #[error("Offline mode unavailable: the local store is not available and the server is unreachable")]
    OfflineUnavailable,

    // =========================================================================
    // Queue Errors
    // =========================================================================
    /// The operation is no longer queued.
    #[error("Pending operation {0} not found")]
    OperationNotFound(i64),

    /// The sale draft was rejected before queuing.
    #[error("Invalid sale: {0}")]
    InvalidSale(#[from] CoreError),

    /// Failed to encode or decode JSON.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal engine error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Engine is shutting down.
    #[error("Sync engine is shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout
        } else if err.is_decode() {
            SyncError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            SyncError::ServerRejected {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            SyncError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if a later attempt may succeed without any change on our side.
    ///
    /// ## Retryable Errors
    /// - Connection failures and timeouts
    /// - 5xx, 408 and 429 responses
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::ConnectionFailed(_) | SyncError::Timeout => true,
            SyncError::ServerRejected { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            _ => false,
        }
    }

    /// Returns true if the server was never reached.
    pub fn is_connectivity_failure(&self) -> bool {
        matches!(self, SyncError::ConnectionFailed(_) | SyncError::Timeout)
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::MissingDeviceId
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// Returns true if the local store failed.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, SyncError::Store(_) | SyncError::OfflineUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::ConnectionFailed("refused".into()).is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(SyncError::ServerRejected {
            status: 500,
            body: String::new()
        }
        .is_retryable());

        assert!(!SyncError::ServerRejected {
            status: 400,
            body: "no items".into()
        }
        .is_retryable());
        assert!(!SyncError::MalformedResponse("object".into()).is_retryable());
        assert!(!SyncError::InvalidConfig("bad".into()).is_retryable());
    }

    #[test]
    fn test_categories() {
        assert!(SyncError::Timeout.is_connectivity_failure());
        assert!(!SyncError::ServerRejected {
            status: 503,
            body: String::new()
        }
        .is_connectivity_failure());

        assert!(SyncError::from(DbError::PoolExhausted).is_store_failure());
        assert!(SyncError::OfflineUnavailable.is_store_failure());
        assert!(SyncError::MissingDeviceId.is_config_error());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::ServerRejected {
            status: 400,
            body: "missing total_amount".into(),
        };
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("missing total_amount"));
    }
}
