//! # Error Types
//!
//! Domain-specific error types for norko-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  norko-core errors (this file)                                         │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  norko-db errors (separate crate)                                      │
//! │  └── DbError          - Local store failures                           │
//! │                                                                         │
//! │  norko-sync errors (separate crate)                                    │
//! │  └── SyncError        - Network, config and engine failures            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → UI notification       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Sale draft failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Payload could not be encoded as JSON.
    #[error("Payload encoding failed: {0}")]
    PayloadEncoding(#[from] serde_json::Error),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when a sale draft doesn't meet requirements.
/// Used for early validation before the draft is queued.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Values that must agree do not.
    #[error("{field} is inconsistent: {reason}")]
    Inconsistent { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "items".to_string(),
        };
        assert_eq!(err.to_string(), "items is required");

        let err = ValidationError::TooLong {
            field: "notes".to_string(),
            max: 500,
        };
        assert_eq!(err.to_string(), "notes must be at most 500 characters");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "items[0].quantity".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
