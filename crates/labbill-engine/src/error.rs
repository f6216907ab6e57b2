//! # Engine Error Type
//!
//! Unified error type returned by every engine operation.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Operation                                                             │
//! │  EngineResult<T>                                                       │
//! │       │                                                                 │
//! │       ├── ValidationError ──────────────► VALIDATION   (never retried) │
//! │       ├── CoreError::NotFound / DbError::NotFound ► NOT_FOUND          │
//! │       ├── CoreError (amount bounds) ────► CONSISTENCY  (never fixed)   │
//! │       ├── DbError::Conflict / timeout ──► CONFLICT     (retry once)    │
//! │       └── anything else ────────────────► INTERNAL     (logged, masked)│
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Serialization
//! ```json
//! {
//!   "code": "CONSISTENCY",
//!   "message": "Refund of ₹300.00 exceeds refundable amount ₹200.00"
//! }
//! ```

use serde::Serialize;

use labbill_core::{CoreError, ValidationError};
use labbill_db::DbError;

/// Error returned from engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for engine responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input failed validation. Surfaced verbatim.
    Validation,

    /// Invoice, patient, test or doctor does not exist for the tenant.
    NotFound,

    /// Lock contention or timeout. Retry the whole operation with a fresh read.
    Conflict,

    /// The request would break an amount invariant.
    Consistency,

    /// Anything else. Details are in the logs only.
    Internal,
}

impl EngineError {
    /// Creates a new engine error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        EngineError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        EngineError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::new(ErrorCode::Validation, message)
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        EngineError::new(ErrorCode::Conflict, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        EngineError::new(ErrorCode::Internal, message)
    }

    /// True when the caller may retry the operation once with a fresh read.
    pub fn is_retryable(&self) -> bool {
        self.code == ErrorCode::Conflict
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::validation(err.to_string())
    }
}

/// Converts core errors to engine errors.
impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => EngineError::validation(e.to_string()),
            CoreError::NotFound { entity, id } => EngineError::not_found(&entity, &id),
            other => EngineError::new(ErrorCode::Consistency, other.to_string()),
        }
    }
}

/// Converts database errors to engine errors.
impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EngineError::not_found(&entity, &id),
            DbError::Conflict(e) => {
                tracing::warn!("Database busy: {}", e);
                EngineError::conflict("The record is busy, please retry")
            }
            DbError::UniqueViolation { field, .. } => {
                tracing::warn!("Unique violation on {}", field);
                EngineError::conflict("A concurrent change collided, please retry")
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                EngineError::validation("Invalid reference")
            }
            DbError::CheckViolation { message } => {
                tracing::error!("Check constraint violation: {}", message);
                EngineError::new(ErrorCode::Consistency, "Amounts violate invoice invariants")
            }
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                EngineError::internal("Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                EngineError::internal("Database migration failed")
            }
            DbError::QueryFailed(e) | DbError::Serialization(e) | DbError::Internal(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database operation failed: {}", e);
                EngineError::internal("Database operation failed")
            }
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("Snapshot serialization failed: {}", err);
        EngineError::internal("Snapshot serialization failed")
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for EngineError {}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
