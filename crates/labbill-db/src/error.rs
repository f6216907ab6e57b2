//! # Storage Errors
//!
//! `sqlx::Error` is folded into [`DbError`] by what the caller can do about
//! it:
//!
//! ```text
//! BUSY / LOCKED / pool timeout ──► Conflict            retry the operation
//! UNIQUE                       ──► UniqueViolation     duplicate number/UHID
//! FOREIGN KEY                  ──► ForeignKeyViolation unknown reference
//! CHECK                        ──► CheckViolation      amount invariant broken
//! no row                       ──► NotFound
//! anything else                ──► QueryFailed / Internal
//! ```

use thiserror::Error;

// Primary result codes; extended codes keep them in the low byte.
const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// e.g. two invoices with the same `(tenant_id, invoice_number)`.
    #[error("Duplicate {field}")]
    UniqueViolation { field: String },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A money CHECK in the schema rejected the row.
    #[error("Check constraint violation: {message}")]
    CheckViolation { message: String },

    /// Another writer held the lock past the busy timeout.
    #[error("Database busy: {0}")]
    Conflict(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::Conflict(_))
    }

    fn from_database(err: &dyn sqlx::error::DatabaseError) -> Self {
        let message = err.message();

        if is_lock_code(err.code().as_deref()) || message.contains("database is locked") {
            return DbError::Conflict(message.to_string());
        }

        // "UNIQUE constraint failed: invoices.tenant_id, invoices.invoice_number"
        if let Some(columns) = message.strip_prefix("UNIQUE constraint failed: ") {
            return DbError::UniqueViolation {
                field: columns.to_string(),
            };
        }

        if message.contains("FOREIGN KEY constraint failed") {
            DbError::ForeignKeyViolation {
                message: message.to_string(),
            }
        } else if message.contains("CHECK constraint failed") {
            DbError::CheckViolation {
                message: message.to_string(),
            }
        } else {
            DbError::QueryFailed(message.to_string())
        }
    }
}

fn is_lock_code(code: Option<&str>) -> bool {
    match code.and_then(|c| c.parse::<i64>().ok()) {
        Some(code) => matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED),
        None => false,
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => DbError::from_database(db_err.as_ref()),
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::PoolTimedOut => DbError::Conflict("timed out waiting for a connection".to_string()),
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => DbError::Serialization(err.to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
