//! Ledger data-access errors

use thiserror::Error;

/// Errors raised by a single ledger operation.
///
/// Cloneable so the coordinator can keep the original failure next to a
/// rollback failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// A statement expected a row and got none
    #[error("Row not found")]
    RowNotFound,

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Lock wait timeout, deadlock detected or serialization failure
    #[error("Lock conflict: {0}")]
    Conflict(String),

    #[error("Unit of work timed out")]
    Timeout,

    /// Connection dropped, refused or not acquired from the pool in time
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl LedgerError {
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotFound { .. } | LedgerError::RowNotFound => "NOT_FOUND",
            LedgerError::Duplicate(_) => "DUPLICATE",
            LedgerError::Constraint(_) => "CONSTRAINT_VIOLATION",
            LedgerError::Conflict(_) => "LOCK_CONFLICT",
            LedgerError::Timeout => "TIMEOUT",
            LedgerError::Connection(_) => "CONNECTION_ERROR",
            LedgerError::Database(_) => "DATABASE_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound { .. } | LedgerError::RowNotFound)
    }

    /// True if running the same unit of work again may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LedgerError::Conflict(_) | LedgerError::Timeout | LedgerError::Connection(_)
        )
    }
}

// PostgreSQL SQLSTATE codes we map explicitly
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const NOT_NULL_VIOLATION: &str = "23502";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";
const QUERY_CANCELED: &str = "57014";

// Whole SQLSTATE classes
const CLASS_CONNECTION_EXCEPTION: &str = "08";
const CLASS_DATA_EXCEPTION: &str = "22";

/// Map a PostgreSQL SQLSTATE to a ledger error, `None` if it has no
/// specific meaning here
fn from_sqlstate(code: &str, message: String) -> Option<LedgerError> {
    let err = match code {
        UNIQUE_VIOLATION => LedgerError::Duplicate(message),
        FOREIGN_KEY_VIOLATION | CHECK_VIOLATION | NOT_NULL_VIOLATION => {
            LedgerError::Constraint(message)
        }
        SERIALIZATION_FAILURE | DEADLOCK_DETECTED | LOCK_NOT_AVAILABLE | QUERY_CANCELED => {
            LedgerError::Conflict(message)
        }
        // numeric_value_out_of_range (22003) and friends
        c if c.starts_with(CLASS_DATA_EXCEPTION) => LedgerError::Constraint(message),
        c if c.starts_with(CLASS_CONNECTION_EXCEPTION) => LedgerError::Connection(message),
        _ => return None,
    };
    Some(err)
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db_err) => db_err
                .code()
                .and_then(|code| from_sqlstate(&code, db_err.message().to_string()))
                .unwrap_or_else(|| LedgerError::Database(e.to_string())),
            sqlx::Error::RowNotFound => LedgerError::RowNotFound,
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => LedgerError::Connection(e.to_string()),
            _ => LedgerError::Database(e.to_string()),
        }
    }
}
