//! Transfer Error Types
//!
//! Two layers: [`TxError`] describes how a transaction attempt ended,
//! [`TransferError`] adds request validation on top.

use thiserror::Error;

use crate::ledger::LedgerError;

/// Outcome of a failed [`super::TransactionCoordinator::run_atomic`] call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxError {
    /// No transaction was opened and the unit of work never ran
    #[error("Failed to begin transaction: {0}")]
    Begin(#[source] LedgerError),

    /// The unit of work failed and was rolled back cleanly
    #[error(transparent)]
    Work(LedgerError),

    /// The unit of work failed and the rollback failed too.
    /// The transaction's effect is unknown until reconciled.
    #[error("tx err: {work}, rollback err: {rollback}")]
    Rollback {
        work: LedgerError,
        #[source]
        rollback: LedgerError,
    },

    /// The unit of work succeeded but the commit did not.
    /// Its result must not be treated as applied.
    #[error("Failed to commit transaction: {0}")]
    Commit(#[source] LedgerError),
}

impl TxError {
    pub fn code(&self) -> &'static str {
        match self {
            TxError::Begin(_) => "BEGIN_FAILED",
            TxError::Work(e) => e.code(),
            TxError::Rollback { .. } => "ROLLBACK_FAILED",
            TxError::Commit(_) => "COMMIT_FAILED",
        }
    }

    /// The error raised by the unit of work, if it ran and failed
    pub fn work_error(&self) -> Option<&LedgerError> {
        match self {
            TxError::Work(e) | TxError::Rollback { work: e, .. } => Some(e),
            TxError::Begin(_) | TxError::Commit(_) => None,
        }
    }

    /// True when the store may or may not hold the transaction's writes
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, TxError::Rollback { .. })
    }

    /// True when retrying cannot apply the work twice and may succeed.
    ///
    /// Commit failures are excluded: only a caller that deduplicates (for
    /// example with a `client_ref`) can retry those safely.
    pub fn is_retryable(&self) -> bool {
        match self {
            TxError::Begin(_) => true,
            TxError::Work(e) => e.is_transient(),
            TxError::Rollback { .. } | TxError::Commit(_) => false,
        }
    }
}

/// Transfer error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Source and destination account cannot be the same")]
    SameAccount,

    #[error("Invalid client reference: {0}")]
    InvalidClientRef(String),

    #[error(transparent)]
    Tx(#[from] TxError),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::SameAccount => "SAME_ACCOUNT",
            TransferError::InvalidClientRef(_) => "INVALID_CLIENT_REF",
            TransferError::Tx(e) => e.code(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            TransferError::Tx(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, TransferError::Tx(e) if e.is_indeterminate())
    }

    /// True if the request was rejected because its `client_ref` was
    /// already used by a committed transfer
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            TransferError::Tx(TxError::Work(LedgerError::Duplicate(_)))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_codes() {
        assert_eq!(TransferError::SameAccount.code(), "SAME_ACCOUNT");
        assert_eq!(TransferError::InvalidAmount.code(), "INVALID_AMOUNT");
        assert_eq!(
            TransferError::from(TxError::Work(LedgerError::NotFound {
                entity: "account",
                id: 3
            }))
            .code(),
            "NOT_FOUND"
        );
        assert_eq!(
            TxError::Commit(LedgerError::Database("reset".into())).code(),
            "COMMIT_FAILED"
        );
    }

    #[test]
    fn test_work_error_passes_through_unchanged() {
        let inner = LedgerError::Constraint("entries_account_id_fkey".into());
        let err = TxError::Work(inner.clone());
        assert_eq!(err.to_string(), inner.to_string());
        assert_eq!(err.work_error(), Some(&inner));
        assert!(!err.is_indeterminate());
    }

    #[test]
    fn test_rollback_failure_keeps_both_errors() {
        let err = TxError::Rollback {
            work: LedgerError::Conflict("deadlock detected".into()),
            rollback: LedgerError::Database("connection closed".into()),
        };

        assert!(err.is_indeterminate());
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "tx err: Lock conflict: deadlock detected, rollback err: Database error: connection closed"
        );
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("Database error: connection closed".to_string())
        );
        assert!(matches!(err.work_error(), Some(LedgerError::Conflict(_))));
    }

    #[test]
    fn test_retry_classification() {
        assert!(TxError::Begin(LedgerError::Connection("refused".into())).is_retryable());
        assert!(TxError::Work(LedgerError::Conflict("lock timeout".into())).is_retryable());
        assert!(TxError::Work(LedgerError::Connection("reset by peer".into())).is_retryable());
        assert!(
            !TxError::Work(LedgerError::Database("relation \"entries\" does not exist".into()))
                .is_retryable()
        );
        assert!(
            !TransferError::from(TxError::Work(LedgerError::Constraint(
                "bigint out of range".into()
            )))
            .is_retryable()
        );
        assert!(!TxError::Work(LedgerError::Duplicate("ref".into())).is_retryable());
        assert!(!TxError::Commit(LedgerError::Database("reset".into())).is_retryable());
        assert!(!TransferError::SameAccount.is_retryable());
    }

    #[test]
    fn test_duplicate_detection() {
        let err = TransferError::from(TxError::Work(LedgerError::Duplicate("ref-9".into())));
        assert!(err.is_duplicate());
        assert!(!TransferError::InvalidAmount.is_duplicate());
    }
}
