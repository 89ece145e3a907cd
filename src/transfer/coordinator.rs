//! Transaction Coordinator
//!
//! Runs a caller-supplied unit of work inside one database transaction and
//! commits or rolls back based on its result.

use futures::future::BoxFuture;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::error::TxError;
use crate::ledger::{LedgerError, LedgerStore, LedgerTx};

/// Wraps a [`LedgerStore`] and turns units of work into atomic transactions
pub struct TransactionCoordinator<S> {
    store: S,
    timeout: Option<Duration>,
}

impl<S: LedgerStore> TransactionCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            timeout: None,
        }
    }

    /// Abort units of work that run longer than `timeout`.
    ///
    /// An aborted unit of work is rolled back and reported as
    /// `TxError::Work(LedgerError::Timeout)`. The commit itself is not bounded.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Execute `work` atomically.
    ///
    /// `work` is called exactly once with the transaction handle and an
    /// accumulator it fills in as it goes. The accumulator is handed back only
    /// after the commit succeeds.
    ///
    /// - begin fails: `TxError::Begin`, `work` is not called
    /// - `work` fails: rollback, then `TxError::Work` with the original error,
    ///   or `TxError::Rollback` carrying both errors if the rollback failed
    /// - commit fails: `TxError::Commit`
    ///
    /// Dropping the returned future before it completes drops the open
    /// transaction, which rolls it back.
    pub async fn run_atomic<T, F>(&self, work: F) -> Result<T, TxError>
    where
        T: Default + Send,
        F: for<'t> FnOnce(&'t mut S::Tx, &'t mut T) -> BoxFuture<'t, Result<(), LedgerError>>
            + Send,
    {
        let mut tx = self.store.begin().await.map_err(|e| {
            warn!(error = %e, "Failed to begin transaction");
            TxError::Begin(e)
        })?;

        let mut output = T::default();
        let result = {
            let pending = work(&mut tx, &mut output);
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, pending)
                    .await
                    .unwrap_or(Err(LedgerError::Timeout)),
                None => pending.await,
            }
        };

        if let Err(work_err) = result {
            return match tx.rollback().await {
                Ok(()) => {
                    debug!(error = %work_err, "Unit of work failed, rolled back");
                    Err(TxError::Work(work_err))
                }
                Err(rollback_err) => {
                    error!(
                        error = %work_err,
                        rollback_error = %rollback_err,
                        "Rollback failed, transaction outcome is indeterminate"
                    );
                    Err(TxError::Rollback {
                        work: work_err,
                        rollback: rollback_err,
                    })
                }
            };
        }

        tx.commit().await.map_err(|e| {
            error!(error = %e, "Commit failed after successful unit of work");
            TxError::Commit(e)
        })?;

        Ok(output)
    }
}
