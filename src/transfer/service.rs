//! Transfer Orchestrator
//!
//! One transfer = one transaction containing:
//!
//! ```text
//! INSERT transfer ─▶ INSERT debit entry ─▶ INSERT credit entry ─▶ balance += delta (lower id)
//!                                                               ─▶ balance += delta (higher id)
//! ```
//!
//! Any failing step rolls back the whole attempt. Nothing is retried here;
//! the caller decides using [`TransferError::is_retryable`].
//!
//! There is no funds-sufficiency check: a transfer may take an account
//! negative.

use std::time::Instant;
use tracing::{info, warn};

use super::balance::add_money;
use super::coordinator::TransactionCoordinator;
use super::error::TransferError;
use super::types::{TransferOutcome, TransferRequest};
use crate::ledger::{CreateTransferParams, LedgerQueries, LedgerStore};

/// Executes money transfers between ledger accounts
pub struct TransferService<S> {
    coordinator: TransactionCoordinator<S>,
}

impl<S: LedgerStore> TransferService<S> {
    pub fn new(coordinator: TransactionCoordinator<S>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &TransactionCoordinator<S> {
        &self.coordinator
    }

    /// Move `req.amount` from `req.from_account_id` to `req.to_account_id`.
    ///
    /// On success the outcome holds the transfer, both entries and both
    /// accounts as updated by this transfer.
    pub async fn transfer(&self, req: TransferRequest) -> Result<TransferOutcome, TransferError> {
        req.validate()?;

        let started = Instant::now();
        let TransferRequest {
            from_account_id,
            to_account_id,
            amount,
            client_ref,
        } = req;

        let result = self
            .coordinator
            .run_atomic::<TransferOutcome, _>(move |tx, out| {
                Box::pin(async move {
                    out.transfer = tx
                        .create_transfer(CreateTransferParams {
                            from_account_id,
                            to_account_id,
                            amount,
                            client_ref,
                        })
                        .await?;

                    out.from_entry = tx.create_entry(from_account_id, -amount).await?;
                    out.to_entry = tx.create_entry(to_account_id, amount).await?;

                    let (from_account, to_account) = add_money(
                        tx,
                        (from_account_id, -amount),
                        (to_account_id, amount),
                    )
                    .await?;
                    out.from_account = from_account;
                    out.to_account = to_account;

                    Ok::<(), crate::ledger::LedgerError>(())
                })
            })
            .await;

        match result {
            Ok(outcome) => {
                info!(
                    transfer_id = outcome.transfer.id,
                    from_account_id = from_account_id,
                    to_account_id = to_account_id,
                    amount = amount,
                    from_balance = outcome.from_account.balance,
                    to_balance = outcome.to_account.balance,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "Transfer committed"
                );
                Ok(outcome)
            }
            Err(e) => {
                warn!(
                    from_account_id = from_account_id,
                    to_account_id = to_account_id,
                    amount = amount,
                    code = e.code(),
                    indeterminate = e.is_indeterminate(),
                    error = %e,
                    "Transfer failed"
                );
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{CreateAccountParams, LedgerError, MemoryLedger};
    use crate::transfer::TxError;

    fn setup(balances: &[i64]) -> (MemoryLedger, TransferService<MemoryLedger>, Vec<i64>) {
        let ledger = MemoryLedger::new();
        let ids = balances
            .iter()
            .map(|&balance| {
                ledger
                    .create_account(CreateAccountParams {
                        owner: "svc".to_string(),
                        balance,
                        currency: "USD".to_string(),
                    })
                    .id
            })
            .collect();
        let service = TransferService::new(TransactionCoordinator::new(ledger.clone()));
        (ledger, service, ids)
    }

    #[tokio::test]
    async fn test_transfer_happy_path() {
        let (ledger, service, ids) = setup(&[500, 200]);

        let outcome = service
            .transfer(TransferRequest::new(ids[0], ids[1], 75))
            .await
            .unwrap();

        assert_eq!(outcome.transfer.from_account_id, ids[0]);
        assert_eq!(outcome.transfer.to_account_id, ids[1]);
        assert_eq!(outcome.transfer.amount, 75);
        assert_eq!(outcome.from_entry.account_id, ids[0]);
        assert_eq!(outcome.from_entry.amount, -75);
        assert_eq!(outcome.to_entry.account_id, ids[1]);
        assert_eq!(outcome.to_entry.amount, 75);
        assert_eq!(outcome.from_account.balance, 425);
        assert_eq!(outcome.to_account.balance, 275);

        assert_eq!(ledger.account(ids[0]).unwrap().balance, 425);
        assert_eq!(ledger.account(ids[1]).unwrap().balance, 275);
        assert_eq!(ledger.transfer(outcome.transfer.id), Some(outcome.transfer));
    }

    #[tokio::test]
    async fn test_entries_created_debit_first() {
        let (_ledger, service, ids) = setup(&[0, 0]);

        let outcome = service
            .transfer(TransferRequest::new(ids[1], ids[0], 10))
            .await
            .unwrap();
        assert!(outcome.from_entry.id < outcome.to_entry.id);
        assert_eq!(outcome.from_entry.amount + outcome.to_entry.amount, 0);
    }

    #[tokio::test]
    async fn test_negative_balance_allowed() {
        let (_ledger, service, ids) = setup(&[5, 0]);

        let outcome = service
            .transfer(TransferRequest::new(ids[0], ids[1], 50))
            .await
            .unwrap();
        assert_eq!(outcome.from_account.balance, -45);
    }

    #[tokio::test]
    async fn test_validation_runs_before_transaction() {
        let (ledger, service, ids) = setup(&[100, 100]);

        let result = service.transfer(TransferRequest::new(ids[0], ids[0], 10)).await;
        assert_eq!(result, Err(TransferError::SameAccount));

        let result = service.transfer(TransferRequest::new(ids[0], ids[1], 0)).await;
        assert_eq!(result, Err(TransferError::InvalidAmount));

        assert_eq!(ledger.commit_count() + ledger.rollback_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_destination_rolls_back() {
        let (ledger, service, ids) = setup(&[100]);

        let result = service.transfer(TransferRequest::new(ids[0], 999, 10)).await;
        assert!(matches!(
            result,
            Err(TransferError::Tx(TxError::Work(LedgerError::Constraint(_))))
        ));
        assert_eq!(ledger.account(ids[0]).unwrap().balance, 100);
        assert!(ledger.transfers().is_empty());
        assert!(ledger.entries().is_empty());
    }

    #[tokio::test]
    async fn test_client_ref_prevents_double_apply() {
        let (ledger, service, ids) = setup(&[100, 0]);
        let req = TransferRequest::new(ids[0], ids[1], 30).with_client_ref("invoice-17");

        service.transfer(req.clone()).await.unwrap();
        let retry = service.transfer(req).await;

        assert!(retry.as_ref().is_err_and(|e| e.is_duplicate()));
        assert_eq!(ledger.account(ids[0]).unwrap().balance, 70);
        assert_eq!(ledger.account(ids[1]).unwrap().balance, 30);
        assert_eq!(ledger.transfers().len(), 1);
    }
}
