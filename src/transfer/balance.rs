//! Balance updates in global lock order
//!
//! Every transaction that touches two accounts must take their row locks in
//! the same order, or two transfers in opposite directions can each hold one
//! lock and wait on the other. The order is ascending account id, decided by
//! the numeric id only and never by which side is debited.

use crate::ledger::{Account, LedgerError, LedgerQueries};

/// Apply two balance deltas, lower account id first.
///
/// Snapshots are returned in argument order and come straight from the
/// store's atomic add, so they reflect this transaction's writes.
pub async fn add_money<Q>(
    q: &mut Q,
    (account_a, delta_a): (i64, i64),
    (account_b, delta_b): (i64, i64),
) -> Result<(Account, Account), LedgerError>
where
    Q: LedgerQueries + ?Sized,
{
    if account_a < account_b {
        let a = q.add_account_balance(account_a, delta_a).await?;
        let b = q.add_account_balance(account_b, delta_b).await?;
        Ok((a, b))
    } else {
        let b = q.add_account_balance(account_b, delta_b).await?;
        let a = q.add_account_balance(account_a, delta_a).await?;
        Ok((a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{CreateAccountParams, LedgerStore, LedgerTx, MemoryLedger};

    fn open(ledger: &MemoryLedger, balance: i64) -> Account {
        ledger.create_account(CreateAccountParams {
            owner: "balance".to_string(),
            balance,
            currency: "CAD".to_string(),
        })
    }

    #[tokio::test]
    async fn test_locks_lower_id_first_in_both_directions() {
        let ledger = MemoryLedger::new();
        let low = open(&ledger, 100);
        let high = open(&ledger, 100);

        let mut tx = ledger.begin().await.unwrap();
        let (from, to) = add_money(&mut tx, (high.id, -10), (low.id, 10))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(from.id, high.id);
        assert_eq!(from.balance, 90);
        assert_eq!(to.id, low.id);
        assert_eq!(to.balance, 110);

        let mut tx = ledger.begin().await.unwrap();
        add_money(&mut tx, (low.id, -5), (high.id, 5)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            ledger.lock_history(),
            vec![vec![low.id, high.id], vec![low.id, high.id]]
        );
    }

    #[tokio::test]
    async fn test_missing_account_fails() {
        let ledger = MemoryLedger::new();
        let account = open(&ledger, 0);

        let mut tx = ledger.begin().await.unwrap();
        let result = add_money(&mut tx, (account.id, -1), (account.id + 1, 1)).await;
        assert!(matches!(result, Err(LedgerError::NotFound { .. })));
    }
}
