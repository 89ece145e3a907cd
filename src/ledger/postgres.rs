//! PostgreSQL ledger backend
//!
//! Balance changes go through `UPDATE ... SET balance = balance + $1 RETURNING`,
//! so the row lock is taken and the sum computed by PostgreSQL in one statement.

use async_trait::async_trait;
use sqlx::postgres::PgExecutor;
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use tracing::debug;

use super::error::LedgerError;
use super::models::{Account, CreateAccountParams, CreateTransferParams, Entry, Transfer};
use super::{LedgerQueries, LedgerStore, LedgerTx};

const ACCOUNT_COLUMNS: &str = "id, owner, balance, currency, created_at";
const ENTRY_COLUMNS: &str = "id, account_id, amount, created_at";
const TRANSFER_COLUMNS: &str = "id, from_account_id, to_account_id, amount, client_ref, created_at";

/// Ledger store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
    lock_timeout: Option<Duration>,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: None,
        }
    }

    /// Bound every row-lock wait inside transactions opened by this store.
    ///
    /// A wait that exceeds the bound fails with [`LedgerError::Conflict`].
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Read committed account state outside any transaction
    pub async fn get_account(&self, id: i64) -> Result<Account, LedgerError> {
        fetch_account(&self.pool, id).await
    }

    pub async fn get_entry(&self, id: i64) -> Result<Entry, LedgerError> {
        fetch_entry(&self.pool, id).await
    }

    pub async fn get_transfer(&self, id: i64) -> Result<Transfer, LedgerError> {
        fetch_transfer(&self.pool, id).await
    }

    /// Create an account in its own implicit transaction
    pub async fn create_account(
        &self,
        params: CreateAccountParams,
    ) -> Result<Account, LedgerError> {
        insert_account(&self.pool, params).await
    }
}

#[async_trait]
impl LedgerStore for PgLedger {
    type Tx = PgLedgerTx;

    async fn begin(&self) -> Result<PgLedgerTx, LedgerError> {
        let mut tx = self.pool.begin().await?;

        if let Some(timeout) = self.lock_timeout {
            sqlx::query(&lock_timeout_stmt(timeout))
                .execute(&mut *tx)
                .await?;
        }

        Ok(PgLedgerTx { tx })
    }
}

/// `SET` does not take bind parameters. Zero disables the timeout in
/// PostgreSQL, so anything shorter than a millisecond rounds up to one.
fn lock_timeout_stmt(timeout: Duration) -> String {
    format!("SET LOCAL lock_timeout = {}", timeout.as_millis().max(1))
}

/// Ledger operations bound to one open PostgreSQL transaction
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerQueries for PgLedgerTx {
    async fn create_account(
        &mut self,
        params: CreateAccountParams,
    ) -> Result<Account, LedgerError> {
        insert_account(&mut *self.tx, params).await
    }

    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, LedgerError> {
        let sql = format!(
            "INSERT INTO transfers (from_account_id, to_account_id, amount, client_ref) \
             VALUES ($1, $2, $3, $4) RETURNING {TRANSFER_COLUMNS}"
        );
        let transfer = sqlx::query_as::<_, Transfer>(&sql)
            .bind(params.from_account_id)
            .bind(params.to_account_id)
            .bind(params.amount)
            .bind(params.client_ref)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(transfer)
    }

    async fn create_entry(&mut self, account_id: i64, amount: i64) -> Result<Entry, LedgerError> {
        let sql = format!(
            "INSERT INTO entries (account_id, amount) VALUES ($1, $2) RETURNING {ENTRY_COLUMNS}"
        );
        let entry = sqlx::query_as::<_, Entry>(&sql)
            .bind(account_id)
            .bind(amount)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(entry)
    }

    async fn add_account_balance(
        &mut self,
        account_id: i64,
        delta: i64,
    ) -> Result<Account, LedgerError> {
        let sql = format!(
            "UPDATE accounts SET balance = balance + $1 WHERE id = $2 RETURNING {ACCOUNT_COLUMNS}"
        );
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(delta)
            .bind(account_id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or(LedgerError::NotFound {
                entity: "account",
                id: account_id,
            })?;

        debug!(
            account_id = account_id,
            delta = delta,
            balance = account.balance,
            "Account balance updated"
        );
        Ok(account)
    }

    async fn get_account(&mut self, id: i64) -> Result<Account, LedgerError> {
        fetch_account(&mut *self.tx, id).await
    }

    async fn get_entry(&mut self, id: i64) -> Result<Entry, LedgerError> {
        fetch_entry(&mut *self.tx, id).await
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, LedgerError> {
        fetch_transfer(&mut *self.tx, id).await
    }
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn commit(self) -> Result<(), LedgerError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), LedgerError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

async fn insert_account<'e, E: PgExecutor<'e>>(
    executor: E,
    params: CreateAccountParams,
) -> Result<Account, LedgerError> {
    let sql = format!(
        "INSERT INTO accounts (owner, balance, currency) VALUES ($1, $2, $3) \
         RETURNING {ACCOUNT_COLUMNS}"
    );
    let account = sqlx::query_as::<_, Account>(&sql)
        .bind(params.owner)
        .bind(params.balance)
        .bind(params.currency)
        .fetch_one(executor)
        .await?;

    Ok(account)
}

async fn fetch_account<'e, E: PgExecutor<'e>>(executor: E, id: i64) -> Result<Account, LedgerError> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
    sqlx::query_as::<_, Account>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(LedgerError::NotFound {
            entity: "account",
            id,
        })
}

async fn fetch_entry<'e, E: PgExecutor<'e>>(executor: E, id: i64) -> Result<Entry, LedgerError> {
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = $1");
    sqlx::query_as::<_, Entry>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(LedgerError::NotFound { entity: "entry", id })
}

async fn fetch_transfer<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
) -> Result<Transfer, LedgerError> {
    let sql = format!("SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = $1");
    sqlx::query_as::<_, Transfer>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(LedgerError::NotFound {
            entity: "transfer",
            id,
        })
}
