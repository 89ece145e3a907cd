//! Ledger Data Access
//!
//! Single-row operations on accounts, entries and transfers. Every operation
//! runs against whatever transaction it is handed; composing several of them
//! into one atomic step is the job of [`crate::transfer::TransactionCoordinator`].
//!
//! Two backends implement the traits:
//! - [`PgLedger`]: PostgreSQL via `sqlx`
//! - [`MemoryLedger`]: in-process store with real row locks, used by tests

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod schema;

pub use error::LedgerError;
pub use memory::{MemoryLedger, MemoryTx};
pub use models::{Account, CreateAccountParams, CreateTransferParams, Entry, Transfer};
pub use postgres::{PgLedger, PgLedgerTx};

use async_trait::async_trait;

/// Transaction-scoped ledger operations
#[async_trait]
pub trait LedgerQueries: Send {
    async fn create_account(
        &mut self,
        params: CreateAccountParams,
    ) -> Result<Account, LedgerError>;

    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, LedgerError>;

    async fn create_entry(&mut self, account_id: i64, amount: i64) -> Result<Entry, LedgerError>;

    /// Add `delta` to the account balance and return the updated row.
    ///
    /// The addition is evaluated by the store and takes the account's row
    /// lock until the transaction ends. Never emulate this with a read
    /// followed by a write.
    async fn add_account_balance(
        &mut self,
        account_id: i64,
        delta: i64,
    ) -> Result<Account, LedgerError>;

    async fn get_account(&mut self, id: i64) -> Result<Account, LedgerError>;

    async fn get_entry(&mut self, id: i64) -> Result<Entry, LedgerError>;

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, LedgerError>;
}

/// An open transaction. Dropping it without `commit` rolls it back.
#[async_trait]
pub trait LedgerTx: LedgerQueries {
    async fn commit(self) -> Result<(), LedgerError>;

    async fn rollback(self) -> Result<(), LedgerError>;
}

/// Source of transactions over a shared connection pool
#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Tx: LedgerTx + 'static;

    async fn begin(&self) -> Result<Self::Tx, LedgerError>;
}
