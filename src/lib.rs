//! ledger_tx - atomic money transfers on a relational ledger
//!
//! Moves money between two accounts as one transaction: a transfer row, a
//! debit and a credit entry, and two balance updates. Concurrent transfers
//! on the same accounts queue on row locks and never deadlock.
//!
//! # Modules
//!
//! - [`ledger`] - Ledger rows, data-access traits, PostgreSQL and in-memory stores
//! - [`transfer`] - Transaction coordinator and transfer orchestration
//! - [`db`] - PostgreSQL connection pool
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod db;
pub mod ledger;
pub mod logging;
pub mod transfer;

// Convenient re-exports at crate root
pub use ledger::{
    Account, Entry, LedgerError, LedgerQueries, LedgerStore, LedgerTx, MemoryLedger, PgLedger,
    Transfer,
};
pub use transfer::{
    TransactionCoordinator, TransferError, TransferOutcome, TransferRequest, TransferService,
    TxError,
};
