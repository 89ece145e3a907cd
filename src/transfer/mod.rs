//! Atomic ledger transfers
//!
//! # Layers
//!
//! ```text
//! TransferService ──▶ TransactionCoordinator ──▶ LedgerStore / LedgerTx
//!   (orchestrator)      (begin/commit/rollback)    (single-row operations)
//! ```
//!
//! # Safety Invariants
//!
//! 1. **All or nothing**: transfer row, both entries and both balance
//!    updates commit together or not at all
//! 2. **Atomic delta**: balances change only through the store-evaluated
//!    `add_account_balance`, never read-then-write
//! 3. **Lock order**: account rows are locked in ascending id order, so
//!    concurrent transfers queue but never deadlock
//! 4. **No hidden retries**: every failure is returned to the caller

pub mod balance;
pub mod coordinator;
pub mod error;
pub mod service;
pub mod types;

pub use balance::add_money;
pub use coordinator::TransactionCoordinator;
pub use error::{TransferError, TxError};
pub use service::TransferService;
pub use types::{TransferOutcome, TransferRequest};
