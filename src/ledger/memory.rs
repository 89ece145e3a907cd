//! In-memory ledger store
//!
//! Behaves like the PostgreSQL backend where it matters for transfers:
//!
//! - writes are buffered per transaction and only become visible on commit
//! - `add_account_balance` takes a per-account row lock that is held until the
//!   transaction ends, so two transactions locking the same accounts in
//!   opposite order really do block each other forever
//! - `client_ref` behaves like a unique index: a second insert of the same
//!   ref waits for the owning transaction, then fails only if it committed
//! - ids come from shared sequences and are not reused after rollback
//!
//! Faults can be injected to exercise rollback and commit failure paths.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OwnedMutexGuard;
use tracing::trace;

use super::error::LedgerError;
use super::models::{Account, CreateAccountParams, CreateTransferParams, Entry, Transfer};
use super::{LedgerQueries, LedgerStore, LedgerTx};

#[derive(Default)]
struct State {
    accounts: BTreeMap<i64, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
    /// Client refs of committed transfers
    client_refs: HashSet<String>,
    account_seq: i64,
    entry_seq: i64,
    transfer_seq: i64,
}

/// Injected failures, read once per transaction at `begin`
#[derive(Debug, Clone, Default)]
struct Faults {
    fail_begin: bool,
    fail_entry_at: Option<usize>,
    fail_rollback: bool,
    fail_commit: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    row_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
    /// Index-entry locks for in-flight client refs
    ref_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    faults: Mutex<Faults>,
    lock_history: Mutex<Vec<Vec<i64>>>,
    commit_count: AtomicUsize,
    rollback_count: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn row_lock(&self, account_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        lock(&self.row_locks)
            .entry(account_id)
            .or_default()
            .clone()
    }

    fn ref_lock(&self, client_ref: &str) -> Arc<tokio::sync::Mutex<()>> {
        lock(&self.ref_locks)
            .entry(client_ref.to_string())
            .or_default()
            .clone()
    }
}

/// In-process ledger store. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    shared: Arc<Shared>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a committed account directly
    pub fn create_account(&self, params: CreateAccountParams) -> Account {
        let mut state = lock(&self.shared.state);
        state.account_seq += 1;
        let account = Account {
            id: state.account_seq,
            owner: params.owner,
            balance: params.balance,
            currency: params.currency,
            created_at: Utc::now(),
        };
        state.accounts.insert(account.id, account.clone());
        account
    }

    pub fn account(&self, id: i64) -> Option<Account> {
        lock(&self.shared.state).accounts.get(&id).cloned()
    }

    pub fn entry(&self, id: i64) -> Option<Entry> {
        lock(&self.shared.state).entries.get(&id).cloned()
    }

    pub fn transfer(&self, id: i64) -> Option<Transfer> {
        lock(&self.shared.state).transfers.get(&id).cloned()
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        lock(&self.shared.state).transfers.values().cloned().collect()
    }

    pub fn entries(&self) -> Vec<Entry> {
        lock(&self.shared.state).entries.values().cloned().collect()
    }

    /// Account ids in the order each finished transaction locked them
    pub fn lock_history(&self) -> Vec<Vec<i64>> {
        lock(&self.shared.lock_history).clone()
    }

    pub fn commit_count(&self) -> usize {
        self.shared.commit_count.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> usize {
        self.shared.rollback_count.load(Ordering::SeqCst)
    }

    pub fn set_fail_begin(&self, fail: bool) {
        lock(&self.shared.faults).fail_begin = fail;
    }

    /// Fail the `n`th `create_entry` call (1-based) of every new transaction
    pub fn set_fail_entry_at(&self, n: Option<usize>) {
        lock(&self.shared.faults).fail_entry_at = n;
    }

    pub fn set_fail_rollback(&self, fail: bool) {
        lock(&self.shared.faults).fail_rollback = fail;
    }

    pub fn set_fail_commit(&self, fail: bool) {
        lock(&self.shared.faults).fail_commit = fail;
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, LedgerError> {
        let faults = lock(&self.shared.faults).clone();
        if faults.fail_begin {
            return Err(LedgerError::Connection("connection refused".to_string()));
        }

        Ok(MemoryTx {
            shared: self.shared.clone(),
            faults,
            accounts: BTreeMap::new(),
            entries: Vec::new(),
            transfers: Vec::new(),
            row_guards: Vec::new(),
            ref_guards: Vec::new(),
            lock_order: Vec::new(),
            entry_calls: 0,
            finished: false,
        })
    }
}

/// Open in-memory transaction. Dropping it rolls back.
pub struct MemoryTx {
    shared: Arc<Shared>,
    faults: Faults,
    /// Accounts created or updated in this transaction
    accounts: BTreeMap<i64, Account>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
    row_guards: Vec<OwnedMutexGuard<()>>,
    ref_guards: Vec<OwnedMutexGuard<()>>,
    lock_order: Vec<i64>,
    entry_calls: usize,
    finished: bool,
}

impl MemoryTx {
    fn account_exists(&self, id: i64) -> bool {
        self.accounts.contains_key(&id) || lock(&self.shared.state).accounts.contains_key(&id)
    }

    fn visible_account(&self, id: i64) -> Option<Account> {
        self.accounts
            .get(&id)
            .cloned()
            .or_else(|| lock(&self.shared.state).accounts.get(&id).cloned())
    }

    async fn lock_row(&mut self, account_id: i64) {
        if self.lock_order.contains(&account_id) {
            return;
        }

        let row = self.shared.row_lock(account_id);
        trace!(account_id = account_id, "Waiting for row lock");
        let guard = row.lock_owned().await;
        self.row_guards.push(guard);
        self.lock_order.push(account_id);
    }

    /// Take the index-entry lock for `client_ref`, waiting out any open
    /// transaction that inserted it, then check committed refs.
    async fn lock_client_ref(&mut self, client_ref: &str) -> Result<(), LedgerError> {
        let already_held = self
            .transfers
            .iter()
            .any(|t| t.client_ref.as_deref() == Some(client_ref));

        if !already_held {
            let entry = self.shared.ref_lock(client_ref);
            trace!(client_ref = client_ref, "Waiting for client_ref lock");
            self.ref_guards.push(entry.lock_owned().await);
        }

        if already_held || lock(&self.shared.state).client_refs.contains(client_ref) {
            return Err(LedgerError::Duplicate(format!(
                "client_ref {} already exists",
                client_ref
            )));
        }
        Ok(())
    }

    /// Release locks and record the lock order. Pending writes are discarded
    /// unless `apply` already moved them into shared state.
    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        self.transfers.clear();
        self.entries.clear();
        self.accounts.clear();

        self.close();
    }

    fn close(&mut self) {
        if !self.lock_order.is_empty() {
            lock(&self.shared.lock_history).push(std::mem::take(&mut self.lock_order));
        }
        self.row_guards.clear();
        self.ref_guards.clear();
    }

    fn apply(&mut self) {
        let mut state = lock(&self.shared.state);
        for (id, account) in std::mem::take(&mut self.accounts) {
            state.accounts.insert(id, account);
        }
        for entry in self.entries.drain(..) {
            state.entries.insert(entry.id, entry);
        }
        for transfer in self.transfers.drain(..) {
            if let Some(client_ref) = &transfer.client_ref {
                state.client_refs.insert(client_ref.clone());
            }
            state.transfers.insert(transfer.id, transfer);
        }
    }
}

#[async_trait]
impl LedgerQueries for MemoryTx {
    async fn create_account(
        &mut self,
        params: CreateAccountParams,
    ) -> Result<Account, LedgerError> {
        let id = {
            let mut state = lock(&self.shared.state);
            state.account_seq += 1;
            state.account_seq
        };
        let account = Account {
            id,
            owner: params.owner,
            balance: params.balance,
            currency: params.currency,
            created_at: Utc::now(),
        };
        self.accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, LedgerError> {
        if params.amount <= 0 {
            return Err(LedgerError::Constraint(
                "transfers_amount_check: amount must be positive".to_string(),
            ));
        }
        for account_id in [params.from_account_id, params.to_account_id] {
            if !self.account_exists(account_id) {
                return Err(LedgerError::Constraint(format!(
                    "transfers references missing account {}",
                    account_id
                )));
            }
        }

        if let Some(client_ref) = &params.client_ref {
            self.lock_client_ref(client_ref).await?;
        }

        let id = {
            let mut state = lock(&self.shared.state);
            state.transfer_seq += 1;
            state.transfer_seq
        };

        let transfer = Transfer {
            id,
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            client_ref: params.client_ref,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn create_entry(&mut self, account_id: i64, amount: i64) -> Result<Entry, LedgerError> {
        self.entry_calls += 1;
        if self.faults.fail_entry_at == Some(self.entry_calls) {
            return Err(LedgerError::Database(format!(
                "injected failure on entry #{}",
                self.entry_calls
            )));
        }
        if !self.account_exists(account_id) {
            return Err(LedgerError::Constraint(format!(
                "entries references missing account {}",
                account_id
            )));
        }

        let id = {
            let mut state = lock(&self.shared.state);
            state.entry_seq += 1;
            state.entry_seq
        };
        let entry = Entry {
            id,
            account_id,
            amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn add_account_balance(
        &mut self,
        account_id: i64,
        delta: i64,
    ) -> Result<Account, LedgerError> {
        if !self.account_exists(account_id) {
            return Err(LedgerError::NotFound {
                entity: "account",
                id: account_id,
            });
        }

        self.lock_row(account_id).await;

        // Row lock held: no other transaction can commit a change to this account
        let mut account = self
            .visible_account(account_id)
            .ok_or(LedgerError::NotFound {
                entity: "account",
                id: account_id,
            })?;
        account.balance = account.balance.checked_add(delta).ok_or_else(|| {
            LedgerError::Constraint(format!("balance overflow on account {}", account_id))
        })?;

        self.accounts.insert(account_id, account.clone());
        Ok(account)
    }

    async fn get_account(&mut self, id: i64) -> Result<Account, LedgerError> {
        self.visible_account(id).ok_or(LedgerError::NotFound {
            entity: "account",
            id,
        })
    }

    async fn get_entry(&mut self, id: i64) -> Result<Entry, LedgerError> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .or_else(|| lock(&self.shared.state).entries.get(&id).cloned())
            .ok_or(LedgerError::NotFound { entity: "entry", id })
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, LedgerError> {
        self.transfers
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .or_else(|| lock(&self.shared.state).transfers.get(&id).cloned())
            .ok_or(LedgerError::NotFound {
                entity: "transfer",
                id,
            })
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn commit(mut self) -> Result<(), LedgerError> {
        if self.faults.fail_commit {
            self.finish();
            return Err(LedgerError::Connection(
                "connection reset during commit".to_string(),
            ));
        }

        self.apply();
        self.finished = true;
        self.close();
        self.shared.commit_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), LedgerError> {
        self.finish();
        self.shared.rollback_count.fetch_add(1, Ordering::SeqCst);

        if self.faults.fail_rollback {
            return Err(LedgerError::Connection(
                "connection lost during rollback".to_string(),
            ));
        }
        Ok(())
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        self.finish();
    }
}
