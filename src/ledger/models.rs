//! Ledger rows: accounts, entries and transfers
//!
//! Money is always an `i64` in the smallest currency unit (cents, satoshis).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Account row. Only `balance` ever changes after creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: i64,
    pub owner: String,
    pub balance: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Ledger entry. Negative amount = debit, positive = credit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Entry {
    pub id: i64,
    pub account_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Transfer record, write-once
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    /// Caller-supplied idempotency reference, unique across transfers
    pub client_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccountParams {
    pub owner: String,
    pub balance: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransferParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    pub client_ref: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_json_field_names() {
        let transfer = Transfer {
            id: 7,
            from_account_id: 1,
            to_account_id: 2,
            amount: 10,
            client_ref: None,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&transfer).unwrap();
        assert_eq!(json["from_account_id"], 1);
        assert_eq!(json["to_account_id"], 2);
        assert_eq!(json["amount"], 10);
        assert!(json["client_ref"].is_null());
    }
}
