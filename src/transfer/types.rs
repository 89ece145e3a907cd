//! Transfer request and outcome

use serde::{Deserialize, Serialize};

use super::error::TransferError;
use crate::ledger::{Account, Entry, Transfer};

/// Longest accepted `client_ref`, matching the column width
pub const MAX_CLIENT_REF_LEN: usize = 128;

/// Move `amount` from one account to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    /// Caller-chosen idempotency reference. A transfer whose reference is
    /// held by an open transaction waits for it; once that one commits, the
    /// newer transfer is rejected instead of applied.
    #[serde(default)]
    pub client_ref: Option<String>,
}

impl TransferRequest {
    pub fn new(from_account_id: i64, to_account_id: i64, amount: i64) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
            client_ref: None,
        }
    }

    pub fn with_client_ref(mut self, client_ref: impl Into<String>) -> Self {
        self.client_ref = Some(client_ref.into());
        self
    }

    pub fn validate(&self) -> Result<(), TransferError> {
        if self.amount <= 0 {
            return Err(TransferError::InvalidAmount);
        }

        if self.from_account_id == self.to_account_id {
            return Err(TransferError::SameAccount);
        }

        if let Some(client_ref) = &self.client_ref
            && (client_ref.trim().is_empty() || client_ref.len() > MAX_CLIENT_REF_LEN)
        {
            return Err(TransferError::InvalidClientRef(client_ref.clone()));
        }

        Ok(())
    }
}

/// Rows written by a committed transfer. Account snapshots are the balances
/// right after this transfer's update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_amount() {
        assert_eq!(
            TransferRequest::new(1, 2, 0).validate(),
            Err(TransferError::InvalidAmount)
        );
        assert_eq!(
            TransferRequest::new(1, 2, -10).validate(),
            Err(TransferError::InvalidAmount)
        );
        assert!(TransferRequest::new(1, 2, 1).validate().is_ok());
    }

    #[test]
    fn test_validate_same_account() {
        assert_eq!(
            TransferRequest::new(7, 7, 10).validate(),
            Err(TransferError::SameAccount)
        );
    }

    #[test]
    fn test_validate_client_ref() {
        assert!(
            TransferRequest::new(1, 2, 10)
                .with_client_ref("order-1")
                .validate()
                .is_ok()
        );
        assert!(matches!(
            TransferRequest::new(1, 2, 10).with_client_ref("  ").validate(),
            Err(TransferError::InvalidClientRef(_))
        ));
        assert!(matches!(
            TransferRequest::new(1, 2, 10)
                .with_client_ref("x".repeat(MAX_CLIENT_REF_LEN + 1))
                .validate(),
            Err(TransferError::InvalidClientRef(_))
        ));
    }

    #[test]
    fn test_request_deserialize_without_client_ref() {
        let req: TransferRequest =
            serde_json::from_str(r#"{"from_account_id":1,"to_account_id":2,"amount":10}"#)
                .unwrap();
        assert_eq!(req, TransferRequest::new(1, 2, 10));
    }
}
