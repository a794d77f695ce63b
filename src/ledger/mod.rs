//! Remote ledger service interface
//!
//! The harness never implements banking logic. Everything it knows about
//! balances comes through [`LedgerApi`], which has one production
//! implementation ([`HttpLedger`]) talking to the service over HTTP.
//!
//! ## Endpoints
//!
//! - `POST /accounts` with `{"initialBalance": n}` → `{"id", "balance"}`
//! - `GET /accounts/{id}` → `{"id", "balance"}`
//! - `POST /accounts/transfer` with `{"fromAccountId", "toAccountId", "amount"}`

pub mod error;
pub mod http;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::money::Amount;

pub use error::{LedgerError, LedgerResult};
pub use http::HttpLedger;

/// Opaque account identifier assigned by the ledger service
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        AccountId(value.to_string())
    }
}

impl From<String> for AccountId {
    fn from(value: String) -> Self {
        AccountId(value)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account state as reported by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub id: AccountId,
    pub balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub initial_balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Amount,
}

/// Body of a `409 Conflict` answer to an account creation
#[derive(Debug, Clone, Deserialize)]
pub struct ExistingAccount {
    pub id: AccountId,
}

/// Operations the harness needs from the ledger service
///
/// Implementations must be safe to share between all workers of a run.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Create an account funded with `initial_balance`
    async fn create_account(&self, initial_balance: Amount) -> LedgerResult<AccountInfo>;

    /// Fetch the current state of an account
    async fn get_account(&self, id: &AccountId) -> LedgerResult<AccountInfo>;

    /// Move `amount` from one account to another
    async fn transfer(&self, from: &AccountId, to: &AccountId, amount: Amount)
    -> LedgerResult<()>;
}
