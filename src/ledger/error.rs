//! Error types for ledger operations

use std::fmt;

use crate::money::Amount;

use super::AccountId;

/// Result type alias for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur while driving the ledger service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Initial balance must be strictly positive
    InvalidInitialBalance(Amount),

    /// Transfer amount must be strictly positive
    InvalidAmount(Amount),

    /// Source balance does not cover the transfer
    InsufficientFunds { available: Amount, requested: Amount },

    /// Source and destination are the same actor
    SameAccount(String),

    /// The actor has no account yet
    NoAccount(String),

    /// The service already holds an account for this identity
    AlreadyExists { id: AccountId },

    /// Connection or transport failure
    Network(String),

    /// The request did not complete within the configured timeout
    Timeout,

    /// The service answered with a non-success status code
    Status { code: u16 },

    /// The response body could not be decoded
    Decode(String),
}

impl LedgerError {
    /// Errors raised locally before any remote call was made
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidInitialBalance(_)
                | LedgerError::InvalidAmount(_)
                | LedgerError::InsufficientFunds { .. }
                | LedgerError::SameAccount(_)
                | LedgerError::NoAccount(_)
        )
    }

    /// Errors worth retrying for idempotent requests
    pub fn is_transient(&self) -> bool {
        match self {
            LedgerError::Network(_) | LedgerError::Timeout => true,
            LedgerError::Status { code } => *code >= 500,
            _ => false,
        }
    }

    /// Short label for the kind of failure, without the values it carries
    pub fn kind(&self) -> String {
        match self {
            LedgerError::InvalidInitialBalance(_) => "invalid initial balance".to_string(),
            LedgerError::InvalidAmount(_) => "invalid amount".to_string(),
            LedgerError::InsufficientFunds { .. } => "insufficient funds".to_string(),
            LedgerError::SameAccount(_) => "same account".to_string(),
            LedgerError::NoAccount(_) => "no account".to_string(),
            LedgerError::AlreadyExists { .. } => "account already exists".to_string(),
            LedgerError::Network(_) => "network error".to_string(),
            LedgerError::Timeout => "timeout".to_string(),
            LedgerError::Status { code } => format!("status {code}"),
            LedgerError::Decode(_) => "undecodable response".to_string(),
        }
    }

    /// HTTP status code carried by the error, if the service answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            LedgerError::Status { code } => Some(*code),
            LedgerError::AlreadyExists { .. } => Some(409),
            _ => None,
        }
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::InvalidInitialBalance(amount) => {
                write!(f, "initial balance must be greater than zero, got {amount}")
            }
            LedgerError::InvalidAmount(amount) => {
                write!(f, "transfer amount must be greater than zero, got {amount}")
            }
            LedgerError::InsufficientFunds {
                available,
                requested,
            } => write!(
                f,
                "insufficient balance: requested {requested}, available {available}"
            ),
            LedgerError::SameAccount(name) => {
                write!(f, "cannot transfer from {name} to itself")
            }
            LedgerError::NoAccount(name) => write!(f, "{name} has no account yet"),
            LedgerError::AlreadyExists { id } => {
                write!(f, "account already created for this user: {id}")
            }
            LedgerError::Network(msg) => write!(f, "request failed: {msg}"),
            LedgerError::Timeout => write!(f, "request timed out"),
            LedgerError::Status { code } => write!(f, "ledger responded with status {code}"),
            LedgerError::Decode(msg) => write!(f, "failed to decode response: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LedgerError::Timeout
        } else if err.is_decode() {
            LedgerError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            LedgerError::Status {
                code: status.as_u16(),
            }
        } else {
            LedgerError::Network(err.to_string())
        }
    }
}
