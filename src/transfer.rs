//! Transfer operation - "move X from A to B"
//!
//! ```text
//! Created ──validate──► Validated ──submit──► Submitted ──ack──► Completed
//!    │                      │                     │
//!    └──────────────────────┴─────────────────────┴──error──► Failed
//! ```
//!
//! Log entries are only appended in the `Completed` transition. A failed
//! operation is final; retrying means building a new operation, and the caller
//! owns the risk that a lost response hid a transfer the service did perform.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument, trace};

use crate::actor::{Actor, record_transfer};
use crate::ledger::{AccountId, LedgerError};
use crate::money::Amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Created,
    Validated,
    Submitted,
    Completed,
    Failed,
}

/// How much a transfer moves
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransferAmount {
    Fixed(Amount),

    /// Fraction of the source balance queried during validation
    PercentOfBalance(f64),
}

impl TransferAmount {
    pub fn resolve(&self, source_balance: Amount) -> Amount {
        match self {
            TransferAmount::Fixed(amount) => *amount,
            TransferAmount::PercentOfBalance(fraction) => source_balance.fraction(*fraction),
        }
    }
}

/// A completed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub source: AccountId,
    pub destination: AccountId,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// `execute` was called on an operation that already ran
    AlreadyExecuted(TransferState),

    /// Rejected locally, the transfer endpoint was never called
    Validation(LedgerError),

    /// A remote call failed
    Remote(LedgerError),
}

impl TransferError {
    pub fn ledger_error(&self) -> Option<&LedgerError> {
        match self {
            TransferError::Validation(e) | TransferError::Remote(e) => Some(e),
            TransferError::AlreadyExecuted(_) => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        self.ledger_error().and_then(LedgerError::status_code)
    }

    /// Failure class for aggregation, e.g. `rejected: insufficient funds`
    pub fn kind(&self) -> String {
        match self {
            TransferError::AlreadyExecuted(_) => "already executed".to_string(),
            TransferError::Validation(e) => format!("rejected: {}", e.kind()),
            TransferError::Remote(e) => format!("failed: {}", e.kind()),
        }
    }

    fn classify(err: LedgerError) -> Self {
        if err.is_validation() {
            TransferError::Validation(err)
        } else {
            TransferError::Remote(err)
        }
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::AlreadyExecuted(state) => {
                write!(f, "transfer already executed (state {state:?})")
            }
            TransferError::Validation(e) => write!(f, "transfer rejected: {e}"),
            TransferError::Remote(e) => write!(f, "transfer failed: {e}"),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Validation(e) | TransferError::Remote(e) => Some(e),
            TransferError::AlreadyExecuted(_) => None,
        }
    }
}

pub struct TransferOperation {
    source: Arc<Actor>,
    destination: Arc<Actor>,
    amount: TransferAmount,
    resolved: Option<Amount>,
    state: TransferState,
}

impl TransferOperation {
    pub fn new(source: Arc<Actor>, destination: Arc<Actor>, amount: Amount) -> Self {
        Self::with_amount(source, destination, TransferAmount::Fixed(amount))
    }

    pub fn with_amount(
        source: Arc<Actor>,
        destination: Arc<Actor>,
        amount: TransferAmount,
    ) -> Self {
        Self {
            source,
            destination,
            amount,
            resolved: None,
            state: TransferState::Created,
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// The amount actually moved, known once validated
    pub fn amount(&self) -> Option<Amount> {
        self.resolved
    }

    pub fn source(&self) -> &Arc<Actor> {
        &self.source
    }

    pub fn destination(&self) -> &Arc<Actor> {
        &self.destination
    }

    /// Run the operation to `Completed` or `Failed`
    #[instrument(skip(self), fields(from = %self.source.name(), to = %self.destination.name()))]
    pub async fn execute(&mut self) -> Result<TransferRecord, TransferError> {
        if self.state != TransferState::Created {
            return Err(TransferError::AlreadyExecuted(self.state));
        }

        let result = self.run().await;
        if let Err(e) = &result {
            debug!("{e}");
            self.state = TransferState::Failed;
        }
        result
    }

    async fn run(&mut self) -> Result<TransferRecord, TransferError> {
        let (source_id, destination_id, amount) = self.validate().await?;

        self.state = TransferState::Submitted;
        self.source
            .ledger()
            .transfer(&source_id, &destination_id, amount)
            .await
            .map_err(TransferError::Remote)?;

        record_transfer(&self.source, &self.destination, amount).map_err(TransferError::classify)?;
        self.state = TransferState::Completed;
        trace!("transfer of {amount} completed");

        Ok(TransferRecord {
            source: source_id,
            destination: destination_id,
            amount,
        })
    }

    async fn validate(&mut self) -> Result<(AccountId, AccountId, Amount), TransferError> {
        if self.source.seq() == self.destination.seq() {
            return Err(TransferError::Validation(LedgerError::SameAccount(
                self.source.name().to_string(),
            )));
        }

        let source_id = self.source.account().await.map_err(TransferError::classify)?;
        let destination_id = self
            .destination
            .account()
            .await
            .map_err(TransferError::classify)?;

        let available = self
            .source
            .query_balance()
            .await
            .map_err(TransferError::classify)?;

        let requested = self.amount.resolve(available);
        if !requested.is_positive() {
            return Err(TransferError::Validation(LedgerError::InvalidAmount(
                requested,
            )));
        }
        if available < requested {
            return Err(TransferError::Validation(LedgerError::InsufficientFunds {
                available,
                requested,
            }));
        }

        self.resolved = Some(requested);
        self.state = TransferState::Validated;
        Ok((source_id, destination_id, requested))
    }
}
