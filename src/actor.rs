//! Actor - local proxy for one ledger account
//!
//! An actor owns exactly one remote account and a private, append-only log of
//! every balance change it believes happened to that account. After a run the
//! verifier folds the log and compares the result against the service.
//!
//! ## Shared state
//!
//! ```text
//!   workers ──ensure_account()──► OnceCell<AccountId>   (one creation, others wait)
//!   workers ──record/transfer───► RwLock<Vec<Entry>>    (exclusive append)
//!   verifier ─expected_balance──► RwLock<Vec<Entry>>    (shared snapshot)
//! ```
//!
//! Every actor has a process-unique sequence number. Whenever two logs are
//! locked together (transfer pairs, cross-actor snapshots) the locks are taken
//! in sequence order.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::OnceCell;
use tracing::{debug, instrument, trace};

use crate::ledger::{AccountId, AccountInfo, LedgerApi, LedgerError, LedgerResult};
use crate::money::Amount;

static NEXT_ACTOR_SEQ: AtomicU64 = AtomicU64::new(1);

/// One balance change an actor believes happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionLogEntry {
    /// Account the change applies to
    pub account_id: AccountId,

    /// Positive for credits, negative for debits
    pub delta: Amount,

    /// When the change was recorded (after the remote call returned)
    pub recorded_at: DateTime<Utc>,
}

pub struct Actor {
    seq: u64,
    name: String,
    initial_balance: Amount,
    ledger: Arc<dyn LedgerApi>,
    account: OnceCell<AccountId>,
    log: RwLock<Vec<ActionLogEntry>>,
}

impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("name", &self.name)
            .field("initial_balance", &self.initial_balance)
            .field("account", &self.account.get())
            .field("log_len", &self.log.read().len())
            .finish()
    }
}

impl Actor {
    pub fn new(
        name: impl Into<String>,
        initial_balance: Amount,
        ledger: Arc<dyn LedgerApi>,
    ) -> Self {
        Self {
            seq: NEXT_ACTOR_SEQ.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            initial_balance,
            ledger,
            account: OnceCell::new(),
            log: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial_balance(&self) -> Amount {
        self.initial_balance
    }

    /// The remote account, once created
    pub fn account_id(&self) -> Option<&AccountId> {
        self.account.get()
    }

    pub(crate) fn ledger(&self) -> &Arc<dyn LedgerApi> {
        &self.ledger
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    /// Make sure the remote account exists and return its current state
    ///
    /// Concurrent callers share one creation request: the first caller creates,
    /// everyone else waits for it. If the service reports that the account
    /// already exists, that account is fetched and adopted instead. An actor
    /// that already holds an account fetches it again.
    #[instrument(skip(self), fields(actor = %self.name))]
    pub async fn ensure_account(&self) -> LedgerResult<AccountInfo> {
        if !self.initial_balance.is_positive() {
            return Err(LedgerError::InvalidInitialBalance(self.initial_balance));
        }

        if let Some(id) = self.account.get() {
            trace!("account {id} already created, fetching it");
            return self.ledger.get_account(id).await;
        }

        let mut created = None;
        let slot = &mut created;

        let id = self
            .account
            .get_or_try_init(|| async move {
                let account = match self.ledger.create_account(self.initial_balance).await {
                    Ok(account) => account,
                    Err(LedgerError::AlreadyExists { id }) => {
                        debug!("account {id} already exists, adopting it");
                        self.ledger.get_account(&id).await?
                    }
                    Err(e) => return Err(e),
                };

                debug!(
                    "created account {} with initial balance {}",
                    account.id, self.initial_balance
                );
                let id = account.id.clone();
                *slot = Some(account);
                Ok(id)
            })
            .await?;

        match created {
            Some(account) => Ok(account),
            // another caller created it while we were waiting
            None => self.ledger.get_account(id).await,
        }
    }

    /// The account id, creating the account first if needed
    pub async fn account(&self) -> LedgerResult<AccountId> {
        if let Some(id) = self.account.get() {
            return Ok(id.clone());
        }
        self.ensure_account().await.map(|account| account.id)
    }

    /// Fresh balance straight from the service
    pub async fn query_balance(&self) -> LedgerResult<Amount> {
        let id = self
            .account
            .get()
            .ok_or_else(|| LedgerError::NoAccount(self.name.clone()))?;

        self.ledger.get_account(id).await.map(|account| account.balance)
    }

    /// Append a balance change for this actor's own account
    ///
    /// Zero deltas are accepted and dropped.
    pub fn record(&self, delta: Amount) -> LedgerResult<()> {
        let id = self
            .account
            .get()
            .ok_or_else(|| LedgerError::NoAccount(self.name.clone()))?;

        if delta.is_zero() {
            trace!(actor = %self.name, "ignoring zero delta");
            return Ok(());
        }

        self.log.write().push(ActionLogEntry {
            account_id: id.clone(),
            delta,
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    /// Initial balance plus every recorded delta
    pub fn expected_balance(&self) -> Amount {
        let log = self.log.read();
        self.initial_balance + log.iter().map(|entry| entry.delta).sum::<Amount>()
    }

    pub fn log_snapshot(&self) -> Vec<ActionLogEntry> {
        self.log.read().clone()
    }

    pub fn log_len(&self) -> usize {
        self.log.read().len()
    }
}

/// Append the debit/credit pair of a completed transfer
///
/// Both logs are held for writing while the pair is appended, so no observer
/// ever sees one entry without the other.
pub(crate) fn record_transfer(
    source: &Actor,
    destination: &Actor,
    amount: Amount,
) -> LedgerResult<()> {
    if source.seq == destination.seq {
        return Err(LedgerError::SameAccount(source.name.clone()));
    }

    let source_id = source
        .account
        .get()
        .ok_or_else(|| LedgerError::NoAccount(source.name.clone()))?;
    let destination_id = destination
        .account
        .get()
        .ok_or_else(|| LedgerError::NoAccount(destination.name.clone()))?;

    let recorded_at = Utc::now();

    let (mut source_log, mut destination_log) = if source.seq < destination.seq {
        let s = source.log.write();
        let d = destination.log.write();
        (s, d)
    } else {
        let d = destination.log.write();
        let s = source.log.write();
        (s, d)
    };

    source_log.push(ActionLogEntry {
        account_id: source_id.clone(),
        delta: -amount,
        recorded_at,
    });
    destination_log.push(ActionLogEntry {
        account_id: destination_id.clone(),
        delta: amount,
        recorded_at,
    });

    Ok(())
}

/// Expected balances of many actors from one consistent snapshot
///
/// All logs are read-locked together, so a transfer pair is either fully
/// visible or not at all. Results are in the order of `actors`.
pub fn expected_balances(actors: &[Arc<Actor>]) -> Vec<Amount> {
    let mut order: Vec<usize> = (0..actors.len()).collect();
    order.sort_by_key(|&idx| actors[idx].seq);
    order.dedup_by_key(|idx| actors[*idx].seq);

    let guards: Vec<_> = order
        .iter()
        .map(|&idx| (actors[idx].seq, actors[idx].log.read()))
        .collect();

    actors
        .iter()
        .map(|actor| {
            let delta: Amount = guards
                .iter()
                .find(|(seq, _)| *seq == actor.seq)
                .map(|(_, log)| log.iter().map(|entry| entry.delta).sum::<Amount>())
                .unwrap_or_default();
            actor.initial_balance + delta
        })
        .collect()
}
