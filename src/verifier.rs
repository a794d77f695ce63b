//! Consistency verifier - audits the ledger after a run
//!
//! Two independent checks:
//!
//! 1. **Per actor**: the balance folded from the actor's action log must equal
//!    one fresh balance query.
//! 2. **Conservation**: the sum of all remote balances must equal the sum taken
//!    before the run. This catches cross-actor bugs (a credit landing on the
//!    wrong account) that per-actor logs cannot see.
//!
//! Amounts are fixed-point cents, so both comparisons are exact. Mismatches are
//! reported, never raised.

use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use tracing::{debug, instrument, warn};

use crate::actor::{Actor, expected_balances};
use crate::ledger::{AccountId, LedgerResult};
use crate::money::Amount;

/// Verification result for one actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorCheck {
    pub name: String,
    pub account_id: Option<AccountId>,
    pub ok: bool,
    pub expected: Amount,

    /// `None` when the balance query failed
    pub actual: Option<Amount>,

    pub error: Option<String>,
}

impl ActorCheck {
    /// `actual - expected`, when the actual balance is known
    pub fn discrepancy(&self) -> Option<Amount> {
        self.actual.map(|actual| actual - self.expected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub actors: Vec<ActorCheck>,

    /// Sum of remote balances before the run
    pub total_before: Amount,

    /// Sum of remote balances after the run; `None` if any query failed
    pub total_after: Option<Amount>,

    pub conserved: bool,

    /// Every actor ok and money conserved
    pub passed: bool,
}

impl VerificationReport {
    pub fn mismatches(&self) -> impl Iterator<Item = &ActorCheck> {
        self.actors.iter().filter(|check| !check.ok)
    }

    /// `total_after - total_before`
    pub fn discrepancy(&self) -> Option<Amount> {
        self.total_after.map(|after| after - self.total_before)
    }
}

pub struct ConsistencyVerifier;

impl ConsistencyVerifier {
    /// Sum of the actors' remote balances, taken before a run
    #[instrument(skip_all, fields(actors = actors.len()))]
    pub async fn capture_total(actors: &[Arc<Actor>]) -> LedgerResult<Amount> {
        let balances = try_join_all(actors.iter().map(|actor| actor.query_balance())).await?;
        let total: Amount = balances.iter().sum();
        debug!("captured baseline total {total}");
        Ok(total)
    }

    /// Compare every actor against the service and check conservation
    ///
    /// Call only once no operation touching these actors is in flight.
    #[instrument(skip_all, fields(actors = actors.len(), baseline = %baseline))]
    pub async fn verify(actors: &[Arc<Actor>], baseline: Amount) -> VerificationReport {
        let expected = expected_balances(actors);
        let actual = join_all(actors.iter().map(|actor| actor.query_balance())).await;

        let checks: Vec<ActorCheck> = actors
            .iter()
            .zip(expected)
            .zip(actual)
            .map(|((actor, expected), actual)| {
                let check = match actual {
                    Ok(actual) => ActorCheck {
                        name: actor.name().to_string(),
                        account_id: actor.account_id().cloned(),
                        ok: actual == expected,
                        expected,
                        actual: Some(actual),
                        error: None,
                    },
                    Err(e) => ActorCheck {
                        name: actor.name().to_string(),
                        account_id: actor.account_id().cloned(),
                        ok: false,
                        expected,
                        actual: None,
                        error: Some(e.to_string()),
                    },
                };

                if !check.ok {
                    warn!(
                        "[{}] balance mismatch: expected {}, got {}",
                        check.name,
                        check.expected,
                        check
                            .actual
                            .map_or_else(|| "nothing".to_string(), |a| a.to_string())
                    );
                }
                check
            })
            .collect();

        let total_after = checks
            .iter()
            .map(|check| check.actual)
            .sum::<Option<Amount>>();

        let conserved = total_after == Some(baseline);
        if !conserved {
            warn!(
                "money not conserved: before {baseline}, after {}",
                total_after.map_or_else(|| "unknown".to_string(), |t| t.to_string())
            );
        }

        let passed = conserved && checks.iter().all(|check| check.ok);

        VerificationReport {
            actors: checks,
            total_before: baseline,
            total_after,
            conserved,
            passed,
        }
    }
}
