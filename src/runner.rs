//! One complete harness run
//!
//! Builds the ledger client and actor pools from a [`HarnessConfig`], drives
//! the load phase and, for transfer runs, audits the ledger afterwards:
//!
//! ```text
//! create accounts → baseline total → load phase → verification
//! ```

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::actor::Actor;
use crate::config::{HarnessConfig, Mode, PoolConfig};
use crate::ledger::{HttpLedger, LedgerApi};
use crate::verifier::{ConsistencyVerifier, VerificationReport};
use crate::workload::{
    RequestStrategy, Target, TransferPlan, WorkloadConfig, WorkloadGenerator, WorkloadOutcome,
};

#[derive(Debug, Clone)]
pub struct RunReport {
    pub title: String,
    pub mode: Mode,
    pub workload: WorkloadOutcome,

    /// Only present for transfer runs
    pub verification: Option<VerificationReport>,
}

impl RunReport {
    /// No consistency violation was found
    ///
    /// Failed requests alone do not fail a run.
    pub fn passed(&self) -> bool {
        self.verification
            .as_ref()
            .is_none_or(|verification| verification.passed)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(verification) = &self.verification {
            writeln!(f, "Initial total: {}", verification.total_before)?;
            match verification.total_after {
                Some(after) => writeln!(f, "Final total:   {after}")?,
                None => writeln!(f, "Final total:   unknown")?,
            }
            writeln!(f)?;
        }

        write!(f, "{}", self.workload.metrics)?;

        if let Some(verification) = &self.verification {
            write!(f, "\n\n{verification}")?;
        }

        Ok(())
    }
}

/// `count` actors named `<prefix>-<i>`, all starting with the pool's balance
pub fn build_pool(prefix: &str, pool: &PoolConfig, ledger: Arc<dyn LedgerApi>) -> Vec<Arc<Actor>> {
    (0..pool.count)
        .map(|i| {
            Arc::new(Actor::new(
                format!("{prefix}-{i}"),
                pool.initial_balance,
                ledger.clone(),
            ))
        })
        .collect()
}

#[instrument(skip_all, fields(mode = ?config.mode, base_url = %config.base_url))]
pub async fn run(config: &HarnessConfig) -> Result<RunReport> {
    config.validate()?;

    let http = HttpLedger::from_config(config).context("failed to build ledger client")?;
    let client = http.client().clone();
    let workload = WorkloadConfig::from_harness(config);

    match config.mode {
        Mode::GetAccounts => {
            let target = Target::get(format!("{}/accounts", http.base_url()));
            let title = format!(
                "GET {} at {} req/s for {}s",
                target.url, config.rps, config.duration
            );
            info!("{title}");

            let outcome = WorkloadGenerator::with_client(
                workload,
                RequestStrategy::Fixed(target),
                client,
            )?
            .run()
            .await?;

            Ok(RunReport {
                title,
                mode: config.mode,
                workload: outcome,
                verification: None,
            })
        }
        Mode::Transfer => {
            let ledger: Arc<dyn LedgerApi> = Arc::new(http);
            let transfers = &config.transfers;
            let sources = build_pool("source", &transfers.sources, ledger.clone());
            let destinations = build_pool("dest", &transfers.destinations, ledger);

            let title = format!(
                "transfers {} -> {} actors at {} req/s for {}s",
                sources.len(),
                destinations.len(),
                config.rps,
                config.duration
            );
            info!("{title}");

            let plan = TransferPlan::new(sources, destinations, transfers.amount.clone());
            let actors = plan.actors();
            let generator =
                WorkloadGenerator::with_client(workload, RequestStrategy::Transfers(plan), client)?;

            generator.prepare().await?;
            let baseline = ConsistencyVerifier::capture_total(&actors)
                .await
                .context("failed to capture the initial total")?;
            info!("initial total across {} accounts: {baseline}", actors.len());

            let outcome = generator.load().await?;
            let verification = ConsistencyVerifier::verify(&actors, baseline).await;

            info!(
                "verification {}",
                if verification.passed { "passed" } else { "failed" }
            );

            Ok(RunReport {
                title,
                mode: config.mode,
                workload: outcome,
                verification: Some(verification),
            })
        }
    }
}
