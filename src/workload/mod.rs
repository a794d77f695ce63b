//! Workload generator - controlled concurrent request pressure
//!
//! ## Run lifecycle
//!
//! ```text
//! prepare: ensure_account() for every actor ── any failure aborts the run
//!    │
//! spawn N workers ──► all wait on Barrier(N + 1) ◄── coordinator
//!    │
//! each worker: loop { pacer.next_slot() → execute request → metrics.add() }
//!    │                     └── None after the deadline: stop taking new work
//! join all workers (in-flight requests drain) → metrics.finalize()
//! ```
//!
//! [`WorkloadGenerator::run`] does both steps. Callers that need to act between
//! them (e.g. to capture a baseline) call [`WorkloadGenerator::prepare`] and then
//! [`WorkloadGenerator::load`].
//!
//! Individual request failures only show up as failed samples.

pub mod pacer;
pub mod target;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, ensure};
use futures::future::{join_all, try_join_all};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::Barrier;
use tracing::{debug, error, info, instrument, warn};

use crate::config::HarnessConfig;
use crate::metrics::{MetricsCollector, MetricsReport};

pub use pacer::Pacer;
pub use target::{RequestStrategy, Target, TransferPlan};

/// Log progress every this many completed requests
const PROGRESS_EVERY: u64 = 100;

#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Target requests per second across all workers
    pub rate: u32,

    pub duration: Duration,

    /// Upper bound on requests in flight at once
    pub workers: usize,

    pub request_timeout: Duration,
}

impl WorkloadConfig {
    pub fn from_harness(config: &HarnessConfig) -> Self {
        Self {
            rate: config.rps,
            duration: config.duration(),
            workers: config.workers,
            request_timeout: config.request_timeout(),
        }
    }
}

/// Result of one load phase
#[derive(Debug, Clone)]
pub struct WorkloadOutcome {
    pub metrics: MetricsReport,

    /// Requests issued by all workers
    pub issued: u64,

    /// Scheduled requests dropped because no worker was free in time
    pub skipped: u64,

    /// Barrier release to last worker finished
    pub elapsed: Duration,
}

pub struct WorkloadGenerator {
    config: WorkloadConfig,
    strategy: Arc<RequestStrategy>,
    client: reqwest::Client,
    metrics: Arc<MetricsCollector>,
}

impl WorkloadGenerator {
    pub fn new(config: WorkloadConfig, strategy: RequestStrategy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build HTTP client")?;

        Self::with_client(config, strategy, client)
    }

    /// Use an existing client (it should carry a request timeout)
    pub fn with_client(
        config: WorkloadConfig,
        strategy: RequestStrategy,
        client: reqwest::Client,
    ) -> Result<Self> {
        ensure!(config.rate > 0, "target rate must be greater than zero");
        ensure!(config.workers > 0, "at least one worker is required");
        ensure!(!config.duration.is_zero(), "duration must be greater than zero");

        Ok(Self {
            config,
            strategy: Arc::new(strategy),
            client,
            metrics: Arc::new(MetricsCollector::new()),
        })
    }

    /// Create every account the strategy needs
    #[instrument(skip(self))]
    pub async fn prepare(&self) -> Result<()> {
        let actors = self.strategy.actors();
        debug!("preparing {} actors", actors.len());

        try_join_all(actors.iter().map(|actor| async move {
            actor
                .ensure_account()
                .await
                .with_context(|| format!("failed to create account for {}", actor.name()))
        }))
        .await?;

        Ok(())
    }

    /// Prepare the actors, then run the load phase to completion
    pub async fn run(self) -> Result<WorkloadOutcome> {
        self.prepare().await?;
        self.load().await
    }

    /// Run the load phase only; every actor must already be prepared
    #[instrument(skip(self), fields(rate = self.config.rate, workers = self.config.workers))]
    pub async fn load(self) -> Result<WorkloadOutcome> {
        let pacer = Arc::new(Pacer::new(self.config.rate, self.config.duration));
        let barrier = Arc::new(Barrier::new(self.config.workers + 1));

        info!(
            "starting load: {} req/s for {:?} ({} requests) across {} workers",
            self.config.rate,
            self.config.duration,
            pacer.total_slots(),
            self.config.workers
        );

        let handles: Vec<_> = (0..self.config.workers)
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    self.strategy.clone(),
                    self.client.clone(),
                    pacer.clone(),
                    barrier.clone(),
                    self.metrics.clone(),
                ))
            })
            .collect();

        barrier.wait().await;
        let started = Instant::now();

        for result in join_all(handles).await {
            if let Err(e) = result {
                error!("worker task failed: {e}");
            }
        }

        let elapsed = started.elapsed();
        let metrics = self.metrics.finalize();

        info!(
            "load finished after {elapsed:?}: {} requests, {:.2}% success",
            metrics.requests,
            metrics.success_ratio * 100.0
        );
        if pacer.skipped() > 0 {
            warn!(
                "{} scheduled requests skipped, all {} workers were busy",
                pacer.skipped(),
                self.config.workers
            );
        }

        Ok(WorkloadOutcome {
            metrics,
            issued: pacer.issued(),
            skipped: pacer.skipped(),
            elapsed,
        })
    }
}

#[instrument(skip_all, fields(worker = id))]
async fn worker(
    id: usize,
    strategy: Arc<RequestStrategy>,
    client: reqwest::Client,
    pacer: Arc<Pacer>,
    barrier: Arc<Barrier>,
    metrics: Arc<MetricsCollector>,
) {
    let mut rng = StdRng::from_os_rng();

    barrier.wait().await;

    while pacer.next_slot().await.is_some() {
        let sample = strategy.execute(&client, &mut rng).await;

        if !sample.success {
            warn!(
                "request failed: {}",
                sample.error.as_deref().unwrap_or("unknown error")
            );
        }

        metrics.add(sample);

        let completed = metrics.requests();
        if completed % PROGRESS_EVERY == 0 {
            debug!("{completed} requests completed");
        }
    }

    debug!("worker done");
}
