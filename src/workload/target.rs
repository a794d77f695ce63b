//! What each scheduled request does
//!
//! Either a fixed raw HTTP request, or a randomly picked transfer between a
//! pool of source actors and a pool of destination actors.

use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use reqwest::Method;
use tracing::trace;

use crate::actor::Actor;
use crate::config::AmountPolicy;
use crate::ledger::LedgerError;
use crate::metrics::Sample;
use crate::money::Amount;
use crate::transfer::{TransferAmount, TransferOperation};

/// A fixed HTTP request
#[derive(Debug, Clone)]
pub struct Target {
    pub method: Method,
    pub url: String,
    pub body: Option<serde_json::Value>,
}

impl Target {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            body: Some(body),
        }
    }

    async fn execute(&self, client: &reqwest::Client) -> Sample {
        let issued_at = Instant::now();

        let mut request = client.request(self.method.clone(), &self.url);
        if let Some(body) = &self.body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return Sample::failure(
                    issued_at,
                    issued_at.elapsed(),
                    e.status().map(|s| s.as_u16()),
                    LedgerError::from(e).kind(),
                );
            }
        };

        let status = response.status();
        let body = response.bytes().await;
        let latency = issued_at.elapsed();

        match body {
            Ok(_) if status.is_success() => Sample::success(issued_at, latency, status.as_u16()),
            Ok(_) => Sample::failure(
                issued_at,
                latency,
                Some(status.as_u16()),
                LedgerError::Status {
                    code: status.as_u16(),
                }
                .kind(),
            ),
            Err(e) => Sample::failure(
                issued_at,
                latency,
                Some(status.as_u16()),
                LedgerError::from(e).kind(),
            ),
        }
    }
}

/// Random transfers from `sources` to `destinations`
#[derive(Debug, Clone)]
pub struct TransferPlan {
    pub sources: Vec<Arc<Actor>>,
    pub destinations: Vec<Arc<Actor>>,
    pub amount: AmountPolicy,
}

impl TransferPlan {
    pub fn new(
        sources: Vec<Arc<Actor>>,
        destinations: Vec<Arc<Actor>>,
        amount: AmountPolicy,
    ) -> Self {
        Self {
            sources,
            destinations,
            amount,
        }
    }

    /// Every actor of both pools
    pub fn actors(&self) -> Vec<Arc<Actor>> {
        self.sources
            .iter()
            .chain(self.destinations.iter())
            .cloned()
            .collect()
    }

    pub fn pick_amount(&self, rng: &mut impl Rng) -> TransferAmount {
        match &self.amount {
            AmountPolicy::Fixed { amount } => TransferAmount::Fixed(*amount),
            AmountPolicy::Uniform { min, max } => {
                let cents = if min < max {
                    rng.random_range(min.cents()..max.cents())
                } else {
                    min.cents()
                };
                TransferAmount::Fixed(Amount::from_cents(cents))
            }
            AmountPolicy::PercentOfBalance { fraction } => {
                TransferAmount::PercentOfBalance(*fraction)
            }
        }
    }

    /// Build the next random operation
    ///
    /// Returns `None` when a pool is empty.
    pub fn next_operation(&self, rng: &mut impl Rng) -> Option<TransferOperation> {
        if self.sources.is_empty() || self.destinations.is_empty() {
            return None;
        }

        let source = &self.sources[rng.random_range(0..self.sources.len())];
        let destination = &self.destinations[rng.random_range(0..self.destinations.len())];
        let amount = self.pick_amount(rng);

        Some(TransferOperation::with_amount(
            source.clone(),
            destination.clone(),
            amount,
        ))
    }
}

/// How the generator builds each request
#[derive(Debug, Clone)]
pub enum RequestStrategy {
    Fixed(Target),
    Transfers(TransferPlan),
}

impl RequestStrategy {
    /// Actors whose accounts must exist before the run starts
    pub fn actors(&self) -> Vec<Arc<Actor>> {
        match self {
            RequestStrategy::Fixed(_) => Vec::new(),
            RequestStrategy::Transfers(plan) => plan.actors(),
        }
    }

    /// Perform one request and describe its outcome
    ///
    /// Transfer latency covers the whole operation, validation reads included.
    pub async fn execute<R: Rng + Send>(&self, client: &reqwest::Client, rng: &mut R) -> Sample {
        match self {
            RequestStrategy::Fixed(target) => target.execute(client).await,
            RequestStrategy::Transfers(plan) => {
                let issued_at = Instant::now();
                let Some(mut operation) = plan.next_operation(rng) else {
                    return Sample::failure(issued_at, issued_at.elapsed(), None, "empty actor pool");
                };

                let result = operation.execute().await;
                let latency = issued_at.elapsed();

                match result {
                    Ok(record) => {
                        trace!(
                            "moved {} from {} to {}",
                            record.amount, record.source, record.destination
                        );
                        Sample::success(issued_at, latency, 200)
                    }
                    Err(e) => {
                        trace!("{e}");
                        Sample::failure(issued_at, latency, e.status_code(), e.kind())
                    }
                }
            }
        }
    }
}
