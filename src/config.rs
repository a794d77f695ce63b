use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail, ensure};
use tracing::trace;

use crate::money::Amount;
use crate::util;

/// What the load phase hammers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Random transfers between a source and a destination pool
    #[default]
    Transfer,

    /// Plain `GET /accounts` requests
    GetAccounts,
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transfer" => Ok(Mode::Transfer),
            "get-accounts" => Ok(Mode::GetAccounts),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

/// How much each generated transfer moves
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum AmountPolicy {
    /// The same amount every time
    Fixed { amount: Amount },

    /// Uniformly random in `[min, max)`
    Uniform { min: Amount, max: Amount },

    /// A fraction of the source's balance at validation time
    PercentOfBalance { fraction: f64 },
}

impl Default for AmountPolicy {
    fn default() -> Self {
        AmountPolicy::Uniform {
            min: Amount::from_cents(100),
            max: Amount::from_cents(1000),
        }
    }
}

/// Retry policy for idempotent reads
///
/// Writes (account creation, transfers) are never retried.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,

    /// Initial backoff, doubled after every attempt
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl RetryPolicy {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            read_retries: default_read_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_read_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    50
}

/// A group of actors created with the same initial balance
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct PoolConfig {
    pub count: usize,
    pub initial_balance: Amount,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_sources")]
    pub sources: PoolConfig,

    #[serde(default = "default_destinations")]
    pub destinations: PoolConfig,

    #[serde(default)]
    pub amount: AmountPolicy,
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig {
            sources: default_sources(),
            destinations: default_destinations(),
            amount: AmountPolicy::default(),
        }
    }
}

fn default_sources() -> PoolConfig {
    PoolConfig {
        count: 10,
        initial_balance: Amount::from_cents(10_000),
    }
}

fn default_destinations() -> PoolConfig {
    PoolConfig {
        count: 10,
        initial_balance: Amount::from_cents(1),
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct HarnessConfig {
    #[serde(default = "util::get_default_base_url")]
    pub base_url: String,

    /// Target requests per second
    #[serde(default = "util::get_default_rps")]
    pub rps: u32,

    /// Load phase duration in seconds
    #[serde(default = "util::get_default_duration")]
    pub duration: u64,

    /// Concurrent workers sharing the request schedule
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub mode: Mode,

    #[serde(default)]
    pub transfers: TransferConfig,

    /// File every run report is appended to
    pub report_file: Option<PathBuf>,
}

fn default_workers() -> usize {
    10
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            base_url: util::get_default_base_url(),
            rps: util::get_default_rps(),
            duration: util::get_default_duration(),
            workers: default_workers(),
            timeout_ms: default_timeout_ms(),
            retry: RetryPolicy::default(),
            mode: Mode::default(),
            transfers: TransferConfig::default(),
            report_file: None,
        }
    }
}

impl HarnessConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Override values from `LEDGER_BASE_URL`, `RPS` and `DURATION`
    pub fn apply_env(&mut self) {
        if let Some(base_url) = util::get_base_url() {
            self.base_url = base_url;
        }
        if let Some(rps) = util::get_rps() {
            self.rps = rps;
        }
        if let Some(duration) = util::get_duration() {
            self.duration = duration;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.base_url.is_empty(), "base_url must not be empty");
        ensure!(self.rps > 0, "rps must be greater than zero");
        ensure!(self.duration > 0, "duration must be greater than zero");
        ensure!(self.workers > 0, "workers must be greater than zero");
        ensure!(self.timeout_ms > 0, "timeout_ms must be greater than zero");

        if self.mode == Mode::Transfer {
            for (name, pool) in [
                ("sources", &self.transfers.sources),
                ("destinations", &self.transfers.destinations),
            ] {
                ensure!(pool.count > 0, "{name}.count must be greater than zero");
                ensure!(
                    pool.initial_balance.is_positive(),
                    "{name}.initial_balance must be greater than zero"
                );
            }

            match &self.transfers.amount {
                AmountPolicy::Fixed { amount } if !amount.is_positive() => {
                    bail!("fixed transfer amount must be greater than zero")
                }
                AmountPolicy::Uniform { min, max } if !min.is_positive() || min >= max => {
                    bail!("uniform transfer amounts need 0 < min < max, got [{min}, {max})")
                }
                AmountPolicy::PercentOfBalance { fraction }
                    if !(*fraction > 0.0 && *fraction <= 1.0) =>
                {
                    bail!("percent_of_balance fraction must be in (0, 1], got {fraction}")
                }
                _ => {}
            }
        }

        Ok(())
    }
}

pub fn read_config_file(path: impl AsRef<Path>) -> anyhow::Result<HarnessConfig> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&file_content)
        .with_context(|| format!("invalid configuration file {}", path.display()))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
