pub mod actor;
pub mod config;
pub mod ledger;
pub mod metrics;
pub mod money;
pub mod report;
pub mod runner;
pub mod transfer;
pub mod util;
pub mod verifier;
pub mod workload;

pub use actor::{ActionLogEntry, Actor};
pub use config::{HarnessConfig, Mode};
pub use ledger::{AccountId, HttpLedger, LedgerApi, LedgerError, LedgerResult};
pub use metrics::{MetricsCollector, MetricsReport};
pub use money::Amount;
pub use runner::{RunReport, run};
pub use transfer::{TransferError, TransferOperation, TransferState};
pub use verifier::{ConsistencyVerifier, VerificationReport};
pub use workload::{WorkloadConfig, WorkloadGenerator};
