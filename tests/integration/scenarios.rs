//! Whole runs driven from a `HarnessConfig`

use ledger_harness::config::{AmountPolicy, PoolConfig, TransferConfig};
use ledger_harness::report::append_report;
use ledger_harness::{Amount, HarnessConfig, Mode, run};

use crate::helpers::*;

fn config(base_url: String, mode: Mode) -> HarnessConfig {
    HarnessConfig {
        base_url,
        rps: 20,
        duration: 1,
        workers: 4,
        timeout_ms: 2_000,
        mode,
        transfers: TransferConfig {
            sources: PoolConfig {
                count: 2,
                initial_balance: Amount::from_cents(10_000),
            },
            destinations: PoolConfig {
                count: 2,
                initial_balance: Amount::from_cents(1),
            },
            amount: AmountPolicy::Fixed {
                amount: Amount::from_cents(250),
            },
        },
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_transfer_run_passes_verification() {
    let (server, fake) = FakeLedger::start().await;

    let report = run(&config(server.uri(), Mode::Transfer)).await.unwrap();

    assert!(report.passed());
    assert_eq!(report.mode, Mode::Transfer);
    assert_eq!(report.workload.metrics.requests, 20);
    assert_eq!(fake.creates(), 4);
    assert_eq!(fake.transfers(), 20);
    assert_eq!(fake.total(), Amount::from_cents(20_002));

    // one read per account for the baseline, one per transfer for validation,
    // one per account for verification
    assert_eq!(fake.reads(), 4 + 20 + 4);

    let verification = report.verification.as_ref().unwrap();
    assert_eq!(verification.actors.len(), 4);
    assert_eq!(verification.total_before, Amount::from_cents(20_002));

    let text = report.to_string();
    assert!(text.contains("Initial total: 200.02"));
    assert!(text.contains("QUEUING SYSTEM ANALYSIS"));
    assert!(text.contains("Verification PASSED"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_get_accounts_run() {
    let (server, fake) = FakeLedger::start().await;

    let report = run(&config(server.uri(), Mode::GetAccounts)).await.unwrap();

    assert!(report.passed());
    assert!(report.verification.is_none());
    assert_eq!(report.workload.metrics.requests, 20);
    assert_eq!(report.workload.metrics.successes, 20);
    assert_eq!(fake.creates(), 0);
    assert!(report.title.contains("/accounts"));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let (server, fake) = FakeLedger::start().await;

    let mut invalid = config(server.uri(), Mode::Transfer);
    invalid.transfers.sources.count = 0;

    assert!(run(&invalid).await.is_err());
    assert_eq!(fake.creates(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_report_file_collects_runs() {
    let (server, _fake) = FakeLedger::start().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs.txt");

    for mode in [Mode::GetAccounts, Mode::Transfer] {
        let report = run(&config(server.uri(), mode)).await.unwrap();
        append_report(&path, &report.title, &report.to_string()).unwrap();
    }

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.matches("==== ").count(), 2);
    assert!(content.contains("CONSISTENCY VERIFICATION"));
}
