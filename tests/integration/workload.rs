//! Load phase behavior: pacing, failure accounting and transfer workloads

use std::time::Duration;

use ledger_harness::config::AmountPolicy;
use ledger_harness::workload::{RequestStrategy, Target, TransferPlan};
use ledger_harness::{Amount, ConsistencyVerifier, WorkloadConfig, WorkloadGenerator};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

fn workload(rate: u32, duration: Duration, workers: usize) -> WorkloadConfig {
    WorkloadConfig {
        rate,
        duration,
        workers,
        request_timeout: Duration::from_secs(2),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_always_failing_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let strategy = RequestStrategy::Fixed(Target::get(format!("{}/accounts", server.uri())));
    let outcome = WorkloadGenerator::new(workload(10, Duration::from_secs(5), 5), strategy)
        .unwrap()
        .run()
        .await
        .unwrap();

    let metrics = &outcome.metrics;
    assert_eq!(metrics.requests, 50);
    assert_eq!(metrics.failures, 50);
    assert_eq!(metrics.success_ratio, 0.0);
    assert_eq!(metrics.status_codes.get(&500), Some(&50));
    assert!(metrics.is_overloaded());

    let elapsed = outcome.elapsed;
    assert!(
        elapsed >= Duration::from_millis(4_500) && elapsed <= Duration::from_millis(6_500),
        "run took {elapsed:?}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_service_does_not_overrun_the_duration() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    // one worker can only serve 2 of the 10 scheduled requests
    let strategy = RequestStrategy::Fixed(Target::get(format!("{}/accounts", server.uri())));
    let outcome = WorkloadGenerator::new(workload(10, Duration::from_secs(1), 1), strategy)
        .unwrap()
        .run()
        .await
        .unwrap();

    let elapsed = outcome.elapsed;
    assert!(elapsed < Duration::from_millis(1_800), "run took {elapsed:?}");
    assert_eq!(outcome.metrics.requests, outcome.issued);
    assert!(outcome.issued >= 2 && outcome.issued <= 3, "issued {}", outcome.issued);
    assert!(outcome.skipped > 0);
    assert!(outcome.issued + outcome.skipped <= 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unreachable_service_counts_failures() {
    // nothing listens on this port once the server is gone
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };

    let strategy = RequestStrategy::Fixed(Target::get(format!("{uri}/accounts")));
    let outcome = WorkloadGenerator::new(workload(20, Duration::from_millis(500), 2), strategy)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.metrics.requests, 10);
    assert_eq!(outcome.metrics.successes, 0);
    assert!(outcome.metrics.status_codes.is_empty());
    assert!(!outcome.metrics.errors.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_transfer_workload_conserves_money() {
    let (server, fake) = FakeLedger::start().await;
    let ledger = http_ledger(&server);

    let sources: Vec<_> = (0..3)
        .map(|i| actor(&format!("source-{i}"), 10_000, &ledger))
        .collect();
    let destinations: Vec<_> = (0..3)
        .map(|i| actor(&format!("dest-{i}"), 1, &ledger))
        .collect();

    let plan = TransferPlan::new(sources, destinations, AmountPolicy::default());
    let actors = plan.actors();
    let generator = WorkloadGenerator::new(
        workload(40, Duration::from_secs(1), 4),
        RequestStrategy::Transfers(plan),
    )
    .unwrap();

    generator.prepare().await.unwrap();
    let baseline = ConsistencyVerifier::capture_total(&actors).await.unwrap();
    assert_eq!(baseline, Amount::from_cents(30_003));

    let outcome = generator.load().await.unwrap();
    assert_eq!(outcome.metrics.requests, 40);
    assert_eq!(outcome.metrics.successes as usize, fake.transfers());
    assert_eq!(fake.creates(), 6);

    let report = ConsistencyVerifier::verify(&actors, baseline).await;
    assert!(report.passed, "{report}");
    assert_eq!(fake.total(), baseline);
}

#[tokio::test]
async fn test_failed_account_creation_aborts_the_run() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let ledger = http_ledger(&server);
    let plan = TransferPlan::new(
        vec![actor("source-0", 10_000, &ledger)],
        vec![actor("dest-0", 1, &ledger)],
        AmountPolicy::default(),
    );

    let err = WorkloadGenerator::new(
        workload(10, Duration::from_secs(1), 1),
        RequestStrategy::Transfers(plan),
    )
    .unwrap()
    .run()
    .await
    .unwrap_err();

    assert!(format!("{err:#}").contains("failed to create account"));
}
