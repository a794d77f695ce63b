//! Account lifecycle against the fake ledger service
//!
//! - exactly one creation under concurrent `ensure_account`
//! - balance queries agree with the service and with each other
//! - invalid initial balances never reach the service

use std::time::Duration;

use assert_matches::assert_matches;
use futures::future::join_all;
use ledger_harness::{Amount, LedgerError};
use pretty_assertions::assert_eq;

use crate::helpers::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ensure_creates_one_account() {
    let (server, fake) = FakeLedger::start_with_delay(Duration::from_millis(50)).await;
    let ledger = http_ledger(&server);
    let alice = actor("alice", 10_000, &ledger);

    let results = join_all((0..12).map(|_| {
        let alice = alice.clone();
        tokio::spawn(async move { alice.ensure_account().await })
    }))
    .await;

    let ids: Vec<_> = results
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().id)
        .collect();

    assert_eq!(fake.creates(), 1);
    assert!(ids.iter().all(|id| id == &ids[0]));
    assert_eq!(alice.account_id(), Some(&ids[0]));
}

#[tokio::test]
async fn test_ensure_twice_keeps_the_account() {
    let (server, fake) = FakeLedger::start().await;
    let ledger = http_ledger(&server);
    let alice = actor("alice", 5_000, &ledger);

    let first = alice.ensure_account().await.unwrap();
    let second = alice.ensure_account().await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.balance, Amount::from_cents(5_000));
    assert_eq!(fake.creates(), 1);
}

#[tokio::test]
async fn test_non_positive_initial_balance_is_rejected_locally() {
    let (server, fake) = FakeLedger::start().await;
    let ledger = http_ledger(&server);

    for cents in [0, -100] {
        let broke = actor("broke", cents, &ledger);
        assert_matches!(
            broke.ensure_account().await,
            Err(LedgerError::InvalidInitialBalance(_))
        );
        assert!(broke.account_id().is_none());
    }

    assert_eq!(fake.creates(), 0);
}

#[tokio::test]
async fn test_query_before_creation_fails() {
    let (server, _fake) = FakeLedger::start().await;
    let ledger = http_ledger(&server);
    let alice = actor("alice", 100, &ledger);

    assert_matches!(alice.query_balance().await, Err(LedgerError::NoAccount(_)));
    assert_matches!(alice.record(Amount::from_cents(1)), Err(LedgerError::NoAccount(_)));
}

#[tokio::test]
async fn test_consecutive_queries_agree_with_service() {
    let (server, fake) = FakeLedger::start().await;
    let ledger = http_ledger(&server);
    let alice = actor("alice", 12_345, &ledger);

    let id = alice.account().await.unwrap();
    let first = alice.query_balance().await.unwrap();
    let second = alice.query_balance().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(Some(first), fake.balance(id.as_str()));
    assert_eq!(alice.expected_balance(), first);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_actors_get_distinct_accounts() {
    let (server, fake) = FakeLedger::start().await;
    let ledger = http_ledger(&server);

    let actors: Vec<_> = (0..8)
        .map(|i| actor(&format!("actor-{i}"), 1_000, &ledger))
        .collect();

    join_all(actors.iter().map(|a| a.ensure_account())).await;

    let mut ids: Vec<_> = actors
        .iter()
        .map(|a| a.account_id().unwrap().clone())
        .collect();
    ids.sort();
    ids.dedup();

    assert_eq!(ids.len(), 8);
    assert_eq!(fake.creates(), 8);
    assert_eq!(fake.total(), Amount::from_cents(8_000));
}
