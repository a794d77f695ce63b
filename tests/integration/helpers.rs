//! Test helpers: an in-memory ledger service served over HTTP by wiremock

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use ledger_harness::{
    Actor, Amount, HttpLedger, LedgerApi,
    config::RetryPolicy,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

#[derive(Default)]
struct LedgerState {
    next_id: u64,
    accounts: BTreeMap<String, Amount>,
    creates: usize,
    reads: usize,
    transfers: usize,
    rejected_transfers: usize,
}

/// Stateful fake of the ledger service
///
/// Supports `POST /accounts`, `GET /accounts/{id}`, `GET /accounts` and
/// `POST /accounts/transfer` with the real service's JSON shapes. Transfers
/// are applied atomically; an overdraft is answered with `400`.
#[derive(Clone, Default)]
pub struct FakeLedger {
    state: Arc<Mutex<LedgerState>>,
    delay: Duration,
}

#[derive(Clone, Copy)]
enum Route {
    Create,
    Get,
    List,
    Transfer,
}

struct Endpoint {
    ledger: FakeLedger,
    route: Route,
}

impl Respond for Endpoint {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let response = match self.route {
            Route::Create => self.ledger.create(request),
            Route::Get => self.ledger.get(request),
            Route::List => self.ledger.list(),
            Route::Transfer => self.ledger.transfer(request),
        };
        response.set_delay(self.ledger.delay)
    }
}

fn amount_field(body: &Value, field: &str) -> Option<Amount> {
    body.get(field)?.as_f64().and_then(Amount::from_f64)
}

impl FakeLedger {
    /// Start a server backed by a fresh fake ledger
    pub async fn start() -> (MockServer, FakeLedger) {
        Self::start_with_delay(Duration::ZERO).await
    }

    /// Every response is held back for `delay`
    pub async fn start_with_delay(delay: Duration) -> (MockServer, FakeLedger) {
        let server = MockServer::start().await;
        let ledger = FakeLedger {
            delay,
            ..Default::default()
        };
        ledger.mount(&server).await;
        (server, ledger)
    }

    async fn mount(&self, server: &MockServer) {
        let routes = [
            (Route::Create, "POST", "/accounts"),
            (Route::Transfer, "POST", "/accounts/transfer"),
            (Route::List, "GET", "/accounts"),
        ];

        for (route, verb, exact) in routes {
            Mock::given(method(verb))
                .and(path(exact))
                .respond_with(Endpoint {
                    ledger: self.clone(),
                    route,
                })
                .mount(server)
                .await;
        }

        Mock::given(method("GET"))
            .and(path_regex(r"^/accounts/[^/]+$"))
            .respond_with(Endpoint {
                ledger: self.clone(),
                route: Route::Get,
            })
            .mount(server)
            .await;
    }

    fn create(&self, request: &Request) -> ResponseTemplate {
        let Ok(body) = serde_json::from_slice::<Value>(&request.body) else {
            return ResponseTemplate::new(400);
        };
        let Some(balance) = amount_field(&body, "initialBalance") else {
            return ResponseTemplate::new(400);
        };

        let mut state = self.state.lock();
        state.creates += 1;
        state.next_id += 1;
        let id = format!("acc-{}", state.next_id);
        state.accounts.insert(id.clone(), balance);

        ResponseTemplate::new(200).set_body_json(json!({"id": id, "balance": balance.as_f64()}))
    }

    fn get(&self, request: &Request) -> ResponseTemplate {
        let id = request.url.path().trim_start_matches("/accounts/");
        let mut state = self.state.lock();
        state.reads += 1;
        match state.accounts.get(id) {
            Some(balance) => ResponseTemplate::new(200)
                .set_body_json(json!({"id": id, "balance": balance.as_f64()})),
            None => ResponseTemplate::new(404),
        }
    }

    fn list(&self) -> ResponseTemplate {
        let accounts: Vec<Value> = self
            .state
            .lock()
            .accounts
            .iter()
            .map(|(id, balance)| json!({"id": id, "balance": balance.as_f64()}))
            .collect();
        ResponseTemplate::new(200).set_body_json(accounts)
    }

    fn transfer(&self, request: &Request) -> ResponseTemplate {
        let Ok(body) = serde_json::from_slice::<Value>(&request.body) else {
            return ResponseTemplate::new(400);
        };
        let (Some(from), Some(to), Some(amount)) = (
            body.get("fromAccountId").and_then(Value::as_str),
            body.get("toAccountId").and_then(Value::as_str),
            amount_field(&body, "amount"),
        ) else {
            return ResponseTemplate::new(400);
        };

        let mut state = self.state.lock();
        let (Some(&available), true) = (state.accounts.get(from), state.accounts.contains_key(to))
        else {
            return ResponseTemplate::new(404);
        };

        if from == to || !amount.is_positive() || available < amount {
            state.rejected_transfers += 1;
            return ResponseTemplate::new(400);
        }

        state.transfers += 1;
        *state.accounts.entry(from.to_string()).or_default() -= amount;
        *state.accounts.entry(to.to_string()).or_default() += amount;

        ResponseTemplate::new(200)
    }

    /// Account creations served
    pub fn creates(&self) -> usize {
        self.state.lock().creates
    }

    /// `GET /accounts/{id}` requests served
    pub fn reads(&self) -> usize {
        self.state.lock().reads
    }

    /// Transfers applied
    pub fn transfers(&self) -> usize {
        self.state.lock().transfers
    }

    pub fn rejected_transfers(&self) -> usize {
        self.state.lock().rejected_transfers
    }

    pub fn balance(&self, id: &str) -> Option<Amount> {
        self.state.lock().accounts.get(id).copied()
    }

    /// Sum of all balances held by the service
    pub fn total(&self) -> Amount {
        self.state.lock().accounts.values().sum()
    }
}

/// Ledger client for `server` without read retries
pub fn http_ledger(server: &MockServer) -> Arc<dyn LedgerApi> {
    let retry = RetryPolicy {
        read_retries: 0,
        backoff_ms: 1,
    };
    Arc::new(HttpLedger::new(&server.uri(), Duration::from_secs(2), retry).unwrap())
}

pub fn actor(name: &str, cents: i64, ledger: &Arc<dyn LedgerApi>) -> Arc<Actor> {
    Arc::new(Actor::new(name, Amount::from_cents(cents), ledger.clone()))
}
