//! HTTP client for the ledger service

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, instrument, trace, warn};

use crate::config::{HarnessConfig, RetryPolicy};
use crate::money::Amount;

use super::{
    AccountId, AccountInfo, CreateAccountRequest, ExistingAccount, LedgerApi, LedgerError,
    LedgerResult, TransferRequest,
};

/// [`LedgerApi`] over HTTP
///
/// The underlying `reqwest::Client` is reused for every request and carries the
/// per-request timeout, so a stalled service never hangs a worker forever.
#[derive(Debug, Clone)]
pub struct HttpLedger {
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpLedger {
    /// Create a client for the service at `base_url`
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> LedgerResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            retry,
        })
    }

    pub fn from_config(config: &HarnessConfig) -> LedgerResult<Self> {
        Self::new(
            &config.base_url,
            config.request_timeout(),
            config.retry.clone(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The shared HTTP client, for raw load targets against the same service
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn fetch_account(&self, id: &AccountId) -> LedgerResult<AccountInfo> {
        let url = self.url(&format!("/accounts/{id}"));
        trace!("requesting {url}");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(LedgerError::Status {
                code: response.status().as_u16(),
            });
        }

        response
            .json::<AccountInfo>()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))
    }
}

#[async_trait]
impl LedgerApi for HttpLedger {
    #[instrument(skip(self), fields(initial_balance = %initial_balance))]
    async fn create_account(&self, initial_balance: Amount) -> LedgerResult<AccountInfo> {
        let response = self
            .client
            .post(self.url("/accounts"))
            .json(&CreateAccountRequest { initial_balance })
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::CONFLICT {
            // the service keeps the account it already created; hand its id to the caller
            return match response.json::<ExistingAccount>().await {
                Ok(existing) => Err(LedgerError::AlreadyExists { id: existing.id }),
                Err(_) => Err(LedgerError::Status {
                    code: status.as_u16(),
                }),
            };
        }

        if !status.is_success() {
            return Err(LedgerError::Status {
                code: status.as_u16(),
            });
        }

        let account = response
            .json::<AccountInfo>()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))?;

        debug!("created account {} with balance {}", account.id, account.balance);
        Ok(account)
    }

    /// Reads are idempotent, so transient failures are retried with backoff.
    #[instrument(skip(self), fields(account = %id))]
    async fn get_account(&self, id: &AccountId) -> LedgerResult<AccountInfo> {
        let mut backoff = self.retry.backoff();
        let mut attempt = 0;

        loop {
            match self.fetch_account(id).await {
                Ok(account) => return Ok(account),
                Err(e) if e.is_transient() && attempt < self.retry.read_retries => {
                    attempt += 1;
                    warn!("balance query failed ({e}), retry {attempt} in {backoff:?}");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Never retried: a lost response may hide a transfer that did happen.
    #[instrument(skip(self), fields(from = %from, to = %to, amount = %amount))]
    async fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> LedgerResult<()> {
        let request = TransferRequest {
            from_account_id: from.clone(),
            to_account_id: to.clone(),
            amount,
        };

        let response = self
            .client
            .post(self.url("/accounts/transfer"))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LedgerError::Status {
                code: response.status().as_u16(),
            });
        }

        trace!("transfer acknowledged");
        Ok(())
    }
}
