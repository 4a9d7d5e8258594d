//! HTTP client for the downstream billing service
//!
//! Implements the `AccountProvisioner` port over a plain JSON-over-HTTP RPC.
//! The interesting part is the error classification: timeouts, connection
//! failures, 429/503 and 5xx responses map to the transient variants the
//! retry policy acts on; 4xx responses map to the non-retryable ones.

use std::time::Duration;

use async_trait::async_trait;
use provana_core::{AccountProvisioner, AccountStatus, BillingCallError, ProvisionedAccount};
use provana_domain::BillingConfig;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Configuration for the billing HTTP client
#[derive(Debug, Clone)]
pub struct BillingClientConfig {
    /// Base URL of the billing service
    pub base_url: String,
    /// Timeout for one request
    pub timeout: Duration,
}

impl Default for BillingClientConfig {
    fn default() -> Self {
        Self { base_url: "http://localhost:9001".to_string(), timeout: Duration::from_secs(5) }
    }
}

impl From<&BillingConfig> for BillingClientConfig {
    fn from(config: &BillingConfig) -> Self {
        Self {
            base_url: config.endpoint.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

/// HTTP adapter for the billing RPC
pub struct HttpBillingClient {
    http: reqwest::Client,
    config: BillingClientConfig,
}

#[derive(Debug, Serialize)]
struct CreateAccountRequest<'a> {
    subject_id: &'a str,
    name: &'a str,
    contact: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateAccountResponse {
    account_ref: String,
    status: String,
}

impl HttpBillingClient {
    /// Create a client with default configuration
    pub fn new() -> Result<Self, BillingCallError> {
        Self::with_config(BillingClientConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(config: BillingClientConfig) -> Result<Self, BillingCallError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BillingCallError::InvalidRequest(format!("client build failed: {e}")))?;

        Ok(Self { http, config })
    }

    fn classify_transport(&self, err: reqwest::Error) -> BillingCallError {
        if err.is_timeout() {
            BillingCallError::Timeout(self.config.timeout)
        } else if err.is_connect() {
            BillingCallError::Connect(err.to_string())
        } else {
            BillingCallError::Server(err.to_string())
        }
    }
}

fn classify_status(status: StatusCode, body: String) -> BillingCallError {
    match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
            BillingCallError::Busy(format!("{status}: {body}"))
        }
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            BillingCallError::InvalidRequest(format!("{status}: {body}"))
        }
        status if status.is_server_error() => BillingCallError::Server(format!("{status}: {body}")),
        status => BillingCallError::Rejected(format!("{status}: {body}")),
    }
}

fn parse_status(raw: &str) -> Result<AccountStatus, BillingCallError> {
    match raw {
        "ACTIVE" => Ok(AccountStatus::Active),
        "PENDING" => Ok(AccountStatus::Pending),
        other => Err(BillingCallError::Server(format!("unexpected account status: {other}"))),
    }
}

#[async_trait]
impl AccountProvisioner for HttpBillingClient {
    #[instrument(skip(self, name, contact))]
    async fn create_account(
        &self,
        subject_id: &str,
        name: &str,
        contact: &str,
    ) -> Result<ProvisionedAccount, BillingCallError> {
        let url = format!("{}/accounts", self.config.base_url);
        debug!(url = %url, "creating billing account");

        let response = self
            .http
            .post(&url)
            .json(&CreateAccountRequest { subject_id, name, contact })
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let body: CreateAccountResponse = response
            .json()
            .await
            .map_err(|e| BillingCallError::Server(format!("malformed response: {e}")))?;

        Ok(ProvisionedAccount {
            account_ref: body.account_ref,
            status: parse_status(&body.status)?,
        })
    }
}
