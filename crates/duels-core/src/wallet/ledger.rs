//! Read/submit access to the ledger over Solana JSON-RPC.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{Pubkey, TokenAmount, Transaction};
use crate::api::ApiError;
use crate::{Error, Result};

/// Commitment used for balance reads and preflight.
const COMMITMENT: &str = "confirmed";

/// JSON-RPC "invalid params" code, returned for accounts that do not exist.
const INVALID_PARAMS_CODE: i64 = -32602;

pub trait LedgerClient: Send + Sync + 'static {
    /// Balance of a token account. `None` if the account does not exist.
    fn token_account_balance(
        &self,
        account: &Pubkey,
    ) -> impl Future<Output = Result<Option<TokenAmount>>> + Send;

    /// Submits a fully signed transaction and returns its signature.
    fn send_transaction(&self, tx: &Transaction) -> impl Future<Output = Result<String>> + Send;
}

/// Creates the ledger connection the first time one is needed.
pub trait LedgerConnector: Send + Sync + 'static {
    type Client: LedgerClient;

    fn connect(&self) -> Result<Self::Client>;
}

#[derive(Debug, Clone)]
pub struct RpcConnector {
    url: String,
    timeout: Duration,
}

impl RpcConnector {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

impl LedgerConnector for RpcConnector {
    type Client = RpcLedger;

    fn connect(&self) -> Result<RpcLedger> {
        RpcLedger::new(&self.url, self.timeout)
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn is_missing_account(&self) -> bool {
        self.code == INVALID_PARAMS_CODE && self.message.contains("could not find account")
    }
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct UiTokenAmount {
    amount: String,
    decimals: u8,
}

impl UiTokenAmount {
    fn to_amount(&self) -> Result<TokenAmount> {
        let amount = self
            .amount
            .parse::<u64>()
            .map_err(|e| Error::NetworkFailure(format!("invalid token amount {:?}: {}", self.amount, e)))?;
        Ok(TokenAmount {
            amount,
            decimals: self.decimals,
        })
    }
}

/// JSON-RPC ledger client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct RpcLedger {
    client: Client,
    url: String,
    next_id: std::sync::Arc<AtomicU64>,
}

impl RpcLedger {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::NetworkFailure(format!("failed to build RPC client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
            next_id: std::sync::Arc::new(AtomicU64::new(1)),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<RpcResponse<T>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method, id, "RPC request");
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::from)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::NetworkFailure(format!(
                "RPC {} returned {}: {}",
                method,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        Ok(response.json().await.map_err(ApiError::from)?)
    }
}

impl LedgerClient for RpcLedger {
    async fn token_account_balance(&self, account: &Pubkey) -> Result<Option<TokenAmount>> {
        let response: RpcResponse<WithContext<UiTokenAmount>> = self
            .call(
                "getTokenAccountBalance",
                json!([account.to_string(), { "commitment": COMMITMENT }]),
            )
            .await?;
        parse_balance(response)
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<String> {
        let response: RpcResponse<String> = self
            .call(
                "sendTransaction",
                json!([
                    tx.to_base64()?,
                    { "encoding": "base64", "preflightCommitment": COMMITMENT }
                ]),
            )
            .await?;
        parse_send(response)
    }
}

fn parse_send(response: RpcResponse<String>) -> Result<String> {
    match (response.result, response.error) {
        (Some(signature), _) => Ok(signature),
        (None, Some(err)) => {
            warn!(code = err.code, message = %err.message, "Transaction rejected");
            Err(Error::SubmissionRejected(err.message))
        }
        (None, None) => Err(Error::NetworkFailure(
            "sendTransaction returned neither result nor error".to_string(),
        )),
    }
}

fn parse_balance(response: RpcResponse<WithContext<UiTokenAmount>>) -> Result<Option<TokenAmount>> {
    match (response.result, response.error) {
        (Some(result), _) => result.value.to_amount().map(Some),
        (None, Some(err)) if err.is_missing_account() => Ok(None),
        (None, Some(err)) => Err(Error::NetworkFailure(format!(
            "getTokenAccountBalance failed ({}): {}",
            err.code, err.message
        ))),
        (None, None) => Err(Error::NetworkFailure(
            "getTokenAccountBalance returned neither result nor error".to_string(),
        )),
    }
}
