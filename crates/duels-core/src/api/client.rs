//! API client for communicating with the duels REST API.
//!
//! `ApiClient` speaks HTTP and knows the endpoint paths and payload shapes.
//! `DuelsService` pairs it with the `SessionManager` so that authorized
//! calls carry a fresh access credential.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{ApiError, RemoteService};
use crate::auth::{SessionManager, TokenRenewer};
use crate::models::auth::{RefreshResponse, UserResponse};
use crate::models::{
    Duel, DuelDetail, ResolveDuelParams, SignInRequest, SignInResponse, TokenPair, User,
    WalletAction,
};
use crate::{Error, Result};

const SIGN_IN_PATH: &str = "auth/sign-in-wallet";
const REFRESH_PATH: &str = "auth/refresh";
const USER_PATH: &str = "user";
const USER_STATS_PATH: &str = "user/stats";
const MY_DUELS_PATH: &str = "duel/my";
const RESOLVE_PATH: &str = "crypto-duel/solana/resolve";

/// Response of the unsigned-transaction endpoints.
#[derive(Debug, Deserialize)]
struct UnsignedTransactionResponse {
    tx: String,
}

/// Endpoint that builds the unsigned transaction for `action`.
fn sign_path(action: &WalletAction) -> &'static str {
    match action {
        WalletAction::CreateDuel(_) => "crypto-duel/solana/sign-tx",
        WalletAction::JoinDuel(_) => "crypto-duel/solana/join/sign-tx",
    }
}

/// Endpoint that records the submitted transaction for `action`.
fn finalize_path(action: &WalletAction) -> &'static str {
    match action {
        WalletAction::CreateDuel(_) => "crypto-duel/solana",
        WalletAction::JoinDuel(_) => "crypto-duel/solana/join",
    }
}

fn duel_path(duel_id: &str) -> String {
    format!("duel/{}", duel_id.trim())
}

/// Parses a success body. An empty body reads as JSON `null`.
fn parse_body<T: DeserializeOwned>(path: &str, text: &str) -> Result<T> {
    let text = if text.trim().is_empty() { "null" } else { text };
    serde_json::from_str(text).map_err(|e| {
        ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", path, e))
            .into()
    })
}

/// API client for the duels service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::NetworkFailure(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(), // Cheap clone, shares connection pool
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| Error::AuthExpired)?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, path: &str) -> Result<T> {
        let response = request
            .headers(self.auth_headers()?)
            .send()
            .await
            .map_err(ApiError::from)?;

        let response = match Self::check_response(response).await {
            Ok(response) => response,
            Err(e) => {
                warn!(path, error = %e, "Request failed");
                return Err(e);
            }
        };

        let text = response.text().await.map_err(ApiError::from)?;
        parse_body(path, &text)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!(path, "GET");
        self.send(self.client.get(self.url(path)), path).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        debug!(path, "POST");
        self.send(self.client.post(self.url(path)).json(body), path).await
    }

    async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        debug!(path, "PUT");
        self.send(self.client.put(self.url(path)).json(body), path).await
    }

    // ===== Authentication =====

    pub async fn sign_in(&self, address: &str, signed_message: &str) -> Result<SignInResponse> {
        self.post(
            SIGN_IN_PATH,
            &SignInRequest {
                address,
                secret: signed_message,
            },
        )
        .await
    }

    // ===== Authorized endpoints =====

    pub async fn fetch_user(&self) -> Result<User> {
        let response: UserResponse = self.get(USER_PATH).await?;
        Ok(response.user)
    }

    /// Aggregate numbers for the signed-in user, passed through as returned.
    pub async fn user_stats(&self) -> Result<Value> {
        self.get(USER_STATS_PATH).await
    }

    pub async fn my_duels(&self) -> Result<Vec<Duel>> {
        self.get(MY_DUELS_PATH).await
    }

    pub async fn duel(&self, duel_id: &str) -> Result<DuelDetail> {
        self.get(&duel_path(duel_id)).await
    }

    pub async fn request_transaction(&self, action: &WalletAction) -> Result<String> {
        let response: UnsignedTransactionResponse =
            self.post(sign_path(action), &action.sign_body()).await?;
        Ok(response.tx)
    }

    pub async fn finalize_transaction(&self, action: &WalletAction, tx_hash: &str) -> Result<Value> {
        self.post(finalize_path(action), &action.finalize_body(tx_hash))
            .await
    }

    pub async fn resolve_duel(&self, params: &ResolveDuelParams) -> Result<Value> {
        self.put(RESOLVE_PATH, params).await
    }
}

impl TokenRenewer for ApiClient {
    /// The refresh endpoint takes the raw refresh credential as the
    /// `Authorization` header.
    async fn renew(&self, refresh_token: &str) -> Result<TokenPair> {
        let value =
            header::HeaderValue::from_str(refresh_token).map_err(|_| Error::AuthExpired)?;
        debug!(path = REFRESH_PATH, "POST");

        let response = self
            .client
            .post(self.url(REFRESH_PATH))
            .header(header::AUTHORIZATION, value)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(ApiError::from)?;
        let response = Self::check_response(response).await?;

        let text = response.text().await.map_err(ApiError::from)?;
        let parsed: RefreshResponse = parse_body(REFRESH_PATH, &text)?;
        Ok(parsed.jwt_info)
    }
}

/// `RemoteService` over HTTP with session-managed credentials.
pub struct DuelsService {
    client: ApiClient,
    session: Arc<SessionManager<ApiClient>>,
}

impl DuelsService {
    pub fn new(client: ApiClient, session: Arc<SessionManager<ApiClient>>) -> Self {
        Self { client, session }
    }

    pub fn session(&self) -> &Arc<SessionManager<ApiClient>> {
        &self.session
    }

    /// A client carrying the current access credential, renewed if needed.
    async fn authorized(&self) -> Result<ApiClient> {
        let token = self
            .session
            .access_credential()
            .await?
            .ok_or(Error::AuthExpired)?;
        Ok(self.client.with_token(token))
    }

    pub async fn user_stats(&self) -> Result<Value> {
        self.authorized().await?.user_stats().await
    }

    pub async fn duel(&self, duel_id: &str) -> Result<DuelDetail> {
        self.authorized().await?.duel(duel_id).await
    }
}

impl RemoteService for DuelsService {
    async fn sign_in(&self, address: &str, signed_message: &str) -> Result<SignInResponse> {
        self.client.sign_in(address, signed_message).await
    }

    async fn get_user(&self) -> Result<User> {
        self.authorized().await?.fetch_user().await
    }

    async fn my_duels(&self) -> Result<Vec<Duel>> {
        self.authorized().await?.my_duels().await
    }

    async fn sign_transaction(&self, action: &WalletAction) -> Result<String> {
        self.authorized().await?.request_transaction(action).await
    }

    async fn finalize_transaction(&self, action: &WalletAction, tx_hash: &str) -> Result<Value> {
        self.authorized()
            .await?
            .finalize_transaction(action, tx_hash)
            .await
    }

    async fn resolve_duel(&self, params: &ResolveDuelParams) -> Result<Value> {
        self.authorized().await?.resolve_duel(params).await
    }
}
