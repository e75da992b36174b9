//! REST API client module for the duels service.
//!
//! This module provides the `ApiClient` for the wallet sign-in, credential
//! refresh, user, duel listing and duel transaction endpoints, and
//! `DuelsService`, which
//! attaches the session's access credential to every authorized call.
//!
//! Flows depend on the `RemoteService` trait rather than on HTTP.

use std::future::Future;

use serde_json::Value;

pub mod client;
pub mod error;

pub use client::{ApiClient, DuelsService};
pub use error::ApiError;

use crate::models::{Duel, ResolveDuelParams, SignInResponse, User, WalletAction};
use crate::Result;

/// The remote operations the auth and transaction flows rely on.
pub trait RemoteService: Send + Sync + 'static {
    /// Exchanges a signed address challenge for a credential pair.
    fn sign_in(
        &self,
        address: &str,
        signed_message: &str,
    ) -> impl Future<Output = Result<SignInResponse>> + Send;

    fn get_user(&self) -> impl Future<Output = Result<User>> + Send;

    /// Duels created by the signed-in user.
    fn my_duels(&self) -> impl Future<Output = Result<Vec<Duel>>> + Send;

    /// Asks the server to build the unsigned transaction for `action`.
    /// Returns it base64-encoded.
    fn sign_transaction(&self, action: &WalletAction) -> impl Future<Output = Result<String>> + Send;

    /// Reports the submitted transaction's signature for `action`.
    fn finalize_transaction(
        &self,
        action: &WalletAction,
        tx_hash: &str,
    ) -> impl Future<Output = Result<Value>> + Send;

    fn resolve_duel(&self, params: &ResolveDuelParams) -> impl Future<Output = Result<Value>> + Send;
}
