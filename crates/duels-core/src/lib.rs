//! Core library for the duels client.
//!
//! Sign-in with a wallet signature, a renewable session that never issues two
//! refresh calls at once, and duel actions carried by wallet-signed
//! transactions that the server builds.
//!
//! - `auth`: credential storage and the `SessionManager`
//! - `wallet`: `WalletSession`, keypair wallet, ledger access, token accounts
//! - `api`: HTTP client for the duels service
//! - `flow`: `AuthFlow` and `TransactionFlow`
//! - `notifications`, `cache`, `config`: supporting state

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod flow;
pub mod models;
pub mod notifications;
pub mod wallet;

pub use error::{Error, Result};
