//! User-facing flows composed from the session, wallet and remote service.
//!
//! - `AuthFlow`: wallet sign-in, logout and lazy profile loading
//! - `TransactionFlow`: server-built transactions signed by the wallet

pub mod auth;
pub mod transaction;

pub use auth::AuthFlow;
pub use transaction::TransactionFlow;
