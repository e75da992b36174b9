//! Authentication module for managing session credentials.
//!
//! This module provides:
//! - `CredentialStore`: expiring credential storage (`KeyringStore` backed by
//!   the OS keychain, `MemoryStore` for process-local use)
//! - `SessionManager`: access/refresh lifecycle with single-flight renewal
//!
//! Access credentials live for 1 hour, refresh credentials for 720 hours.

pub mod credentials;
pub mod session;

pub use credentials::{CredentialStore, KeyringStore, MemoryStore};
pub use session::{SessionManager, TokenRenewer, ACCESS_TOKEN, REFRESH_TOKEN};
