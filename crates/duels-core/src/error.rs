//! Error taxonomy shared by the session, wallet and flow layers.

use thiserror::Error;

/// Generic text shown when a failure carries no user-facing message.
const GENERIC_USER_MESSAGE: &str = "Something went wrong. Please try again.";

/// Errors surfaced by the client core.
///
/// `Clone` is required: a single renewal outcome is handed to every
/// caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("No wallet provider available")]
    WalletUnavailable,

    #[error("Wallet request rejected: {0}")]
    WalletRejected(String),

    #[error("Wallet connection failed: {0}")]
    WalletConnectFailed(#[source] Box<Error>),

    /// The refresh credential is invalid or gone; only a fresh sign-in helps.
    #[error("Session expired - sign in again")]
    AuthExpired,

    #[error("Network error: {0}")]
    NetworkFailure(String),

    #[error("Request rejected ({status}): {}", .message.as_deref().unwrap_or("no details"))]
    RemoteRejected {
        status: u16,
        message: Option<String>,
    },

    /// The ledger refused a signed transaction (simulation or preflight failure).
    #[error("Transaction rejected by the network: {0}")]
    SubmissionRejected(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Text suitable for a notification. Internal detail stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Error::RemoteRejected {
                message: Some(message),
                ..
            } => message.clone(),
            Error::WalletConnectFailed(cause) => match cause.root_cause() {
                Error::WalletRejected(_) => "Wallet connection was declined".to_string(),
                Error::WalletUnavailable => Error::WalletUnavailable.user_message(),
                _ => "Wallet connection failed".to_string(),
            },
            Error::WalletUnavailable => "No wallet found. Install a wallet to continue.".to_string(),
            Error::WalletRejected(_) => "Request was declined in the wallet".to_string(),
            Error::AuthExpired => "Your session has expired. Please sign in again.".to_string(),
            Error::SubmissionRejected(_) => "The network rejected the transaction".to_string(),
            Error::NetworkFailure(_) => {
                "Unable to reach the server. Check your connection.".to_string()
            }
            _ => GENERIC_USER_MESSAGE.to_string(),
        }
    }

    /// Unwraps `WalletConnectFailed` to the underlying cause.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::WalletConnectFailed(cause) => cause.root_cause(),
            other => other,
        }
    }
}
