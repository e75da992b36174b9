//! Wallet module: the user's signing capability and ledger access.
//!
//! This module provides:
//! - `WalletSession`: connection lifecycle, challenge signing, balances and
//!   sign-and-submit of server-built transactions
//! - `WalletProvider` / `WalletConnector`: the opaque wallet capability
//! - `LedgerClient` / `LedgerConnector`: balance reads and submission
//!   (`RpcLedger` over JSON-RPC)
//! - `KeypairWallet`: a local ed25519 keypair provider
//! - `Pubkey`, `TokenMint`, `TokenAmount`: addresses and token balances

use std::future::Future;

pub mod keypair;
pub mod ledger;
pub mod pubkey;
pub mod session;
pub mod token;
pub mod transaction;

pub use keypair::{KeypairConnector, KeypairWallet};
pub use ledger::{LedgerClient, LedgerConnector, RpcConnector, RpcLedger};
pub use pubkey::{parse_pubkey, Pubkey};
pub use session::{ConnectOutcome, WalletSession, WalletState};
pub use token::{
    associated_token_address, TokenAmount, TokenMint, TOKEN_PROGRAM_ID, USDC_DECIMALS, USDC_MINT,
};
pub use transaction::{Transaction, SIGNATURE_BYTES};

use crate::Result;

/// A connected wallet's capabilities.
pub trait WalletProvider: Send + Sync + 'static {
    /// Asks the user to connect; returns the wallet's public key.
    fn connect(&self) -> impl Future<Output = Result<Pubkey>> + Send;

    /// Signs arbitrary bytes with the wallet key.
    fn sign_message(&self, message: &[u8]) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Signs `tx` and submits it through `ledger`. Returns the signature.
    fn sign_and_send_transaction<L: LedgerClient>(
        &self,
        tx: Transaction,
        ledger: &L,
    ) -> impl Future<Output = Result<String>> + Send;

    fn disconnect(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Produces a provider handle. Fails with `WalletUnavailable` when no wallet
/// is installed or configured.
pub trait WalletConnector: Send + Sync + 'static {
    type Provider: WalletProvider;

    fn open(&self) -> Result<Self::Provider>;
}
