//! Wallet connection lifecycle.
//!
//! `WalletSession` owns the provider handle, the connected address, the
//! shared ledger connection and the last balance it read. Locks are never
//! held across wallet or ledger calls.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{
    LedgerClient, LedgerConnector, Pubkey, TokenAmount, TokenMint, Transaction, WalletConnector,
    WalletProvider,
};
use crate::notifications::NotificationCenter;
use crate::{Error, Result};

/// Shown while the wallet asks the user to approve the sign-in challenge.
const CONFIRM_CONNECTION: &str = "Please confirm wallet connection";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletState {
    Disconnected,
    Connecting,
    Connected,
    SigningChallenge,
    SigningTransaction,
}

/// Result of `connect`. `signed_message` is the base64 signature over the
/// address text, present only when a sign-in challenge was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub address: Pubkey,
    pub signed_message: Option<String>,
}

struct Inner<P, L> {
    state: WalletState,
    provider: Option<Arc<P>>,
    address: Option<Pubkey>,
    balance: Option<TokenAmount>,
    ledger: Option<Arc<L>>,
}

impl<P, L> Default for Inner<P, L> {
    fn default() -> Self {
        Self {
            state: WalletState::Disconnected,
            provider: None,
            address: None,
            balance: None,
            ledger: None,
        }
    }
}

type ProviderOf<C> = <C as WalletConnector>::Provider;
type LedgerOf<L> = <L as LedgerConnector>::Client;

pub struct WalletSession<C: WalletConnector, L: LedgerConnector> {
    connector: C,
    ledger_connector: L,
    mint: TokenMint,
    notifications: NotificationCenter,
    wallet_timeout: Duration,
    inner: Mutex<Inner<ProviderOf<C>, LedgerOf<L>>>,
}

impl<C: WalletConnector, L: LedgerConnector> WalletSession<C, L> {
    pub fn new(
        connector: C,
        ledger_connector: L,
        mint: TokenMint,
        notifications: NotificationCenter,
        wallet_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            ledger_connector,
            mint,
            notifications,
            wallet_timeout,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner<ProviderOf<C>, LedgerOf<L>>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> WalletState {
        self.inner().state
    }

    /// Address of the connected wallet.
    pub fn address(&self) -> Option<Pubkey> {
        self.inner().address
    }

    pub fn last_balance(&self) -> Option<TokenAmount> {
        self.inner().balance
    }

    pub fn mint(&self) -> &TokenMint {
        &self.mint
    }

    /// Connects the wallet, optionally signing the sign-in challenge.
    ///
    /// An already connected wallet is reused without prompting unless a
    /// challenge is requested. Any failure leaves the session disconnected.
    pub async fn connect(&self, require_sign_in: bool) -> Result<ConnectOutcome> {
        if !require_sign_in {
            if let Some(address) = self.address() {
                return Ok(ConnectOutcome {
                    address,
                    signed_message: None,
                });
            }
        }

        let loading = require_sign_in.then(|| self.notifications.loading(CONFIRM_CONNECTION));
        let result = self.try_connect(require_sign_in).await;
        if let Some(id) = loading {
            self.notifications.remove(id);
        }

        result.map_err(|e| {
            warn!(error = %e, "Wallet connection failed");
            let mut inner = self.inner();
            inner.state = WalletState::Disconnected;
            inner.address = None;
            Error::WalletConnectFailed(Box::new(e))
        })
    }

    async fn try_connect(&self, require_sign_in: bool) -> Result<ConnectOutcome> {
        self.ledger()?;
        let provider = self.provider()?;

        self.inner().state = WalletState::Connecting;
        let address = self.with_timeout("connect", provider.connect()).await?;
        {
            let mut inner = self.inner();
            inner.address = Some(address);
            inner.state = WalletState::Connected;
        }
        info!(%address, "Wallet connected");

        if !require_sign_in {
            return Ok(ConnectOutcome {
                address,
                signed_message: None,
            });
        }

        self.inner().state = WalletState::SigningChallenge;
        let challenge = address.to_string();
        let signature = self
            .with_timeout("challenge signing", provider.sign_message(challenge.as_bytes()))
            .await?;
        self.finish_signing();

        Ok(ConnectOutcome {
            address,
            signed_message: Some(STANDARD.encode(signature)),
        })
    }

    /// Balance of the tracked token for the connected wallet, or for
    /// `known_owner` when no wallet is connected. A missing token account
    /// counts as zero.
    pub async fn balance(&self, known_owner: Option<&Pubkey>) -> Result<TokenAmount> {
        let owner = self
            .address()
            .or_else(|| known_owner.copied())
            .ok_or(Error::WalletUnavailable)?;
        let account = self.mint.associated_token_address(&owner);
        let ledger = self.ledger()?;

        let balance = ledger
            .token_account_balance(&account)
            .await?
            .unwrap_or_else(|| TokenAmount::zero(self.mint.decimals));
        debug!(%owner, %account, %balance, "Token balance");

        self.inner().balance = Some(balance);
        Ok(balance)
    }

    /// Signs a server-built transaction and submits it. Returns the
    /// transaction signature. Not retried.
    pub async fn sign_and_submit(&self, unsigned_tx: &str) -> Result<String> {
        self.connect(false).await?;
        let tx = Transaction::from_base64(unsigned_tx)?;

        let provider = self
            .inner()
            .provider
            .clone()
            .ok_or(Error::WalletUnavailable)?;
        let ledger = self.ledger()?;

        self.inner().state = WalletState::SigningTransaction;
        let result = self
            .with_timeout(
                "transaction signing",
                provider.sign_and_send_transaction(tx, &*ledger),
            )
            .await;
        self.finish_signing();

        match &result {
            Ok(signature) => info!(%signature, "Transaction submitted"),
            Err(e) => warn!(error = %e, "Transaction signing failed"),
        }
        result
    }

    /// Disconnects the wallet and forgets the address, balance and ledger
    /// connection. Safe to call when already disconnected.
    ///
    /// Any open provider handle is disconnected, including one left behind
    /// by a failed `connect` whose provider-side connect had succeeded.
    pub async fn disconnect(&self) {
        let provider = {
            let mut inner = self.inner();
            let provider = inner.provider.take();
            *inner = Inner::default();
            provider
        };

        if let Some(provider) = provider {
            if let Err(e) = self.with_timeout("disconnect", provider.disconnect()).await {
                warn!(error = %e, "Wallet disconnect failed");
            }
            info!("Wallet disconnected");
        }
    }

    /// Returns the shared ledger connection, creating it on first use.
    fn ledger(&self) -> Result<Arc<LedgerOf<L>>> {
        let mut inner = self.inner();
        if let Some(ledger) = &inner.ledger {
            return Ok(ledger.clone());
        }
        let ledger = Arc::new(self.ledger_connector.connect()?);
        inner.ledger = Some(ledger.clone());
        debug!("Ledger connection created");
        Ok(ledger)
    }

    fn provider(&self) -> Result<Arc<ProviderOf<C>>> {
        let mut inner = self.inner();
        if let Some(provider) = &inner.provider {
            return Ok(provider.clone());
        }
        let provider = Arc::new(self.connector.open()?);
        inner.provider = Some(provider.clone());
        Ok(provider)
    }

    /// Back to `Connected` unless a disconnect happened meanwhile.
    fn finish_signing(&self) {
        let mut inner = self.inner();
        if matches!(
            inner.state,
            WalletState::SigningChallenge | WalletState::SigningTransaction
        ) {
            inner.state = WalletState::Connected;
        }
    }

    async fn with_timeout<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.wallet_timeout, call)
            .await
            .map_err(|_| {
                Error::NetworkFailure(format!(
                    "wallet {} timed out after {}s",
                    operation,
                    self.wallet_timeout.as_secs()
                ))
            })?
    }
}
