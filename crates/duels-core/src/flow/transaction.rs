//! Duel actions backed by a wallet-signed transaction.
//!
//! The server builds the unsigned transaction, the wallet signs and submits
//! it, and the server is told the resulting signature. Nothing is retried;
//! a failed step ends the flow and is reported once.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::api::RemoteService;
use crate::models::{ResolveDuelParams, WalletAction};
use crate::notifications::NotificationCenter;
use crate::wallet::{LedgerConnector, WalletConnector, WalletSession};
use crate::Result;

pub struct TransactionFlow<S, C: WalletConnector, L: LedgerConnector> {
    remote: Arc<S>,
    wallet: Arc<WalletSession<C, L>>,
    notifications: NotificationCenter,
}

impl<S, C, L> TransactionFlow<S, C, L>
where
    S: RemoteService,
    C: WalletConnector,
    L: LedgerConnector,
{
    pub fn new(
        remote: Arc<S>,
        wallet: Arc<WalletSession<C, L>>,
        notifications: NotificationCenter,
    ) -> Self {
        Self {
            remote,
            wallet,
            notifications,
        }
    }

    /// Runs `action` end to end and returns the server's final response.
    pub async fn execute(&self, action: &WalletAction) -> Result<Value> {
        match self.sign_submit_finalize(action).await {
            Ok(result) => {
                self.notifications.success("Transaction confirmed");
                Ok(result)
            }
            Err(e) => {
                warn!(action = action.name(), error = %e, "Wallet action failed");
                self.notifications.error(e.user_message());
                Err(e)
            }
        }
    }

    async fn sign_submit_finalize(&self, action: &WalletAction) -> Result<Value> {
        let unsigned_tx = self.remote.sign_transaction(action).await?;
        let tx_hash = self.wallet.sign_and_submit(&unsigned_tx).await?;
        info!(action = action.name(), %tx_hash, "Transaction submitted, finalizing");
        self.remote.finalize_transaction(action, &tx_hash).await
    }

    /// Resolves a duel. The payout is signed server-side, so the wallet is
    /// not involved.
    pub async fn resolve_duel(&self, params: &ResolveDuelParams) -> Result<Value> {
        match self.remote.resolve_duel(params).await {
            Ok(result) => {
                info!(duel_id = %params.duel_id, "Duel resolved");
                self.notifications.success("Duel resolved");
                Ok(result)
            }
            Err(e) => {
                warn!(duel_id = %params.duel_id, error = %e, "Duel resolution failed");
                self.notifications.error(e.user_message());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::flow::tests::StubRemote;
    use crate::models::{JoinDuelParams, SignInResponse};
    use crate::notifications::NotificationKind;
    use crate::wallet::session::tests::{
        session_with, unsigned_payload, StubConnector, StubLedgerConnector, StubWalletState,
    };
    use crate::wallet::SIGNATURE_BYTES;
    use crate::Error;

    type Flow = TransactionFlow<StubRemote, StubConnector, Arc<StubLedgerConnector>>;

    fn flow(remote: StubRemote) -> (Arc<StubRemote>, Arc<StubWalletState>, NotificationCenter, Flow) {
        let remote = Arc::new(remote);
        let notifications = NotificationCenter::new();
        let connector = StubConnector::default();
        let wallet_state = connector.state.clone();
        let wallet = Arc::new(session_with(
            connector,
            Arc::new(StubLedgerConnector::default()),
            notifications.clone(),
        ));
        let flow = TransactionFlow::new(remote.clone(), wallet, notifications.clone());
        (remote, wallet_state, notifications, flow)
    }

    fn remote_with_tx(unsigned_tx: Result<String>) -> StubRemote {
        let mut remote = StubRemote::new(Err::<SignInResponse, _>(Error::AuthExpired));
        remote.unsigned_tx = unsigned_tx;
        remote
    }

    fn join() -> WalletAction {
        WalletAction::JoinDuel(JoinDuelParams {
            duel_id: "42".to_string(),
            answer: 0,
            invited_by: Some("friend".to_string()),
            external_source: None,
        })
    }

    #[tokio::test]
    async fn test_execute_finalizes_with_signature() {
        let (remote, wallet, notifications, flow) = flow(remote_with_tx(Ok(unsigned_payload())));

        let result = flow.execute(&join()).await.expect("action completed");

        let expected = bs58::encode([7u8; SIGNATURE_BYTES]).into_string();
        assert_eq!(result["tx_hash"], expected.as_str());
        assert_eq!(remote.count("finalize_transaction"), 1);
        assert_eq!(wallet.submissions.load(Ordering::SeqCst), 1);
        let active = notifications.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].kind, NotificationKind::Success);
    }

    #[tokio::test]
    async fn test_no_finalize_when_signing_fails() {
        let (remote, wallet, notifications, flow) = flow(remote_with_tx(Ok(unsigned_payload())));
        wallet.reject_signing.store(true, Ordering::SeqCst);

        let err = flow.execute(&join()).await.expect_err("wallet declined");

        assert!(matches!(err, Error::WalletRejected(_)));
        assert_eq!(remote.count("sign_transaction"), 1);
        assert_eq!(remote.count("finalize_transaction"), 0);
        let active = notifications.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].kind, NotificationKind::Error);
    }

    #[tokio::test]
    async fn test_server_refusal_stops_before_wallet() {
        let refused = Err(Error::RemoteRejected {
            status: 400,
            message: Some("duel is already closed".to_string()),
        });
        let (remote, wallet, notifications, flow) = flow(remote_with_tx(refused));

        assert!(flow.execute(&join()).await.is_err());

        assert_eq!(wallet.connects.load(Ordering::SeqCst), 0);
        assert_eq!(remote.count("finalize_transaction"), 0);
        assert_eq!(notifications.active()[0].text, "duel is already closed");
    }

    #[tokio::test]
    async fn test_resolve_skips_wallet() {
        let (remote, wallet, _notifications, flow) = flow(remote_with_tx(Ok(String::new())));

        let result = flow
            .resolve_duel(&ResolveDuelParams {
                duel_id: "42".to_string(),
                answer: 1,
            })
            .await
            .expect("resolved");

        assert_eq!(result["resolved"], true);
        assert_eq!(remote.count("resolve_duel"), 1);
        assert_eq!(wallet.connects.load(Ordering::SeqCst), 0);
    }
}
