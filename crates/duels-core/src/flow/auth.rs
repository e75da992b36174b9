//! Wallet sign-in and logout.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::RemoteService;
use crate::auth::{SessionManager, TokenRenewer};
use crate::cache::CacheManager;
use crate::models::User;
use crate::notifications::NotificationCenter;
use crate::wallet::{parse_pubkey, LedgerConnector, WalletConnector, WalletSession};
use crate::{Error, Result};

pub struct AuthFlow<S, R, C: WalletConnector, L: LedgerConnector> {
    remote: Arc<S>,
    session: Arc<SessionManager<R>>,
    wallet: Arc<WalletSession<C, L>>,
    cache: Arc<CacheManager>,
    notifications: NotificationCenter,
}

impl<S, R, C, L> AuthFlow<S, R, C, L>
where
    S: RemoteService,
    R: TokenRenewer,
    C: WalletConnector,
    L: LedgerConnector,
{
    pub fn new(
        remote: Arc<S>,
        session: Arc<SessionManager<R>>,
        wallet: Arc<WalletSession<C, L>>,
        cache: Arc<CacheManager>,
        notifications: NotificationCenter,
    ) -> Self {
        Self {
            remote,
            session,
            wallet,
            cache,
            notifications,
        }
    }

    /// Connects the wallet, signs the challenge and exchanges it for a
    /// session. Returns the signed-in user when known.
    ///
    /// A failed connect or exchange raises one error notification. Whatever
    /// succeeded before the failure stays in place so the user can retry.
    pub async fn sign_in(&self) -> Result<Option<User>> {
        if let Err(e) = self.exchange_challenge().await {
            warn!(error = %e, "Sign-in failed");
            self.notifications.error(e.user_message());
            return Err(e);
        }

        let user = self.load_user().await;
        if user.is_none() {
            self.refresh_balance(None).await;
        }

        info!("Signed in");
        Ok(user)
    }

    async fn exchange_challenge(&self) -> Result<()> {
        let connection = self.wallet.connect(true).await?;
        let signed_message = connection
            .signed_message
            .ok_or_else(|| Error::WalletRejected("wallet returned no signature".to_string()))?;

        let response = self
            .remote
            .sign_in(&connection.address.to_string(), &signed_message)
            .await?;

        self.session
            .establish(&response.jwt_info.access_token, &response.jwt_info.refresh_token);
        if let Some(user) = response.user {
            self.cache.store_user(user);
        }
        Ok(())
    }

    /// Clears the session, the cached user and pending notifications, then
    /// disconnects the wallet.
    pub async fn log_out(&self) {
        self.session.clear();
        self.cache.clear();
        self.notifications.clear();
        self.wallet.disconnect().await;
        info!("Logged out");
    }

    /// Returns the cached user, fetching it first when a session exists and
    /// nothing is cached, then refreshes the token balance. Never fails;
    /// problems are logged.
    pub async fn load_user(&self) -> Option<User> {
        let user = match self.cache.user() {
            Some(user) => user,
            None => self.fetch_user().await?,
        };
        self.refresh_balance(Some(&user)).await;
        Some(user)
    }

    async fn fetch_user(&self) -> Option<User> {
        match self.session.access_credential().await {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!("No session, skipping user fetch");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "No usable credential for user fetch");
                return None;
            }
        }

        match self.remote.get_user().await {
            Ok(user) => {
                self.cache.store_user(user.clone());
                Some(user)
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch user");
                None
            }
        }
    }

    /// Balance of the connected wallet, or of the user's address on file
    /// while no wallet is connected.
    async fn refresh_balance(&self, user: Option<&User>) {
        let on_file = user
            .and_then(|user| user.public_address.as_deref())
            .and_then(|address| match parse_pubkey(address) {
                Ok(owner) => Some(owner),
                Err(e) => {
                    warn!(error = %e, "Ignoring invalid wallet address on file");
                    None
                }
            });

        match self.wallet.balance(on_file.as_ref()).await {
            Ok(_) => {}
            Err(Error::WalletUnavailable) => debug!("No wallet or address for balance refresh"),
            Err(e) => warn!(error = %e, "Balance refresh failed"),
        }
    }

    /// Number of the user's own duels that are neither resolved nor
    /// refunded. Zero without a session.
    pub async fn resolve_count(&self) -> Result<usize> {
        if self.session.access_credential().await?.is_none() {
            return Ok(0);
        }
        let duels = self.remote.my_duels().await?;
        Ok(duels.iter().filter(|duel| !duel.status.is_settled()).count())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::auth::session::tests::{pair, StubRenewer};
    use crate::auth::{CredentialStore, MemoryStore, ACCESS_TOKEN, REFRESH_TOKEN};
    use crate::flow::tests::{user, StubRemote};
    use crate::models::SignInResponse;
    use crate::notifications::NotificationKind;
    use crate::wallet::session::tests::{
        session_with, StubConnector, StubLedgerConnector, StubSession, StubWalletState,
        WALLET_ADDRESS,
    };
    use crate::wallet::{TokenAmount, WalletState};

    struct Harness {
        store: Arc<MemoryStore>,
        renewer: Arc<StubRenewer>,
        remote: Arc<StubRemote>,
        wallet_state: Arc<StubWalletState>,
        wallet: Arc<StubSession>,
        cache: Arc<CacheManager>,
        notifications: NotificationCenter,
        flow: AuthFlow<StubRemote, StubRenewer, StubConnector, Arc<StubLedgerConnector>>,
    }

    fn harness(remote: StubRemote, renewer: StubRenewer) -> Harness {
        harness_with_ledger(remote, renewer, StubLedgerConnector::default())
    }

    fn harness_with_ledger(
        remote: StubRemote,
        renewer: StubRenewer,
        ledger: StubLedgerConnector,
    ) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let renewer = Arc::new(renewer);
        let session = Arc::new(SessionManager::new(store.clone(), renewer.clone()));
        let remote = Arc::new(remote);
        let notifications = NotificationCenter::new();
        let connector = StubConnector::default();
        let wallet_state = connector.state.clone();
        let wallet = Arc::new(session_with(
            connector,
            Arc::new(ledger),
            notifications.clone(),
        ));
        let cache = Arc::new(CacheManager::in_memory());
        let flow = AuthFlow::new(
            remote.clone(),
            session,
            wallet.clone(),
            cache.clone(),
            notifications.clone(),
        );
        Harness {
            store,
            renewer,
            remote,
            wallet_state,
            wallet,
            cache,
            notifications,
            flow,
        }
    }

    fn seed_access(store: &MemoryStore) {
        store.set(
            ACCESS_TOKEN,
            "A1",
            chrono::Utc::now() + chrono::Duration::hours(1),
        );
    }

    fn signed_in(user_id: &str) -> Result<SignInResponse> {
        Ok(SignInResponse {
            jwt_info: pair("A1", "R1"),
            user: Some(user(user_id)),
        })
    }

    #[tokio::test]
    async fn test_sign_in_stores_session_and_user() {
        let h = harness(StubRemote::new(signed_in("1")), StubRenewer::returning(Ok(pair("A2", "R2"))));

        let signed_in_user = h.flow.sign_in().await.expect("signed in");

        assert_eq!(h.store.get(ACCESS_TOKEN).as_deref(), Some("A1"));
        assert_eq!(h.store.get(REFRESH_TOKEN).as_deref(), Some("R1"));
        assert_eq!(signed_in_user.map(|u| u.id), Some("1".to_string()));
        assert_eq!(h.cache.user().map(|u| u.id), Some("1".to_string()));
        assert_eq!(h.remote.count("get_user"), 0);
        assert_eq!(h.wallet.address(), Some(WALLET_ADDRESS));
        assert!(h.wallet.last_balance().is_some());
        assert!(h.notifications.active().is_empty());
    }

    #[tokio::test]
    async fn test_sign_in_fetches_user_when_response_has_none() {
        let remote = StubRemote::new(Ok(SignInResponse {
            jwt_info: pair("A1", "R1"),
            user: None,
        }));
        let h = harness(remote, StubRenewer::returning(Ok(pair("A2", "R2"))));

        let signed_in_user = h.flow.sign_in().await.expect("signed in");

        assert_eq!(h.remote.count("get_user"), 1);
        assert_eq!(signed_in_user.map(|u| u.id), Some("from-get-user".to_string()));
    }

    #[tokio::test]
    async fn test_rejected_exchange_raises_one_notification() {
        let rejected = Err(Error::RemoteRejected {
            status: 400,
            message: Some("invalid signature".to_string()),
        });
        let h = harness(StubRemote::new(rejected), StubRenewer::returning(Ok(pair("A2", "R2"))));

        let err = h.flow.sign_in().await.expect_err("exchange rejected");

        assert!(matches!(err, Error::RemoteRejected { status: 400, .. }));
        let active = h.notifications.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].kind, NotificationKind::Error);
        assert_eq!(active[0].text, "invalid signature");
        assert!(h.store.get(REFRESH_TOKEN).is_none());
        // The wallet connection is left for the retry.
        assert_eq!(h.wallet.state(), WalletState::Connected);
    }

    #[tokio::test]
    async fn test_declined_wallet_skips_exchange() {
        let h = harness(StubRemote::new(signed_in("1")), StubRenewer::returning(Ok(pair("A2", "R2"))));
        h.wallet_state.reject_signing.store(true, Ordering::SeqCst);

        assert!(h.flow.sign_in().await.is_err());

        assert_eq!(h.remote.count("sign_in"), 0);
        let active = h.notifications.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].text, "Wallet connection was declined");
    }

    #[tokio::test]
    async fn test_log_out_clears_everything() {
        let h = harness(StubRemote::new(signed_in("1")), StubRenewer::returning(Ok(pair("A2", "R2"))));
        h.flow.sign_in().await.expect("signed in");
        h.notifications.warning("pending");

        h.flow.log_out().await;

        assert!(h.store.get(ACCESS_TOKEN).is_none());
        assert!(h.store.get(REFRESH_TOKEN).is_none());
        assert!(h.cache.user().is_none());
        assert!(h.notifications.active().is_empty());
        assert_eq!(h.wallet.state(), WalletState::Disconnected);
        assert_eq!(h.wallet_state.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_log_out_during_renewal_discards_new_credentials() {
        let h = harness(StubRemote::new(signed_in("1")), StubRenewer::gated(Ok(pair("A2", "R2"))));
        h.store.set(
            REFRESH_TOKEN,
            "R1",
            chrono::Utc::now() + chrono::Duration::hours(1),
        );

        let pending = h.flow.load_user();
        let log_out = async {
            h.renewer.entered.notified().await;
            h.flow.log_out().await;
            h.renewer.release.notify_one();
        };
        let (loaded, ()) = tokio::join!(pending, log_out);

        assert!(loaded.is_none());
        assert_eq!(h.renewer.calls(), 1);
        assert_eq!(h.remote.count("get_user"), 0);
        assert!(h.store.get(ACCESS_TOKEN).is_none());
        assert!(h.store.get(REFRESH_TOKEN).is_none());
    }

    #[tokio::test]
    async fn test_load_user_without_session_is_anonymous() {
        let h = harness(StubRemote::new(signed_in("1")), StubRenewer::returning(Ok(pair("A2", "R2"))));

        assert!(h.flow.load_user().await.is_none());
        assert_eq!(h.remote.count("get_user"), 0);
        assert_eq!(h.renewer.calls(), 0);
    }

    #[tokio::test]
    async fn test_load_user_reads_balance_of_address_on_file() {
        let mut remote = StubRemote::new(signed_in("1"));
        remote.user = Ok(serde_json::from_value(serde_json::json!({
            "id": "7",
            "public_address": "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin",
        }))
        .expect("valid user JSON"));
        let ledger = StubLedgerConnector {
            balance: Some(TokenAmount {
                amount: 2_500_000,
                decimals: 6,
            }),
            ..StubLedgerConnector::default()
        };
        let h = harness_with_ledger(remote, StubRenewer::returning(Ok(pair("A2", "R2"))), ledger);
        seed_access(&h.store);

        let loaded = h.flow.load_user().await;

        assert_eq!(loaded.map(|u| u.id), Some("7".to_string()));
        assert_eq!(h.wallet.state(), WalletState::Disconnected);
        assert_eq!(h.wallet_state.connects.load(Ordering::SeqCst), 0);
        assert_eq!(
            h.wallet.last_balance(),
            Some(TokenAmount {
                amount: 2_500_000,
                decimals: 6
            })
        );
    }

    #[tokio::test]
    async fn test_resolve_count_skips_settled_duels() {
        let mut remote = StubRemote::new(signed_in("1"));
        remote.duels = Ok(serde_json::from_value(serde_json::json!([
            { "id": "a", "status": 4 },
            { "id": "b", "status": 5 },
            { "id": "c", "status": 6 },
            { "id": "d", "status": 1 },
            { "id": "e", "status": 2 },
        ]))
        .expect("valid duels JSON"));
        let h = harness(remote, StubRenewer::returning(Ok(pair("A2", "R2"))));
        seed_access(&h.store);

        assert_eq!(h.flow.resolve_count().await, Ok(3));
        assert_eq!(h.remote.count("my_duels"), 1);
    }

    #[tokio::test]
    async fn test_resolve_count_without_session_is_zero() {
        let h = harness(StubRemote::new(signed_in("1")), StubRenewer::returning(Ok(pair("A2", "R2"))));

        assert_eq!(h.flow.resolve_count().await, Ok(0));
        assert_eq!(h.remote.count("my_duels"), 0);
    }
}
