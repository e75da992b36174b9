//! Credential lifecycle: lookup, transparent renewal, rotation and logout.
//!
//! Renewal is single-flight. While a refresh call is outstanding, every
//! caller that needs a credential awaits the same shared future instead of
//! issuing its own call with the same refresh token (which the server would
//! revoke after the first use).

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use super::CredentialStore;
use crate::models::TokenPair;
use crate::{Error, Result};

/// Store name of the short-lived access credential
pub const ACCESS_TOKEN: &str = "access_token";

/// Store name of the long-lived refresh credential
pub const REFRESH_TOKEN: &str = "refresh_token";

/// Access credential lifetime in hours.
const ACCESS_TOKEN_TTL_HOURS: i64 = 1;

/// Refresh credential lifetime in hours (30 days).
const REFRESH_TOKEN_TTL_HOURS: i64 = 720;

/// The remote capability that exchanges a refresh credential for a new pair.
pub trait TokenRenewer: Send + Sync + 'static {
    fn renew(&self, refresh_token: &str) -> impl Future<Output = Result<TokenPair>> + Send;
}

type Renewal = Shared<BoxFuture<'static, Result<String>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct SessionManager<R> {
    store: Arc<dyn CredentialStore>,
    renewer: Arc<R>,
    in_flight: Mutex<Option<Renewal>>,
    /// Bumped by `clear()`. A renewal started under an older epoch must not
    /// write its credentials; the check and the write happen under this lock.
    epoch: Arc<Mutex<u64>>,
}

impl<R: TokenRenewer> SessionManager<R> {
    pub fn new(store: Arc<dyn CredentialStore>, renewer: Arc<R>) -> Self {
        Self {
            store,
            renewer,
            in_flight: Mutex::new(None),
            epoch: Arc::new(Mutex::new(0)),
        }
    }

    /// Returns a usable access credential, renewing it if only the refresh
    /// credential is left. `Ok(None)` means anonymous.
    pub async fn access_credential(&self) -> Result<Option<String>> {
        if let Some(token) = self.store.get(ACCESS_TOKEN) {
            return Ok(Some(token));
        }

        if !self.has_in_flight() && self.store.get(REFRESH_TOKEN).is_none() {
            return Ok(None);
        }

        self.renew().await.map(Some)
    }

    /// Whether a refresh credential is stored.
    pub fn has_session(&self) -> bool {
        self.store.get(REFRESH_TOKEN).is_some()
    }

    /// Exchanges the refresh credential for a new pair, rotating both.
    ///
    /// Joins the outstanding renewal if there is one. Failures are handed to
    /// every waiter and leave the stored credentials alone; the next call
    /// starts a fresh attempt.
    pub async fn renew(&self) -> Result<String> {
        let renewal = self.join_or_start()?;
        let result = renewal.clone().await;

        let mut slot = lock(&self.in_flight);
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&renewal)) {
            *slot = None;
        }
        drop(slot);

        result
    }

    fn has_in_flight(&self) -> bool {
        lock(&self.in_flight)
            .as_ref()
            .is_some_and(|renewal| renewal.peek().is_none())
    }

    fn join_or_start(&self) -> Result<Renewal> {
        let mut slot = lock(&self.in_flight);

        if let Some(renewal) = slot.as_ref() {
            // A finished renewal whose waiters have not cleared it yet must
            // not hand its old outcome to a new caller.
            if renewal.peek().is_none() {
                debug!("Joining in-flight token renewal");
                return Ok(renewal.clone());
            }
        }

        let refresh_token = self.store.get(REFRESH_TOKEN).ok_or(Error::AuthExpired)?;
        let started_epoch = *lock(&self.epoch);

        let renewal = Self::run_renewal(
            self.store.clone(),
            self.renewer.clone(),
            self.epoch.clone(),
            started_epoch,
            refresh_token,
        )
        .boxed()
        .shared();

        debug!("Starting token renewal");
        *slot = Some(renewal.clone());
        Ok(renewal)
    }

    async fn run_renewal(
        store: Arc<dyn CredentialStore>,
        renewer: Arc<R>,
        epoch: Arc<Mutex<u64>>,
        started_epoch: u64,
        refresh_token: String,
    ) -> Result<String> {
        let pair = renewer
            .renew(&refresh_token)
            .await
            .map_err(|e| match e {
                Error::RemoteRejected { status, .. } if refresh_refused(status) => {
                    warn!(status, "Refresh credential rejected");
                    Error::AuthExpired
                }
                other => {
                    warn!(error = %other, "Token renewal failed");
                    other
                }
            })?;

        let current = lock(&epoch);
        if *current != started_epoch {
            info!("Session cleared during renewal, discarding renewed credentials");
            return Err(Error::AuthExpired);
        }
        write_pair(store.as_ref(), &pair.access_token, &pair.refresh_token);
        drop(current);

        info!("Session renewed");
        Ok(pair.access_token)
    }

    /// Stores a freshly issued credential pair.
    pub fn establish(&self, access_token: &str, refresh_token: &str) {
        let _guard = lock(&self.epoch);
        write_pair(self.store.as_ref(), access_token, refresh_token);
        debug!("Session credentials stored");
    }

    /// Removes both credentials. Idempotent. A renewal still in flight keeps
    /// running for its existing waiters but its result is discarded.
    pub fn clear(&self) {
        {
            let mut epoch = lock(&self.epoch);
            *epoch += 1;
            self.store.remove(ACCESS_TOKEN);
            self.store.remove(REFRESH_TOKEN);
        }
        *lock(&self.in_flight) = None;
        info!("Session cleared");
    }
}

/// Statuses that mean the refresh credential itself was refused. Anything
/// else (rate limits, outages) leaves the session intact for a later retry.
fn refresh_refused(status: u16) -> bool {
    matches!(status, 400 | 401 | 403)
}

fn write_pair(store: &dyn CredentialStore, access_token: &str, refresh_token: &str) {
    let now = Utc::now();
    store.set(
        ACCESS_TOKEN,
        access_token,
        now + Duration::hours(ACCESS_TOKEN_TTL_HOURS),
    );
    store.set(
        REFRESH_TOKEN,
        refresh_token,
        now + Duration::hours(REFRESH_TOKEN_TTL_HOURS),
    );
}
