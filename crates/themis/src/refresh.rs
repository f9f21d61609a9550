//! Single-flight token refresh.
//!
//! Every caller that needs a new access token goes through
//! [`TokenRefreshCoordinator::refresh`]. While one refresh call is on the
//! wire, later callers await the same shared future instead of issuing
//! their own, so N concurrent 401s cost exactly one `POST /auth/refresh`.

use crate::{AuthApi, RefreshError};
use credential_store::{CredentialStore, TokenPair};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

type RefreshFuture = Shared<BoxFuture<'static, Result<TokenPair, RefreshError>>>;

/// Called once per failed refresh that invalidated the session.
pub type InvalidationHook = Arc<dyn Fn(&RefreshError) + Send + Sync>;

struct InFlight {
    id: u64,
    future: RefreshFuture,
}

struct Inner {
    api: AuthApi,
    store: Arc<CredentialStore>,
    in_flight: Mutex<Option<InFlight>>,
    next_id: AtomicU64,
    network_calls: AtomicU64,
    on_invalidated: Mutex<Option<InvalidationHook>>,
}

/// Owner of the refresh endpoint and sole writer of refreshed tokens.
#[derive(Clone)]
pub struct TokenRefreshCoordinator {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TokenRefreshCoordinator {
    pub fn new(api: AuthApi, store: Arc<CredentialStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                store,
                in_flight: Mutex::new(None),
                next_id: AtomicU64::new(0),
                network_calls: AtomicU64::new(0),
                on_invalidated: Mutex::new(None),
            }),
        }
    }

    /// Register the hook run after a failed refresh has cleared credentials.
    ///
    /// It runs before any waiter sees the error.
    pub fn set_invalidation_hook(&self, hook: InvalidationHook) {
        *lock(&self.inner.on_invalidated) = Some(hook);
    }

    /// Number of refresh requests actually sent.
    pub fn network_calls(&self) -> u64 {
        self.inner.network_calls.load(Ordering::SeqCst)
    }

    /// True while a refresh call is outstanding.
    pub fn is_refreshing(&self) -> bool {
        lock(&self.inner.in_flight).is_some()
    }

    /// Obtain a new token pair, joining the in-flight refresh if there is one.
    pub async fn refresh(&self) -> Result<TokenPair, RefreshError> {
        let future = {
            let mut slot = lock(&self.inner.in_flight);
            match slot.as_ref() {
                Some(in_flight) => {
                    debug!(refresh_id = in_flight.id, "Joining in-flight token refresh");
                    in_flight.future.clone()
                }
                None => {
                    let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
                    let future = run(self.inner.clone(), id).boxed().shared();
                    *slot = Some(InFlight {
                        id,
                        future: future.clone(),
                    });
                    future
                }
            }
        };
        future.await
    }
}

/// Body of one shared refresh. Clears its own slot before resolving so a
/// caller arriving afterwards starts a fresh refresh.
async fn run(inner: Arc<Inner>, id: u64) -> Result<TokenPair, RefreshError> {
    let outcome = inner.rotate(id).await;

    let mut slot = lock(&inner.in_flight);
    if slot.as_ref().is_some_and(|f| f.id == id) {
        *slot = None;
    }
    drop(slot);

    outcome
}

impl Inner {
    async fn rotate(&self, id: u64) -> Result<TokenPair, RefreshError> {
        let Some(refresh_token) = self.store.refresh_token() else {
            return Err(self.fail(RefreshError::MissingRefreshToken));
        };

        self.network_calls.fetch_add(1, Ordering::SeqCst);
        debug!(refresh_id = id, "Refreshing access token");

        let pair = match self.api.refresh(&refresh_token).await {
            Ok(pair) => pair,
            Err(e) => return Err(self.fail(e)),
        };

        // A sign-out during the call already cleared the store; writing the
        // new pair back would resurrect the session.
        if self.store.refresh_token().as_deref() != Some(refresh_token.as_str()) {
            return Err(self.fail(RefreshError::SessionEnded));
        }

        if !self.store.set_token_pair(&pair) {
            warn!(refresh_id = id, "Refreshed tokens could not be persisted");
        }
        info!(refresh_id = id, "Access token refreshed");
        Ok(pair)
    }

    fn fail(&self, error: RefreshError) -> RefreshError {
        if !error.invalidates_session() {
            warn!(error = %error, "Token refresh failed, keeping session");
            return error;
        }

        warn!(error = %error, "Token refresh failed, clearing session");
        self.store.clear_session();

        let hook = lock(&self.on_invalidated).clone();
        if let Some(hook) = hook {
            hook(&error);
        }
        error
    }
}
