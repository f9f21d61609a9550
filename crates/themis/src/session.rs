//! Session lifecycle built on the session FSM.
//!
//! `SessionManager` is the only writer of session state. The FSM decides
//! which transitions are legal; the manager performs the I/O around each
//! transition and publishes a [`Session`] snapshot after every change.

use crate::api::{MeResponse, ME_PATH};
use crate::session_fsm::{
    Session, SessionMachine, SessionMachineInput, SessionMachineState, SessionStatus,
};
use crate::{
    ApiRequest, ApiResponse, AuthApi, AuthError, AuthGateway, AuthResult, PermissionEvaluator,
    RefreshError, Role, TokenRefreshCoordinator, UserProfile,
};
use credential_store::{CredentialStore, TokenPair};
use expediente_config::Config;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::{watch, OnceCell};
use tracing::{debug, info, warn};

/// Default bound on the server logout notification.
pub const DEFAULT_LOGOUT_TIMEOUT: Duration = Duration::from_secs(3);

/// Callback type for session change notifications.
pub type SessionStateCallback = Box<dyn Fn(Session) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct SessionState {
    machine: SessionMachine,
    user: Option<UserProfile>,
    error: Option<String>,
    /// Bumped by every sign-in start and every sign-out. A login response
    /// is only committed if this still matches the value it started with.
    attempt: u64,
}

impl SessionState {
    fn snapshot(&self) -> Session {
        Session {
            status: SessionStatus::from(self.machine.state()),
            user: self.user.clone(),
            error: self.error.clone(),
        }
    }
}

/// State shared with the refresh invalidation hook.
struct SessionCore {
    state: Mutex<SessionState>,
    tx: watch::Sender<Session>,
    callback: Mutex<Option<SessionStateCallback>>,
}

impl SessionCore {
    fn snapshot(&self) -> Session {
        lock(&self.state).snapshot()
    }

    /// Apply `input`, then let `mutate` adjust user and error in the same
    /// critical section so observers never see a half-updated session.
    fn transition(
        &self,
        input: &SessionMachineInput,
        mutate: impl FnOnce(&mut SessionState),
    ) -> AuthResult<Session> {
        let mut state = lock(&self.state);
        let old_status = SessionStatus::from(state.machine.state());

        state.machine.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                state.machine.state()
            ))
        })?;
        mutate(&mut state);
        Ok(self.publish(state, old_status))
    }

    fn publish(&self, state: MutexGuard<'_, SessionState>, old_status: SessionStatus) -> Session {
        let snapshot = state.snapshot();
        self.tx.send_replace(snapshot.clone());
        drop(state);

        debug!(
            old_status = ?old_status,
            new_status = ?snapshot.status,
            "Session state transition"
        );
        self.notify(&snapshot);
        snapshot
    }

    /// Enter `Authenticating` and return the attempt number.
    fn begin_sign_in(&self) -> AuthResult<u64> {
        let mut attempt = 0;
        self.transition(&SessionMachineInput::SignInRequested, |state| {
            state.attempt += 1;
            state.error = None;
            attempt = state.attempt;
        })?;
        Ok(attempt)
    }

    /// Persist the login result and enter `Authenticated`, unless a sign-out
    /// ended `attempt` while the login call was in flight.
    ///
    /// The store is written under the state lock so a concurrent sign-out
    /// either runs before (and the response is discarded) or after (and
    /// clears what was written).
    fn complete_sign_in(
        &self,
        attempt: u64,
        store: &CredentialStore,
        tokens: &TokenPair,
        user: UserProfile,
    ) -> AuthResult<Session> {
        let mut state = lock(&self.state);
        if state.attempt != attempt
            || !matches!(state.machine.state(), SessionMachineState::Authenticating)
        {
            return Err(AuthError::Authentication(
                "Sign-in was cancelled by sign-out".to_string(),
            ));
        }

        if !store.set_token_pair(tokens) {
            warn!(user_id = %user.id, "Tokens could not be persisted, session will not survive a restart");
        }
        store.set_cached_user(&user);

        state
            .machine
            .consume(&SessionMachineInput::SignInSucceeded)
            .map_err(|_| {
                AuthError::InvalidStateTransition("Cannot complete sign-in".to_string())
            })?;
        state.user = Some(user);
        state.error = None;
        Ok(self.publish(state, SessionStatus::Authenticating))
    }

    /// Record a failed login for `attempt`. A stale attempt is left alone.
    fn fail_sign_in(&self, attempt: u64, store: &CredentialStore, message: String) {
        let mut state = lock(&self.state);
        if state.attempt != attempt {
            debug!("Sign-in failed after it was cancelled");
            return;
        }
        store.clear_session();
        if state
            .machine
            .consume(&SessionMachineInput::SignInFailed)
            .is_err()
        {
            warn!("Sign-in failure left session in an unexpected state");
            return;
        }
        state.user = None;
        state.error = Some(message);
        self.publish(state, SessionStatus::Authenticating);
    }

    /// Clear credentials and leave any signed-in or signing-in state.
    /// Returns the tokens that were stored, for the server notification.
    fn end_session(&self, store: &CredentialStore) -> Option<TokenPair> {
        let mut state = lock(&self.state);
        let tokens = store.token_pair();
        store.clear_session();
        state.attempt += 1;

        let old_status = SessionStatus::from(state.machine.state());
        if state
            .machine
            .consume(&SessionMachineInput::SignOutRequested)
            .is_ok()
        {
            state.user = None;
            state.error = None;
            self.publish(state, old_status);
            info!(from = ?old_status, "Signed out");
        } else {
            debug!(status = ?old_status, "Sign-out requested without a session");
        }
        tokens
    }

    /// Change user or error without a status transition.
    fn update(&self, mutate: impl FnOnce(&mut SessionState)) -> Session {
        let mut state = lock(&self.state);
        let before = state.snapshot();
        mutate(&mut state);
        let after = state.snapshot();
        if after == before {
            return after;
        }

        self.tx.send_replace(after.clone());
        drop(state);
        self.notify(&after);
        after
    }

    fn notify(&self, session: &Session) {
        let callback = lock(&self.callback);
        if let Some(callback) = callback.as_ref() {
            callback(session.clone());
        }
    }

    fn session_expired(&self, error: &RefreshError) {
        let message = AuthError::Refresh(error.clone()).user_message();
        let result = self.transition(&SessionMachineInput::RefreshFailed, |state| {
            state.user = None;
            state.error = Some(message);
        });
        match result {
            Ok(_) => info!(error = %error, "Session invalidated after refresh failure"),
            Err(_) => debug!(error = %error, "Refresh failed outside an authenticated session"),
        }
    }
}

/// Session service for one signed-in user.
///
/// Construct once per process and share by reference. Credentials live in
/// the [`CredentialStore`]; the FSM tracks what is happening to them.
pub struct SessionManager {
    core: Arc<SessionCore>,
    api: AuthApi,
    store: Arc<CredentialStore>,
    gateway: AuthGateway,
    logout_timeout: Duration,
    bootstrapped: OnceCell<()>,
}

impl SessionManager {
    pub fn new(api: AuthApi, store: Arc<CredentialStore>) -> Self {
        let refresher = TokenRefreshCoordinator::new(api.clone(), store.clone());
        let gateway = AuthGateway::new(api.clone(), store.clone(), refresher.clone());

        let (tx, _rx) = watch::channel(Session::initial());
        let core = Arc::new(SessionCore {
            state: Mutex::new(SessionState {
                machine: SessionMachine::new(),
                user: None,
                error: None,
                attempt: 0,
            }),
            tx,
            callback: Mutex::new(None),
        });

        let hook_core: Weak<SessionCore> = Arc::downgrade(&core);
        refresher.set_invalidation_hook(Arc::new(move |error: &RefreshError| {
            if let Some(core) = hook_core.upgrade() {
                core.session_expired(error);
            }
        }));

        Self {
            core,
            api,
            store,
            gateway,
            logout_timeout: DEFAULT_LOGOUT_TIMEOUT,
            bootstrapped: OnceCell::new(),
        }
    }

    /// Build from configuration over an already chosen credential backend.
    pub fn from_config(config: &Config, store: Arc<CredentialStore>) -> AuthResult<Self> {
        Ok(Self::new(AuthApi::from_config(config)?, store).with_logout_timeout(config.logout_timeout()))
    }

    pub fn with_logout_timeout(mut self, timeout: Duration) -> Self {
        self.logout_timeout = timeout;
        self
    }

    /// Set a callback to be notified of session changes.
    pub fn set_state_callback(&self, callback: SessionStateCallback) {
        *lock(&self.core.callback) = Some(callback);
    }

    /// Receiver that always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.core.tx.subscribe()
    }

    pub fn snapshot(&self) -> Session {
        self.core.snapshot()
    }

    pub fn status(&self) -> SessionStatus {
        self.snapshot().status
    }

    /// The signed-in user, if authenticated.
    pub fn user(&self) -> Option<UserProfile> {
        let session = self.snapshot();
        session.user.filter(|_| session.status == SessionStatus::Authenticated)
    }

    /// Profile cached by the last successful sign-in or bootstrap.
    pub fn cached_user(&self) -> Option<UserProfile> {
        self.store.cached_user()
    }

    /// Authenticated request pipeline for API calls.
    pub fn gateway(&self) -> &AuthGateway {
        &self.gateway
    }

    pub async fn request(&self, request: &ApiRequest) -> AuthResult<ApiResponse> {
        self.gateway.request(request).await
    }

    /// Restore the stored session, once.
    ///
    /// Every exit path leaves the session out of `Bootstrapping`. Failures
    /// are logged and end in `Unauthenticated` with credentials cleared;
    /// this never returns an error.
    pub async fn bootstrap(&self) -> Session {
        self.bootstrapped.get_or_init(|| self.restore()).await;
        self.snapshot()
    }

    async fn restore(&self) {
        if self.store.token_pair().is_none() {
            info!("No stored session");
            self.store.clear_session();
            self.finish_bootstrap(&SessionMachineInput::NoStoredToken, None);
            return;
        }

        let known_email = self.store.cached_user::<UserProfile>().map(|user| user.email);
        match self.gateway.get_json::<MeResponse>(ME_PATH).await {
            Ok(_) if self.store.token_pair().is_none() => {
                warn!("Credentials disappeared while restoring session");
                self.finish_bootstrap(&SessionMachineInput::ProfileFailed, None);
            }
            Ok(me) => {
                let user = UserProfile::from_wire(me.user, known_email.as_deref());
                self.store.set_cached_user(&user);
                info!(user_id = %user.id, role = %user.role, "Session restored");
                self.finish_bootstrap(&SessionMachineInput::ProfileLoaded, Some(user));
            }
            Err(e) => {
                warn!(error = %e, "Could not restore session, clearing credentials");
                self.store.clear_session();
                self.finish_bootstrap(&SessionMachineInput::ProfileFailed, None);
            }
        }
    }

    fn finish_bootstrap(&self, input: &SessionMachineInput, user: Option<UserProfile>) {
        if let Err(e) = self.core.transition(input, |state| state.user = user) {
            warn!(error = %e, "Bootstrap finished in an unexpected state");
        }
    }

    /// Sign in with email and password.
    ///
    /// Both fields are checked locally first. Tokens are persisted before the
    /// session becomes `Authenticated`. Runs [`Self::bootstrap`] first if it
    /// has not run yet.
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<UserProfile> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            let err = AuthError::Validation("Email and password are required".to_string());
            self.core.update(|state| state.error = Some(err.user_message()));
            return Err(err);
        }

        self.bootstrap().await;
        let attempt = self.core.begin_sign_in()?;

        match self.api.login(email, password).await {
            Ok(response) => {
                let user = UserProfile::from_wire(response.user, Some(email));
                self.core
                    .complete_sign_in(attempt, &self.store, &response.tokens, user.clone())?;
                info!(user_id = %user.id, role = %user.role, "Signed in");
                Ok(user)
            }
            Err(e) => {
                warn!(error = %e, "Sign-in failed");
                self.core.fail_sign_in(attempt, &self.store, e.user_message());
                Err(e)
            }
        }
    }

    /// Sign out.
    ///
    /// Local credentials are cleared and the session is `Unauthenticated`
    /// before the server is told; that notification is best-effort and
    /// bounded by the logout timeout. A sign-in still waiting on the server
    /// is cancelled and its response discarded. Safe to call repeatedly or
    /// concurrently.
    pub async fn sign_out(&self) -> Session {
        if let Some(tokens) = self.core.end_session(&self.store) {
            self.notify_server_logout(tokens).await;
        }
        self.snapshot()
    }

    async fn notify_server_logout(&self, tokens: TokenPair) {
        let call = self
            .api
            .logout(Some(&tokens.access_token), Some(&tokens.refresh_token));
        match tokio::time::timeout(self.logout_timeout, call).await {
            Ok(Ok(())) => debug!("Server session closed"),
            Ok(Err(e)) => warn!(error = %e, "Server logout failed"),
            Err(_) => warn!(
                timeout_ms = self.logout_timeout.as_millis() as u64,
                "Server logout timed out"
            ),
        }
    }

    /// Clear the session error without touching status.
    pub fn clear_error(&self) -> Session {
        self.core.update(|state| state.error = None)
    }

    /// True if the signed-in user holds any of `roles`.
    pub fn has_role(&self, roles: &[Role]) -> bool {
        self.user().is_some_and(|user| roles.contains(&user.role))
    }

    /// True if the signed-in user's role grants `permission`.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.user()
            .is_some_and(|user| PermissionEvaluator::evaluate(user.role, permission))
    }
}
