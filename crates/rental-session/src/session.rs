//! Session management with FSM-based state tracking.
//!
//! `SessionManager` owns the in-memory session (access token and user) and
//! mirrors it into the credential store. Token writes always reach durable
//! storage before the in-memory session changes, so a restart never observes
//! a newer session than the one on disk. The cached user record is written
//! the same way, but a failed cache write is only logged.

use crate::events::{EndReason, SessionEvent, SessionListener};
use crate::session_fsm::{SessionMachine, SessionMachineInput, SessionState};
use crate::token::{self, DEFAULT_EXPIRY_SKEW_MS};
use crate::{SessionError, SessionResult};
use rental_api::{AuthApi, AuthSession, User};
use rental_storage::CredentialStore;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const LOGIN_FAILED: &str = "Login failed";
const REGISTRATION_FAILED: &str = "Registration failed";
const REFRESH_FAILED: &str = "Failed to refresh token";
const PROFILE_FAILED: &str = "Failed to fetch profile";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Tunables for the session manager.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Tokens expiring within this many milliseconds are refreshed early.
    pub expiry_skew_ms: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiry_skew_ms: DEFAULT_EXPIRY_SKEW_MS,
        }
    }
}

/// Point-in-time view of the session for consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub is_authenticated: bool,
    pub user: Option<User>,
    pub token: Option<String>,
    /// True until the startup bootstrap has resolved.
    pub bootstrapping: bool,
    pub auth_operation_in_flight: bool,
}

/// What an authenticated API call needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub user_id: String,
    pub access_token: String,
}

#[derive(Default)]
struct SessionData {
    token: Option<String>,
    user: Option<User>,
}

/// Where a token pair came from. A sign-in without a refresh token drops the
/// stored one; a refresh without one keeps it.
#[derive(Clone, Copy)]
enum TokenSource {
    SignIn,
    Refresh,
}

/// Clears the in-flight flag when a login or registration finishes.
struct AuthOperationGuard<'a>(&'a AtomicBool);

impl Drop for AuthOperationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owner of the authentication state.
///
/// Construct one per application at the composition root and share it by
/// `Arc`. Call [`SessionManager::init`] at startup and
/// [`SessionManager::dispose`] on shutdown.
pub struct SessionManager {
    credentials: CredentialStore,
    auth_api: Arc<dyn AuthApi>,
    config: SessionConfig,
    fsm: Mutex<SessionMachine>,
    data: Mutex<SessionData>,
    bootstrap_started: AtomicBool,
    bootstrapping: AtomicBool,
    auth_in_flight: AtomicBool,
    /// Serialises refreshes; the generation lets waiters share a result.
    refresh_lock: tokio::sync::Mutex<()>,
    refresh_generation: AtomicU64,
    listeners: Mutex<Vec<SessionListener>>,
    auto_refresh: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl SessionManager {
    pub fn new(credentials: CredentialStore, auth_api: Arc<dyn AuthApi>, config: SessionConfig) -> Self {
        Self {
            credentials,
            auth_api,
            config,
            fsm: Mutex::new(SessionMachine::new()),
            data: Mutex::new(SessionData::default()),
            bootstrap_started: AtomicBool::new(false),
            bootstrapping: AtomicBool::new(true),
            auth_in_flight: AtomicBool::new(false),
            refresh_lock: tokio::sync::Mutex::new(()),
            refresh_generation: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
            auto_refresh: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    // ==========================================
    // Observation
    // ==========================================

    /// Register a listener for session events.
    ///
    /// Listeners run synchronously on the task that caused the event and are
    /// dropped by [`SessionManager::dispose`].
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        lock(&self.listeners).push(Arc::new(listener));
    }

    fn emit(&self, event: SessionEvent) {
        let listeners: Vec<SessionListener> = lock(&self.listeners).clone();
        for listener in listeners {
            listener(&event);
        }
    }

    /// Current FSM state.
    pub fn state(&self) -> SessionState {
        SessionState::from(lock(&self.fsm).state())
    }

    /// Transition the FSM, logging actual state changes.
    fn transition(&self, input: &SessionMachineInput) -> SessionResult<SessionState> {
        let mut fsm = lock(&self.fsm);
        let old_state = SessionState::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            SessionError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_state = SessionState::from(fsm.state());
        drop(fsm);

        if old_state != new_state {
            debug!(old_state = ?old_state, new_state = ?new_state, "Session state transition");
        }
        Ok(new_state)
    }

    fn authenticated(state: SessionState, data: &SessionData) -> bool {
        matches!(state, SessionState::Authenticated | SessionState::Refreshing) && data.token.is_some()
    }

    pub fn is_authenticated(&self) -> bool {
        let state = self.state();
        Self::authenticated(state, &lock(&self.data))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state();
        let data = lock(&self.data);
        SessionSnapshot {
            state,
            is_authenticated: Self::authenticated(state, &data),
            user: data.user.clone(),
            token: data.token.clone(),
            bootstrapping: self.bootstrapping.load(Ordering::SeqCst),
            auth_operation_in_flight: self.auth_in_flight.load(Ordering::SeqCst),
        }
    }

    /// Credentials for an authenticated call, if a user is signed in.
    ///
    /// Never refreshes, so callers can use it before any network round trip.
    pub fn credentials(&self) -> Option<SessionCredentials> {
        let state = self.state();
        let data = lock(&self.data);
        if !Self::authenticated(state, &data) {
            return None;
        }
        match (&data.user, &data.token) {
            (Some(user), Some(token)) => Some(SessionCredentials {
                user_id: user.id.clone(),
                access_token: token.clone(),
            }),
            _ => None,
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn ensure_active(&self) -> SessionResult<()> {
        if self.is_disposed() {
            return Err(SessionError::Disposed);
        }
        Ok(())
    }

    // ==========================================
    // Lifecycle
    // ==========================================

    /// Run the startup bootstrap once and report the resulting session.
    pub async fn init(&self) -> SessionResult<SessionSnapshot> {
        self.ensure_active()?;
        self.bootstrap().await;
        Ok(self.snapshot())
    }

    /// Release the auto-refresh timer and all listeners.
    ///
    /// Later logins fail with [`SessionError::Disposed`]; stored credentials
    /// are left alone so the next process can resume the session.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = lock(&self.auto_refresh).take() {
            handle.abort();
        }
        lock(&self.listeners).clear();
        info!("Session manager disposed");
    }

    /// Periodically refresh the access token once it nears expiry.
    ///
    /// Replaces any timer started earlier. The task holds only a weak
    /// reference and stops when the manager is dropped or disposed.
    pub fn start_auto_refresh(self: &Arc<Self>, interval: Duration) {
        if self.is_disposed() {
            return;
        }
        let manager: Weak<Self> = Arc::downgrade(self);
        let period = interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                if manager.is_disposed() {
                    break;
                }
                manager.refresh_if_expiring().await;
            }
        });

        if let Some(previous) = lock(&self.auto_refresh).replace(handle) {
            previous.abort();
        }
        debug!(interval_ms = period.as_millis() as u64, "Auto refresh started");
    }

    async fn refresh_if_expiring(&self) {
        let current = lock(&self.data).token.clone();
        if let Some(current) = current {
            if token::is_expired(&current, self.config.expiry_skew_ms) {
                debug!("Access token near expiry, refreshing");
                self.refresh().await;
            }
        }
    }

    // ==========================================
    // Bootstrap and activation
    // ==========================================

    /// Resolve the stored session at startup.
    ///
    /// Runs at most once per manager and always leaves the manager
    /// authenticated or unauthenticated. Any failure clears stored credentials.
    pub async fn bootstrap(&self) {
        if self.bootstrap_started.swap(true, Ordering::SeqCst) {
            debug!("Bootstrap already ran");
            return;
        }

        if let Err(e) = self.try_bootstrap().await {
            warn!(error = %e, "Bootstrap failed, clearing stored credentials");
            self.end_session(EndReason::BootstrapFailed);
        }

        self.bootstrapping.store(false, Ordering::SeqCst);
        info!(state = ?self.state(), "Bootstrap complete");
    }

    async fn try_bootstrap(&self) -> SessionResult<()> {
        let Some(access_token) = self.credentials.get_access_token()? else {
            info!("No stored session found");
            self.transition(&SessionMachineInput::NoSession)?;
            return Ok(());
        };

        if token::is_expired(&access_token, self.config.expiry_skew_ms) {
            info!("Stored access token expired, refreshing");
            self.refresh().await;
            return Ok(());
        }

        self.validate_and_activate(&access_token).await
    }

    /// Persist `access_token`, mark the session authenticated, then load the
    /// user.
    ///
    /// A failed user fetch does not undo the activation: the session stays
    /// authenticated and the user falls back to the cached record for the
    /// same subject, or stays empty until [`SessionManager::reload_user`].
    pub async fn validate_and_activate(&self, access_token: &str) -> SessionResult<()> {
        self.ensure_active()?;
        self.credentials.set_access_token(access_token)?;
        self.activate(access_token, None).await
    }

    /// Activate a token that is already persisted. `seed_user` is the user
    /// record delivered with the token, used if the profile fetch fails.
    async fn activate(&self, access_token: &str, seed_user: Option<User>) -> SessionResult<()> {
        self.transition(&SessionMachineInput::TokenActivated)?;
        lock(&self.data).token = Some(access_token.to_string());

        let user = match self.auth_api.current_user(access_token).await {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Failed to fetch current user, session stays active");
                seed_user.or_else(|| self.fallback_user(access_token))
            }
        };

        let user_id = user.as_ref().map(|u| u.id.clone()).or_else(|| {
            token::decode(access_token)
                .ok()
                .and_then(|claims| claims.subject_id)
        });
        self.store_user(user);

        info!(user_id = ?user_id, "Session active");
        self.emit(SessionEvent::Authenticated { user_id });
        Ok(())
    }

    /// A previously known user record for the token's subject, if any.
    fn fallback_user(&self, access_token: &str) -> Option<User> {
        let subject = token::decode(access_token).ok()?.subject_id?;

        let in_memory = lock(&self.data).user.clone();
        if let Some(user) = in_memory.filter(|u| u.id == subject) {
            return Some(user);
        }

        match self.credentials.get_user::<User>() {
            Ok(cached) => cached.filter(|u| u.id == subject),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable cached user record");
                None
            }
        }
    }

    fn store_user(&self, user: Option<User>) {
        if let Some(user) = &user {
            if let Err(e) = self.credentials.set_user(user) {
                warn!(user_id = %user.id, error = %e, "Failed to cache user record");
            }
        }
        lock(&self.data).user = user;
    }

    // ==========================================
    // Login / Register
    // ==========================================

    fn begin_auth_operation(&self) -> SessionResult<AuthOperationGuard<'_>> {
        if self
            .auth_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Rejecting auth operation while another is in flight");
            return Err(SessionError::ConcurrentOperation);
        }
        Ok(AuthOperationGuard(&self.auth_in_flight))
    }

    /// Sign in with email and password.
    ///
    /// Fails with [`SessionError::ConcurrentOperation`] without touching the
    /// network if a login or registration is already running. On failure
    /// the previous session is left as it was.
    pub async fn login(&self, email: &str, password: &str) -> SessionResult<()> {
        self.ensure_active()?;
        let _operation = self.begin_auth_operation()?;

        debug!("Attempting email/password login");
        let session = self
            .auth_api
            .login(email, password)
            .await
            .map_err(|e| SessionError::from_api(e, LOGIN_FAILED))?;

        self.establish(session, TokenSource::SignIn).await?;
        info!("Login successful");
        Ok(())
    }

    /// Create an account and sign in. Same contract as [`SessionManager::login`].
    pub async fn register(&self, name: &str, email: &str, password: &str) -> SessionResult<()> {
        self.ensure_active()?;
        let _operation = self.begin_auth_operation()?;

        debug!("Attempting registration");
        let session = self
            .auth_api
            .register(name, email, password)
            .await
            .map_err(|e| SessionError::from_api(e, REGISTRATION_FAILED))?;

        self.establish(session, TokenSource::SignIn).await?;
        info!("Registration successful");
        Ok(())
    }

    async fn establish(&self, session: AuthSession, source: TokenSource) -> SessionResult<()> {
        let refresh_token = session.refresh_token.as_deref();
        match source {
            TokenSource::SignIn => self
                .credentials
                .replace_token_pair(&session.access_token, refresh_token)?,
            TokenSource::Refresh => self
                .credentials
                .set_token_pair(&session.access_token, refresh_token)?,
        }
        self.activate(&session.access_token, session.user).await
    }

    // ==========================================
    // Refresh
    // ==========================================

    /// Exchange the stored refresh token for a new pair.
    ///
    /// Never fails outward: any problem ends the session. Concurrent callers
    /// share one in-flight refresh. Returns whether the session is
    /// authenticated afterwards.
    pub async fn refresh(&self) -> bool {
        if self.is_disposed() {
            return false;
        }

        let observed = self.refresh_generation.load(Ordering::SeqCst);
        let _flight = self.refresh_lock.lock().await;
        if self.refresh_generation.load(Ordering::SeqCst) != observed {
            debug!("Joined refresh completed by a concurrent caller");
            return self.is_authenticated();
        }

        let refreshed = match self.try_refresh().await {
            Ok(()) => {
                info!("Token refreshed");
                true
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                self.end_session(EndReason::RefreshFailed);
                false
            }
        };

        self.refresh_generation.fetch_add(1, Ordering::SeqCst);
        refreshed
    }

    async fn try_refresh(&self) -> SessionResult<()> {
        self.transition(&SessionMachineInput::RefreshStarted)?;

        let refresh_token = self
            .credentials
            .get_refresh_token()?
            .ok_or_else(|| SessionError::AuthRejected("No refresh token available".to_string()))?;

        let session = self
            .auth_api
            .refresh(&refresh_token)
            .await
            .map_err(|e| SessionError::from_api(e, REFRESH_FAILED))?;

        if token::is_expired(&session.access_token, 0) {
            return Err(SessionError::AuthRejected(
                "Refreshed access token is already expired".to_string(),
            ));
        }

        self.establish(session, TokenSource::Refresh).await
    }

    /// A usable access token, refreshing first if the current one is near
    /// expiry.
    pub async fn ensure_fresh_token(&self) -> SessionResult<String> {
        self.ensure_active()?;
        let current = lock(&self.data)
            .token
            .clone()
            .ok_or(SessionError::NotAuthenticated)?;

        if !token::is_expired(&current, self.config.expiry_skew_ms) {
            return Ok(current);
        }

        if !self.refresh().await {
            return Err(SessionError::NotAuthenticated);
        }
        lock(&self.data)
            .token
            .clone()
            .ok_or(SessionError::NotAuthenticated)
    }

    // ==========================================
    // Logout
    // ==========================================

    /// Sign out. Idempotent and never fails.
    ///
    /// The remote call is best-effort; local teardown always happens.
    pub async fn logout(&self) {
        let stored = match self.credentials.get_access_token() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to read stored access token");
                None
            }
        };
        let access_token = stored.or_else(|| lock(&self.data).token.clone());

        if let Some(access_token) = access_token {
            if let Err(e) = self.auth_api.logout(&access_token).await {
                debug!(error = %e, "Remote logout failed, clearing local session anyway");
            }
        }

        self.end_session(EndReason::LoggedOut);
    }

    /// Clear durable then in-memory credentials and notify listeners.
    fn end_session(&self, reason: EndReason) {
        if let Err(e) = self.credentials.clear_all() {
            warn!(error = %e, "Failed to clear stored credentials");
        }
        {
            let mut data = lock(&self.data);
            data.token = None;
            data.user = None;
        }
        if let Err(e) = self.transition(&SessionMachineInput::SessionEnded) {
            warn!(error = %e, "Session teardown transition refused");
        }

        info!(reason = ?reason, "Session ended");
        self.emit(SessionEvent::SessionEnded { reason });
    }

    // ==========================================
    // User record
    // ==========================================

    /// Re-fetch the signed-in user from the service.
    pub async fn reload_user(&self) -> SessionResult<User> {
        self.ensure_active()?;
        let access_token = lock(&self.data)
            .token
            .clone()
            .ok_or(SessionError::NotAuthenticated)?;

        let user = self
            .auth_api
            .current_user(&access_token)
            .await
            .map_err(|e| SessionError::from_api(e, PROFILE_FAILED))?;

        self.replace_user(user.clone())?;
        Ok(user)
    }

    /// Replace the cached user record with one fetched elsewhere.
    pub fn replace_user(&self, user: User) -> SessionResult<()> {
        if !self.is_authenticated() {
            return Err(SessionError::NotAuthenticated);
        }
        let user_id = user.id.clone();
        self.store_user(Some(user));
        self.emit(SessionEvent::UserUpdated { user_id });
        Ok(())
    }

    /// Apply `mutate` to the current user record and persist the result.
    ///
    /// `mutate` returns whether it changed anything; unchanged records are
    /// neither written nor announced. Returns `None` when no user is loaded.
    pub fn update_user<F>(&self, mutate: F) -> Option<User>
    where
        F: FnOnce(&mut User) -> bool,
    {
        let mut data = lock(&self.data);
        let mut user = data.user.clone()?;
        if !mutate(&mut user) {
            return Some(user);
        }

        if let Err(e) = self.credentials.set_user(&user) {
            warn!(user_id = %user.id, error = %e, "Failed to cache user record");
        }
        data.user = Some(user.clone());
        drop(data);

        self.emit(SessionEvent::UserUpdated {
            user_id: user.id.clone(),
        });
        Some(user)
    }
}
