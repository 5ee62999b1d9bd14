//! Auth state container.
//!
//! DESIGN
//! ======
//! `AuthStore` is a cheap-to-clone handle created once at the application
//! root and passed to whatever needs it. It owns the latest session
//! snapshot, the resolved user and the config, and is the only writer of
//! the cached user.
//!
//! Boot is two-phase: `new` seeds the user from the cache synchronously,
//! then the caller drives `load` (typically spawned) for the authoritative
//! fetch. Snapshots published on the bridge's `allauth.auth.change`
//! channel are applied as they arrive.
//!
//! CONCURRENCY
//! ===========
//! Every apply (state write, cache write, transition tracking) runs under a
//! single `apply` mutex, so the cache and the tracker always describe the
//! same snapshot as the state. Listeners are called after it is released,
//! and no lock is held across an await. Fetch completion and `update_user`
//! are not sequenced beyond that: whichever applies last wins.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::error::AuthError;
use crate::net::api::SessionStore;
use crate::net::types::{AuthResponse, STATUS_GONE, STATUS_OK, STATUS_UNAUTHORIZED, SessionConfig, User};
use crate::state::bus::{Channel, EventBridge, Subscription, UserUpdated};
use crate::state::cache::UserCache;
use crate::state::change::AuthChangeTracker;
use crate::state::derive::AuthChangeEvent;

// =============================================================================
// STATE
// =============================================================================

/// The container's session slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LoadState {
    /// The initial fetch has not completed.
    #[default]
    Loading,
    /// The initial fetch failed. Terminal until a caller-initiated refresh.
    Failed { reason: String },
    Loaded(Arc<AuthResponse>),
}

impl LoadState {
    #[must_use]
    pub fn response(&self) -> Option<&Arc<AuthResponse>> {
        match self {
            Self::Loaded(response) => Some(response),
            Self::Loading | Self::Failed { .. } => None,
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Point-in-time copy of everything the container holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthSnapshot {
    pub auth: LoadState,
    pub config: Option<Arc<SessionConfig>>,
    pub user: Option<User>,
}

impl AuthSnapshot {
    /// Loading until the session has been fetched once and the config has
    /// loaded with status 200.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.auth.is_loading() || !self.config.as_ref().is_some_and(|c| c.is_ok())
    }

    /// Signed in with a known user.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.auth.response().is_some_and(|r| r.status == STATUS_OK) && self.user.is_some()
    }
}

/// A classified change of the container's session snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthTransition {
    pub event: AuthChangeEvent,
    pub response: Arc<AuthResponse>,
}

// =============================================================================
// STORE
// =============================================================================

struct StoreInner {
    session: Arc<dyn SessionStore>,
    cache: UserCache,
    bridge: EventBridge,
    state: RwLock<AuthSnapshot>,
    apply: Mutex<()>,
    tracker: Mutex<AuthChangeTracker>,
    transitions: Channel<AuthTransition>,
    external: Mutex<Option<Subscription>>,
}

/// Shared handle to the auth state container.
#[derive(Clone)]
pub struct AuthStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for AuthStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthStore")
            .field("state", &self.snapshot())
            .field("cache", &self.inner.cache)
            .finish_non_exhaustive()
    }
}

impl AuthStore {
    /// Create the container, seed the user from the cache and start
    /// listening for external session changes. No network I/O happens here.
    #[must_use]
    pub fn new(session: Arc<dyn SessionStore>, cache: UserCache, bridge: EventBridge) -> Self {
        let seeded = cache.load();
        if let Some(user) = &seeded {
            debug!(user_id = %user.id, "seeded user from cache");
        }

        let inner = Arc::new(StoreInner {
            session,
            cache,
            bridge,
            state: RwLock::new(AuthSnapshot { user: seeded, ..AuthSnapshot::default() }),
            apply: Mutex::new(()),
            tracker: Mutex::new(AuthChangeTracker::new()),
            transitions: Channel::new("auth:transition"),
            external: Mutex::new(None),
        });

        let weak = Arc::downgrade(&inner);
        let subscription = inner.bridge.auth_changed().subscribe(move |response: &Arc<AuthResponse>| {
            if let Some(inner) = weak.upgrade() {
                inner.apply_external(Arc::clone(response));
            }
        });
        *inner.external.lock().unwrap_or_else(PoisonError::into_inner) = Some(subscription);

        Self { inner }
    }

    /// Fetch session and config concurrently and apply both results.
    ///
    /// A session fetch failure moves the store to [`LoadState::Failed`]
    /// and clears the user; a config failure is only logged.
    pub async fn load(&self) {
        let (auth, config) = futures::join!(self.inner.session.fetch_auth(), self.inner.session.fetch_config());
        self.inner.apply_initial(auth);
        if let Err(e) = self.inner.apply_config(config) {
            warn!(error = %e, code = e.error_code(), "config load failed");
        }
    }

    /// Re-fetch the session and apply it as an external change.
    ///
    /// Transitions are classified against the last applied snapshot; a
    /// failed load does not reset it. After a boot whose very first fetch
    /// failed there is nothing to compare against, so the first successful
    /// refresh only sets the baseline and fires no `on_auth_change` event.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; current state is left untouched.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let response = self.inner.session.fetch_auth().await?;
        self.inner.apply_external(Arc::new(response));
        Ok(())
    }

    /// Re-fetch the config.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; the previous config is kept.
    pub async fn reload_config(&self) -> Result<(), AuthError> {
        let config = self.inner.session.fetch_config().await;
        self.inner.apply_config(config)
    }

    /// Locally-driven user change, e.g. after a profile edit.
    ///
    /// `Some` persists and adopts the user; when a session snapshot with a
    /// `data` section exists it is replaced by a copy carrying the new user
    /// and `user:updated` is broadcast. `None` clears the user and the cache
    /// but leaves the session snapshot alone.
    pub fn update_user(&self, user: Option<User>) {
        let Some(user) = user else {
            let _guard = self.inner.lock_apply();
            self.inner.cache.clear();
            self.inner.write_state().user = None;
            debug!("user cleared locally");
            return;
        };

        let synthesized = {
            let _guard = self.inner.lock_apply();
            self.inner.cache.store(&user);
            let next = {
                let mut state = self.inner.write_state();
                state.user = Some(user.clone());
                let next = state
                    .auth
                    .response()
                    .and_then(|current| current.with_user(user.clone()))
                    .map(Arc::new);
                if let Some(next) = &next {
                    state.auth = LoadState::Loaded(Arc::clone(next));
                }
                next
            };
            next.map(|next| {
                let event = self.inner.observe(Some(&next));
                (next, event)
            })
        };

        match synthesized {
            Some((next, event)) => {
                self.inner.publish_transition(event, &next);
                let delivered = self.inner.bridge.user_updated().publish(&UserUpdated { user });
                debug!(listeners = delivered, "user updated");
            }
            None => debug!(user_id = %user.id, "user cached before session loaded"),
        }
    }

    /// Subscribe to classified transitions of the session snapshot. Each
    /// transition is delivered exactly once.
    pub fn on_auth_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AuthTransition) + Send + Sync + 'static,
    {
        self.inner.transitions.subscribe(listener)
    }

    /// Stop applying external session changes.
    pub fn shutdown(&self) {
        let subscription = self.inner.external.lock().unwrap_or_else(PoisonError::into_inner).take();
        if subscription.is_some() {
            debug!("auth store detached from event bridge");
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.read_state().clone()
    }

    #[must_use]
    pub fn auth(&self) -> LoadState {
        self.inner.read_state().auth.clone()
    }

    #[must_use]
    pub fn response(&self) -> Option<Arc<AuthResponse>> {
        self.inner.read_state().auth.response().cloned()
    }

    #[must_use]
    pub fn config(&self) -> Option<Arc<SessionConfig>> {
        self.inner.read_state().config.clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.inner.read_state().user.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.read_state().is_loading()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.read_state().is_authenticated()
    }

    #[must_use]
    pub fn cache(&self) -> &UserCache {
        &self.inner.cache
    }

    #[must_use]
    pub fn bridge(&self) -> &EventBridge {
        &self.inner.bridge
    }
}

// =============================================================================
// APPLY
// =============================================================================

/// What to do with the cached user after a new snapshot.
enum UserEffect {
    Adopt(User),
    Clear,
    Keep,
}

impl StoreInner {
    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, AuthSnapshot> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, AuthSnapshot> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_apply(&self) -> MutexGuard<'_, ()> {
        self.apply.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_initial(&self, result: Result<AuthResponse, AuthError>) {
        match result {
            Ok(response) => {
                let response = Arc::new(response);
                info!(status = response.status, "session loaded");
                // The boot path itself only adopts. A session store that also
                // publishes on the bridge (the HTTP client does for 401/410)
                // has already applied the snapshot through the external path,
                // which clears the user before this runs.
                let effect = adopt_effect(&response).unwrap_or(UserEffect::Keep);
                self.replace(response, effect);
            }
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "session load failed");
                let _guard = self.lock_apply();
                {
                    let mut state = self.write_state();
                    state.auth = LoadState::Failed { reason: e.to_string() };
                    state.user = None;
                }
                self.cache.clear();
            }
        }
    }

    fn apply_external(&self, response: Arc<AuthResponse>) {
        debug!(status = response.status, "external session change");
        let effect = adopt_effect(&response).unwrap_or_else(|| {
            if matches!(response.status, STATUS_UNAUTHORIZED | STATUS_GONE) { UserEffect::Clear } else { UserEffect::Keep }
        });
        self.replace(response, effect);
    }

    fn apply_config(&self, result: Result<SessionConfig, AuthError>) -> Result<(), AuthError> {
        let config = result?;
        debug!(status = config.status, providers = config.providers().len(), "config loaded");
        self.write_state().config = Some(Arc::new(config));
        Ok(())
    }

    fn replace(&self, response: Arc<AuthResponse>, effect: UserEffect) {
        let event = {
            let _guard = self.lock_apply();
            {
                let mut state = self.write_state();
                state.auth = LoadState::Loaded(Arc::clone(&response));
                match &effect {
                    UserEffect::Adopt(user) => state.user = Some(user.clone()),
                    UserEffect::Clear => state.user = None,
                    UserEffect::Keep => {}
                }
            }
            match &effect {
                UserEffect::Adopt(user) => self.cache.store(user),
                UserEffect::Clear => self.cache.clear(),
                UserEffect::Keep => {}
            }
            self.observe(Some(&response))
        };
        self.publish_transition(event, &response);
    }

    /// Caller holds the apply lock.
    fn observe(&self, current: Option<&Arc<AuthResponse>>) -> Option<AuthChangeEvent> {
        self.tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(current)
    }

    fn publish_transition(&self, event: Option<AuthChangeEvent>, response: &Arc<AuthResponse>) {
        if let Some(event) = event {
            self.transitions.publish(&AuthTransition { event, response: Arc::clone(response) });
        }
    }
}

/// A 200 carrying a user adopts it.
fn adopt_effect(response: &AuthResponse) -> Option<UserEffect> {
    if response.status != STATUS_OK {
        return None;
    }
    response.user().cloned().map(UserEffect::Adopt)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
