//! Consumer accessors over an optional [`AuthStore`].
//!
//! Every accessor accepts `Option<&AuthStore>` so that code running before
//! the store exists (or outside its scope) reads safe defaults: status 401,
//! no user, no config. None of them perform I/O except the cache fallback
//! in [`use_auth_info`] and [`use_resolved_user`].

use std::sync::Arc;

use crate::net::types::{AuthResponse, STATUS_UNAUTHORIZED, SessionConfig, User};
use crate::state::auth::AuthStore;
use crate::state::cache::{ResolvedUser, resolve_user};
use crate::state::change::AuthChangeTracker;
use crate::state::derive::{AuthChangeEvent, AuthInfo, derive_info_with_fallback};

/// The session snapshot as seen by a consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthView {
    pub response: Option<Arc<AuthResponse>>,
    /// Status of `response`, or 401 when there is none yet.
    pub status: u16,
}

impl Default for AuthView {
    fn default() -> Self {
        Self { response: None, status: STATUS_UNAUTHORIZED }
    }
}

impl AuthView {
    fn of(response: Option<Arc<AuthResponse>>) -> Self {
        let status = response.as_ref().map_or(STATUS_UNAUTHORIZED, |r| r.status);
        Self { response, status }
    }
}

#[must_use]
pub fn use_auth(store: Option<&AuthStore>) -> AuthView {
    AuthView::of(store.and_then(AuthStore::response))
}

#[must_use]
pub fn use_config(store: Option<&AuthStore>) -> Option<Arc<SessionConfig>> {
    store.and_then(AuthStore::config)
}

/// The container's current user, without consulting the cache.
#[must_use]
pub fn use_user(store: Option<&AuthStore>) -> Option<User> {
    store.and_then(AuthStore::user)
}

/// Layered lookup: live user, then the cache.
#[must_use]
pub fn use_resolved_user(store: Option<&AuthStore>) -> ResolvedUser {
    match store {
        Some(store) => resolve_user(store.user().as_ref(), store.cache()),
        None => ResolvedUser::Missing,
    }
}

/// Derived auth semantics for the current snapshot. The cached user only
/// fills in for a snapshot that is already authenticated.
#[must_use]
pub fn use_auth_info(store: Option<&AuthStore>) -> AuthInfo {
    let Some(store) = store else {
        return AuthInfo::default();
    };
    let response = store.response();
    derive_info_with_fallback(response.as_deref(), || store.cache().load())
}

#[must_use]
pub fn use_auth_status(store: Option<&AuthStore>) -> (AuthView, AuthInfo) {
    (use_auth(store), use_auth_info(store))
}

/// Current snapshot plus the transition since the caller's last read.
/// The caller owns `tracker` and keeps it across reads; each transition is
/// returned exactly once.
pub fn use_auth_change(store: Option<&AuthStore>, tracker: &mut AuthChangeTracker) -> (AuthView, Option<AuthChangeEvent>) {
    let view = use_auth(store);
    let event = tracker.observe(view.response.as_ref());
    (view, event)
}

#[cfg(test)]
#[path = "hooks_test.rs"]
mod tests;
