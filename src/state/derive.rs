//! Pure auth semantics: derived info and transition classification.
//!
//! DESIGN
//! ======
//! Nothing here touches storage or the network. The cache fallback for
//! the user is injected by the caller, so `derive_info` and
//! `classify_transition` are deterministic for a given input.

use std::fmt;

use crate::net::types::{AuthResponse, Flow, STATUS_GONE, STATUS_OK, STATUS_UNAUTHORIZED, User};

/// Authentication semantics computed from an [`AuthResponse`]. Never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthInfo {
    pub is_authenticated: bool,
    pub requires_reauthentication: bool,
    pub user: Option<User>,
    pub pending_flow: Option<Flow>,
}

/// Derive [`AuthInfo`] from the response alone.
#[must_use]
pub fn derive_info(response: Option<&AuthResponse>) -> AuthInfo {
    derive_info_with_fallback(response, || None)
}

/// Derive [`AuthInfo`], consulting `fallback` for the user when the
/// response is authenticated but does not carry one.
///
/// `fallback` is never called for an unauthenticated response, so a cached
/// user cannot make an anonymous session look signed in.
pub fn derive_info_with_fallback<F>(response: Option<&AuthResponse>, fallback: F) -> AuthInfo
where
    F: FnOnce() -> Option<User>,
{
    let Some(response) = response else {
        return AuthInfo::default();
    };

    let is_authenticated = response.status == STATUS_OK
        || (response.status == STATUS_UNAUTHORIZED && response.meta.is_authenticated);
    let requires_reauthentication = is_authenticated && response.status == STATUS_UNAUTHORIZED;
    let pending_flow = response.pending_flow().cloned();
    let user = if is_authenticated { response.user().cloned().or_else(fallback) } else { None };

    AuthInfo { is_authenticated, requires_reauthentication, user, pending_flow }
}

// =============================================================================
// TRANSITIONS
// =============================================================================

/// Discrete classification of the change between two session snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthChangeEvent {
    LoggedOut,
    LoggedIn,
    Reauthenticated,
    ReauthenticationRequired,
    FlowUpdated,
}

impl AuthChangeEvent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoggedOut => "LOGGED_OUT",
            Self::LoggedIn => "LOGGED_IN",
            Self::Reauthenticated => "REAUTHENTICATED",
            Self::ReauthenticationRequired => "REAUTHENTICATION_REQUIRED",
            Self::FlowUpdated => "FLOW_UPDATED",
        }
    }
}

impl fmt::Display for AuthChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify the transition `from -> to`.
///
/// Precedence matters: a 410 wins outright, and the identity guard must run
/// before the authenticated/unauthenticated comparison or a user switch
/// would read as a reauthentication.
///
/// Deep-equal snapshots yield `None` before any rule runs, so `410 -> 410`
/// is not a second `LoggedOut`. The container applies most snapshots twice
/// (once from the bridge, once from the fetch that produced them).
#[must_use]
pub fn classify_transition(from: &AuthResponse, to: &AuthResponse) -> Option<AuthChangeEvent> {
    if from == to {
        return None;
    }
    if to.status == STATUS_GONE {
        return Some(AuthChangeEvent::LoggedOut);
    }

    let mut from_info = derive_info(Some(from));
    let to_info = derive_info(Some(to));

    // A different user on both sides is a fresh login, not a continuation.
    if let (Some(before), Some(after)) = (&from_info.user, &to_info.user) {
        if before.id != after.id {
            from_info = AuthInfo::default();
        }
    }

    match (from_info.is_authenticated, to_info.is_authenticated) {
        (false, true) => Some(AuthChangeEvent::LoggedIn),
        (true, false) => Some(AuthChangeEvent::LoggedOut),
        (true, true) => {
            if to_info.requires_reauthentication {
                Some(AuthChangeEvent::ReauthenticationRequired)
            } else if from_info.requires_reauthentication {
                Some(AuthChangeEvent::Reauthenticated)
            } else if from.methods_len() < to.methods_len() {
                // Both sides authenticated after a reload of the reauth
                // screen; only the method count shows the completed step.
                Some(AuthChangeEvent::Reauthenticated)
            } else {
                None
            }
        }
        (false, false) => {
            let to_flow = to_info.pending_flow.filter(|flow| !flow.id.is_empty())?;
            let from_flow_id = from_info.pending_flow.map(|flow| flow.id);
            (from_flow_id.as_deref() != Some(to_flow.id.as_str())).then_some(AuthChangeEvent::FlowUpdated)
        }
    }
}

#[cfg(test)]
#[path = "derive_test.rs"]
mod tests;
