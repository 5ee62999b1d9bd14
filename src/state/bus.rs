//! Event bridge: typed, named publish/subscribe channels.
//!
//! DESIGN
//! ======
//! Components that are not parent/child of each other (a nav bar and a home
//! view, say) react to auth and profile changes through these channels
//! instead of threading state through every layer. Two channels exist:
//! `allauth.auth.change` carries full session snapshots into the auth
//! container, `user:updated` carries lightweight profile notifications to
//! leaf consumers.
//!
//! Delivery is synchronous and in subscription order. The listener list is
//! snapshotted before dispatch, so listeners may publish or (un)subscribe
//! without deadlocking; such changes take effect from the next publish.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::trace;

use crate::net::types::{AuthResponse, User};

pub const AUTH_CHANGE_EVENT: &str = "allauth.auth.change";
pub const USER_UPDATED_EVENT: &str = "user:updated";

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

// =============================================================================
// CHANNEL
// =============================================================================

/// One named channel with an ordered listener list.
pub struct Channel<T> {
    name: &'static str,
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self { name: self.name, registry: Arc::clone(&self.registry) }
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<T> Channel<T> {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self { name, registry: Arc::new(Mutex::new(Registry { next_id: 0, listeners: Vec::new() })) }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }

    /// Deliver `payload` to every current listener. Returns how many ran;
    /// zero listeners is not an error.
    pub fn publish(&self, payload: &T) -> usize {
        let snapshot: Vec<Listener<T>> = {
            let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        trace!(channel = self.name, listeners = snapshot.len(), "publish");
        for listener in &snapshot {
            listener(payload);
        }
        snapshot.len()
    }
}

impl<T: 'static> Channel<T> {
    /// Register a listener. It stays registered until the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let listener: Listener<T> = Arc::new(listener);
        let id = {
            let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.push((id, listener));
            id
        };
        let weak: Weak<Mutex<Registry<T>>> = Arc::downgrade(&self.registry);
        Subscription {
            channel: self.name,
            cancel: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
                    registry.listeners.retain(|(listener_id, _)| *listener_id != id);
                }
            })),
        }
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Listener registration guard; unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes its listener immediately"]
pub struct Subscription {
    channel: &'static str,
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    #[must_use]
    pub fn channel(&self) -> &'static str {
        self.channel
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

// =============================================================================
// BRIDGE
// =============================================================================

/// Payload of the `user:updated` channel.
#[derive(Debug, Clone, PartialEq)]
pub struct UserUpdated {
    pub user: User,
}

/// The two application channels, shared by cloning.
#[derive(Debug, Clone)]
pub struct EventBridge {
    auth_changed: Channel<Arc<AuthResponse>>,
    user_updated: Channel<UserUpdated>,
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBridge {
    #[must_use]
    pub fn new() -> Self {
        Self { auth_changed: Channel::new(AUTH_CHANGE_EVENT), user_updated: Channel::new(USER_UPDATED_EVENT) }
    }

    /// Session snapshots produced outside the auth container.
    #[must_use]
    pub fn auth_changed(&self) -> &Channel<Arc<AuthResponse>> {
        &self.auth_changed
    }

    /// Profile notifications for consumers that only need to re-render.
    #[must_use]
    pub fn user_updated(&self) -> &Channel<UserUpdated> {
        &self.user_updated
    }
}

#[cfg(test)]
#[path = "bus_test.rs"]
mod tests;
