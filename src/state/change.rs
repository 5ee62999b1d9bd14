//! One-shot transition detection over a stream of session snapshots.

use std::sync::Arc;

use tracing::debug;

use crate::net::types::AuthResponse;
use crate::state::derive::{AuthChangeEvent, classify_transition};

/// Remembers the last observed snapshot and reports each classified
/// transition exactly once.
///
/// The first observation only establishes the baseline. A snapshot that is
/// the same `Arc` as the previous one is never reclassified, so repeated
/// reads of unchanged state stay silent.
#[derive(Debug, Clone, Default)]
pub struct AuthChangeTracker {
    previous: Option<Arc<AuthResponse>>,
}

impl AuthChangeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker whose baseline is already `initial`.
    #[must_use]
    pub fn starting_from(initial: Option<Arc<AuthResponse>>) -> Self {
        Self { previous: initial }
    }

    #[must_use]
    pub fn previous(&self) -> Option<&Arc<AuthResponse>> {
        self.previous.as_ref()
    }

    /// Record `current` and return the transition from the previous
    /// snapshot, if any. The stored snapshot is replaced unconditionally.
    pub fn observe(&mut self, current: Option<&Arc<AuthResponse>>) -> Option<AuthChangeEvent> {
        let event = match (self.previous.as_ref(), current) {
            (Some(prev), Some(cur)) if !Arc::ptr_eq(prev, cur) => classify_transition(prev, cur),
            _ => None,
        };
        self.previous = current.cloned();
        if let Some(event) = event {
            debug!(%event, status = current.map(|r| r.status), "auth transition");
        }
        event
    }
}

#[cfg(test)]
#[path = "change_test.rs"]
mod tests;
