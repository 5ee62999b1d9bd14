//! Local cache: a string key/value store plus the user snapshot kept in it.
//!
//! DESIGN
//! ======
//! `Storage` mirrors the browser `localStorage` surface (`get_item`,
//! `set_item`, `remove_item`) so the in-memory and file-backed stores are
//! interchangeable. `UserCache` owns the single `user` key; the auth
//! container is its only writer.
//!
//! ERROR HANDLING
//! ==============
//! Cache failures never reach callers. A corrupt user entry is discarded
//! and an unreadable store is treated as empty, each with a warning.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::warn;

use crate::config::DEFAULT_USER_CACHE_KEY;
use crate::error::AuthError;
use crate::net::types::User;

// =============================================================================
// STORAGE
// =============================================================================

/// Persistent string key/value store.
pub trait Storage: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AuthError::Storage`] when the backing store is unreadable.
    fn get_item(&self, key: &str) -> Result<Option<String>, AuthError>;

    /// # Errors
    ///
    /// Returns [`AuthError::Storage`] when the backing store is unwritable.
    fn set_item(&self, key: &str, value: &str) -> Result<(), AuthError>;

    /// # Errors
    ///
    /// Returns [`AuthError::Storage`] when the backing store is unwritable.
    fn remove_item(&self, key: &str) -> Result<(), AuthError>;
}

/// Process-local store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, AuthError> {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), AuthError> {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), AuthError> {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        items.remove(key);
        Ok(())
    }
}

/// Store persisted as one flat JSON object on disk.
///
/// Every operation re-reads the file so separate processes sharing the
/// path observe each other's writes. Writes go through a temp file and a
/// rename.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, AuthError> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| AuthError::Storage(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(AuthError::Storage(format!("{}: {e}", self.path.display()))),
        }
    }

    /// Read for a subsequent write. An unparseable file is replaced rather
    /// than blocking every future write.
    fn read_for_write(&self) -> Result<BTreeMap<String, String>, AuthError> {
        match self.read_all() {
            Err(AuthError::Storage(reason)) if self.path.exists() => {
                warn!(path = %self.path.display(), %reason, "cache file unreadable; starting fresh");
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    fn write_all(&self, items: &BTreeMap<String, String>) -> Result<(), AuthError> {
        let storage_err = |e: std::io::Error| AuthError::Storage(format!("{}: {e}", self.path.display()));
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(storage_err)?;
        }
        let rendered = serde_json::to_string_pretty(items).map_err(|e| AuthError::Storage(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, rendered).map_err(storage_err)?;
        fs::rename(&tmp, &self.path).map_err(storage_err)
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, AuthError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), AuthError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut items = self.read_for_write()?;
        items.insert(key.to_owned(), value.to_owned());
        self.write_all(&items)
    }

    fn remove_item(&self, key: &str) -> Result<(), AuthError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut items = self.read_for_write()?;
        if items.remove(key).is_none() {
            return Ok(());
        }
        self.write_all(&items)
    }
}

// =============================================================================
// USER CACHE
// =============================================================================

/// The cached user snapshot under a single storage key.
#[derive(Clone)]
pub struct UserCache {
    storage: Arc<dyn Storage>,
    key: String,
}

impl fmt::Debug for UserCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCache").field("key", &self.key).finish_non_exhaustive()
    }
}

impl UserCache {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        Self { storage, key: key.into() }
    }

    /// Cache under the `user` key.
    #[must_use]
    pub fn with_default_key(storage: Arc<dyn Storage>) -> Self {
        Self::new(storage, DEFAULT_USER_CACHE_KEY)
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Read the cached user. A corrupt entry is removed and reported as absent.
    #[must_use]
    pub fn load(&self) -> Option<User> {
        let raw = match self.storage.get_item(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %self.key, error = %e, "user cache unreadable");
                return None;
            }
        };
        match serde_json::from_str::<User>(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(key = %self.key, error = %e, "discarding corrupt cached user");
                self.clear();
                None
            }
        }
    }

    pub fn store(&self, user: &User) {
        let rendered = match serde_json::to_string(user) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(key = %self.key, error = %e, "cached user not serializable");
                return;
            }
        };
        if let Err(e) = self.storage.set_item(&self.key, &rendered) {
            warn!(key = %self.key, error = %e, "user cache write failed");
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.storage.remove_item(&self.key) {
            warn!(key = %self.key, error = %e, "user cache clear failed");
        }
    }
}

// =============================================================================
// LAYERED LOOKUP
// =============================================================================

/// Where a resolved user came from.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedUser {
    /// Held by the live container state.
    Live(User),
    /// Recovered from the local cache.
    Cached(User),
    Missing,
}

impl ResolvedUser {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Live(user) | Self::Cached(user) => Some(user),
            Self::Missing => None,
        }
    }

    #[must_use]
    pub fn into_user(self) -> Option<User> {
        match self {
            Self::Live(user) | Self::Cached(user) => Some(user),
            Self::Missing => None,
        }
    }

    #[must_use]
    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }
}

/// Resolve a user by precedence: live state first, then the cache.
#[must_use]
pub fn resolve_user(live: Option<&User>, cache: &UserCache) -> ResolvedUser {
    if let Some(user) = live {
        return ResolvedUser::Live(user.clone());
    }
    cache.load().map_or(ResolvedUser::Missing, ResolvedUser::Cached)
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
