//! Client configuration parsed from environment variables.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::AuthError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_USER_CACHE_KEY: &str = "user";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// allauth headless client kind. Selects the URL prefix and how the
/// session is carried (cookie jar vs `X-Session-Token`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClientKind {
    Browser,
    #[default]
    App,
}

impl ClientKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::App => "app",
        }
    }
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientKind {
    type Err = AuthError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "browser" => Ok(Self::Browser),
            "app" => Ok(Self::App),
            other => Err(AuthError::ConfigParse(format!(
                "unknown client kind '{other}' (expected 'browser' or 'app')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend origin without a trailing slash.
    pub base_url: String,
    pub client_kind: ClientKind,
    /// File backing the local cache. `None` keeps the cache in memory.
    pub cache_path: Option<PathBuf>,
    pub timeouts: ClientTimeouts,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            client_kind: ClientKind::default(),
            cache_path: None,
            timeouts: ClientTimeouts::default(),
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `WISHLIST_BASE_URL`: backend origin (default `http://127.0.0.1:8000`)
    /// - `WISHLIST_AUTH_CLIENT`: `app` (default) or `browser`
    /// - `WISHLIST_CACHE_FILE`: path of the persisted cache
    /// - `WISHLIST_REQUEST_TIMEOUT_SECS`: default 30
    /// - `WISHLIST_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ConfigParse`] for an unknown client kind or an
    /// empty base URL.
    pub fn from_env() -> Result<Self, AuthError> {
        let base_url = match std::env::var("WISHLIST_BASE_URL") {
            Ok(raw) => normalize_base_url(&raw)?,
            Err(_) => DEFAULT_BASE_URL.to_owned(),
        };
        let client_kind = match std::env::var("WISHLIST_AUTH_CLIENT") {
            Ok(raw) => raw.trim().parse()?,
            Err(_) => ClientKind::default(),
        };
        let cache_path = std::env::var_os("WISHLIST_CACHE_FILE")
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);
        let timeouts = ClientTimeouts {
            request_secs: env_parse_u64("WISHLIST_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("WISHLIST_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self { base_url, client_kind, cache_path, timeouts })
    }

    /// Root of the allauth headless API, e.g. `http://host/_allauth/app/v1`.
    #[must_use]
    pub fn api_root(&self) -> String {
        format!("{}/_allauth/{}/v1", self.base_url, self.client_kind)
    }
}

/// Trim whitespace and trailing slashes; reject an empty origin.
///
/// # Errors
///
/// Returns [`AuthError::ConfigParse`] when nothing is left after trimming.
pub fn normalize_base_url(raw: &str) -> Result<String, AuthError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AuthError::ConfigParse("base URL is empty".into()));
    }
    Ok(trimmed.to_owned())
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).map_or(default, |v| v.trim().parse::<u64>().unwrap_or(default))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
