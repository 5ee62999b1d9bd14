//! allauth headless session client.
//!
//! ARCHITECTURE
//! ============
//! `SessionStore` is the seam the auth container depends on; `AllauthClient`
//! implements it over HTTP and also exposes the session operations account
//! screens drive (login, logout, reauthenticate, profile update).
//!
//! Every session-bearing response is inspected after it arrives: app-client
//! session tokens are captured into storage, and snapshots that signal a
//! session change are published on the bridge's `allauth.auth.change`
//! channel, which is how the container learns about them.
//!
//! ERROR HANDLING
//! ==============
//! allauth mirrors its status in the JSON body, so a 401 or 410 with a JSON
//! body is a normal response, not an error. Only transport failures and
//! unreadable bodies become [`AuthError`]s. Response parsing is pure
//! (`parse_body`) for testability.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::cookie::{CookieStore, Jar};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::{ClientConfig, ClientKind};
use crate::error::AuthError;
use crate::net::types::{AuthResponse, STATUS_GONE, STATUS_OK, STATUS_UNAUTHORIZED, SessionConfig};
use crate::state::bus::EventBridge;
use crate::state::cache::Storage;

pub const SESSION_TOKEN_KEY: &str = "sessionToken";
pub const SESSION_TOKEN_HEADER: &str = "X-Session-Token";
pub const CSRF_HEADER: &str = "X-CSRFToken";
pub const CSRF_COOKIE: &str = "csrftoken";
pub const PROFILE_PATH: &str = "/api/auth/account/profile/";

// =============================================================================
// SESSION STORE
// =============================================================================

/// Source of authoritative session state and auth configuration.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Current session snapshot.
    async fn fetch_auth(&self) -> Result<AuthResponse, AuthError>;

    /// Auth configuration (enabled login methods, social providers, ...).
    async fn fetch_config(&self) -> Result<SessionConfig, AuthError>;
}

// =============================================================================
// REQUEST BODIES
// =============================================================================

/// Login credentials. allauth accepts either `username` or `email`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub password: String,
}

#[derive(Serialize)]
struct ReauthenticateRequest<'a> {
    password: &'a str,
}

#[derive(Serialize)]
struct ProfileRequest<'a> {
    username: &'a str,
    current_password: &'a str,
}

/// Result of a profile update on the wishlist API.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ProfileResponse {
    pub status: u16,
    #[serde(default)]
    pub data: ProfileData,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct ProfileData {
    #[serde(default)]
    pub username: Option<String>,
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct AllauthClient {
    http: reqwest::Client,
    jar: Arc<Jar>,
    base_url: String,
    api_root: String,
    kind: ClientKind,
    storage: Arc<dyn Storage>,
    bridge: EventBridge,
}

impl std::fmt::Debug for AllauthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllauthClient")
            .field("api_root", &self.api_root)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl AllauthClient {
    /// Build a client for `config`. Session tokens are kept in `storage`;
    /// session-changing responses are published on `bridge`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::HttpClientBuild`] if the HTTP client fails to build.
    pub fn new(config: &ClientConfig, storage: Arc<dyn Storage>, bridge: EventBridge) -> Result<Self, AuthError> {
        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(|e| AuthError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            jar,
            base_url: config.base_url.clone(),
            api_root: config.api_root(),
            kind: config.client_kind,
            storage,
            bridge,
        })
    }

    #[must_use]
    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// `GET /auth/session`.
    ///
    /// # Errors
    ///
    /// Transport failures and unreadable bodies.
    pub async fn get_session(&self) -> Result<AuthResponse, AuthError> {
        self.session_request::<()>(Method::GET, "/auth/session", None).await
    }

    /// `GET /config`.
    ///
    /// # Errors
    ///
    /// Transport failures and unreadable bodies.
    pub async fn get_config(&self) -> Result<SessionConfig, AuthError> {
        let url = format!("{}/config", self.api_root);
        let (status, text) = self.send::<()>(Method::GET, &url, None).await?;
        parse_body(status, &text)
    }

    /// `POST /auth/login`.
    ///
    /// # Errors
    ///
    /// Transport failures and unreadable bodies. Rejected credentials come
    /// back as a normal response with a 400 status.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, AuthError> {
        self.session_request(Method::POST, "/auth/login", Some(credentials)).await
    }

    /// `DELETE /auth/session`. A successful logout answers 401.
    ///
    /// # Errors
    ///
    /// Transport failures and unreadable bodies.
    pub async fn logout(&self) -> Result<AuthResponse, AuthError> {
        self.session_request::<()>(Method::DELETE, "/auth/session", None).await
    }

    /// `POST /auth/reauthenticate`.
    ///
    /// # Errors
    ///
    /// Transport failures and unreadable bodies.
    pub async fn reauthenticate(&self, password: &str) -> Result<AuthResponse, AuthError> {
        self.session_request(Method::POST, "/auth/reauthenticate", Some(&ReauthenticateRequest { password }))
            .await
    }

    /// `PUT /api/auth/account/profile/` on the wishlist API.
    ///
    /// # Errors
    ///
    /// Transport failures and unreadable bodies.
    pub async fn update_profile(&self, username: &str, current_password: &str) -> Result<ProfileResponse, AuthError> {
        let url = format!("{}{PROFILE_PATH}", self.base_url);
        let body = ProfileRequest { username, current_password };
        let (status, text) = self.send(Method::PUT, &url, Some(&body)).await?;
        parse_body(status, &text)
    }

    async fn session_request<B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<AuthResponse, AuthError> {
        let url = format!("{}{path}", self.api_root);
        let (status, text) = self.send(method, &url, body).await?;
        let response: AuthResponse = parse_body(status, &text)?;
        self.track_session(&response);
        Ok(response)
    }

    async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<(u16, String), AuthError> {
        let mutating = method != Method::GET;
        let mut request = self.http.request(method.clone(), url);
        if let Some(token) = self.session_token() {
            request = request.header(SESSION_TOKEN_HEADER, token);
        }
        if mutating {
            if let Some(csrf) = self.csrf_token(url) {
                request = request.header(CSRF_HEADER, csrf);
            }
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| AuthError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| AuthError::Request(e.to_string()))?;
        debug!(%method, url, status, "session request");
        Ok((status, text))
    }

    fn session_token(&self) -> Option<String> {
        if self.kind != ClientKind::App {
            return None;
        }
        match self.storage.get_item(SESSION_TOKEN_KEY) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "session token unreadable");
                None
            }
        }
    }

    fn csrf_token(&self, url: &str) -> Option<String> {
        let Ok(url) = reqwest::Url::parse(url) else {
            return None;
        };
        let header = self.jar.cookies(&url)?;
        let Ok(header) = header.to_str() else {
            return None;
        };
        csrf_from_cookie_header(header).map(str::to_owned)
    }

    /// Capture or drop the app session token and publish session changes.
    fn track_session(&self, response: &AuthResponse) {
        if self.kind == ClientKind::App {
            let stored = match (&response.meta.session_token, response.status) {
                (Some(token), _) => self.storage.set_item(SESSION_TOKEN_KEY, token),
                (None, STATUS_GONE) => self.storage.remove_item(SESSION_TOKEN_KEY),
                (None, _) => Ok(()),
            };
            if let Err(e) = stored {
                warn!(error = %e, "session token write failed");
            }
        }
        if should_publish_change(response) {
            let delivered = self.bridge.auth_changed().publish(&Arc::new(response.clone()));
            debug!(status = response.status, listeners = delivered, "published auth change");
        }
    }
}

#[async_trait::async_trait]
impl SessionStore for AllauthClient {
    async fn fetch_auth(&self) -> Result<AuthResponse, AuthError> {
        self.get_session().await
    }

    async fn fetch_config(&self) -> Result<SessionConfig, AuthError> {
        self.get_config().await
    }
}

// =============================================================================
// PURE HELPERS
// =============================================================================

/// Decode a JSON body regardless of transport status. A body that does not
/// decode is a parse error on 2xx and an unexpected-status error otherwise.
///
/// # Errors
///
/// See above.
pub fn parse_body<T: DeserializeOwned>(status: u16, text: &str) -> Result<T, AuthError> {
    match serde_json::from_str::<T>(text) {
        Ok(value) => Ok(value),
        Err(e) if (200..300).contains(&status) => Err(AuthError::Parse(e.to_string())),
        Err(_) => Err(AuthError::UnexpectedStatus { status, body: text.to_owned() }),
    }
}

/// A snapshot is worth broadcasting when the session ended, needs
/// (re)authentication, or is now authenticated.
#[must_use]
pub fn should_publish_change(response: &AuthResponse) -> bool {
    matches!(response.status, STATUS_UNAUTHORIZED | STATUS_GONE)
        || (response.status == STATUS_OK && response.meta.is_authenticated)
}

/// Extract the CSRF token from a `Cookie` header value.
#[must_use]
pub fn csrf_from_cookie_header(header: &str) -> Option<&str> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix(CSRF_COOKIE)?.strip_prefix('='))
        .filter(|token| !token.is_empty())
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
