//! Wire types for the allauth headless session and config endpoints.
//!
//! DESIGN
//! ======
//! Only the fields the auth core reasons about are typed. Everything else
//! lands in `extra` maps so a cached user or a synthesized response
//! survives a serialize/deserialize cycle without dropping server fields.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const STATUS_OK: u16 = 200;
pub const STATUS_UNAUTHORIZED: u16 = 401;
pub const STATUS_GONE: u16 = 410;

// =============================================================================
// USER
// =============================================================================

/// Stable identity key. allauth emits integer primary keys by default but
/// custom user models may use strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Int(i64),
    Str(String),
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::Str(id.to_owned())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Str(id) => f.write_str(id),
        }
    }
}

/// Minimal user profile as held by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_usable_password: Option<bool>,
    /// Server fields not modeled here (`email`, `display`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    #[must_use]
    pub fn new(id: impl Into<UserId>, username: impl Into<String>) -> Self {
        Self { id: id.into(), username: username.into(), has_usable_password: None, extra: Map::new() }
    }

    /// Human-facing name: allauth's `display` when present, else `username`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.extra
            .get("display")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.username)
    }
}

// =============================================================================
// AUTH RESPONSE
// =============================================================================

/// Snapshot of session status returned by the session endpoint.
///
/// Never mutated after construction; state transitions replace it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub status: u16,
    #[serde(default)]
    pub meta: AuthMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AuthData>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthMeta {
    /// Disambiguates a 401 that still belongs to a user awaiting reauthentication.
    #[serde(default)]
    pub is_authenticated: bool,
    /// Issued to app clients on login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// Completed authentication method records. Only the count is used.
    #[serde(default)]
    pub methods: Vec<Value>,
    #[serde(default)]
    pub flows: Vec<Flow>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A server-declared authentication step (login, signup, MFA, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: String,
    #[serde(default)]
    pub is_pending: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Flow {
    #[must_use]
    pub fn new(id: impl Into<String>, is_pending: bool) -> Self {
        Self { id: id.into(), is_pending, extra: Map::new() }
    }
}

impl AuthResponse {
    /// Bare response with only a status code, as allauth returns for 410.
    #[must_use]
    pub fn with_status(status: u16) -> Self {
        Self { status, meta: AuthMeta::default(), data: None, extra: Map::new() }
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.data.as_ref().and_then(|d| d.user.as_ref())
    }

    #[must_use]
    pub fn methods_len(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.methods.len())
    }

    #[must_use]
    pub fn flows(&self) -> &[Flow] {
        self.data.as_ref().map(|d| d.flows.as_slice()).unwrap_or(&[])
    }

    /// First flow still marked pending.
    #[must_use]
    pub fn pending_flow(&self) -> Option<&Flow> {
        self.flows().iter().find(|flow| flow.is_pending)
    }

    /// Copy of this response with `data.user` replaced. `None` when there
    /// is no `data` section to carry the user.
    #[must_use]
    pub fn with_user(&self, user: User) -> Option<Self> {
        let data = self.data.as_ref()?;
        Some(Self { data: Some(AuthData { user: Some(user), ..data.clone() }), ..self.clone() })
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// allauth configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub status: u16,
    #[serde(default)]
    pub data: ConfigData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socialaccount: Option<SocialAccountConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfa: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usersessions: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialAccountConfig {
    #[serde(default)]
    pub providers: Vec<ProviderInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub flows: Vec<String>,
}

impl SessionConfig {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    #[must_use]
    pub fn providers(&self) -> &[ProviderInfo] {
        self.data
            .socialaccount
            .as_ref()
            .map(|s| s.providers.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
