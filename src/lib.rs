//! # wishlist-auth
//!
//! Client-side authentication state for the wishlist app, kept in sync with
//! a django-allauth headless backend.
//!
//! ARCHITECTURE
//! ============
//! - `net`: wire types and the allauth session client.
//! - `state`: local user cache, event bridge, derivation functions, the
//!   `AuthStore` container, one-shot transition tracking and the consumer
//!   accessors (`use_*`).
//! - `config`: environment-driven client settings.
//!
//! Data flows session store -> `AuthStore` -> cache + event bridge ->
//! consumers. Local profile edits flow back in through
//! [`AuthStore::update_user`].

pub mod config;
pub mod error;
pub mod net;
pub mod state;

pub use config::{ClientConfig, ClientKind};
pub use error::AuthError;
pub use net::api::{AllauthClient, LoginRequest, ProfileResponse, SessionStore};
pub use net::types::{AuthData, AuthMeta, AuthResponse, Flow, SessionConfig, User, UserId};
pub use state::auth::{AuthSnapshot, AuthStore, AuthTransition, LoadState};
pub use state::bus::{Channel, EventBridge, Subscription, UserUpdated};
pub use state::cache::{FileStorage, MemoryStorage, ResolvedUser, Storage, UserCache};
pub use state::change::AuthChangeTracker;
pub use state::derive::{AuthChangeEvent, AuthInfo, classify_transition, derive_info};
pub use state::hooks::{
    AuthView, use_auth, use_auth_change, use_auth_info, use_auth_status, use_config, use_resolved_user, use_user,
};
