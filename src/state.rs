//! Client-side auth state.
//!
//! DESIGN
//! ======
//! `AuthStore` (in `auth`) is created once at the application root. It owns
//! the latest session snapshot, the resolved user and the auth config, and
//! keeps the persisted user (`cache`) in step with them. Session changes
//! arrive on the `bus` and are classified into one-shot events by
//! `change`, using the pure rules in `derive`. Consumers read state through
//! the accessors in `hooks`, which tolerate a missing store.

pub mod auth;
pub mod bus;
pub mod cache;
pub mod change;
pub mod derive;
pub mod hooks;
