//! Network layer: allauth wire types and the session client.

pub mod api;
pub mod types;
