//! Client-side state modules.

pub mod auth;
