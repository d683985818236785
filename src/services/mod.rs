//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own identity verification and session persistence so route
//! handlers can stay focused on protocol translation and cookie plumbing.

pub mod identity;
pub mod session;
