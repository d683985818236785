//! Network access to the calendar shell server.

pub mod api;
