//! Shared utilities

pub mod rate_limit;
pub mod secret;
pub mod time;
