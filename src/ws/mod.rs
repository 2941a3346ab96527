//! WebSocket push transport

pub mod handler;
pub mod protocol;
