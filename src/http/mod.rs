//! HTTP surface: operator commands, reads and team control

pub mod middleware;
pub mod routes;

pub use routes::build_router;
