//! portal-core: Shared infrastructure for the reclaim portal.
pub mod config;
pub mod middleware;
pub mod observability;

pub use axum;
pub use tracing;
