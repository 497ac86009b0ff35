//! HTTP API layer.
//!
//! Routes are nested under `/api/v1` and guarded by a middleware stack:
//! request logging → error-envelope context → rate limiting → per-router
//! auth gates (required / staff / admin / optional).
//!
//! The router is composable — `api_router()` returns a `Router` that can
//! be mounted on any axum server.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use types::ApiContext;
