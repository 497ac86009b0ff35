//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Request logger — method, path, status, latency
//! 2. Envelope context — stamps path/request id into error bodies
//! 3. Rate limiter — reject early, save resources
//! 4. Auth gates — per-router (required / admin / staff / optional)

pub mod auth;
pub mod envelope;
pub mod rate;
pub mod request_log;
