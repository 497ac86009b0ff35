//! Shared types for the API layer.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::api::rate_limit::RateLimiter;
use crate::config::AppConfig;
use crate::db::{self, DatabaseError};
use crate::models::User;
use crate::storage::ReportStore;

/// Shared context for all API routes and middleware.
///
/// The rate limiter is the only cross-request mutable state; everything
/// else is read-only configuration or a per-request database connection.
#[derive(Clone)]
pub struct ApiContext {
    pub config: Arc<AppConfig>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    pub store: Arc<ReportStore>,
}

impl ApiContext {
    pub fn new(config: Arc<AppConfig>, store: Arc<ReportStore>) -> Self {
        Self {
            config,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new())),
            store,
        }
    }

    /// One connection per request, scoped to the handler's lifetime.
    pub fn open_db(&self) -> Result<rusqlite::Connection, DatabaseError> {
        db::open_connection(&self.config.database_path)
    }
}

/// Authenticated caller, injected into request extensions by the auth
/// middleware after token verification and user lookup.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Standard pagination query parameters.
#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageParams {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(20).clamp(1, 100)
    }
}

/// Pagination envelope carried by every list response.
#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if total > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };
        Self {
            total,
            page,
            per_page,
            total_pages,
        }
    }
}
