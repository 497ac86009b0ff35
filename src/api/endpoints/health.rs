//! Health check endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;
use crate::config::{StorageConfig, APP_NAME, APP_VERSION};
use crate::db;

#[derive(Serialize)]
pub struct RootResponse {
    pub message: String,
    pub version: &'static str,
}

/// `GET /` — liveness banner.
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: format!("{APP_NAME} is running"),
        version: APP_VERSION,
    })
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub components: Components,
}

#[derive(Serialize)]
pub struct Components {
    pub database: ComponentHealth,
    pub storage: ComponentHealth,
    pub rate_limiter: ComponentHealth,
}

/// `GET /health` — component status. 503 when the database is unreachable;
/// a storage problem alone does not mark the whole system unhealthy.
pub async fn check(State(ctx): State<ApiContext>) -> (StatusCode, Json<HealthResponse>) {
    let database = match ctx.open_db().and_then(|conn| db::count_tables(&conn)) {
        Ok(tables) => ComponentHealth {
            status: "healthy",
            detail: format!("{tables} tables"),
        },
        Err(err) => {
            tracing::error!(error = %err, "database health check failed");
            ComponentHealth {
                status: "unhealthy",
                detail: err.to_string(),
            }
        }
    };

    let storage = ComponentHealth {
        status: "healthy",
        detail: match &ctx.config.storage {
            StorageConfig::Local { root } => format!("local: {}", root.display()),
            StorageConfig::S3 { bucket, .. } => format!("s3: {bucket}"),
        },
    };

    let rate_limiter = ComponentHealth {
        status: "healthy",
        detail: if ctx.config.rate_limiting_enabled {
            "enabled".into()
        } else {
            "disabled".into()
        },
    };

    let healthy = database.status == "healthy";
    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" },
        version: APP_VERSION,
        components: Components {
            database,
            storage,
            rate_limiter,
        },
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}
