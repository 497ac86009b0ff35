//! API error types with the structured JSON error envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthError;
use crate::db::DatabaseError;
use crate::models::DomainError;
use crate::storage::StorageError;

/// Error response body: `{"error": {code, message, timestamp, ...}}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication failed")]
    Unauthorized,
    #[error("Insufficient permissions: {0}")]
    Forbidden(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Business rule violated: {0}")]
    BusinessRule(String),
    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64, limit: u32 },
    #[error("External service failure: {0}")]
    ExternalService(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTHENTICATION_FAILED",
                // Deliberately generic: never reveals which check failed.
                "Could not validate credentials".to_string(),
                None,
            ),
            ApiError::Forbidden(detail) => (
                StatusCode::FORBIDDEN,
                "AUTHORIZATION_FAILED",
                detail.clone(),
                None,
            ),
            ApiError::Validation(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                detail.clone(),
                None,
            ),
            ApiError::NotFound(detail) => (
                StatusCode::NOT_FOUND,
                "RESOURCE_NOT_FOUND",
                detail.clone(),
                None,
            ),
            ApiError::Conflict(detail) => (
                StatusCode::CONFLICT,
                "RESOURCE_ALREADY_EXISTS",
                detail.clone(),
                None,
            ),
            ApiError::BusinessRule(detail) => (
                StatusCode::BAD_REQUEST,
                "BUSINESS_RULE_VIOLATION",
                detail.clone(),
                None,
            ),
            ApiError::InvalidTransition { from, to } => (
                StatusCode::BAD_REQUEST,
                "INVALID_STATUS_TRANSITION",
                format!("Cannot transition from {from} to {to}"),
                Some(serde_json::json!({ "from": from, "to": to })),
            ),
            ApiError::RateLimited { retry_after, limit } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMIT_EXCEEDED",
                format!("Rate limit exceeded. Retry after {retry_after}s"),
                Some(serde_json::json!({
                    "limit": limit,
                    "retry_after": retry_after,
                })),
            ),
            ApiError::ExternalService(detail) => {
                tracing::error!(detail, "external service failure");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "EXTERNAL_SERVICE_ERROR",
                    "External service unavailable".to_string(),
                    None,
                )
            }
            ApiError::Internal(detail) => {
                // Full detail goes to the log, only a correlation id to
                // the client.
                let error_id = Uuid::new_v4().to_string();
                tracing::error!(error_id, detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "An unexpected error occurred".to_string(),
                    Some(serde_json::json!({ "error_id": error_id })),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                timestamp: Utc::now(),
                details,
                request_id: None,
                path: None,
            },
        };

        let mut response = (status, Json(body)).into_response();
        match &self {
            ApiError::RateLimited { retry_after, .. } => {
                if let Ok(val) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
                    response.headers_mut().insert("Retry-After", val);
                }
            }
            ApiError::Unauthorized => {
                response.headers_mut().insert(
                    "WWW-Authenticate",
                    axum::http::HeaderValue::from_static("Bearer"),
                );
            }
            _ => {}
        }
        response
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => {
                ApiError::NotFound(format!("{entity_type} with ID '{id}' not found"))
            }
            DatabaseError::UniqueViolation(_) => {
                ApiError::Conflict("Duplicate entry found".into())
            }
            DatabaseError::ForeignKeyViolation(_) => {
                ApiError::Conflict("Operation conflicts with referenced records".into())
            }
            DatabaseError::InvalidEnum { field, value } => {
                ApiError::Validation(format!("Invalid value for {field}: {value}"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidTransition { from, to } => {
                ApiError::InvalidTransition { from, to }
            }
            other => ApiError::BusinessRule(other.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => ApiError::NotFound("Report file not found".into()),
            other => ApiError::ExternalService(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken => ApiError::Unauthorized,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_returns_401_with_generic_message() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get("WWW-Authenticate").unwrap(), "Bearer");
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "AUTHENTICATION_FAILED");
        assert_eq!(json["error"]["message"], "Could not validate credentials");
        assert!(json["error"]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn rate_limited_returns_429_with_retry_after() {
        let response = ApiError::RateLimited {
            retry_after: 60,
            limit: 10,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "60");
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "RATE_LIMIT_EXCEEDED");
        assert_eq!(json["error"]["details"]["retry_after"], 60);
        assert_eq!(json["error"]["details"]["limit"], 10);
    }

    #[tokio::test]
    async fn invalid_transition_names_both_states() {
        let response = ApiError::InvalidTransition {
            from: "completed".into(),
            to: "pending".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "INVALID_STATUS_TRANSITION");
        assert_eq!(json["error"]["details"]["from"], "completed");
        assert_eq!(json["error"]["details"]["to"], "pending");
    }

    #[tokio::test]
    async fn internal_hides_detail_but_carries_error_id() {
        let response = ApiError::Internal("connection pool exploded".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "An unexpected error occurred");
        assert!(json["error"]["details"]["error_id"].is_string());
        let message = json["error"]["message"].as_str().unwrap();
        assert!(!message.contains("connection pool"));
    }

    #[tokio::test]
    async fn database_unique_violation_maps_to_conflict() {
        let api_err: ApiError = DatabaseError::UniqueViolation("users.username".into()).into();
        let response = api_err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "RESOURCE_ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn domain_transition_error_maps_through() {
        let api_err: ApiError = DomainError::InvalidTransition {
            from: "cancelled".into(),
            to: "confirmed".into(),
        }
        .into();
        let response = api_err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn storage_failure_maps_to_503() {
        let api_err: ApiError = StorageError::Timeout.into();
        let response = api_err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "EXTERNAL_SERVICE_ERROR");
    }

    #[tokio::test]
    async fn validation_returns_422() {
        let response = ApiError::Validation("email is malformed".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
