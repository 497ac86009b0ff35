//! Bearer token authentication and role gates.
//!
//! `require_auth` resolves `Authorization: Bearer <jwt>` to a `CurrentUser`
//! in request extensions. `require_admin` / `require_staff` compose on top
//! and must be layered inside it. `optional_auth` resolves to no user
//! instead of failing, for endpoints that render differently for guests.
//!
//! Token verification failure, expiry, unknown subject and inactive user
//! all collapse to the same authentication-failed outcome.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CurrentUser};
use crate::auth::{self, TokenType};
use crate::db::repository;
use crate::models::User;

fn bearer_token(req: &Request<axum::body::Body>) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Resolve the bearer token to an active user.
fn resolve_user(ctx: &ApiContext, token: &str) -> Result<User, ApiError> {
    let claims = auth::verify_token(token, TokenType::Access, &ctx.config.auth)
        .map_err(|_| ApiError::Unauthorized)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Unauthorized)?;

    let conn = ctx.open_db()?;
    let user = repository::get_user(&conn, &user_id)?.ok_or(ApiError::Unauthorized)?;
    if !user.is_active {
        return Err(ApiError::Unauthorized);
    }
    Ok(user)
}

/// Require a valid access token for an active user.
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = bearer_token(&req).ok_or(ApiError::Unauthorized)?;
    let user = resolve_user(&ctx, &token)?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Admin gate. Must run inside `require_auth`.
pub async fn require_admin(req: Request<axum::body::Body>, next: Next) -> Response {
    match req.extensions().get::<CurrentUser>() {
        Some(current) if current.0.is_admin() => next.run(req).await,
        Some(_) => ApiError::Forbidden("Not enough permissions".into()).into_response(),
        None => ApiError::Unauthorized.into_response(),
    }
}

/// Lab-technician-or-admin gate. Must run inside `require_auth`.
pub async fn require_staff(req: Request<axum::body::Body>, next: Next) -> Response {
    match req.extensions().get::<CurrentUser>() {
        Some(current) if current.0.is_staff() => next.run(req).await,
        Some(_) => ApiError::Forbidden("Lab technician access required".into()).into_response(),
        None => ApiError::Unauthorized.into_response(),
    }
}

/// Resolve the caller when a valid token is present; otherwise continue
/// anonymously. Never fails the request.
pub async fn optional_auth(mut req: Request<axum::body::Body>, next: Next) -> Response {
    if let Some(ctx) = req.extensions().get::<ApiContext>().cloned() {
        if let Some(token) = bearer_token(&req) {
            if let Ok(user) = resolve_user(&ctx, &token) {
                req.extensions_mut().insert(CurrentUser(user));
            }
        }
    }
    next.run(req).await
}
