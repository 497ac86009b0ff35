//! Per-client rate limiting middleware.
//!
//! The key is the authenticated user id when a valid access token is
//! presented, the client IP otherwise. Every response carries
//! X-RateLimit-Limit / -Remaining / -Reset headers; 429 responses add a
//! Retry-After hint for the exceeded window.

use axum::extract::ConnectInfo;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;

use crate::api::error::ApiError;
use crate::api::rate_limit::{profile_for_path, RateDecision};
use crate::api::types::ApiContext;
use crate::auth::{self, TokenType};

fn bearer_token(req: &Request<axum::body::Body>) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn client_ip(req: &Request<axum::body::Body>) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = req.headers().get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return real_ip.to_string();
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate-limit key: authenticated user id if the token checks out, else IP.
fn rate_key(req: &Request<axum::body::Body>, ctx: &ApiContext) -> String {
    if let Some(token) = bearer_token(req) {
        if let Ok(claims) = auth::verify_token(token, TokenType::Access, &ctx.config.auth) {
            return format!("user:{}", claims.sub);
        }
    }
    format!("ip:{}", client_ip(req))
}

pub async fn limit(req: Request<axum::body::Body>, next: Next) -> Response {
    let ctx = match req.extensions().get::<ApiContext>().cloned() {
        Some(ctx) => ctx,
        None => return ApiError::Internal("missing API context".into()).into_response(),
    };

    if !ctx.config.rate_limiting_enabled {
        return next.run(req).await;
    }

    let key = rate_key(&req, &ctx);
    let profile = profile_for_path(req.uri().path());

    // MutexGuard must drop before the .await on next.run
    let decision: RateDecision = {
        let mut limiter = match ctx.rate_limiter.lock() {
            Ok(limiter) => limiter,
            Err(_) => {
                return ApiError::Internal("rate limiter lock".into()).into_response();
            }
        };
        limiter.check(&key, profile)
    };

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        ApiError::RateLimited {
            retry_after: decision.retry_after.unwrap_or(60),
            limit: decision.limit,
        }
        .into_response()
    };

    let reset = chrono::Utc::now().timestamp() + 60;
    let headers = response.headers_mut();
    if let Ok(val) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("X-RateLimit-Limit", val);
    }
    if let Ok(val) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", val);
    }
    if let Ok(val) = HeaderValue::from_str(&reset.to_string()) {
        headers.insert("X-RateLimit-Reset", val);
    }
    response
}
