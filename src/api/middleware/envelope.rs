//! Stamps request context into error envelopes.
//!
//! Error bodies are produced by `ApiError::into_response` without access to
//! the request; this middleware fills in the `path` and, when the client
//! sent an `X-Request-ID` / `X-Correlation-ID` header, the `request_id`.

use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

const MAX_ERROR_BODY: usize = 256 * 1024;

fn request_id(req: &Request<Body>) -> Option<String> {
    req.headers()
        .get("X-Request-ID")
        .or_else(|| req.headers().get("X-Correlation-ID"))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub async fn stamp_context(req: Request<Body>, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let request_id = request_id(&req);

    let response = next.run(req).await;
    if !(response.status().is_client_error() || response.status().is_server_error()) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_ERROR_BODY).await {
        Ok(bytes) => bytes,
        Err(_) => return Response::from_parts(parts, Body::empty()),
    };

    if let Ok(mut value) = serde_json::from_slice::<serde_json::Value>(&bytes) {
        if let Some(error) = value.get_mut("error").and_then(|e| e.as_object_mut()) {
            error.insert("path".into(), serde_json::Value::String(path));
            if let Some(id) = request_id {
                error.insert("request_id".into(), serde_json::Value::String(id));
            }
            if let Ok(rewritten) = serde_json::to_vec(&value) {
                parts.headers.remove(axum::http::header::CONTENT_LENGTH);
                return Response::from_parts(parts, Body::from(rewritten));
            }
        }
    }

    Response::from_parts(parts, Body::from(bytes))
}
