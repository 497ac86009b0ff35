//! API router assembly.
//!
//! Four sub-routers with different auth gates are merged under `/api/v1`:
//! public (optional auth), authenticated, staff and admin. Catalog and
//! company-profile management share paths with public reads, so those
//! handlers check the admin role themselves behind the optional-auth layer.

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;

/// Build the full application router.
pub fn api_router(ctx: ApiContext) -> Router {
    // Public routes. The optional-auth layer resolves a caller when a
    // valid token is present so admins see inactive catalog entries.
    let public = Router::new()
        .route("/auth/register", post(endpoints::auth::register))
        .route("/auth/login", post(endpoints::auth::login))
        .route("/auth/refresh", post(endpoints::auth::refresh))
        .route(
            "/lab-tests",
            get(endpoints::lab_tests::list).post(endpoints::lab_tests::create),
        )
        .route(
            "/lab-tests/:id",
            get(endpoints::lab_tests::get)
                .put(endpoints::lab_tests::update)
                .delete(endpoints::lab_tests::delete),
        )
        .route(
            "/lab-tests/categories/list",
            get(endpoints::lab_tests::categories),
        )
        .route(
            "/company/info",
            get(endpoints::company::info).put(endpoints::company::update_info),
        )
        .route(
            "/company/contact",
            get(endpoints::company::contact_info).post(endpoints::company::submit_contact),
        )
        .route("/company/services", get(endpoints::company::services))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::optional_auth));

    // Any authenticated user.
    let authenticated = Router::new()
        .route("/auth/logout", post(endpoints::auth::logout))
        .route("/auth/me", get(endpoints::auth::me))
        .route("/auth/change-password", put(endpoints::auth::change_password))
        .route("/auth/verify-token", get(endpoints::auth::verify_token))
        .route("/lab-tests/:id/book", post(endpoints::lab_tests::book))
        .route("/bookings/my", get(endpoints::bookings::my))
        .route("/bookings/:id", get(endpoints::bookings::get))
        .route(
            "/bookings/reference/:reference",
            get(endpoints::bookings::get_by_reference),
        )
        .route("/bookings/:id/cancel", put(endpoints::bookings::cancel))
        .route(
            "/reports",
            get(endpoints::reports::list).post(endpoints::reports::create),
        )
        .route(
            "/reports/:id",
            get(endpoints::reports::get)
                .put(endpoints::reports::update)
                .delete(endpoints::reports::delete),
        )
        .route("/reports/:id/download", get(endpoints::reports::download))
        .route("/reports/:id/share", post(endpoints::reports::share))
        .route("/reports/stats/overview", get(endpoints::reports::stats))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::require_auth));

    // Lab technicians and admins.
    let staff = Router::new()
        .route("/reports/:id/upload", post(endpoints::reports::upload))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::require_staff))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth));

    // Admins only.
    let admin = Router::new()
        .route("/lab-tests/stats/overview", get(endpoints::lab_tests::stats))
        .route("/bookings", get(endpoints::bookings::list_all))
        .route("/bookings/:id/status", put(endpoints::bookings::update_status))
        .route("/bookings/:id/admin", put(endpoints::bookings::admin_update))
        .route(
            "/company/contact/messages",
            get(endpoints::company::list_messages),
        )
        .route(
            "/company/contact/messages/:id",
            get(endpoints::company::get_message)
                .put(endpoints::company::update_message)
                .delete(endpoints::company::delete_message),
        )
        .route("/company/contact/stats", get(endpoints::company::contact_stats))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::require_admin))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth));

    let api = public.merge(authenticated).merge(staff).merge(admin);

    let root = Router::new()
        .route("/", get(endpoints::health::root))
        .route("/health", get(endpoints::health::check))
        .with_state(ctx.clone());

    let cors = if ctx.config.cors_origins.is_empty() {
        CorsLayer::new()
    } else {
        let origins: Vec<HeaderValue> = ctx
            .config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Layers are applied bottom-to-top: Extension must be outermost so
    // every middleware can read ApiContext from request extensions.
    Router::new()
        .merge(root)
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(ctx.config.max_upload_bytes + 1024 * 1024))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::middleware::from_fn(middleware::envelope::stamp_context))
        .layer(axum::middleware::from_fn(middleware::request_log::log_requests))
        .layer(cors)
        .layer(axum::Extension(ctx))
}
