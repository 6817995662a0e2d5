//! REST router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. Rate limiter → 2. Auth validator → 3. Audit logger
//!
//! Public routes only get the rate limiter. CORS is open to any origin.

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router with a fresh `ApiContext`.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

/// Build router from a pre-constructed `ApiContext`, e.g. one with
/// custom rate limits.
pub fn api_router_with_ctx(ctx: ApiContext) -> Router {
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension (outermost) → Rate limit → Auth → Audit (innermost) → Handler
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/auth/logout", post(endpoints::auth::logout))
        .route("/doctor/dashboard", get(endpoints::doctors::dashboard))
        .route("/doctor/schedule", put(endpoints::doctors::update_schedule))
        .route("/doctor/profile", put(endpoints::doctors::update_profile))
        .route(
            "/patient/profile",
            get(endpoints::patients::profile).put(endpoints::patients::update_profile),
        )
        .route(
            "/patient/select-doctor",
            put(endpoints::patients::select_doctor),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    let public = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/signup", post(endpoints::auth::signup))
        .route("/auth/login", post(endpoints::auth::login))
        .route("/auth/request-otp", post(endpoints::auth::request_otp))
        .route("/auth/verify-otp", post(endpoints::auth::verify_otp))
        .route("/doctor/signup", post(endpoints::doctors::signup))
        .route("/patient/signup", post(endpoints::patients::signup))
        .route("/doctors/list", get(endpoints::doctors::list))
        .route(
            "/doctor/profile/:doctor_id",
            get(endpoints::doctors::public_profile),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx));

    Router::new()
        .nest("/api", protected)
        .nest("/api", public)
        .layer(CorsLayer::permissive())
}
