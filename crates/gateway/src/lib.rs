//! LabTrack API Gateway
//!
//! HTTP surface over the shared-schema directory and the per-center
//! sample registry. Handles:
//! - Tenant resolution from the request host
//! - Session authentication
//! - Request routing
//! - Observability (logging, metrics, request IDs)

pub mod handlers;
pub mod middleware;

use axum::{
    extract::FromRef,
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use labtrack_common::{config::AppConfig, db::DbPool};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Application state shared across handlers
#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let timeout = TimeoutLayer::new(state.config.request_timeout());

    let api_routes = Router::new()
        // Sample registry (tenant hosts only)
        .route(
            "/samples/",
            get(handlers::samples::list_samples).post(handlers::samples::create_sample),
        )
        .route("/samples/statistics/", get(handlers::samples::statistics))
        .route(
            "/samples/{id}/",
            get(handlers::samples::get_sample)
                .patch(handlers::samples::update_sample)
                .delete(handlers::samples::delete_sample),
        )
        .route("/samples/{id}/add_result/", post(handlers::samples::add_result))
        .route("/samples/{id}/update_status/", patch(handlers::samples::update_status))
        .route(
            "/sample-results/",
            get(handlers::sample_results::list_results).post(handlers::sample_results::create_result),
        )
        .route("/sample-results/{id}/", get(handlers::sample_results::get_result))

        // Tenant directory (any host)
        .route(
            "/centers/",
            get(handlers::centers::list_centers).post(handlers::centers::create_center),
        )
        .route("/centers/get_current_schema/", get(handlers::centers::get_current_schema))
        .route(
            "/centers/{id}/",
            get(handlers::centers::get_center).patch(handlers::centers::update_center),
        )
        .route("/centers/{id}/migrate_schema/", post(handlers::centers::migrate_schema))
        .route(
            "/domains/",
            get(handlers::domains::list_domains).post(handlers::domains::create_domain),
        )
        .route("/domains/{id}/", get(handlers::domains::get_domain))

        // Account directory (any host)
        .route(
            "/users/",
            get(handlers::users::list_users).post(handlers::users::register),
        )
        .route("/users/login/", post(handlers::users::login))
        .route("/users/logout/", post(handlers::users::logout))
        .route("/users/profile/", get(handlers::users::profile))
        .route("/users/center_users/", get(handlers::users::center_users))
        .route(
            "/users/{id}/",
            get(handlers::users::get_user).patch(handlers::users::update_user),
        );

    // Compose the app
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api", api_routes)
        .layer(axum_middleware::from_fn(middleware::metrics::track_requests))
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}
