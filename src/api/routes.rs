use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{make_span_with_request_id, request_id_middleware};

use super::handlers;
use super::AppState;

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes())
        .layer(
            // The request id is assigned before the trace span is created
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        // Personal rankings
        .route(
            "/users/:user_id/rankings",
            get(handlers::list_rankings).post(handlers::start_ranking),
        )
        .route(
            "/users/:user_id/rankings/:title_id",
            delete(handlers::delete_entry),
        )
        // Comparison session
        .route(
            "/users/:user_id/session",
            get(handlers::current_prompt).delete(handlers::cancel),
        )
        .route("/users/:user_id/session/answer", post(handlers::answer))
        .route("/users/:user_id/session/commit", post(handlers::commit))
        // Account removal
        .route("/users/:user_id", delete(handlers::delete_account))
        // Community aggregates
        .route("/titles/:title_id/aggregate", get(handlers::get_aggregate))
        .route(
            "/titles/:title_id/aggregate/recompute",
            post(handlers::recompute_aggregate),
        )
}
