use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::AppState;
use crate::middleware::{make_span_with_request_id, request_id_middleware};

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Routes under /api
fn api_routes() -> Router<AppState> {
    Router::new()
        // Recommendation loop
        .route("/recommend", post(handlers::recommend))
        .route("/feedback", post(handlers::submit_feedback))
        .route("/hyperparams", get(handlers::get_hyperparams))
        // Closet
        .route(
            "/closet",
            get(handlers::list_closet).post(handlers::create_closet_item),
        )
        .route(
            "/closet/:id",
            get(handlers::get_closet_item).delete(handlers::delete_closet_item),
        )
        .route("/closet/:id/image", post(handlers::upload_item_image))
}
