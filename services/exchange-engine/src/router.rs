use crate::handlers::{health, orders};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/orders", post(orders::create_order))
        .route(
            "/orders/:id",
            get(orders::get_order).delete(orders::cancel_order),
        )
        .route("/failed_orders", get(orders::failed_orders))
        .route("/metrics", get(health::metrics));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
