//! HTTP API route definitions.

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    aggregated_book, arbitrage, dashboard, health, liquidity, slippage, venue_books,
    AppState,
};
use crate::venue::BookSource;

/// Create the API router.
pub fn create_router<S: BookSource + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/book/:symbol", get(aggregated_book::<S>))
        .route("/api/v1/book/:symbol/venues", get(venue_books::<S>))
        .route("/api/v1/slippage/:symbol", get(slippage::<S>))
        .route("/api/v1/liquidity/:symbol", get(liquidity::<S>))
        .route("/api/v1/arbitrage", get(arbitrage::<S>))
        .route("/api/v1/dashboard/:symbol", get(dashboard::<S>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
