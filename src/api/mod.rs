//! HTTP API module exposing the engine's query boundary.

pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;
