//! Formcraft HTTP API.
//!
//! A multi-tenant REST API for building, theming, publishing, and
//! collecting submissions through forms. Every authenticated request is
//! scoped to the tenant in the caller's token.

pub mod auth;
pub mod config;
pub mod error;
pub mod export_worker;
pub mod rate_limit;
pub mod response;
pub mod routes;
pub mod state;

pub use config::{Args, Command, ServerConfig};
pub use error::AppError;
pub use state::AppState;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health::routes())
        .merge(routes::auth::routes())
        .merge(routes::tenant::routes())
        .merge(routes::users::routes())
        .merge(routes::forms::routes())
        .merge(routes::themes::routes())
        .merge(routes::templates::routes())
        .merge(routes::tools::routes())
        .merge(routes::links::routes())
        .merge(routes::public::routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
