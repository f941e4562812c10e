//! HTTP API server

use axum::{http::HeaderValue, routing::get, Router};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Settings;

pub mod handlers;
pub mod state;

pub use state::AppState;

/// Build the API router using the provided application state
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(state.settings());

    Router::new()
        .route("/", get(handlers::hello))
        .route("/userid", get(handlers::user_id))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Allow the configured frontend origin with credentials.
///
/// Requests from any other origin get no `Access-Control-Allow-Origin`.
///
/// Methods and headers mirror the preflight request, which permits all of
/// them while staying compatible with `allow_credentials(true)`.
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origin = match HeaderValue::from_str(&settings.frontend_url) {
        // A wildcard cannot be combined with credentials
        Ok(origin) if origin != "*" => AllowOrigin::list([origin]),
        _ => {
            tracing::warn!(
                origin = %settings.frontend_url,
                "CORS: invalid origin, denying all cross-origin requests"
            );
            AllowOrigin::exact(HeaderValue::from_static("null"))
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
