use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, Method};
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::require_signature;
use crate::handler;
use crate::state::AppState;

/// Build the axum router with all Lapse endpoints.
///
/// Uploads and deletes pass through the signature gate; downloads, metadata
/// and health are open.
pub fn build_router(state: AppState) -> Router {
    let gated = Router::new()
        .route("/api/v1/upload", post(handler::upload))
        .route("/api/v1/file/:id", delete(handler::delete_file))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_signature));

    Router::new()
        .route("/health", get(handler::health))
        .route("/api/v1/download/:id", get(handler::download))
        .route("/api/v1/file/:id/metadata", get(handler::metadata))
        .merge(gated)
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::AUTHORIZATION,
            HeaderName::from_static("x-signature"),
            HeaderName::from_static("x-timestamp"),
        ])
}
