//! HTTP surface.
//!
//! Routes:
//! - `GET /` - service banner
//! - `GET /healthz` - liveness
//! - `GET /metrics` - Prometheus exposition
//! - `POST /v1/chat/completions` - the pipeline, behind authentication and
//!   rate limiting (in that order)

pub mod error;
pub mod handler;
pub mod state;


pub use error::GatewayError;
pub use handler::chat_completions_handler;
#[cfg(any(test, feature = "mock"))]
pub use state::MockAppState;
pub use state::AppState;

use axum::{
    Json, Router,
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{KeyStore, require_api_key};
use crate::cache::ExactCacheBackend;
use crate::metrics;
use crate::ratelimit::enforce_rate_limit;
use crate::vectordb::VectorIndex;

/// Human-readable service name for the root banner.
pub const SERVICE_NAME: &str = "Switchboard LLM Gateway";

/// Builds the full router over a composition root.
pub fn create_router<C, V, K>(state: AppState<C, V, K>) -> Router
where
    C: ExactCacheBackend + 'static,
    V: VectorIndex + 'static,
    K: KeyStore + 'static,
{
    let completions = Router::new()
        .route(
            "/v1/chat/completions",
            post(chat_completions_handler::<C, V, K>),
        )
        // Layer order is outside-in: authentication first, then admission.
        .layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            enforce_rate_limit,
        ))
        .layer(middleware::from_fn_with_state(
            state.key_store.clone(),
            require_api_key::<K>,
        ))
        .with_state(state);

    Router::new()
        .route("/", get(root_handler))
        .route("/healthz", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(completions)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn root_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": format!("{SERVICE_NAME} is running") }))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn metrics_handler() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    )
        .into_response()
}
