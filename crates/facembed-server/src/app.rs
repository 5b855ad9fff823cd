use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use facembed_core::AnalyzerFactory;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::handlers;

/// Shared router state: only the factory, never a live analyzer.
#[derive(Clone)]
pub struct AppState {
    pub analyzers: Arc<dyn AnalyzerFactory>,
}

impl AppState {
    pub fn new(analyzers: Arc<dyn AnalyzerFactory>) -> Self {
        Self { analyzers }
    }
}

/// Build the HTTP router with CORS, tracing and body-limit layers.
pub fn create_app(state: AppState, config: &Config) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/faceEmbeddingB64", post(handlers::face_embedding_b64))
        .route("/faceEmbeddingImg", post(handlers::face_embedding_img))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    tracing::debug!(origins = ?origins, "CORS origins configured");

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
