//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression, the body
//! limit, every endpoint handler and the optional frontend fallback.

use std::future::Future;
use std::path::Path;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use zmai_core::config::{expand_home, ZmaiConfig};
use zmai_core::error::ZmaiError;

use crate::handlers;
use crate::state::AppState;

/// Largest accepted request body.
const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/conversations",
            get(handlers::list_conversations).post(handlers::create_conversation),
        )
        .route(
            "/conversation/{id}",
            get(handlers::get_conversation).delete(handlers::delete_conversation),
        )
        .route("/conversation/{id}/rename", post(handlers::rename_conversation))
        .route("/conversation/{id}/color", post(handlers::set_color))
        .route("/conversation/{id}/toggle_search", post(handlers::toggle_search))
        .route("/websearch", get(handlers::websearch))
        .route("/chat", post(handlers::chat));

    if let Some(dir) = state.config.server.frontend_dir.as_deref() {
        let dir = expand_home(dir);
        if dir.is_dir() {
            tracing::info!(path = %dir.display(), "Serving frontend");
            router = router.fallback_service(frontend_service(&dir));
        } else {
            tracing::warn!(path = %dir.display(), "Frontend directory not found, not serving it");
        }
    }

    router
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Static files from `dir`, with `index.html` for every unknown path.
fn frontend_service(dir: &Path) -> ServeDir<ServeFile> {
    ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")))
}

/// CORS for the configured origins. An empty list allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}

/// Serve the API on `general.host:general.port` until `shutdown` resolves.
pub async fn start_server<F>(
    config: &ZmaiConfig,
    state: AppState,
    shutdown: F,
) -> Result<(), ZmaiError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", config.general.host, config.general.port);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ZmaiError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("Starting API server on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ZmaiError::Api(format!("Server error: {}", e)))?;

    tracing::info!("API server stopped");
    Ok(())
}

