//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use switchboard_core::{SwitchboardConfig, SwitchboardError};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // CORS: the console front end is served from localhost on the API port
    // or the port after it.
    let port = state.config.general.port;
    let dev_port = port.saturating_add(1);
    let origins: Vec<HeaderValue> = [port, dev_port]
        .iter()
        .flat_map(|p| {
            [
                format!("http://127.0.0.1:{}", p),
                format!("http://localhost:{}", p),
            ]
        })
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/router/classify", post(handlers::classify))
        .route("/charts/render", post(handlers::render_chart))
        .route("/chat", post(handlers::chat))
        .route("/chat/transcript", get(handlers::transcript))
        .route("/chat/sources", get(handlers::sources))
        .route("/commands", get(handlers::commands))
        .layer(CompressionLayer::new());

    // SSE stream is kept out of compression so events flush immediately.
    let stream_routes = Router::new().route("/stream", get(handlers::stream));

    api_routes
        .merge(stream_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB global limit
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured port, bound to localhost.
pub async fn start_server(
    config: &SwitchboardConfig,
    state: AppState,
) -> Result<(), SwitchboardError> {
    let addr = format!("127.0.0.1:{}", config.general.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SwitchboardError::Api(format!("Failed to bind: {}", e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| SwitchboardError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
