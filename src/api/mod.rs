//! HTTP query surface.
//!
//! - `GET /api/activity` - filtered events, newest first
//! - `GET /api/stats` - aggregate counts
//! - `GET /api/agents` - agent directories (transcript mode only)
//! - `GET /api/tools` - distinct tool actions (transcript mode only)
//! - `GET /health`

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use color_eyre::eyre::{Result, WrapErr};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::store::{LiveHandle, TranscriptArchive};

/// Which event source the server answers from.
#[derive(Debug, Clone)]
pub enum AppState {
    /// The store owned by the live pipeline loop.
    Live(LiveHandle),
    /// A fresh transcript scan per request.
    Batch(Arc<TranscriptArchive>),
}

/// Create the router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/activity", get(handlers::activity))
        .route("/api/stats", get(handlers::stats))
        .route("/api/agents", get(handlers::agents))
        .route("/api/tools", get(handlers::tools))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(cors)
        .layer(middleware::from_fn(preflight))
}

/// Bind `port` on all interfaces. Called before anything else starts so a
/// taken port fails the process at startup.
pub async fn bind(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("Failed to bind port {port}"))
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "activity API listening");
    }
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .wrap_err("HTTP server failed")
}

async fn health_check() -> &'static str {
    "OK"
}

/// Answer every `OPTIONS` request with an empty 204, whatever the path.
async fn preflight(request: Request, next: Next) -> Response {
    if request.method() != Method::OPTIONS {
        return next.run(request).await;
    }
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "*"),
        ],
    )
        .into_response()
}
