use axum::{
    Router,
    routing::{get, post},
    http::StatusCode,
    Json,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::controller::Controller;

use super::api;
use super::sse::sse_handler;

pub struct HttpServer {
    pub controller: Arc<Controller>,
}

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<Controller>,
}

impl HttpServer {
    pub fn new(controller: Arc<Controller>) -> Self {
        Self { controller }
    }

    pub async fn run(self, port: u16) -> std::io::Result<()> {
        let app = router(AppState {
            controller: Arc::clone(&self.controller),
        });

        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        info!("q8-mirror HTTP server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutting down HTTP server");
            })
            .await
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))

        // SSE endpoint for session lifecycle updates
        .route("/events", get(sse_handler))

        .route("/api/devices", get(api::list_devices))
        .route("/api/pair", post(api::pair))
        .route("/api/connect", post(api::connect))
        .route("/api/disconnect", post(api::disconnect))
        .route("/api/wireless", post(api::enable_wireless))
        .route(
            "/api/session",
            get(api::session_status)
                .post(api::start_session)
                .delete(api::stop_session),
        )

        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({
        "status": "healthy",
        "service": "q8-mirror",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
