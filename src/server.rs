//! HTTP boundary for inbound readings.
//!
//! This is the adapter between external collaborators (message bridges,
//! mock sensors) and the engine:
//! - `POST /readings` submits one reading payload
//! - `GET /health` liveness probe
//! - `GET /stats` engine counter snapshot
//!
//! Malformed readings are answered with a 400 and a diagnostic; they never
//! reach engine state.

use crate::engine::{Engine, EngineStats, InboundPayload, IngestError};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Response for an admitted reading.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: String,
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub tracked_keys: usize,
}

/// Error response.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// GET /health
async fn health(State(engine): State<Arc<Engine>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tracked_keys: engine.tracked_keys(),
    })
}

/// GET /stats
async fn stats(State(engine): State<Arc<Engine>>) -> Json<EngineStats> {
    Json(engine.stats())
}

/// POST /readings
async fn ingest(
    State(engine): State<Arc<Engine>>,
    body: Bytes,
) -> Result<Json<IngestResponse>, (StatusCode, Json<ErrorResponse>)> {
    match engine.ingest(InboundPayload::Bytes(body.to_vec())).await {
        Ok(()) => Ok(Json(IngestResponse {
            status: "accepted".to_string(),
        })),
        Err(IngestError::Invalid(e)) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
                code: "INVALID_READING".to_string(),
            }),
        )),
        Err(e) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: e.to_string(),
                code: "STORE_ERROR".to_string(),
            }),
        )),
    }
}

/// Run the HTTP server. Returns the bound address and a shutdown handle.
pub async fn run(
    port: u16,
    engine: Arc<Engine>,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/readings", post(ingest))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(engine);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("ingest server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("ingest server shutdown signal received");
            })
            .await
        {
            tracing::error!("ingest server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
