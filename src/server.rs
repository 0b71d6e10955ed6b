//! HTTP surface for the companion service.
//!
//! Any transport able to carry the four-operation contract would do; this
//! one binds it over HTTP/JSON so walkers and operators can reach the
//! companion with plain clients.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::OnceLock;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, EnvFilter};

use crate::companion::{Companion, ExportReport, StatsReport};
use crate::error::CompanionError;
use crate::types::VertexId;
use crate::walk::WalkId;

/// Default port the companion daemon binds.
pub const DEFAULT_PORT: u16 = 7199;

/// Runtime options used to boot the companion HTTP server.
#[derive(Clone, Debug)]
pub struct ServeOptions {
    /// Network interface to bind to.
    pub host: IpAddr,
    /// Listening port.
    pub port: u16,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
        }
    }
}

/// Errors that can occur while running the server.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Binding the TCP listener or serving connections failed.
    #[error("companion server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Starts the companion server and runs until ctrl-c.
pub async fn serve(companion: Companion, options: ServeOptions) -> Result<(), ServeError> {
    install_tracing_subscriber();

    let addr = SocketAddr::from((options.host, options.port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "companion listening");

    let app = router(companion);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Builds the companion router, for [`serve`] or for embedding under a
/// larger application.
pub fn router(companion: Companion) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/sources", post(register_handler))
        .route("/api/sources/:idx/avoid", post(avoid_handler))
        .route("/api/walks", post(walks_handler))
        .route("/api/export", post(export_handler))
        .with_state(companion)
        .layer(TraceLayer::new_for_http())
}

async fn health_handler(State(companion): State<Companion>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        sources_registered: companion.source_count().is_some(),
    })
}

async fn stats_handler(State(companion): State<Companion>) -> Json<StatsReport> {
    Json(companion.stats())
}

async fn register_handler(
    State(companion): State<Companion>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, AppError> {
    companion.register_sources(&payload.sources)?;
    Ok(Json(RegisterResponse {
        sources: payload.sources.len(),
    }))
}

async fn avoid_handler(
    State(companion): State<Companion>,
    Path(idx): Path<usize>,
    Json(payload): Json<AvoidRequest>,
) -> Result<StatusCode, AppError> {
    let sources = companion.source_count().ok_or(CompanionError::NotRegistered)?;
    if idx >= sources {
        return Err(CompanionError::SourceOutOfRange { index: idx, sources }.into());
    }
    companion.add_avoidance(idx, &payload.vertices);
    Ok(StatusCode::NO_CONTENT)
}

async fn walks_handler(
    State(companion): State<Companion>,
    Json(payload): Json<WalksRequest>,
) -> Result<Json<WalksResponse>, AppError> {
    let sources = companion.source_count().ok_or(CompanionError::NotRegistered)?;
    if payload.walks.len() != payload.vertices.len() {
        return Err(CompanionError::InvalidArgument(format!(
            "walk/vertex arrays must be index-aligned ({} walks, {} vertices)",
            payload.walks.len(),
            payload.vertices.len()
        ))
        .into());
    }
    if let Some(bad) = payload
        .walks
        .iter()
        .map(|walk| walk.source_index())
        .find(|&index| index >= sources)
    {
        return Err(CompanionError::SourceOutOfRange { index: bad, sources }.into());
    }
    let admitted = payload.walks.len();
    companion.process_batch(payload.walks, payload.vertices).await;
    Ok(Json(WalksResponse { admitted }))
}

async fn export_handler(
    State(companion): State<Companion>,
    Json(payload): Json<ExportRequest>,
) -> Result<Json<ExportReport>, AppError> {
    companion.source_count().ok_or(CompanionError::NotRegistered)?;
    let report = companion.export_top(&payload.path).await?;
    Ok(Json(report))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    sources_registered: bool,
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    sources: Vec<VertexId>,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    sources: usize,
}

#[derive(Debug, Deserialize)]
struct AvoidRequest {
    vertices: Vec<VertexId>,
}

#[derive(Debug, Deserialize)]
struct WalksRequest {
    walks: Vec<WalkId>,
    vertices: Vec<VertexId>,
}

#[derive(Debug, Serialize)]
struct WalksResponse {
    admitted: usize,
}

#[derive(Debug, Deserialize)]
struct ExportRequest {
    path: PathBuf,
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Companion(#[from] CompanionError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let AppError::Companion(err) = &self;
        let status = match err {
            CompanionError::AlreadyRegistered => StatusCode::CONFLICT,
            CompanionError::NotRegistered
            | CompanionError::SourceOutOfRange { .. }
            | CompanionError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            CompanionError::Io(_) | CompanionError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorPayload {
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    message: String,
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(err) => tracing::error!(?err, "failed to listen for shutdown signal"),
    }
}

fn install_tracing_subscriber() {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = fmt().with_env_filter(filter).try_init();
    });
}
