use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    config::Config,
    error::InterventionError,
    intervention::Intervention,
    sensor::Measurement,
    simulator::{SimulationReport, Simulator},
    snapshot::{to_points, GridSnapshot},
};

/// Errors surfaced by HTTP handlers as `{error, status}` JSON.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body is not a usable intervention.
    #[error(transparent)]
    Intervention(#[from] InterventionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Intervention(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub name: String,
    pub resolution: usize,
    pub points: usize,
    pub regions: usize,
    pub last_updated: DateTime<Utc>,
    pub measurements_blended: usize,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub last_updated: DateTime<Utc>,
    pub measurements_blended: usize,
    pub points: usize,
    pub total_intensity: f64,
}

/// Raw station readings, as fetched and before blending.
#[derive(Debug, Serialize)]
pub struct StationsResponse {
    pub stations: Vec<Measurement>,
    pub count: usize,
}

pub fn build_router(state: Arc<Simulator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/baseline", get(baseline))
        .route("/api/simulate", post(simulate))
        .route("/api/refresh", post(refresh))
        .route("/api/stations", get(stations))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let simulator = Simulator::from_config(config);
    if simulator.cache().has_measurement_source() {
        simulator.refresh().await;
    }
    let router = build_router(Arc::new(simulator));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "emissions API listening (Ctrl+C to stop)");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down emissions API");
}

async fn health(State(sim): State<Arc<Simulator>>) -> Json<HealthResponse> {
    let baseline = sim.cache().get();
    Json(HealthResponse {
        status: "ok",
        name: sim.config().name.clone(),
        resolution: baseline.grid.resolution(),
        points: to_points(&baseline.grid, sim.regions()).len(),
        regions: sim.regions().regions().len(),
        last_updated: baseline.built_at,
        measurements_blended: baseline.measurements_blended,
    })
}

async fn baseline(State(sim): State<Arc<Simulator>>) -> Json<GridSnapshot> {
    Json(sim.baseline_snapshot().await)
}

async fn simulate(
    State(sim): State<Arc<Simulator>>,
    body: String,
) -> Result<Json<SimulationReport>, ApiError> {
    let intervention = Intervention::from_json(&body)?;
    Ok(Json(sim.simulate(intervention).await))
}

async fn refresh(State(sim): State<Arc<Simulator>>) -> Json<RefreshResponse> {
    let baseline = sim.refresh().await;
    let snapshot = GridSnapshot::capture(&baseline.grid, sim.regions(), baseline.built_at);
    Json(RefreshResponse {
        last_updated: baseline.built_at,
        measurements_blended: baseline.measurements_blended,
        points: snapshot.points.len(),
        total_intensity: snapshot.total(),
    })
}

async fn stations(State(sim): State<Arc<Simulator>>) -> Json<StationsResponse> {
    let stations = sim.stations().await;
    Json(StationsResponse {
        count: stations.len(),
        stations,
    })
}
