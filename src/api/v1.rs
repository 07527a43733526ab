use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;

use crate::{
    api::error::ApiError,
    domain::{EpisodeResult, Node, NodeId, NodeKind, PathRecord},
    engine::{AppState, GridMetrics, GridSnapshot, LossMetrics},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/health", get(health))
        .route("/grid/state", get(get_grid_state))
        .route("/grid/optimize", post(trigger_optimization))
        .route("/grid/paths", get(get_paths))
        .route("/grid/loss", get(get_loss_metrics))
        .route("/grid/risk", get(get_risk_analysis))
        .route("/grid/node/:id", get(get_node_details))
        .route("/grid/statistics", get(get_statistics))
        .route("/grid/status", get(get_status))
        .with_state(state)
}

pub async fn healthz() -> axum::http::StatusCode {
    axum::http::StatusCode::OK
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    grid_state: &'static str,
    episodes_trained: u64,
    timestamp: DateTime<Utc>,
}

pub async fn health(State(st): State<AppState>) -> Json<HealthResponse> {
    let ready = st.engine.latest().await.is_some();
    Json(HealthResponse {
        status: "healthy",
        grid_state: if ready { "initialized" } else { "initializing" },
        episodes_trained: st.engine.episodes_trained().await,
        timestamp: Utc::now(),
    })
}

#[derive(Debug, Serialize)]
pub struct GridStateResponse {
    pub episode: u64,
    pub nodes: Vec<Node>,
    pub edges: Vec<EdgeView>,
    pub metrics: GridMetrics,
    pub optimization: EpisodeResult,
    pub timestamp: DateTime<Utc>,
}

/// Line with resolved endpoint names, as consumed by the UI layer.
#[derive(Debug, Serialize)]
pub struct EdgeView {
    pub source: NodeId,
    pub source_name: String,
    pub target: NodeId,
    pub target_name: String,
    pub resistance_ohm: f64,
    pub current_a: f64,
    pub temperature_c: f64,
    pub power_flow_mw: f64,
    pub risk: f64,
}

fn edge_views(snapshot: &GridSnapshot) -> Vec<EdgeView> {
    let name = |id: NodeId| {
        snapshot
            .nodes
            .get(id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| format!("Node {id}"))
    };
    snapshot
        .lines
        .iter()
        .map(|line| EdgeView {
            source: line.a,
            source_name: name(line.a),
            target: line.b,
            target_name: name(line.b),
            resistance_ohm: line.resistance_ohm,
            current_a: line.current_a,
            temperature_c: line.temperature_c,
            power_flow_mw: line.power_flow_mw,
            risk: line.risk,
        })
        .collect()
}

pub async fn get_grid_state(
    State(st): State<AppState>,
) -> Result<Json<GridStateResponse>, ApiError> {
    let snapshot = st.engine.grid_snapshot().await.ok_or_else(ApiError::not_ready)?;
    let optimization = st.engine.latest().await.ok_or_else(ApiError::not_ready)?;
    Ok(Json(GridStateResponse {
        episode: optimization.episode,
        edges: edge_views(&snapshot),
        nodes: snapshot.nodes,
        metrics: snapshot.metrics,
        optimization,
        timestamp: Utc::now(),
    }))
}

#[derive(Debug, Serialize)]
pub struct OptimizeResponse {
    pub success: bool,
    pub episode_result: EpisodeResult,
    pub timestamp: DateTime<Utc>,
}

/// Run one optimization episode immediately. Serializes with the
/// scheduled background cycle through the engine's core lock.
pub async fn trigger_optimization(
    State(st): State<AppState>,
) -> Result<Json<OptimizeResponse>, ApiError> {
    let episode_result = st.engine.run_episode().await?;
    Ok(Json(OptimizeResponse {
        success: true,
        episode_result,
        timestamp: Utc::now(),
    }))
}

#[derive(Debug, Serialize)]
pub struct PathsResponse {
    pub paths: Vec<PathRecord>,
    pub loss_percent: f64,
    pub avg_risk: f64,
    pub total_demand_mw: f64,
    pub episode: u64,
    pub timestamp: DateTime<Utc>,
}

pub async fn get_paths(State(st): State<AppState>) -> Result<Json<PathsResponse>, ApiError> {
    let result = st.engine.latest().await.ok_or_else(ApiError::not_ready)?;
    Ok(Json(PathsResponse {
        paths: result.paths,
        loss_percent: result.loss_percent,
        avg_risk: result.avg_risk,
        total_demand_mw: result.total_demand_mw,
        episode: result.episode,
        timestamp: result.timestamp,
    }))
}

#[derive(Debug, Serialize)]
pub struct LossResponse {
    #[serde(flatten)]
    pub metrics: LossMetrics,
    pub timestamp: DateTime<Utc>,
}

pub async fn get_loss_metrics(State(st): State<AppState>) -> Json<LossResponse> {
    Json(LossResponse {
        metrics: st.engine.loss_metrics().await,
        timestamp: Utc::now(),
    })
}

#[derive(Debug, Serialize)]
pub struct NodeRisk {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub average_neighbor_risk: f64,
    pub max_neighbor_risk: f64,
    pub neighbors: usize,
}

#[derive(Debug, Serialize)]
pub struct RiskResponse {
    /// Nodes sorted by average neighboring risk, highest first.
    pub nodes: Vec<NodeRisk>,
    /// Lines sorted by risk, highest first.
    pub edges: Vec<EdgeView>,
    pub timestamp: DateTime<Utc>,
}

pub async fn get_risk_analysis(
    State(st): State<AppState>,
) -> Result<Json<RiskResponse>, ApiError> {
    let snapshot = st.engine.grid_snapshot().await.ok_or_else(ApiError::not_ready)?;

    let nodes = snapshot
        .nodes
        .iter()
        .map(|node| {
            let risks: Vec<f64> = snapshot
                .lines
                .iter()
                .filter(|l| l.connects(node.id))
                .map(|l| l.risk)
                .collect();
            let average = if risks.is_empty() {
                0.0
            } else {
                risks.iter().sum::<f64>() / risks.len() as f64
            };
            NodeRisk {
                id: node.id,
                name: node.name.clone(),
                kind: node.kind,
                average_neighbor_risk: average,
                max_neighbor_risk: risks.iter().cloned().fold(0.0, f64::max),
                neighbors: risks.len(),
            }
        })
        .sorted_by(|a, b| {
            b.average_neighbor_risk
                .total_cmp(&a.average_neighbor_risk)
        })
        .collect();

    let edges = edge_views(&snapshot)
        .into_iter()
        .sorted_by(|a, b| b.risk.total_cmp(&a.risk))
        .collect();

    Ok(Json(RiskResponse {
        nodes,
        edges,
        timestamp: Utc::now(),
    }))
}

#[derive(Debug, Serialize)]
pub struct NeighborDetail {
    pub node_id: NodeId,
    pub name: String,
    pub resistance_ohm: f64,
    pub current_a: f64,
    pub temperature_c: f64,
    pub risk: f64,
    pub power_flow_mw: f64,
}

#[derive(Debug, Serialize)]
pub struct NodeDetailResponse {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub demand_mw: f64,
    pub voltage_kv: f64,
    pub neighbors: usize,
    pub neighbor_details: Vec<NeighborDetail>,
    pub timestamp: DateTime<Utc>,
}

pub async fn get_node_details(
    State(st): State<AppState>,
    Path(id): Path<NodeId>,
) -> Result<Json<NodeDetailResponse>, ApiError> {
    let snapshot = st.engine.grid_snapshot().await.ok_or_else(ApiError::not_ready)?;
    let node = snapshot
        .nodes
        .get(id)
        .ok_or_else(|| ApiError::NotFound(format!("node {id}")))?;

    let neighbor_details: Vec<NeighborDetail> = snapshot
        .lines
        .iter()
        .filter_map(|line| {
            let other = line.other_end(id)?;
            Some(NeighborDetail {
                node_id: other,
                name: snapshot
                    .nodes
                    .get(other)
                    .map(|n| n.name.clone())
                    .unwrap_or_default(),
                resistance_ohm: line.resistance_ohm,
                current_a: line.current_a,
                temperature_c: line.temperature_c,
                risk: line.risk,
                power_flow_mw: line.power_flow_mw,
            })
        })
        .collect();

    Ok(Json(NodeDetailResponse {
        id: node.id,
        name: node.name.clone(),
        kind: node.kind,
        demand_mw: node.demand_mw,
        voltage_kv: node.voltage_kv,
        neighbors: neighbor_details.len(),
        neighbor_details,
        timestamp: Utc::now(),
    }))
}

#[derive(Debug, Serialize, Default)]
pub struct Stats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl Stats {
    fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            std: variance.sqrt(),
            min: samples.iter().cloned().fold(f64::INFINITY, f64::min),
            max: samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub voltage_kv: Stats,
    pub demand_mw: Stats,
    pub risk: Stats,
    pub temperature_c: Stats,
    pub current_a: Stats,
    pub power_flow_mw: Stats,
    pub high_risk_edges: usize,
    pub total_demand_mw: f64,
    pub episode: u64,
    pub timestamp: DateTime<Utc>,
}

pub async fn get_statistics(
    State(st): State<AppState>,
) -> Result<Json<StatisticsResponse>, ApiError> {
    let snapshot = st.engine.grid_snapshot().await.ok_or_else(ApiError::not_ready)?;
    let episode = st.engine.latest().await.map(|r| r.episode).unwrap_or(0);

    let voltages: Vec<f64> = snapshot.nodes.iter().map(|n| n.voltage_kv).collect();
    let demands: Vec<f64> = snapshot
        .nodes
        .iter()
        .filter(|n| n.is_substation())
        .map(|n| n.demand_mw)
        .collect();
    let risks: Vec<f64> = snapshot.lines.iter().map(|l| l.risk).collect();
    let temperatures: Vec<f64> = snapshot.lines.iter().map(|l| l.temperature_c).collect();
    let currents: Vec<f64> = snapshot.lines.iter().map(|l| l.current_a).collect();
    let flows: Vec<f64> = snapshot.lines.iter().map(|l| l.power_flow_mw).collect();

    Ok(Json(StatisticsResponse {
        voltage_kv: Stats::from_samples(&voltages),
        demand_mw: Stats::from_samples(&demands),
        risk: Stats::from_samples(&risks),
        temperature_c: Stats::from_samples(&temperatures),
        current_a: Stats::from_samples(&currents),
        power_flow_mw: Stats::from_samples(&flows),
        high_risk_edges: risks.iter().filter(|r| **r > 0.5).count(),
        total_demand_mw: snapshot.metrics.total_demand_mw,
        episode,
        timestamp: Utc::now(),
    }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub source: &'static str,
    pub is_active: bool,
    pub interval_seconds: u64,
    pub episodes_trained: u64,
    pub timestamp: DateTime<Utc>,
}

pub async fn get_status(State(st): State<AppState>) -> Json<StatusResponse> {
    let episodes = st.engine.episodes_trained().await;
    Json(StatusResponse {
        source: if cfg!(feature = "sim") {
            "scada simulator"
        } else {
            "external telemetry"
        },
        is_active: episodes > 0,
        interval_seconds: st.cfg.optimizer.interval_seconds,
        episodes_trained: episodes,
        timestamp: Utc::now(),
    })
}
