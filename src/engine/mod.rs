//! # Episode Orchestrator
//!
//! One background task runs optimization episodes on a fixed interval:
//! apply telemetry, score line risk, sample a generator per substation,
//! route it, compute loss and reward, update the policy and publish the
//! result. The mutable core (topology, policy, telemetry source) is
//! owned behind a single `Mutex`, so scheduled and manually-triggered
//! cycles serialize and the episode counter advances by exactly one per
//! completed cycle. Readers only ever see cloned snapshots behind an
//! `RwLock`.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::domain::{EpisodeResult, HistoryPoint, Line, Node, NodeId, PathRecord};
use crate::grid::{shortest_path, Topology};
use crate::policy::{encode_state, reinforce_update, PolicyParams, SampledAction};
use crate::risk::{RiskModel, CONSERVATIVE_DEFAULT_RISK};
use crate::scada::TelemetrySource;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub engine: Arc<GridEngine>,
}

impl AppState {
    /// Build the initial topology, policy and telemetry source. A
    /// malformed or disconnected initial graph aborts startup here;
    /// this is the only fatal error in the system.
    pub fn new(cfg: Config) -> Result<Self> {
        let mut rng = match cfg.grid.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let topology =
            Topology::connected_random(cfg.grid.num_nodes, cfg.grid.num_generators, &mut rng)?;

        #[cfg(feature = "sim")]
        let scada: Box<dyn TelemetrySource> =
            Box::new(crate::scada::ScadaSimulator::new(cfg.grid.random_seed));
        #[cfg(not(feature = "sim"))]
        let scada: Box<dyn TelemetrySource> = Box::new(NullTelemetry);

        let oracle: Arc<dyn RiskModel> = Arc::new(crate::risk::HeuristicRiskModel);

        let engine = Arc::new(GridEngine::new(&cfg, topology, scada, oracle, rng));
        Ok(Self { cfg, engine })
    }
}

#[cfg(not(feature = "sim"))]
struct NullTelemetry;

#[cfg(not(feature = "sim"))]
impl TelemetrySource for NullTelemetry {
    fn sample(&mut self, _topology: &Topology) -> crate::scada::TelemetryFrame {
        crate::scada::TelemetryFrame::default()
    }
}

/// Spawn the background episode loop; cancel the returned token to stop
/// it cooperatively, then await the handle so an in-flight episode is
/// published before teardown (no mid-mutation termination).
pub fn spawn_engine_tasks(state: AppState, cfg: Config) -> (CancellationToken, JoinHandle<()>) {
    let cancel = CancellationToken::new();
    let engine = state.engine.clone();
    let token = cancel.clone();
    let handle = tokio::spawn(async move {
        engine.run(cfg.optimizer.interval_seconds, token).await;
    });
    (cancel, handle)
}

/// Serializable copy of the grid for readers, taken at publish time.
#[derive(Debug, Clone, Serialize)]
pub struct GridSnapshot {
    pub nodes: Vec<Node>,
    pub lines: Vec<Line>,
    pub metrics: GridMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridMetrics {
    pub total_demand_mw: f64,
    pub total_nodes: usize,
    pub total_lines: usize,
    /// Average risk over every line of the grid (not only used ones).
    pub average_risk: f64,
    pub generators: usize,
}

/// Loss/risk training metrics for readers.
#[derive(Debug, Clone, Serialize, Default)]
pub struct LossMetrics {
    pub history: Vec<f64>,
    pub risk_history: Vec<f64>,
    pub current_loss_percent: f64,
    pub current_avg_risk: f64,
    pub best_loss: Option<f64>,
    pub worst_loss: Option<f64>,
    pub episodes_trained: u64,
}

/// State exclusively mutated by episode execution.
struct EngineCore {
    topology: Topology,
    params: PolicyParams,
    scada: Box<dyn TelemetrySource>,
    oracle: Arc<dyn RiskModel>,
    rng: StdRng,
    /// Lines that have at least one successful oracle score; a failed
    /// call on an unscored line falls back to maximum caution.
    risk_known: HashSet<(NodeId, NodeId)>,
    episodes: u64,
}

/// State shared with readers, replaced wholesale at publish time.
#[derive(Default)]
struct Published {
    latest: Option<EpisodeResult>,
    grid: Option<GridSnapshot>,
    history: VecDeque<HistoryPoint>,
    best_loss: Option<f64>,
    worst_loss: Option<f64>,
}

pub struct GridEngine {
    core: Mutex<EngineCore>,
    published: RwLock<Published>,
    risk_weight: f64,
    risk_reward_weight: f64,
    learning_rate: f64,
    history_window: usize,
}

impl GridEngine {
    pub fn new(
        cfg: &Config,
        topology: Topology,
        scada: Box<dyn TelemetrySource>,
        oracle: Arc<dyn RiskModel>,
        rng: StdRng,
    ) -> Self {
        let params = PolicyParams::zeros(cfg.grid.num_generators);
        Self {
            core: Mutex::new(EngineCore {
                topology,
                params,
                scada,
                oracle,
                rng,
                risk_known: HashSet::new(),
                episodes: 0,
            }),
            published: RwLock::new(Published::default()),
            risk_weight: cfg.optimizer.risk_weight,
            risk_reward_weight: cfg.optimizer.risk_reward_weight,
            learning_rate: cfg.optimizer.learning_rate,
            history_window: cfg.optimizer.history_window.max(1),
        }
    }

    /// Background loop: one episode per tick until cancelled. Episode
    /// failures are logged and never stop the loop.
    pub async fn run(self: Arc<Self>, interval_seconds: u64, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
        info!(interval_seconds, "background optimization loop started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("background optimization loop stopped");
                    return;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.run_episode().await {
                        warn!(error = %e, "episode failed");
                    }
                }
            }
        }
    }

    /// Execute one full optimization cycle and publish its result.
    /// Serialized with every other cycle through the core lock; the
    /// publish happens under the same lock so results can never be
    /// observed out of episode order.
    pub async fn run_episode(&self) -> Result<EpisodeResult> {
        let mut core = self.core.lock().await;
        let result = self.execute_cycle(&mut core);
        let snapshot = Self::snapshot(&core.topology);

        {
            let mut published = self.published.write().await;
            published.history.push_back(HistoryPoint {
                loss_percent: result.loss_percent,
                avg_risk: result.avg_risk,
            });
            while published.history.len() > self.history_window {
                published.history.pop_front();
            }
            published.best_loss = Some(match published.best_loss {
                Some(best) => best.min(result.loss_percent),
                None => result.loss_percent,
            });
            published.worst_loss = Some(match published.worst_loss {
                Some(worst) => worst.max(result.loss_percent),
                None => result.loss_percent,
            });
            published.grid = Some(snapshot);
            published.latest = Some(result.clone());
        }

        debug!(
            episode = result.episode,
            loss_percent = result.loss_percent,
            avg_risk = result.avg_risk,
            reward = result.reward,
            "episode published"
        );
        Ok(result)
    }

    fn execute_cycle(&self, core: &mut EngineCore) -> EpisodeResult {
        // 1. Refresh telemetry; unknown-entity updates are dropped.
        let frame = core.scada.sample(&core.topology);
        let outcome = core.topology.apply_telemetry(&frame.nodes, &frame.lines);
        for rejected in &outcome.rejected {
            warn!(error = %rejected, "telemetry update dropped");
        }

        // 2. Score line risk through the oracle; failures keep the
        //    last-known value, or assume maximum caution if none exists.
        for (key, features) in &frame.asset_features {
            match core.oracle.assess(features) {
                Ok(assessment) => {
                    match core.topology.set_line_risk(key.0, key.1, assessment.probability) {
                        Ok(()) => {
                            core.risk_known.insert(*key);
                        }
                        Err(rejected) => warn!(error = %rejected, "risk score dropped"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, line = ?key, "risk oracle call failed");
                    if !core.risk_known.contains(key) {
                        if let Err(rejected) =
                            core.topology
                                .set_line_risk(key.0, key.1, CONSERVATIVE_DEFAULT_RISK)
                        {
                            warn!(error = %rejected, "risk fallback dropped");
                        }
                    }
                }
            }
        }

        // 3-5. Sample an assignment per substation, route it, aggregate.
        let generators: Vec<NodeId> = core.topology.generators().map(|g| g.id).collect();
        let substations: Vec<Node> = core.topology.substations().cloned().collect();

        let mut records = Vec::with_capacity(substations.len());
        let mut trained_actions: Vec<SampledAction> = Vec::new();
        let mut total_demand = 0.0;
        let mut resolved_demand = 0.0;
        let mut total_loss = 0.0;
        let mut used_risk = 0.0;
        let mut used_hops = 0usize;

        for substation in &substations {
            // Routing and loss work on the constant demand; the noisy
            // telemetry reading only feeds the state/statistics views.
            let demand_mw = substation.base_demand_mw;
            total_demand += demand_mw;
            let state = encode_state(&core.topology, substation, &generators, self.risk_weight);
            let sampled = core.params.sample(&state, &mut core.rng);
            let generator_id = generators[sampled.action];
            let generator_name = core
                .topology
                .node(generator_id)
                .map(|g| g.name.clone())
                .unwrap_or_default();

            match shortest_path(&core.topology, substation.id, generator_id, self.risk_weight) {
                Ok(routed) => {
                    let loss = routed.loss_mw(demand_mw);
                    resolved_demand += demand_mw;
                    total_loss += loss;
                    used_risk += routed.total_risk;
                    used_hops += routed.hops();
                    trained_actions.push(sampled);
                    records.push(PathRecord {
                        substation_id: substation.id,
                        substation_name: substation.name.clone(),
                        generator_id,
                        generator_name,
                        demand_mw,
                        path: Some(routed.nodes),
                        loss_mw: Some(loss),
                    });
                }
                Err(e) => {
                    warn!(
                        substation = %substation.name,
                        generator = %generator_name,
                        error = %e,
                        "substation unresolved this episode"
                    );
                    records.push(PathRecord {
                        substation_id: substation.id,
                        substation_name: substation.name.clone(),
                        generator_id,
                        generator_name,
                        demand_mw,
                        path: None,
                        loss_mw: None,
                    });
                }
            }
        }

        let loss_percent = if resolved_demand > 0.0 {
            100.0 * total_loss / resolved_demand
        } else {
            0.0
        };
        let avg_risk = if used_hops > 0 {
            used_risk / used_hops as f64
        } else {
            0.0
        };

        // 6. Reward and policy update, trained only on resolved routes.
        let reward = -(loss_percent + self.risk_reward_weight * avg_risk);
        core.params = reinforce_update(&core.params, &trained_actions, reward, self.learning_rate);

        // 7-8. Episode counter and result.
        core.episodes += 1;
        EpisodeResult {
            episode: core.episodes,
            paths: records,
            total_demand_mw: total_demand,
            total_loss_mw: total_loss,
            loss_percent,
            avg_risk,
            reward,
            timestamp: Utc::now(),
        }
    }

    fn snapshot(topology: &Topology) -> GridSnapshot {
        GridSnapshot {
            nodes: topology.nodes().to_vec(),
            lines: topology.lines().to_vec(),
            metrics: GridMetrics {
                total_demand_mw: topology.total_demand_mw(),
                total_nodes: topology.nodes().len(),
                total_lines: topology.lines().len(),
                average_risk: topology.average_risk(),
                generators: topology.generators().count(),
            },
        }
    }

    /// Latest published episode result, if any cycle has completed.
    pub async fn latest(&self) -> Option<EpisodeResult> {
        self.published.read().await.latest.clone()
    }

    /// Latest published grid snapshot.
    pub async fn grid_snapshot(&self) -> Option<GridSnapshot> {
        self.published.read().await.grid.clone()
    }

    pub async fn loss_metrics(&self) -> LossMetrics {
        let published = self.published.read().await;
        LossMetrics {
            history: published.history.iter().map(|p| p.loss_percent).collect(),
            risk_history: published.history.iter().map(|p| p.avg_risk).collect(),
            current_loss_percent: published
                .history
                .back()
                .map(|p| p.loss_percent)
                .unwrap_or(0.0),
            current_avg_risk: published.history.back().map(|p| p.avg_risk).unwrap_or(0.0),
            best_loss: published.best_loss,
            worst_loss: published.worst_loss,
            episodes_trained: published.latest.as_ref().map(|r| r.episode).unwrap_or(0),
        }
    }

    pub async fn episodes_trained(&self) -> u64 {
        self.core.lock().await.episodes
    }

    /// Current policy parameters (cloned), for inspection and tests.
    pub async fn policy_params(&self) -> PolicyParams {
        self.core.lock().await.params.clone()
    }
}
