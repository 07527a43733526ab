use anyhow::Result;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub grid: GridConfig,
    pub optimizer: OptimizerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

/// Startup-time topology parameters; never mutated at runtime.
#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    pub num_nodes: usize,
    pub num_generators: usize,
    /// Seed for topology construction and the SCADA simulator; unset
    /// means seeded from entropy.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptimizerConfig {
    /// Sensitivity of the path search to line risk (path cost =
    /// resistance + risk_weight × risk).
    pub risk_weight: f64,
    /// Weight of the average-risk penalty in the episode reward,
    /// separate from the path-cost risk weight.
    pub risk_reward_weight: f64,
    pub learning_rate: f64,
    /// Seconds between scheduled background episodes.
    pub interval_seconds: u64,
    /// Bounded loss/risk history window.
    pub history_window: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("GRID__").split("__"));
        Ok(figment.extract()?)
    }
}
