pub mod api;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod grid;
pub mod policy;
pub mod risk;
pub mod scada;
pub mod telemetry;
