//! # Equipment Failure Risk
//!
//! Narrow capability seam to the predictive-maintenance oracle. The
//! engine only depends on `RiskModel::assess` returning a failure
//! probability in [0, 1]; the concrete model family behind it (ensemble
//! classifiers, anomaly detectors, ...) is deliberately out of scope.

pub mod heuristic;

pub use heuristic::HeuristicRiskModel;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::GridError;

/// Risk assumed for a line whose very first oracle call already failed:
/// maximum caution.
pub const CONSERVATIVE_DEFAULT_RISK: f64 = 1.0;

/// Sensor feature vector for one transmission asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetFeatures {
    pub temperature_c: f64,
    /// Load as a percentage of rated capacity.
    pub load_percent: f64,
    /// Vibration in mm/s.
    pub vibration: f64,
    pub age_years: f64,
    /// Corrosion index in [0, 1].
    pub corrosion: f64,
    /// Harmonic distortion in percent.
    pub harmonics: f64,
    /// Oil quality in [0, 1], higher is better.
    pub oil_quality: f64,
    pub trip_count: u32,
    pub ambient_temp_c: f64,
    pub humidity_percent: f64,
}

/// Coarse classification of the predicted failure mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
pub enum FailureKind {
    #[strum(serialize = "Thermal Overload")]
    ThermalOverload,
    #[strum(serialize = "Mechanical Fatigue")]
    MechanicalFatigue,
    #[strum(serialize = "Electrical Disturbance")]
    ElectricalDisturbance,
    #[strum(serialize = "General Degradation")]
    GeneralDegradation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Display)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Severity bands over the failure probability: 0.2 / 0.4 / 0.7.
    pub fn from_probability(probability: f64) -> Self {
        if probability > 0.7 {
            Severity::Critical
        } else if probability > 0.4 {
            Severity::High
        } else if probability > 0.2 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            Severity::Critical => "Immediate action required",
            Severity::High => "Schedule maintenance within 7 days",
            Severity::Medium => "Monitor closely",
            Severity::Low => "Normal operation",
        }
    }
}

/// Result of one oracle call for one asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Failure probability in [0, 1].
    pub probability: f64,
    pub severity: Severity,
    /// Only classified once the probability is worth acting on (> 0.3).
    pub failure_kind: Option<FailureKind>,
    pub recommendation: String,
}

/// Capability interface to the failure-risk oracle. Calls must be fast
/// and bounded (sub-50ms); a failing call degrades to the line's
/// last-known risk, or `CONSERVATIVE_DEFAULT_RISK` if none exists.
pub trait RiskModel: Send + Sync {
    fn assess(&self, features: &AssetFeatures) -> Result<RiskAssessment, GridError>;
}
