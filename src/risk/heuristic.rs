//! Weighted heuristic scorer standing in for the trained ensemble.
//!
//! Scores are a normalized weighted sum of the dominant degradation
//! drivers (load, temperature, age, vibration) with smaller corrections
//! from corrosion, harmonics and oil quality, capped below certainty.

use crate::error::GridError;

use super::{AssetFeatures, FailureKind, RiskAssessment, RiskModel, Severity};

/// Probability cap: the heuristic never claims a certain failure.
const RISK_CAP: f64 = 0.95;

/// Probability above which a failure kind is classified at all.
const CLASSIFY_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Default)]
pub struct HeuristicRiskModel;

impl HeuristicRiskModel {
    fn probability(features: &AssetFeatures) -> f64 {
        let base = 0.3 * (features.load_percent / 100.0)
            + 0.4 * (features.temperature_c / 100.0)
            + 0.2 * (features.age_years / 20.0)
            + 0.1 * features.vibration;

        let correction = 0.05 * features.corrosion + 0.02 * (features.harmonics / 10.0)
            - 0.05 * features.oil_quality;

        (base + correction).clamp(0.0, RISK_CAP)
    }

    fn classify(features: &AssetFeatures) -> FailureKind {
        if features.temperature_c > 90.0 {
            FailureKind::ThermalOverload
        } else if features.vibration > 1.0 {
            FailureKind::MechanicalFatigue
        } else if features.harmonics > 8.0 {
            FailureKind::ElectricalDisturbance
        } else {
            FailureKind::GeneralDegradation
        }
    }
}

impl RiskModel for HeuristicRiskModel {
    fn assess(&self, features: &AssetFeatures) -> Result<RiskAssessment, GridError> {
        let probability = Self::probability(features);
        let severity = Severity::from_probability(probability);
        let failure_kind =
            (probability > CLASSIFY_THRESHOLD).then(|| Self::classify(features));
        Ok(RiskAssessment {
            probability,
            severity,
            failure_kind,
            recommendation: severity.recommendation().to_string(),
        })
    }
}
