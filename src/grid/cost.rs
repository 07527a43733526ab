use crate::domain::Line;

/// Documented default sensitivity of the path search to predicted
/// equipment failure risk.
pub const DEFAULT_RISK_WEIGHT: f64 = 10.0;

/// Combined search weight for a line:
/// `resistance + risk_weight × risk`, with risk clamped to [0, 1].
///
/// Pure. Never negative for non-negative resistance and risk weight;
/// larger `risk_weight` makes the search avoid risky lines even at the
/// cost of higher-resistance routes.
pub fn line_weight(line: &Line, risk_weight: f64) -> f64 {
    line.resistance_ohm + risk_weight * line.risk.clamp(0.0, 1.0)
}
