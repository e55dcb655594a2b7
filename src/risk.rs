use chrono::{DateTime, Utc};
use serde::Serialize;

/// Score reported when no analysis has produced a real assessment yet.
pub const UNKNOWN_RISK: f64 = 0.5;

const ANOMALY_WEIGHT: f64 = 0.30;
const CLUSTER_WEIGHT: f64 = 0.25;
const TEMPORAL_WEIGHT: f64 = 0.20;
const PRICE_WEIGHT: f64 = 0.25;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RiskFactor {
    pub name: &'static str,
    /// Factor value on a 0–10 scale.
    pub value: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub score: f64,
    pub factors: Vec<RiskFactor>,
    pub timestamp: DateTime<Utc>,
}

impl RiskAssessment {
    pub fn unknown() -> Self {
        Self {
            score: UNKNOWN_RISK,
            factors: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

/// Detector outputs consumed by the aggregator. `None` marks a detector that
/// failed this pass; its factor is left out.
#[derive(Debug, Clone, Default)]
pub struct RiskInputs {
    pub anomaly_percentage: Option<f64>,
    pub wallet_cluster_count: Option<usize>,
    pub suspicious_temporal: Option<bool>,
    pub flagged_markets: Option<usize>,
}

/// Fuse detector outputs into one 0–100 score.
pub fn aggregate(inputs: &RiskInputs) -> RiskAssessment {
    let mut factors = Vec::with_capacity(4);

    if let Some(pct) = inputs.anomaly_percentage {
        factors.push(RiskFactor {
            name: "anomalies",
            value: (pct / 10.0).clamp(0.0, 10.0),
            weight: ANOMALY_WEIGHT,
        });
    }
    if let Some(count) = inputs.wallet_cluster_count {
        factors.push(RiskFactor {
            name: "wallet_clusters",
            value: (count as f64 * 2.0).min(10.0),
            weight: CLUSTER_WEIGHT,
        });
    }
    if let Some(suspicious) = inputs.suspicious_temporal {
        factors.push(RiskFactor {
            name: "temporal_patterns",
            value: if suspicious { 10.0 } else { 0.0 },
            weight: TEMPORAL_WEIGHT,
        });
    }
    if let Some(markets) = inputs.flagged_markets {
        factors.push(RiskFactor {
            name: "price_manipulation",
            value: (markets as f64 * 3.0).min(10.0),
            weight: PRICE_WEIGHT,
        });
    }

    let score = factors
        .iter()
        .map(|f| f.value * f.weight)
        .sum::<f64>()
        .clamp(0.0, 100.0);

    RiskAssessment {
        score,
        factors,
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_batch_scores_zero() {
        let assessment = aggregate(&RiskInputs {
            anomaly_percentage: Some(0.0),
            wallet_cluster_count: Some(0),
            suspicious_temporal: Some(false),
            flagged_markets: Some(0),
        });
        assert_eq!(assessment.score, 0.0);
        assert_eq!(assessment.factors.len(), 4);
    }

    #[test]
    fn test_weighted_sum_and_caps() {
        let assessment = aggregate(&RiskInputs {
            anomaly_percentage: Some(250.0), // capped at 10
            wallet_cluster_count: Some(2),   // 4
            suspicious_temporal: Some(true), // 10
            flagged_markets: Some(1),        // 3
        });
        // 10*0.30 + 4*0.25 + 10*0.20 + 3*0.25
        assert!((assessment.score - 6.75).abs() < 1e-9);
        assert_eq!(assessment.factors[0].value, 10.0);
    }

    #[test]
    fn test_failed_detector_is_omitted() {
        let assessment = aggregate(&RiskInputs {
            anomaly_percentage: None,
            wallet_cluster_count: Some(10),
            suspicious_temporal: None,
            flagged_markets: None,
        });
        assert_eq!(assessment.factors.len(), 1);
        assert_eq!(assessment.factors[0].name, "wallet_clusters");
        assert!((assessment.score - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_sentinel() {
        assert_eq!(RiskAssessment::unknown().score, UNKNOWN_RISK);
    }
}
