use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AlertThresholds;
use crate::pipeline::AnalysisReport;

use super::state::RollingHistory;

/// Flagged-market count at which price manipulation raises an alert.
const PRICE_MANIPULATION_MARKETS: usize = 10;

const HIGH_RISK_SCORE: f64 = 80.0;
const HIGH_ANOMALY_PERCENTAGE: f64 = 25.0;
const HIGH_VOLUME_SPIKE: f64 = 5.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HighRisk,
    HighAnomalies,
    ManyClusters,
    VolumeSpike,
    SuspiciousPatterns,
    PriceManipulation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

/// One triggered condition. Immutable once dispatched.
#[derive(Debug, Clone, Serialize)]
pub struct AlertEvent {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    pub timestamp: DateTime<Utc>,
}

/// The report fields alert rules look at.
#[derive(Debug, Clone, Default)]
pub struct AlertInputs {
    pub risk_score: f64,
    pub anomaly_percentage: f64,
    pub wallet_cluster_count: usize,
    pub suspicious_temporal: bool,
    pub flagged_markets: usize,
}

impl AlertInputs {
    pub fn from_report(report: &AnalysisReport) -> Self {
        Self {
            risk_score: report.risk_score,
            anomaly_percentage: report.anomalies.percentage,
            wallet_cluster_count: report.wallet_clusters.count,
            suspicious_temporal: report.suspicious_temporal(),
            flagged_markets: report.price_manipulation.suspicious_markets,
        }
    }
}

/// Evaluate every alert rule once against a threshold snapshot. `volume_history`
/// must already include this pass's volume.
pub fn evaluate(
    inputs: &AlertInputs,
    volume_history: &RollingHistory,
    thresholds: &AlertThresholds,
) -> Vec<AlertEvent> {
    let now = Utc::now();
    let mut alerts = Vec::new();
    let mut raise = |kind, severity, message: String, value: f64, threshold: f64| {
        alerts.push(AlertEvent {
            kind,
            severity,
            message,
            value,
            threshold,
            timestamp: now,
        });
    };

    if inputs.risk_score >= thresholds.risk_score {
        raise(
            AlertKind::HighRisk,
            if inputs.risk_score >= HIGH_RISK_SCORE { Severity::High } else { Severity::Medium },
            format!("High risk score detected: {:.1}", inputs.risk_score),
            inputs.risk_score,
            thresholds.risk_score,
        );
    }

    if inputs.anomaly_percentage >= thresholds.anomaly_percentage {
        raise(
            AlertKind::HighAnomalies,
            if inputs.anomaly_percentage >= HIGH_ANOMALY_PERCENTAGE {
                Severity::High
            } else {
                Severity::Medium
            },
            format!("High anomaly rate: {:.1}% of trades", inputs.anomaly_percentage),
            inputs.anomaly_percentage,
            thresholds.anomaly_percentage,
        );
    }

    let clusters = inputs.wallet_cluster_count as f64;
    if clusters >= thresholds.cluster_count {
        raise(
            AlertKind::ManyClusters,
            Severity::Medium,
            format!("Many wallet clusters detected: {}", inputs.wallet_cluster_count),
            clusters,
            thresholds.cluster_count,
        );
    }

    if let (Some(latest), Some(previous)) = (volume_history.latest(), volume_history.previous()) {
        if previous > 0.0 {
            let ratio = latest / previous;
            if ratio >= thresholds.volume_spike {
                raise(
                    AlertKind::VolumeSpike,
                    if ratio >= HIGH_VOLUME_SPIKE { Severity::High } else { Severity::Medium },
                    format!("Volume spike detected: {:.1}x increase", ratio),
                    ratio,
                    thresholds.volume_spike,
                );
            }
        }
    }

    if inputs.suspicious_temporal {
        raise(
            AlertKind::SuspiciousPatterns,
            Severity::Medium,
            "Suspicious temporal trading patterns detected".to_string(),
            1.0,
            1.0,
        );
    }

    if inputs.flagged_markets >= PRICE_MANIPULATION_MARKETS {
        raise(
            AlertKind::PriceManipulation,
            Severity::High,
            format!(
                "Price manipulation signals in {} markets",
                inputs.flagged_markets
            ),
            inputs.flagged_markets as f64,
            PRICE_MANIPULATION_MARKETS as f64,
        );
    }

    alerts
}
