use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::monitor::alerts::{AlertEvent, AlertKind, Severity};
use crate::monitor::state::MonitorPhase;
use crate::pipeline::AnalysisReport;

// ============================================================
// Query params
// ============================================================

#[derive(Debug, Deserialize)]
pub struct AlertParams {
    #[serde(rename = "type")]
    pub kind: Option<AlertKind>,
    pub severity: Option<Severity>,
    pub limit: Option<usize>,
}

// ============================================================
// Responses
// ============================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub phase: MonitorPhase,
    pub last_analysis: Option<DateTime<Utc>>,
}

/// Latest report, or a placeholder carrying the "unknown" risk score while no
/// pass has completed.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AnalysisResponse {
    Ready(Arc<AnalysisReport>),
    Pending {
        status: &'static str,
        risk_score: f64,
    },
}

#[derive(Debug, Serialize)]
pub struct AlertsResponse {
    pub total_alerts: u64,
    pub alerts: Vec<AlertEvent>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
