use serde::Serialize;

use crate::ingest::types::TradeRecord;

/// A trade with its outlier score attached. Higher scores are more normal;
/// negative scores fall inside the configured contamination share.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyRecord {
    #[serde(flatten)]
    pub trade: TradeRecord,
    pub anomaly_score: f64,
    pub is_anomaly: bool,
}

/// Batch-level view of the outlier scorer's output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnomalySummary {
    pub count: usize,
    pub percentage: f64,
    /// The most anomalous trades (lowest score first), at most five.
    pub top_anomalies: Vec<AnomalyRecord>,
}
