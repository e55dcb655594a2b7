use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::AlertThresholds;
use crate::pipeline::AnalysisReport;

use super::alerts::AlertEvent;

pub const VOLUME_HISTORY: usize = 10;
pub const RISK_HISTORY: usize = 5;

/// Fixed-capacity history; pushing onto a full buffer drops the oldest value.
#[derive(Debug, Clone)]
pub struct RollingHistory {
    capacity: usize,
    values: VecDeque<f64>,
}

impl RollingHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            values: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// The value recorded just before the latest one.
    pub fn previous(&self) -> Option<f64> {
        self.values.len().checked_sub(2).and_then(|i| self.values.get(i).copied())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }
}

impl FromIterator<f64> for RollingHistory {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let values: Vec<f64> = iter.into_iter().collect();
        let mut history = Self::new(values.len().max(VOLUME_HISTORY));
        for v in values {
            history.push(v);
        }
        history
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MonitorPhase {
    Idle,
    Running,
    Stopped,
}

/// Point-in-time view answered to `get_status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub phase: MonitorPhase,
    pub subscribers: usize,
    pub last_analysis: Option<DateTime<Utc>>,
    pub total_alerts: u64,
    pub consecutive_failures: u32,
    pub thresholds: AlertThresholds,
    pub volume_history: Vec<f64>,
    pub risk_history: Vec<f64>,
}

/// Headline numbers from the latest pass, sent to new subscribers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LatestStats {
    pub total_trades: usize,
    pub risk_score: f64,
    pub anomaly_count: usize,
    pub wallet_cluster_count: usize,
    pub sync_cluster_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl LatestStats {
    fn from_report(report: &AnalysisReport) -> Self {
        Self {
            total_trades: report.total_trades,
            risk_score: report.risk_score,
            anomaly_count: report.anomalies.count,
            wallet_cluster_count: report.wallet_clusters.count,
            sync_cluster_count: report.cluster_summary.total_clusters,
            timestamp: report.timestamp,
        }
    }
}

/// Read-only copy of the monitor published after every state change.
#[derive(Debug, Clone)]
pub struct MonitorView {
    pub status: StatusSnapshot,
    pub latest: Option<Arc<AnalysisReport>>,
    pub alerts: Vec<AlertEvent>,
}

/// All mutable monitor state. Owned by the driver loop alone.
#[derive(Debug)]
pub struct MonitorState {
    pub phase: MonitorPhase,
    pub thresholds: AlertThresholds,
    pub volume_history: RollingHistory,
    pub risk_history: RollingHistory,
    pub total_alerts: u64,
    pub consecutive_failures: u32,
    pub last_analysis: Option<DateTime<Utc>>,
    pub latest: Option<Arc<AnalysisReport>>,
    recent_alerts: VecDeque<AlertEvent>,
    alert_capacity: usize,
}

impl MonitorState {
    pub fn new(thresholds: AlertThresholds, alert_capacity: usize) -> Self {
        Self {
            phase: MonitorPhase::Idle,
            thresholds,
            volume_history: RollingHistory::new(VOLUME_HISTORY),
            risk_history: RollingHistory::new(RISK_HISTORY),
            total_alerts: 0,
            consecutive_failures: 0,
            last_analysis: None,
            latest: None,
            recent_alerts: VecDeque::new(),
            alert_capacity: alert_capacity.max(1),
        }
    }

    /// Fold a finished pass into the rolling histories.
    pub fn record_pass(&mut self, report: Arc<AnalysisReport>) {
        self.volume_history.push(report.total_volume);
        self.risk_history.push(report.risk_score);
        self.last_analysis = Some(report.timestamp);
        self.consecutive_failures = 0;
        self.latest = Some(report);
    }

    pub fn record_alerts(&mut self, alerts: &[AlertEvent]) {
        self.total_alerts += alerts.len() as u64;
        for alert in alerts {
            if self.recent_alerts.len() == self.alert_capacity {
                self.recent_alerts.pop_front();
            }
            self.recent_alerts.push_back(alert.clone());
        }
    }

    /// Newest first.
    pub fn recent_alerts(&self) -> Vec<AlertEvent> {
        self.recent_alerts.iter().rev().cloned().collect()
    }

    pub fn latest_stats(&self) -> Option<LatestStats> {
        self.latest.as_deref().map(LatestStats::from_report)
    }

    pub fn status(&self, subscribers: usize) -> StatusSnapshot {
        StatusSnapshot {
            phase: self.phase,
            subscribers,
            last_analysis: self.last_analysis,
            total_alerts: self.total_alerts,
            consecutive_failures: self.consecutive_failures,
            thresholds: self.thresholds.clone(),
            volume_history: self.volume_history.to_vec(),
            risk_history: self.risk_history.to_vec(),
        }
    }

    pub fn view(&self, subscribers: usize) -> MonitorView {
        MonitorView {
            status: self.status(subscribers),
            latest: self.latest.clone(),
            alerts: self.recent_alerts(),
        }
    }
}
