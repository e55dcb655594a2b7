//! Messages exchanged with subscribers.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::AlertThresholds;
use crate::pipeline::AnalysisReport;

use super::alerts::AlertEvent;
use super::state::{LatestStats, StatusSnapshot};

/// Commands a subscriber may send, tagged by `command`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ClientCommand {
    GetStatus,
    UpdateThresholds {
        #[serde(default)]
        thresholds: ThresholdUpdate,
    },
    ForceAnalysis,
}

/// Partial threshold overwrite. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ThresholdUpdate {
    pub risk_score: Option<f64>,
    pub anomaly_percentage: Option<f64>,
    pub cluster_count: Option<f64>,
    pub volume_spike: Option<f64>,
}

impl ThresholdUpdate {
    /// Merge onto `current`, rejecting the whole update if any value is invalid.
    pub fn apply(&self, current: &AlertThresholds) -> eyre::Result<AlertThresholds> {
        let merged = AlertThresholds {
            risk_score: self.risk_score.unwrap_or(current.risk_score),
            anomaly_percentage: self.anomaly_percentage.unwrap_or(current.anomaly_percentage),
            cluster_count: self.cluster_count.unwrap_or(current.cluster_count),
            volume_spike: self.volume_spike.unwrap_or(current.volume_spike),
        };
        merged.validate()?;
        Ok(merged)
    }
}

/// Outbound messages, tagged by `type`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    CurrentState {
        stats: Option<LatestStats>,
        thresholds: AlertThresholds,
    },
    Status(StatusSnapshot),
    AnalysisUpdate {
        analysis: Arc<AnalysisReport>,
        alerts: Vec<AlertEvent>,
    },
    ThresholdsUpdated {
        thresholds: AlertThresholds,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

pub fn parse_command(text: &str) -> eyre::Result<ClientCommand> {
    serde_json::from_str(text).map_err(|e| eyre::eyre!("Invalid command: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::state::MonitorPhase;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_command(r#"{"command":"get_status"}"#).unwrap(),
            ClientCommand::GetStatus
        );
        assert_eq!(
            parse_command(r#"{"command":"force_analysis"}"#).unwrap(),
            ClientCommand::ForceAnalysis
        );

        let cmd = parse_command(r#"{"command":"update_thresholds","thresholds":{"risk_score":70}}"#)
            .unwrap();
        let ClientCommand::UpdateThresholds { thresholds } = cmd else {
            panic!("expected update_thresholds");
        };
        assert_eq!(thresholds.risk_score, Some(70.0));
        assert_eq!(thresholds.volume_spike, None);
    }

    #[test]
    fn test_malformed_commands_are_errors() {
        assert!(parse_command("not json").is_err());
        assert!(parse_command(r#"{"command":"reboot"}"#).is_err());
        assert!(parse_command(r#"{"action":"get_status"}"#).is_err());
        assert!(
            parse_command(r#"{"command":"update_thresholds","thresholds":{"risk":1}}"#).is_err()
        );
    }

    #[test]
    fn test_threshold_merge() {
        let update = ThresholdUpdate {
            volume_spike: Some(3.0),
            ..ThresholdUpdate::default()
        };
        let merged = update.apply(&AlertThresholds::default()).unwrap();
        assert_eq!(merged.volume_spike, 3.0);
        assert_eq!(merged.risk_score, 50.0);

        let bad = ThresholdUpdate {
            risk_score: Some(-1.0),
            ..ThresholdUpdate::default()
        };
        assert!(bad.apply(&AlertThresholds::default()).is_err());
    }

    #[test]
    fn test_outbound_type_tags() {
        let json = serde_json::to_value(ServerMessage::error("boom")).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "boom");

        let json = serde_json::to_value(ServerMessage::ThresholdsUpdated {
            thresholds: AlertThresholds::default(),
        })
        .unwrap();
        assert_eq!(json["type"], "thresholds_updated");
        assert_eq!(json["thresholds"]["volume_spike"], 2.0);

        let status = StatusSnapshot {
            phase: MonitorPhase::Running,
            subscribers: 2,
            last_analysis: None,
            total_alerts: 7,
            consecutive_failures: 0,
            thresholds: AlertThresholds::default(),
            volume_history: vec![],
            risk_history: vec![],
        };
        let json = serde_json::to_value(ServerMessage::Status(status)).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["phase"], "running");
        assert_eq!(json["subscribers"], 2);
    }
}
