use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use super::types::{ClusterSummary, SyncCluster};

#[derive(Debug, Serialize)]
struct ClusterReport<'a> {
    summary: &'a ClusterSummary,
    clusters: &'a [SyncCluster],
    analysis_timestamp: DateTime<Utc>,
}

/// Write the cluster summary and cluster list as pretty JSON, creating parent
/// directories as needed.
pub fn save_report(
    path: &Path,
    summary: &ClusterSummary,
    clusters: &[SyncCluster],
    at: DateTime<Utc>,
) -> eyre::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                eyre::eyre!("Failed to create report directory '{}': {}", parent.display(), e)
            })?;
        }
    }

    let report = ClusterReport {
        summary,
        clusters,
        analysis_timestamp: at,
    };
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(path, json)
        .map_err(|e| eyre::eyre!("Failed to write cluster report '{}': {}", path.display(), e))?;

    tracing::debug!(path = %path.display(), clusters = clusters.len(), "Cluster report saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_report_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("clusters.json");

        save_report(&path, &ClusterSummary::default(), &[], Utc::now()).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["summary"]["total_clusters"], 0);
        assert!(written["clusters"].as_array().unwrap().is_empty());
    }
}
