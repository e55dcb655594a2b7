use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use crate::anomaly::engine::{self, OutlierScorer};
use crate::anomaly::types::AnomalySummary;
use crate::config::Config;
use crate::ingest::source::MarketDirectory;
use crate::ingest::types::TradeBatch;
use crate::risk::{self, RiskFactor, RiskInputs};
use crate::signals::price::{PriceManipulationReport, PriceSignalDetector};
use crate::signals::temporal::{TemporalAnalyzer, TemporalReport};
use crate::sync::finder::SyncClusterFinder;
use crate::sync::types::{ClusterSummary, SyncCluster};
use crate::wallet::clusterer::{WalletClusterSummary, WalletClusterer};

/// Everything one analysis pass produced. Detectors that failed are listed in
/// `degraded` and contribute defaults here.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub timestamp: DateTime<Utc>,
    pub total_trades: usize,
    pub skipped_records: usize,
    pub total_volume: f64,
    pub clusters: Vec<SyncCluster>,
    pub cluster_summary: ClusterSummary,
    pub wallet_clusters: WalletClusterSummary,
    pub anomalies: AnomalySummary,
    pub temporal_patterns: Option<TemporalReport>,
    pub price_manipulation: PriceManipulationReport,
    pub risk_score: f64,
    pub risk_factors: Vec<RiskFactor>,
    pub degraded: Vec<&'static str>,
}

impl AnalysisReport {
    pub fn suspicious_temporal(&self) -> bool {
        self.temporal_patterns
            .as_ref()
            .map(|t| t.suspicious_pattern)
            .unwrap_or(false)
    }
}

/// Runs every detector over a batch and fuses the results. Detectors are pure
/// functions of the batch, so one pipeline serves every pass.
pub struct DetectionPipeline {
    pub markets: MarketDirectory,
    finder: SyncClusterFinder,
    scorer: OutlierScorer,
    wallet_clusterer: WalletClusterer,
    temporal: TemporalAnalyzer,
    price: PriceSignalDetector,
}

impl DetectionPipeline {
    /// Build the detectors and load market metadata if configured.
    pub fn init(config: &Config) -> Self {
        let markets = match &config.source.markets_path {
            Some(path) => match MarketDirectory::load(Path::new(path)) {
                Ok(dir) => dir,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to load market directory, continuing without");
                    MarketDirectory::default()
                }
            },
            None => MarketDirectory::default(),
        };
        Self::new(config, markets)
    }

    pub fn new(config: &Config, markets: MarketDirectory) -> Self {
        Self {
            markets,
            finder: SyncClusterFinder::new(&config.sync),
            scorer: OutlierScorer::new(config.anomaly.clone()),
            wallet_clusterer: WalletClusterer::new(config.wallet_clusters.clone()),
            temporal: TemporalAnalyzer::new(config.signals.temporal_cv),
            price: PriceSignalDetector::new(config.signals.clone()),
        }
    }

    /// Run one full pass. Never fails: a detector error is logged, recorded in
    /// `degraded`, and its risk factor is left out.
    pub fn analyze(&self, batch: &TradeBatch) -> AnalysisReport {
        let trades = &batch.trades;
        let mut degraded = Vec::new();

        // Step 1: Synchronization clusters
        let clusters = self.finder.find_clusters(trades, &self.markets);
        let cluster_summary = self.finder.summarize(&clusters);

        // Step 2: Trade outliers
        let anomalies = guarded("anomalies", &mut degraded, || self.scorer.detect(trades));
        let anomaly_summary = anomalies
            .as_ref()
            .map(|a| engine::summarize(a, trades.len()))
            .unwrap_or_default();

        // Step 3: Wallet relationship clusters
        let wallet_clusters =
            guarded("wallet_clusters", &mut degraded, || self.wallet_clusterer.detect(trades));

        // Step 4: Temporal patterns
        let temporal_patterns = self.temporal.analyze(trades);

        // Step 5: Price manipulation signals
        let price = guarded("price_manipulation", &mut degraded, || self.price.detect(trades));

        // Step 6: Risk aggregation
        let assessment = risk::aggregate(&RiskInputs {
            anomaly_percentage: anomalies.as_ref().map(|_| anomaly_summary.percentage),
            wallet_cluster_count: wallet_clusters.as_ref().map(|c| c.len()),
            suspicious_temporal: Some(
                temporal_patterns
                    .as_ref()
                    .map(|t| t.suspicious_pattern)
                    .unwrap_or(false),
            ),
            flagged_markets: price.as_ref().map(|p| p.suspicious_markets),
        });

        let report = AnalysisReport {
            timestamp: Utc::now(),
            total_trades: trades.len(),
            skipped_records: batch.skipped,
            total_volume: batch.total_volume(),
            clusters,
            cluster_summary,
            wallet_clusters: wallet_clusters
                .map(WalletClusterSummary::from_clusters)
                .unwrap_or_default(),
            anomalies: anomaly_summary,
            temporal_patterns,
            price_manipulation: price.unwrap_or_default(),
            risk_score: assessment.score,
            risk_factors: assessment.factors,
            degraded,
        };

        tracing::info!(
            trades = report.total_trades,
            sync_clusters = report.cluster_summary.total_clusters,
            anomalies = report.anomalies.count,
            wallet_clusters = report.wallet_clusters.count,
            suspicious_markets = report.price_manipulation.suspicious_markets,
            risk_score = report.risk_score,
            "Analysis pass complete"
        );

        report
    }
}

fn guarded<T>(
    name: &'static str,
    degraded: &mut Vec<&'static str>,
    run: impl FnOnce() -> eyre::Result<T>,
) -> Option<T> {
    match run() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(detector = name, error = %e, "Detector failed, omitting its contribution");
            degraded.push(name);
            None
        }
    }
}
