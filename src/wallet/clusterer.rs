use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::WalletClusterConfig;
use crate::graph::cluster::{dbscan, NOISE};
use crate::ingest::types::TradeRecord;
use crate::stats;

use super::features::profile_wallets;

/// Cluster name → member wallets.
pub type WalletClusters = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, Serialize)]
pub struct WalletClusterSummary {
    pub count: usize,
    pub clusters: WalletClusters,
    pub total_wallets_in_clusters: usize,
}

impl WalletClusterSummary {
    pub fn from_clusters(clusters: WalletClusters) -> Self {
        Self {
            count: clusters.len(),
            total_wallets_in_clusters: clusters.values().map(Vec::len).sum(),
            clusters,
        }
    }
}

/// Groups wallets whose trading profiles sit close together once standardized.
pub struct WalletClusterer {
    config: WalletClusterConfig,
}

impl WalletClusterer {
    pub fn new(config: WalletClusterConfig) -> Self {
        Self { config }
    }

    /// Returns an empty mapping when the batch is too small or too few wallets qualify.
    pub fn detect(&self, trades: &[TradeRecord]) -> eyre::Result<WalletClusters> {
        if trades.len() < self.config.min_trades {
            tracing::debug!(trades = trades.len(), "Not enough trades for wallet clustering");
            return Ok(WalletClusters::new());
        }

        let profiles = profile_wallets(trades, self.config.min_trades_per_wallet);
        if profiles.len() < self.config.min_wallets {
            tracing::debug!(
                qualifying = profiles.len(),
                min = self.config.min_wallets,
                "Not enough active wallets for clustering"
            );
            return Ok(WalletClusters::new());
        }

        let vectors: Vec<Vec<f64>> = profiles.iter().map(|p| p.as_vector()).collect();
        if vectors.iter().flatten().any(|v| !v.is_finite()) {
            return Err(eyre::eyre!("wallet feature vectors contain non-finite values"));
        }
        let scaled = stats::standardize(&vectors);
        let labels = dbscan(&scaled, self.config.eps, self.config.min_samples);

        let mut clusters = WalletClusters::new();
        for (profile, label) in profiles.into_iter().zip(labels) {
            if label == NOISE {
                continue;
            }
            clusters
                .entry(format!("cluster_{}", label))
                .or_default()
                .push(profile.wallet);
        }

        tracing::debug!(
            clusters = clusters.len(),
            wallets = clusters.values().map(Vec::len).sum::<usize>(),
            "Wallet clustering complete"
        );
        Ok(clusters)
    }
}
