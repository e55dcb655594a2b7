use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::SyncConfig;
use crate::ingest::source::MarketDirectory;
use crate::ingest::types::{Side, TradeRecord};

use super::types::{ClusterSummary, MarketClusterCount, SyncCluster, WalletStat};

/// Finds bursts of trades on the same market and side whose neighbours in time
/// order sit within `threshold_secs` of each other.
pub struct SyncClusterFinder {
    threshold_secs: i64,
    volume_norm: f64,
    top_markets: usize,
}

impl SyncClusterFinder {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            threshold_secs: config.threshold_secs.max(1),
            volume_norm: config.volume_norm,
            top_markets: config.top_markets,
        }
    }

    pub fn threshold_secs(&self) -> i64 {
        self.threshold_secs
    }

    /// Find every sync cluster in the batch, highest sync score first.
    pub fn find_clusters(
        &self,
        trades: &[TradeRecord],
        markets: &MarketDirectory,
    ) -> Vec<SyncCluster> {
        let groups = group_by_market_and_side(trades);
        tracing::debug!(groups = groups.len(), "Grouped trades by market and side");

        let mut clusters: Vec<SyncCluster> = groups
            .into_iter()
            .flat_map(|((market_id, side), group)| {
                let name = markets.display_name(market_id);
                self.sweep(group)
                    .into_iter()
                    .map(|members| self.describe(market_id, &name, side, members))
                    .collect::<Vec<_>>()
            })
            .collect();

        clusters.sort_by(|a, b| {
            b.sync_score
                .total_cmp(&a.sync_score)
                .then_with(|| a.market_id.cmp(&b.market_id))
                .then_with(|| a.side.cmp(&b.side))
                .then_with(|| a.start_time.cmp(&b.start_time))
        });

        tracing::debug!(clusters = clusters.len(), "Sync cluster search complete");
        clusters
    }

    /// Greedy sweep over one group. Each trade is compared with the last trade
    /// already in the open cluster, not with the cluster's first trade.
    fn sweep<'a>(&self, mut group: Vec<&'a TradeRecord>) -> Vec<Vec<&'a TradeRecord>> {
        if group.len() < 2 {
            return Vec::new();
        }

        group.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.wallet.cmp(&b.wallet))
                .then_with(|| a.size.total_cmp(&b.size))
                .then_with(|| a.price.total_cmp(&b.price))
        });

        let mut clusters = Vec::new();
        let mut current: Vec<&TradeRecord> = vec![group[0]];

        for &trade in &group[1..] {
            let last_ts = current[current.len() - 1].timestamp;
            if trade.timestamp - last_ts <= self.threshold_secs {
                current.push(trade);
            } else {
                if current.len() > 1 {
                    clusters.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
                current.push(trade);
            }
        }

        if current.len() > 1 {
            clusters.push(current);
        }

        clusters
    }

    fn describe(
        &self,
        market_id: &str,
        market_name: &str,
        side: Side,
        members: Vec<&TradeRecord>,
    ) -> SyncCluster {
        let trades_count = members.len();
        let total_volume: f64 = members.iter().map(|t| t.size).sum();
        let start_time = members.iter().map(|t| t.timestamp).min().unwrap_or_default();
        let end_time = members.iter().map(|t| t.timestamp).max().unwrap_or_default();
        let time_window_secs = end_time - start_time;

        let mut wallet_stats: BTreeMap<String, WalletStat> = BTreeMap::new();
        for trade in &members {
            let stat = wallet_stats
                .entry(trade.wallet.clone())
                .or_insert_with(|| WalletStat {
                    trades_count: 0,
                    total_amount: 0.0,
                    last_price: trade.price,
                });
            stat.trades_count += 1;
            stat.total_amount += trade.size;
            stat.last_price = trade.price;
        }
        let wallets: Vec<String> = wallet_stats.keys().cloned().collect();

        let sync_score = self.sync_score(time_window_secs, total_volume, wallets.len(), trades_count);

        SyncCluster {
            market_id: market_id.to_string(),
            market_name: market_name.to_string(),
            side,
            trades: members.into_iter().cloned().collect(),
            wallets,
            wallet_stats,
            trades_count,
            total_volume,
            avg_trade_size: total_volume / trades_count as f64,
            start_time,
            end_time,
            time_window_secs,
            time_window_label: format_window(time_window_secs),
            sync_score,
        }
    }

    /// Composite 0–100 score: half time tightness, 30% volume, 20% wallet diversity.
    pub fn sync_score(
        &self,
        time_window_secs: i64,
        total_volume: f64,
        distinct_wallets: usize,
        member_count: usize,
    ) -> f64 {
        if member_count < 2 {
            return 0.0;
        }
        let time_factor = 1.0 - time_window_secs as f64 / self.threshold_secs as f64;
        let volume_factor = (total_volume / self.volume_norm).min(1.0);
        let wallet_diversity = distinct_wallets as f64 / member_count as f64;

        let score = (0.5 * time_factor + 0.3 * volume_factor + 0.2 * wallet_diversity) * 100.0;
        score.clamp(0.0, 100.0)
    }

    /// Aggregate statistics across a cluster list.
    pub fn summarize(&self, clusters: &[SyncCluster]) -> ClusterSummary {
        if clusters.is_empty() {
            return ClusterSummary::default();
        }

        let total_volume = clusters.iter().map(|c| c.total_volume).sum();
        let unique_wallets: BTreeSet<&str> = clusters
            .iter()
            .flat_map(|c| c.wallets.iter().map(String::as_str))
            .collect();
        let avg_sync_score =
            clusters.iter().map(|c| c.sync_score).sum::<f64>() / clusters.len() as f64;

        let mut per_market: HashMap<&str, usize> = HashMap::new();
        for cluster in clusters {
            *per_market.entry(cluster.market_name.as_str()).or_default() += 1;
        }
        let mut top_markets: Vec<MarketClusterCount> = per_market
            .into_iter()
            .map(|(market, count)| MarketClusterCount {
                market: market.to_string(),
                clusters: count,
            })
            .collect();
        top_markets.sort_by(|a, b| b.clusters.cmp(&a.clusters).then_with(|| a.market.cmp(&b.market)));
        top_markets.truncate(self.top_markets);

        ClusterSummary {
            total_clusters: clusters.len(),
            total_volume,
            total_unique_wallets: unique_wallets.len(),
            avg_sync_score,
            top_markets,
        }
    }
}

fn group_by_market_and_side(trades: &[TradeRecord]) -> BTreeMap<(&str, Side), Vec<&TradeRecord>> {
    let mut groups: BTreeMap<(&str, Side), Vec<&TradeRecord>> = BTreeMap::new();
    for trade in trades {
        if trade.market_id.is_empty() || trade.wallet.is_empty() {
            continue;
        }
        groups
            .entry((trade.market_id.as_str(), trade.side))
            .or_default()
            .push(trade);
    }
    groups
}

/// Render a duration as `45s`, `3m 5s` or `2h 10m`.
pub fn format_window(secs: i64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::MarketMeta;

    fn trade(wallet: &str, market: &str, side: Side, size: f64, ts: i64) -> TradeRecord {
        TradeRecord {
            wallet: wallet.to_string(),
            market_id: market.to_string(),
            side,
            size,
            price: 0.5,
            timestamp: ts,
        }
    }

    fn finder() -> SyncClusterFinder {
        SyncClusterFinder::new(&SyncConfig::default())
    }

    #[test]
    fn test_gap_is_measured_from_last_member() {
        let trades = vec![
            trade("0xa", "M", Side::Yes, 10.0, 0),
            trade("0xb", "M", Side::Yes, 10.0, 100),
            trade("0xc", "M", Side::Yes, 10.0, 500),
        ];
        let clusters = finder().find_clusters(&trades, &MarketDirectory::default());

        assert_eq!(clusters.len(), 1);
        let c = &clusters[0];
        assert_eq!(c.trades_count, 2);
        assert_eq!(c.start_time, 0);
        assert_eq!(c.end_time, 100);
        assert_eq!(c.time_window_secs, 100);
        assert_eq!(c.wallets, vec!["0xa".to_string(), "0xb".to_string()]);
    }

    #[test]
    fn test_chain_extends_past_threshold_from_start() {
        // Each neighbour is 150s apart, so the span (300s) exceeds the threshold.
        let trades = vec![
            trade("0xa", "M", Side::No, 1.0, 1000),
            trade("0xb", "M", Side::No, 1.0, 1150),
            trade("0xc", "M", Side::No, 1.0, 1300),
        ];
        let clusters = finder().find_clusters(&trades, &MarketDirectory::default());
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].trades_count, 3);
        assert_eq!(clusters[0].time_window_secs, 300);
        // time factor is negative here; the score is still clamped into range
        assert!(clusters[0].sync_score >= 0.0 && clusters[0].sync_score <= 100.0);
    }

    #[test]
    fn test_members_share_market_and_side() {
        let trades = vec![
            trade("0xa", "M1", Side::Yes, 5.0, 10),
            trade("0xb", "M1", Side::No, 5.0, 12),
            trade("0xc", "M2", Side::Yes, 5.0, 14),
            trade("0xd", "M1", Side::Yes, 5.0, 20),
            trade("0xe", "M1", Side::No, 5.0, 25),
            trade("0xf", "M2", Side::Yes, 5.0, 30),
        ];
        let clusters = finder().find_clusters(&trades, &MarketDirectory::default());
        assert_eq!(clusters.len(), 3);
        for cluster in &clusters {
            assert!(cluster.trades.len() >= 2);
            assert!(cluster
                .trades
                .iter()
                .all(|t| t.market_id == cluster.market_id && t.side == cluster.side));
            let min = cluster.trades.iter().map(|t| t.timestamp).min().unwrap();
            let max = cluster.trades.iter().map(|t| t.timestamp).max().unwrap();
            assert_eq!(cluster.time_window_secs, max - min);
        }
    }

    #[test]
    fn test_equal_timestamps_merge_and_order_independent() {
        let trades = vec![
            trade("0xc", "M", Side::Yes, 3.0, 50),
            trade("0xa", "M", Side::Yes, 1.0, 50),
            trade("0xb", "M", Side::Yes, 2.0, 50),
            trade("0xd", "M", Side::Yes, 2.0, 900),
            trade("0xe", "M", Side::Yes, 2.0, 950),
        ];
        let mut reversed = trades.clone();
        reversed.reverse();

        let f = finder();
        let a = f.find_clusters(&trades, &MarketDirectory::default());
        let b = f.find_clusters(&reversed, &MarketDirectory::default());

        assert_eq!(a.len(), 2);
        let key = |c: &SyncCluster| (c.start_time, c.wallets.clone(), c.trades_count);
        let mut ka: Vec<_> = a.iter().map(key).collect();
        let mut kb: Vec<_> = b.iter().map(key).collect();
        ka.sort();
        kb.sort();
        assert_eq!(ka, kb);
        assert!(a.iter().any(|c| c.trades_count == 3 && c.time_window_secs == 0));
    }

    #[test]
    fn test_sync_score_formula() {
        let f = finder();
        // Perfectly simultaneous, full volume, all distinct wallets.
        assert_eq!(f.sync_score(0, 20_000.0, 4, 4), 100.0);
        // 90s of a 180s window, 5000 volume, 2 wallets over 4 trades:
        // (0.5*0.5 + 0.3*0.5 + 0.2*0.5) * 100 = 50
        assert!((f.sync_score(90, 5_000.0, 2, 4) - 50.0).abs() < 1e-9);
        // Very wide window drives the raw value negative.
        assert_eq!(f.sync_score(10_000, 0.0, 1, 10), 0.0);
    }

    #[test]
    fn test_results_sorted_by_score() {
        let trades = vec![
            trade("0xa", "slow", Side::Yes, 1.0, 0),
            trade("0xa", "slow", Side::Yes, 1.0, 170),
            trade("0xa", "fast", Side::Yes, 9_000.0, 0),
            trade("0xb", "fast", Side::Yes, 9_000.0, 1),
        ];
        let clusters = finder().find_clusters(&trades, &MarketDirectory::default());
        assert_eq!(clusters[0].market_id, "fast");
        assert!(clusters[0].sync_score > clusters[1].sync_score);
    }

    #[test]
    fn test_summary_and_market_names() {
        let markets = MarketDirectory::from_markets(vec![MarketMeta {
            id: "M1".to_string(),
            name: "Election winner".to_string(),
            question: None,
        }]);
        let trades = vec![
            trade("0xa", "M1", Side::Yes, 100.0, 0),
            trade("0xb", "M1", Side::Yes, 300.0, 10),
            trade("0xa", "M1", Side::No, 50.0, 0),
            trade("0xc", "M1", Side::No, 50.0, 5),
            trade("0xd", "M2", Side::Yes, 25.0, 0),
            trade("0xd", "M2", Side::Yes, 25.0, 1),
        ];
        let f = finder();
        let clusters = f.find_clusters(&trades, &markets);
        let summary = f.summarize(&clusters);

        assert_eq!(summary.total_clusters, 3);
        assert_eq!(summary.total_volume, 550.0);
        assert_eq!(summary.total_unique_wallets, 4);
        assert_eq!(summary.top_markets[0].market, "Election winner");
        assert_eq!(summary.top_markets[0].clusters, 2);
        assert_eq!(summary.top_markets[1].market, "M2");

        let mixed = clusters.iter().find(|c| c.market_id == "M2").unwrap();
        assert_eq!(mixed.wallet_stats["0xd"].trades_count, 2);
        assert_eq!(mixed.avg_trade_size, 25.0);
    }

    #[test]
    fn test_single_trades_and_empty_input() {
        let f = finder();
        assert!(f.find_clusters(&[], &MarketDirectory::default()).is_empty());
        let lone = vec![trade("0xa", "M", Side::Yes, 1.0, 0)];
        assert!(f.find_clusters(&lone, &MarketDirectory::default()).is_empty());
        assert_eq!(f.summarize(&[]).total_clusters, 0);
    }

    #[test]
    fn test_format_window() {
        assert_eq!(format_window(45), "45s");
        assert_eq!(format_window(185), "3m 5s");
        assert_eq!(format_window(7800), "2h 10m");
    }
}
