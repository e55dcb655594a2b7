use serde::Serialize;
use std::collections::BTreeMap;

use crate::ingest::types::{Side, TradeRecord};

/// Per-wallet participation inside one sync cluster.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WalletStat {
    pub trades_count: usize,
    pub total_amount: f64,
    /// Price of the wallet's latest trade in the cluster.
    pub last_price: f64,
}

/// A burst of near-simultaneous trades on one (market, side).
/// Recomputed on every pass; clusters carry no identity between passes.
#[derive(Debug, Clone, Serialize)]
pub struct SyncCluster {
    pub market_id: String,
    pub market_name: String,
    pub side: Side,
    pub trades: Vec<TradeRecord>,
    pub wallets: Vec<String>,
    pub wallet_stats: BTreeMap<String, WalletStat>,
    pub trades_count: usize,
    pub total_volume: f64,
    pub avg_trade_size: f64,
    pub start_time: i64,
    pub end_time: i64,
    pub time_window_secs: i64,
    pub time_window_label: String,
    pub sync_score: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MarketClusterCount {
    pub market: String,
    pub clusters: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusterSummary {
    pub total_clusters: usize,
    pub total_volume: f64,
    pub total_unique_wallets: usize,
    pub avg_sync_score: f64,
    pub top_markets: Vec<MarketClusterCount>,
}
