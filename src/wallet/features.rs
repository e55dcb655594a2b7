use std::collections::{BTreeMap, HashSet};

use crate::ingest::types::TradeRecord;
use crate::stats;

/// Behavioural profile of one wallet across a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletFeatures {
    pub wallet: String,
    pub trade_count: usize,
    pub total_volume: f64,
    pub mean_size: f64,
    pub size_std: f64,
    pub distinct_markets: usize,
    pub distinct_sides: usize,
}

impl WalletFeatures {
    pub fn as_vector(&self) -> Vec<f64> {
        vec![
            self.trade_count as f64,
            self.total_volume,
            self.mean_size,
            self.size_std,
            self.distinct_markets as f64,
            self.distinct_sides as f64,
        ]
    }
}

/// Profile every wallet with at least `min_trades` trades, ordered by wallet id.
pub fn profile_wallets(trades: &[TradeRecord], min_trades: usize) -> Vec<WalletFeatures> {
    let mut by_wallet: BTreeMap<&str, Vec<&TradeRecord>> = BTreeMap::new();
    for trade in trades {
        if !trade.wallet.is_empty() {
            by_wallet.entry(trade.wallet.as_str()).or_default().push(trade);
        }
    }

    by_wallet
        .into_iter()
        .filter(|(_, list)| list.len() >= min_trades.max(1))
        .map(|(wallet, list)| {
            let sizes: Vec<f64> = list.iter().map(|t| t.size).collect();
            let (mean_size, std) = stats::mean_std(&sizes);
            let markets: HashSet<&str> = list.iter().map(|t| t.market_id.as_str()).collect();
            let sides: HashSet<_> = list.iter().map(|t| t.side).collect();

            WalletFeatures {
                wallet: wallet.to_string(),
                trade_count: list.len(),
                total_volume: sizes.iter().sum(),
                mean_size,
                size_std: if list.len() > 1 { std } else { 0.0 },
                distinct_markets: markets.len(),
                distinct_sides: sides.len(),
            }
        })
        .collect()
}
