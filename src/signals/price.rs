use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::SignalConfig;
use crate::ingest::types::TradeRecord;
use crate::stats;

/// Heuristic manipulation signals raised for one market.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSignals {
    pub market_id: String,
    pub signals: Vec<String>,
    pub price_volume_corr: f64,
    pub price_volatility: f64,
    pub large_trade_ratio: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PriceManipulationReport {
    pub suspicious: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub manipulation_signals: Vec<MarketSignals>,
    pub total_markets_analyzed: usize,
    pub suspicious_markets: usize,
}

impl PriceManipulationReport {
    fn insufficient_data() -> Self {
        Self {
            reason: Some("insufficient_data".to_string()),
            ..Self::default()
        }
    }
}

pub struct PriceSignalDetector {
    config: SignalConfig,
}

impl PriceSignalDetector {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, trades: &[TradeRecord]) -> eyre::Result<PriceManipulationReport> {
        if trades.len() < self.config.min_total_trades {
            return Ok(PriceManipulationReport::insufficient_data());
        }

        let mut by_market: BTreeMap<&str, Vec<&TradeRecord>> = BTreeMap::new();
        for trade in trades {
            if !trade.market_id.is_empty() {
                by_market.entry(trade.market_id.as_str()).or_default().push(trade);
            }
        }
        let total_markets_analyzed = by_market.len();

        let mut manipulation_signals = Vec::new();
        for (market_id, mut list) in by_market {
            if list.len() < self.config.min_market_trades {
                continue;
            }
            list.sort_by_key(|t| t.timestamp);

            if let Some(found) = self.evaluate_market(market_id, &list)? {
                manipulation_signals.push(found);
            }
        }

        Ok(PriceManipulationReport {
            suspicious: !manipulation_signals.is_empty(),
            reason: None,
            suspicious_markets: manipulation_signals.len(),
            manipulation_signals,
            total_markets_analyzed,
        })
    }

    fn evaluate_market(
        &self,
        market_id: &str,
        trades: &[&TradeRecord],
    ) -> eyre::Result<Option<MarketSignals>> {
        let prices: Vec<f64> = trades.iter().map(|t| t.price).collect();
        let sizes: Vec<f64> = trades.iter().map(|t| t.size).collect();

        if prices.iter().chain(&sizes).any(|v| !v.is_finite()) {
            return Err(eyre::eyre!("market {} has non-finite price or size", market_id));
        }

        // A constant series has no defined correlation; treat it as uncorrelated.
        let corr = stats::pearson(&prices, &sizes).unwrap_or(0.0);
        let volatility = stats::coefficient_of_variation(&prices);
        let p90 = stats::percentile(&sizes, 90.0);
        let large_trade_ratio =
            sizes.iter().filter(|&&s| s > p90).count() as f64 / sizes.len() as f64;

        let mut signals = Vec::new();
        if corr.abs() > self.config.correlation {
            signals.push(format!("high_price_volume_correlation_{:.2}", corr));
        }
        if volatility > self.config.volatility {
            signals.push(format!("high_price_volatility_{:.2}", volatility));
        }
        if large_trade_ratio > self.config.large_trade_ratio {
            signals.push(format!("high_large_trade_ratio_{:.2}", large_trade_ratio));
        }

        if signals.is_empty() {
            return Ok(None);
        }

        tracing::debug!(market = market_id, signals = ?signals, "Price manipulation signals");
        Ok(Some(MarketSignals {
            market_id: market_id.to_string(),
            signals,
            price_volume_corr: corr,
            price_volatility: volatility,
            large_trade_ratio,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Side;

    fn trade(market: &str, size: f64, price: f64, ts: i64) -> TradeRecord {
        TradeRecord {
            wallet: "0xa".to_string(),
            market_id: market.to_string(),
            side: Side::Yes,
            size,
            price,
            timestamp: ts,
        }
    }

    fn detector() -> PriceSignalDetector {
        PriceSignalDetector::new(SignalConfig::default())
    }

    #[test]
    fn test_insufficient_data() {
        let trades: Vec<TradeRecord> = (0..9).map(|i| trade("m", 1.0, 0.5, i)).collect();
        let report = detector().detect(&trades).unwrap();
        assert!(!report.suspicious);
        assert_eq!(report.reason.as_deref(), Some("insufficient_data"));
    }

    #[test]
    fn test_price_follows_size() {
        // Price rises in lockstep with trade size: perfect correlation.
        let mut trades: Vec<TradeRecord> = (0..6)
            .map(|i| trade("pump", 100.0 + i as f64 * 10.0, 0.40 + i as f64 * 0.01, i))
            .collect();
        // A quiet market with too few trades to be evaluated.
        trades.extend((0..4).map(|i| trade("quiet", 5.0, 0.5, i)));

        let report = detector().detect(&trades).unwrap();
        assert!(report.suspicious);
        assert_eq!(report.total_markets_analyzed, 2);
        assert_eq!(report.suspicious_markets, 1);

        let pump = &report.manipulation_signals[0];
        assert_eq!(pump.market_id, "pump");
        assert!((pump.price_volume_corr - 1.0).abs() < 1e-9);
        assert!(pump.signals.iter().any(|s| s.starts_with("high_price_volume_correlation")));
    }

    #[test]
    fn test_volatile_prices_and_large_trades() {
        // Flat sizes except two whales; prices swing between 0.1 and 0.9.
        let sizes = [10.0, 10.0, 10.0, 500.0, 10.0, 10.0, 10.0, 500.0, 10.0, 10.0];
        let prices = [0.1, 0.9, 0.1, 0.9, 0.1, 0.9, 0.1, 0.9, 0.1, 0.9];
        let trades: Vec<TradeRecord> = sizes
            .iter()
            .zip(prices)
            .enumerate()
            .map(|(i, (&s, p))| trade("swing", s, p, i as i64))
            .collect();

        let report = detector().detect(&trades).unwrap();
        let swing = &report.manipulation_signals[0];
        assert!(swing.price_volatility > 0.3);
        assert!(swing.signals.iter().any(|s| s.starts_with("high_price_volatility")));
        // Only values strictly above the 90th percentile count as large.
        assert_eq!(swing.large_trade_ratio, 0.0);
    }

    #[test]
    fn test_calm_market_has_no_signals() {
        let trades: Vec<TradeRecord> = (0..12)
            .map(|i| trade("calm", 10.0 + (i % 2) as f64, 0.5 + (i % 3) as f64 * 0.001, i))
            .collect();
        let report = detector().detect(&trades).unwrap();
        assert!(!report.suspicious);
        assert_eq!(report.suspicious_markets, 0);
        assert_eq!(report.total_markets_analyzed, 1);
    }

    #[test]
    fn test_non_finite_price_is_an_error() {
        let mut trades: Vec<TradeRecord> = (0..10).map(|i| trade("m", 1.0, 0.5, i)).collect();
        trades[3].price = f64::NAN;
        assert!(detector().detect(&trades).is_err());
    }
}
