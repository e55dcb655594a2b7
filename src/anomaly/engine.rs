use crate::config::AnomalyConfig;
use crate::ingest::types::TradeRecord;
use crate::stats;

use super::features::trade_features;
use super::forest::IsolationForest;
use super::types::{AnomalyRecord, AnomalySummary};

const TOP_ANOMALIES: usize = 5;

/// Scores every trade in a batch against the batch's own distribution.
pub struct OutlierScorer {
    config: AnomalyConfig,
}

impl OutlierScorer {
    pub fn new(config: AnomalyConfig) -> Self {
        Self { config }
    }

    /// Score every trade. Batches below `min_trades` yield an empty list.
    pub fn score_all(&self, trades: &[TradeRecord]) -> eyre::Result<Vec<AnomalyRecord>> {
        if trades.len() < self.config.min_trades.max(2) {
            tracing::debug!(
                trades = trades.len(),
                min = self.config.min_trades,
                "Not enough trades for outlier scoring"
            );
            return Ok(Vec::new());
        }

        let features: Vec<Vec<f64>> = trades.iter().map(trade_features).collect();
        let scaled = stats::standardize(&features);

        let forest = IsolationForest::new(
            self.config.trees,
            self.config.sample_size,
            self.config.contamination,
            self.config.seed,
        );
        let decisions = forest.fit_decision(&scaled)?;

        Ok(trades
            .iter()
            .zip(decisions)
            .map(|(trade, score)| AnomalyRecord {
                trade: trade.clone(),
                anomaly_score: score,
                is_anomaly: score < 0.0,
            })
            .collect())
    }

    /// The flagged trades only, with their scores attached.
    pub fn detect(&self, trades: &[TradeRecord]) -> eyre::Result<Vec<AnomalyRecord>> {
        Ok(self
            .score_all(trades)?
            .into_iter()
            .filter(|r| r.is_anomaly)
            .collect())
    }
}

/// Count, share of the batch, and the five most anomalous trades.
pub fn summarize(anomalies: &[AnomalyRecord], total_trades: usize) -> AnomalySummary {
    let flagged: Vec<&AnomalyRecord> = anomalies.iter().filter(|a| a.is_anomaly).collect();
    let percentage = if total_trades > 0 {
        flagged.len() as f64 / total_trades as f64 * 100.0
    } else {
        0.0
    };

    let mut top: Vec<AnomalyRecord> = flagged.iter().map(|a| (*a).clone()).collect();
    top.sort_by(|a, b| a.anomaly_score.total_cmp(&b.anomaly_score));
    top.truncate(TOP_ANOMALIES);

    AnomalySummary {
        count: flagged.len(),
        percentage,
        top_anomalies: top,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Side;

    fn trade(i: usize, size: f64) -> TradeRecord {
        TradeRecord {
            wallet: format!("0xwallet{}", i % 4),
            market_id: "m1".to_string(),
            side: if i % 2 == 0 { Side::Yes } else { Side::No },
            size,
            price: 0.5,
            timestamp: 1_700_000_000 + (i as i64) * 60,
        }
    }

    #[test]
    fn test_small_batch_returns_empty() {
        let scorer = OutlierScorer::new(AnomalyConfig::default());
        let trades: Vec<TradeRecord> = (0..9).map(|i| trade(i, 10.0)).collect();
        assert!(scorer.detect(&trades).unwrap().is_empty());
        assert!(scorer.score_all(&trades).unwrap().is_empty());
        assert!(scorer.detect(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_whale_trade_is_flagged() {
        let scorer = OutlierScorer::new(AnomalyConfig::default());
        let mut trades: Vec<TradeRecord> = (0..49).map(|i| trade(i, 10.0 + (i % 3) as f64)).collect();
        trades.push(trade(49, 250_000.0));

        let scored = scorer.score_all(&trades).unwrap();
        assert_eq!(scored.len(), trades.len());

        let anomalies = scorer.detect(&trades).unwrap();
        assert!(!anomalies.is_empty());
        assert!(anomalies.len() <= 5);
        assert!(anomalies.iter().all(|a| a.is_anomaly && a.anomaly_score < 0.0));

        let summary = summarize(&anomalies, trades.len());
        assert_eq!(summary.top_anomalies[0].trade.size, 250_000.0);
        assert_eq!(summary.count, anomalies.len());
        assert!((summary.percentage - anomalies.len() as f64 / 50.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_deterministic_for_fixed_batch() {
        let scorer = OutlierScorer::new(AnomalyConfig::default());
        let trades: Vec<TradeRecord> = (0..30).map(|i| trade(i, (i * 7 % 11) as f64 + 1.0)).collect();
        let a: Vec<f64> = scorer.score_all(&trades).unwrap().iter().map(|r| r.anomaly_score).collect();
        let b: Vec<f64> = scorer.score_all(&trades).unwrap().iter().map(|r| r.anomaly_score).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&[], 0);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.percentage, 0.0);
        assert!(summary.top_anomalies.is_empty());
    }
}
