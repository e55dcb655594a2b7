use chrono::Utc;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::{SourceConfig, SourceKind};

use super::normalizer;
use super::types::{MarketMeta, TradeBatch, TradeRecord};

/// Anything that can hand the monitor its latest batch of trades.
///
/// Called from a blocking context once per analysis pass.
pub trait TradeSource: Send + Sync {
    fn fetch(&self) -> eyre::Result<TradeBatch>;
}

/// Reads the venue scraper's JSON cache: either `{"trades": [...]}` or a bare array
/// of raw trade objects, normalized through the fallback table.
pub struct JsonCacheSource {
    path: PathBuf,
    max_batch: usize,
}

impl JsonCacheSource {
    pub fn new(path: impl Into<PathBuf>, max_batch: usize) -> Self {
        Self {
            path: path.into(),
            max_batch,
        }
    }
}

impl TradeSource for JsonCacheSource {
    fn fetch(&self) -> eyre::Result<TradeBatch> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            eyre::eyre!("Failed to read trade cache '{}': {}", self.path.display(), e)
        })?;
        let parsed: JsonValue = serde_json::from_str(&content).map_err(|e| {
            eyre::eyre!("Failed to parse trade cache '{}': {}", self.path.display(), e)
        })?;

        let raw = match &parsed {
            JsonValue::Array(items) => items.as_slice(),
            JsonValue::Object(obj) => obj
                .get("trades")
                .and_then(|t| t.as_array())
                .map(|t| t.as_slice())
                .unwrap_or(&[]),
            _ => return Err(eyre::eyre!("Trade cache must be an array or an object with `trades`")),
        };

        let (trades, skipped) = normalizer::normalize_all(raw);
        tracing::info!(
            path = %self.path.display(),
            trades = trades.len(),
            skipped,
            "Loaded trades from cache"
        );

        Ok(TradeBatch {
            trades: most_recent(trades, self.max_batch),
            skipped,
            fetched_at: Utc::now(),
        })
    }
}

/// Reads already-normalized trades from a CSV export with a
/// `wallet,market_id,side,size,price,timestamp` header.
pub struct CsvSource {
    path: PathBuf,
    max_batch: usize,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>, max_batch: usize) -> Self {
        Self {
            path: path.into(),
            max_batch,
        }
    }
}

impl TradeSource for CsvSource {
    fn fetch(&self) -> eyre::Result<TradeBatch> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| eyre::eyre!("Failed to open trade CSV '{}': {}", self.path.display(), e))?;

        let mut trades = Vec::new();
        let mut skipped = 0usize;

        for result in reader.deserialize::<TradeRecord>() {
            match result {
                Ok(trade) if trade.size > 0.0 && trade.timestamp > 0 => trades.push(trade),
                Ok(_) => skipped += 1,
                Err(e) => {
                    skipped += 1;
                    tracing::debug!(error = %e, "Skipping malformed CSV row");
                }
            }
        }

        if skipped > 0 {
            tracing::warn!(skipped, "Dropped malformed CSV trade rows");
        }

        Ok(TradeBatch {
            trades: most_recent(trades, self.max_batch),
            skipped,
            fetched_at: Utc::now(),
        })
    }
}

/// Keep the newest `max` trades. Order of the survivors is preserved.
fn most_recent(mut trades: Vec<TradeRecord>, max: usize) -> Vec<TradeRecord> {
    if max == 0 || trades.len() <= max {
        return trades;
    }
    let mut timestamps: Vec<i64> = trades.iter().map(|t| t.timestamp).collect();
    timestamps.sort_unstable_by(|a, b| b.cmp(a));
    let cutoff = timestamps[max - 1];

    let mut kept_at_cutoff = timestamps[..max].iter().filter(|&&t| t == cutoff).count();
    trades.retain(|t| {
        if t.timestamp > cutoff {
            true
        } else if t.timestamp == cutoff && kept_at_cutoff > 0 {
            kept_at_cutoff -= 1;
            true
        } else {
            false
        }
    });
    trades
}

/// Build the configured trade source.
pub fn build_source(config: &SourceConfig) -> Box<dyn TradeSource> {
    match config.kind {
        SourceKind::Json => Box::new(JsonCacheSource::new(&config.path, config.max_batch)),
        SourceKind::Csv => Box::new(CsvSource::new(&config.path, config.max_batch)),
    }
}

/// In-memory index of market metadata keyed by market id.
#[derive(Debug, Default, Clone)]
pub struct MarketDirectory {
    by_id: HashMap<String, MarketMeta>,
}

impl MarketDirectory {
    pub fn from_markets(markets: Vec<MarketMeta>) -> Self {
        Self {
            by_id: markets.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }

    /// Load a JSON array of market metadata.
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read markets file '{}': {}", path.display(), e))?;
        let markets: Vec<MarketMeta> = serde_json::from_str(&content)
            .map_err(|e| eyre::eyre!("Failed to parse markets JSON: {}", e))?;

        tracing::info!(markets = markets.len(), "Loaded market directory");
        Ok(Self::from_markets(markets))
    }

    pub fn lookup(&self, market_id: &str) -> Option<&MarketMeta> {
        self.by_id.get(market_id)
    }

    /// Display name for a market, falling back to its id.
    pub fn display_name(&self, market_id: &str) -> String {
        self.lookup(market_id)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| market_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Side;
    use std::io::Write;

    fn trade(ts: i64) -> TradeRecord {
        TradeRecord {
            wallet: "0x1".to_string(),
            market_id: "m".to_string(),
            side: Side::Yes,
            size: 1.0,
            price: 0.5,
            timestamp: ts,
        }
    }

    #[test]
    fn test_json_cache_source_skips_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"timestamp": "2024-01-01T00:00:00", "trades": [
                {{"wallet": "0xa", "market_id": "m1", "side": "YES", "amount": 10, "price": 0.5, "timestamp": 100}},
                {{"wallet": "0xb", "market_id": "m1", "side": "NO", "amount": 0, "price": 0.5, "timestamp": 100}},
                {{"market_id": "m1", "side": "NO", "amount": 4, "price": 0.5, "timestamp": 100}}
            ]}}"#
        )
        .unwrap();

        let batch = JsonCacheSource::new(file.path(), 0).fetch().unwrap();
        assert_eq!(batch.trades.len(), 1);
        assert_eq!(batch.skipped, 2);
        assert_eq!(batch.trades[0].wallet, "0xa");
    }

    #[test]
    fn test_csv_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "wallet,market_id,side,size,price,timestamp").unwrap();
        writeln!(file, "0xa,m1,A,10,0.5,100").unwrap();
        writeln!(file, "0xb,m1,SELL,5,0.4,160").unwrap();
        writeln!(file, "0xc,m1,HOLD,5,0.4,160").unwrap();
        writeln!(file, "0xd,m1,long,5,0.4,170").unwrap();
        writeln!(file, "0xe,m1,Down,5,0.4,180").unwrap();

        let batch = CsvSource::new(file.path(), 0).fetch().unwrap();
        assert_eq!(batch.trades.len(), 4);
        assert_eq!(batch.skipped, 1);
        let sides: Vec<Side> = batch.trades.iter().map(|t| t.side).collect();
        assert_eq!(sides, vec![Side::Yes, Side::No, Side::Yes, Side::No]);
    }

    #[test]
    fn test_most_recent_keeps_newest() {
        let trades = vec![trade(5), trade(1), trade(9), trade(5), trade(3)];
        let kept = most_recent(trades, 3);
        let ts: Vec<i64> = kept.iter().map(|t| t.timestamp).collect();
        assert_eq!(ts, vec![5, 9, 5]);

        let kept = most_recent(vec![trade(1), trade(2)], 10);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_market_directory_fallback() {
        let dir = MarketDirectory::from_markets(vec![MarketMeta {
            id: "m1".to_string(),
            name: "Will it rain?".to_string(),
            question: None,
        }]);
        assert_eq!(dir.display_name("m1"), "Will it rain?");
        assert_eq!(dir.display_name("m2"), "m2");
    }
}
