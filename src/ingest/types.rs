use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

/// Direction of a trade. Venues report this as buy/sell or yes/no; both
/// collapse onto the two outcomes here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Side {
    #[serde(rename = "YES")]
    Yes,
    #[serde(rename = "NO")]
    No,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "YES",
            Self::No => "NO",
        }
    }

    /// Parse any of the spellings venues use for a trade direction.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "YES" | "A" | "BUY" | "UP" | "LONG" => Some(Self::Yes),
            "NO" | "B" | "SELL" | "DOWN" | "SHORT" => Some(Self::No),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Side {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Side::parse(&raw).ok_or_else(|| de::Error::custom(format!("unknown trade side '{}'", raw)))
    }
}

/// A normalized trade, immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub wallet: String,
    pub market_id: String,
    pub side: Side,
    pub size: f64,
    pub price: f64,
    pub timestamp: i64,
}

/// Display metadata for a market, supplied by the venue's market lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketMeta {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub question: Option<String>,
}

/// The trades handed to one analysis pass.
#[derive(Debug, Clone)]
pub struct TradeBatch {
    pub trades: Vec<TradeRecord>,
    /// Raw records dropped during normalization.
    pub skipped: usize,
    pub fetched_at: DateTime<Utc>,
}

impl TradeBatch {
    pub fn new(trades: Vec<TradeRecord>) -> Self {
        Self {
            trades,
            skipped: 0,
            fetched_at: Utc::now(),
        }
    }

    /// Sum of trade sizes, used as the volume measurement for spike detection.
    pub fn total_volume(&self) -> f64 {
        self.trades.iter().map(|t| t.size).sum()
    }
}
