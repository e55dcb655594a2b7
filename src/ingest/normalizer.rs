use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;

use super::types::{Side, TradeRecord};

// Candidate keys per logical field, tried in order. The first key whose value
// coerces successfully wins.
const WALLET_FIELDS: &[&str] = &[
    "proxyWallet",
    "maker",
    "taker",
    "user",
    "trader",
    "address",
    "wallet",
];
const MARKET_FIELDS: &[&str] = &["conditionId", "market", "market_id"];
const SIDE_FIELDS: &[&str] = &["outcome", "side", "position", "direction"];
const SIZE_FIELDS: &[&str] = &["size", "amount", "quantity", "volume", "value"];
const PRICE_FIELDS: &[&str] = &["price", "rate", "cost"];
const TIME_FIELDS: &[&str] = &["timestamp", "createdAt", "time", "date", "created_at"];

/// Normalize one raw venue record into a `TradeRecord`.
///
/// Returns an error naming the first field that could not be resolved. Records
/// with a non-positive size or timestamp are rejected too.
pub fn normalize_trade(raw: &JsonValue) -> eyre::Result<TradeRecord> {
    let obj = raw
        .as_object()
        .ok_or_else(|| eyre::eyre!("trade record is not a JSON object"))?;

    let wallet = first_match(obj, WALLET_FIELDS, coerce_wallet)
        .ok_or_else(|| eyre::eyre!("missing wallet"))?;
    let market_id = first_match(obj, MARKET_FIELDS, coerce_string)
        .ok_or_else(|| eyre::eyre!("missing market id"))?;
    let side = first_match(obj, SIDE_FIELDS, |v| v.as_str().and_then(Side::parse))
        .ok_or_else(|| eyre::eyre!("missing or unrecognized side"))?;
    let size = first_match(obj, SIZE_FIELDS, coerce_number)
        .ok_or_else(|| eyre::eyre!("missing size"))?;
    let price = first_match(obj, PRICE_FIELDS, coerce_number).unwrap_or(0.0);
    let timestamp = first_match(obj, TIME_FIELDS, coerce_timestamp)
        .ok_or_else(|| eyre::eyre!("missing timestamp"))?;

    if size <= 0.0 {
        return Err(eyre::eyre!("non-positive size {}", size));
    }
    if timestamp <= 0 {
        return Err(eyre::eyre!("non-positive timestamp {}", timestamp));
    }

    Ok(TradeRecord {
        wallet,
        market_id,
        side,
        size,
        price,
        timestamp,
    })
}

/// Normalize a list of raw records, skipping malformed ones.
/// Returns the accepted trades and the number skipped.
pub fn normalize_all(raw: &[JsonValue]) -> (Vec<TradeRecord>, usize) {
    let mut trades = Vec::with_capacity(raw.len());
    let mut skipped = 0usize;

    for record in raw {
        match normalize_trade(record) {
            Ok(trade) => trades.push(trade),
            Err(e) => {
                skipped += 1;
                tracing::debug!(error = %e, "Skipping malformed trade record");
            }
        }
    }

    if skipped > 0 {
        tracing::warn!(
            accepted = trades.len(),
            skipped,
            "Dropped malformed trade records during normalization"
        );
    }

    (trades, skipped)
}

fn first_match<T>(
    obj: &serde_json::Map<String, JsonValue>,
    fields: &[&str],
    coerce: impl Fn(&JsonValue) -> Option<T>,
) -> Option<T> {
    fields
        .iter()
        .filter_map(|field| obj.get(*field))
        .find_map(|value| coerce(value))
}

fn coerce_wallet(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if s.starts_with("0x") => Some(s.clone()),
        JsonValue::Object(inner) => inner
            .get("address")
            .and_then(|a| a.as_str())
            .filter(|a| !a.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

fn coerce_string(value: &JsonValue) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn coerce_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn coerce_timestamp(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        JsonValue::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    }
}

/// RFC 3339, then ISO 8601 without an offset (read as UTC), then epoch seconds.
fn parse_timestamp_str(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }
    if let Ok(naive) = s
        .parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
    {
        return Some(naive.and_utc().timestamp());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp());
    }
    s.parse::<i64>().ok()
}
