use crate::ingest::types::TradeRecord;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over the UTF-8 bytes. Stable across runs and platforms, unlike the
/// std `DefaultHasher`.
pub fn stable_hash(value: &str) -> u64 {
    value
        .bytes()
        .fold(FNV_OFFSET, |acc, b| (acc ^ b as u64).wrapping_mul(FNV_PRIME))
}

/// Per-trade feature vector:
/// size, price, second of day, wallet id length, wallet hash bucket, market hash bucket.
pub fn trade_features(trade: &TradeRecord) -> Vec<f64> {
    vec![
        trade.size,
        trade.price,
        trade.timestamp.rem_euclid(86_400) as f64,
        trade.wallet.chars().count() as f64,
        (stable_hash(&trade.wallet) % 1000) as f64,
        (stable_hash(&trade.market_id) % 100) as f64,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Side;

    #[test]
    fn test_stable_hash_known_values() {
        // Reference FNV-1a 64-bit vectors.
        assert_eq!(stable_hash(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(stable_hash("a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn test_trade_features() {
        let trade = TradeRecord {
            wallet: "0xabc".to_string(),
            market_id: "m".to_string(),
            side: Side::Yes,
            size: 12.0,
            price: 0.3,
            timestamp: 86_400 * 3 + 3_661,
        };
        let f = trade_features(&trade);
        assert_eq!(f.len(), 6);
        assert_eq!(f[0], 12.0);
        assert_eq!(f[2], 3_661.0);
        assert_eq!(f[3], 5.0);
        assert!(f[4] < 1000.0 && f[5] < 100.0);
    }
}
