use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    #[serde(default)]
    pub wallet_clusters: WalletClusterConfig,
    #[serde(default)]
    pub signals: SignalConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub thresholds: AlertThresholds,
    #[serde(default)]
    pub api: ApiConfig,
}

// ============================================================
// Trade Source Config
// ============================================================

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Json,
    Csv,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_source_kind")]
    pub kind: SourceKind,
    pub path: String,
    pub markets_path: Option<String>,
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

fn default_source_kind() -> SourceKind {
    SourceKind::Json
}

fn default_max_batch() -> usize {
    10_000
}

// ============================================================
// Detector Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_sync_threshold")]
    pub threshold_secs: i64,
    #[serde(default = "default_volume_norm")]
    pub volume_norm: f64,
    #[serde(default = "default_top_markets")]
    pub top_markets: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            threshold_secs: 180,
            volume_norm: 10_000.0,
            top_markets: 5,
        }
    }
}

fn default_sync_threshold() -> i64 {
    180
}

fn default_volume_norm() -> f64 {
    10_000.0
}

fn default_top_markets() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnomalyConfig {
    #[serde(default = "default_contamination")]
    pub contamination: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_trees")]
    pub trees: usize,
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    #[serde(default = "default_min_trades")]
    pub min_trades: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            contamination: 0.1,
            seed: 42,
            trees: 100,
            sample_size: 256,
            min_trades: 10,
        }
    }
}

fn default_contamination() -> f64 {
    0.1
}

fn default_seed() -> u64 {
    42
}

fn default_trees() -> usize {
    100
}

fn default_sample_size() -> usize {
    256
}

fn default_min_trades() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct WalletClusterConfig {
    #[serde(default = "default_eps")]
    pub eps: f64,
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    #[serde(default = "default_min_trades_per_wallet")]
    pub min_trades_per_wallet: usize,
    #[serde(default = "default_min_wallets")]
    pub min_wallets: usize,
    #[serde(default = "default_min_trades")]
    pub min_trades: usize,
}

impl Default for WalletClusterConfig {
    fn default() -> Self {
        Self {
            eps: 0.5,
            min_samples: 5,
            min_trades_per_wallet: 3,
            min_wallets: 5,
            min_trades: 10,
        }
    }
}

fn default_eps() -> f64 {
    0.5
}

fn default_min_samples() -> usize {
    5
}

fn default_min_trades_per_wallet() -> usize {
    3
}

fn default_min_wallets() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct SignalConfig {
    #[serde(default = "default_min_market_trades")]
    pub min_market_trades: usize,
    #[serde(default = "default_min_trades")]
    pub min_total_trades: usize,
    #[serde(default = "default_correlation")]
    pub correlation: f64,
    #[serde(default = "default_volatility")]
    pub volatility: f64,
    #[serde(default = "default_large_trade_ratio")]
    pub large_trade_ratio: f64,
    #[serde(default = "default_temporal_cv")]
    pub temporal_cv: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            min_market_trades: 5,
            min_total_trades: 10,
            correlation: 0.7,
            volatility: 0.3,
            large_trade_ratio: 0.3,
            temporal_cv: 1.5,
        }
    }
}

fn default_min_market_trades() -> usize {
    5
}

fn default_correlation() -> f64 {
    0.7
}

fn default_volatility() -> f64 {
    0.3
}

fn default_large_trade_ratio() -> f64 {
    0.3
}

fn default_temporal_cv() -> f64 {
    1.5
}

// ============================================================
// Monitor Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_failure_backoff_secs")]
    pub failure_backoff_secs: u64,
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    #[serde(default = "default_pass_timeout_secs")]
    pub pass_timeout_secs: u64,
    #[serde(default = "default_alert_history")]
    pub alert_history: usize,
    pub report_path: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            failure_backoff_secs: 10,
            max_consecutive_failures: 5,
            pass_timeout_secs: 120,
            alert_history: 100,
            report_path: None,
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

fn default_failure_backoff_secs() -> u64 {
    10
}

fn default_max_consecutive_failures() -> u32 {
    5
}

fn default_pass_timeout_secs() -> u64 {
    120
}

fn default_alert_history() -> usize {
    100
}

/// Operator-settable alert boundaries. Subscribers may overwrite any subset of
/// these at runtime.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AlertThresholds {
    #[serde(default = "default_risk_threshold")]
    pub risk_score: f64,
    #[serde(default = "default_anomaly_threshold")]
    pub anomaly_percentage: f64,
    #[serde(default = "default_cluster_threshold")]
    pub cluster_count: f64,
    #[serde(default = "default_volume_spike")]
    pub volume_spike: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            risk_score: 50.0,
            anomaly_percentage: 15.0,
            cluster_count: 20.0,
            volume_spike: 2.0,
        }
    }
}

fn default_risk_threshold() -> f64 {
    50.0
}

fn default_anomaly_threshold() -> f64 {
    15.0
}

fn default_cluster_threshold() -> f64 {
    20.0
}

fn default_volume_spike() -> f64 {
    2.0
}

impl AlertThresholds {
    pub fn validate(&self) -> eyre::Result<()> {
        let values = [
            ("risk_score", self.risk_score),
            ("anomaly_percentage", self.anomaly_percentage),
            ("cluster_count", self.cluster_count),
            ("volume_spike", self.volume_spike),
        ];
        for (name, value) in values {
            if !value.is_finite() || value <= 0.0 {
                return Err(eyre::eyre!(
                    "Alert threshold '{}' must be a positive number, got {}",
                    name,
                    value
                ));
            }
        }
        Ok(())
    }
}

// ============================================================
// API Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default = "default_api_host")]
    pub host: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8765,
            host: "0.0.0.0".to_string(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_api_port() -> u16 {
    8765
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("Failed to parse config file '{}': {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> eyre::Result<()> {
        if self.source.path.trim().is_empty() {
            return Err(eyre::eyre!("source.path must not be empty"));
        }
        if self.sync.threshold_secs <= 0 {
            return Err(eyre::eyre!(
                "sync.threshold_secs must be positive, got {}",
                self.sync.threshold_secs
            ));
        }
        if self.sync.volume_norm <= 0.0 {
            return Err(eyre::eyre!("sync.volume_norm must be positive"));
        }
        if !(self.anomaly.contamination > 0.0 && self.anomaly.contamination <= 0.5) {
            return Err(eyre::eyre!(
                "anomaly.contamination must be in (0, 0.5], got {}",
                self.anomaly.contamination
            ));
        }
        if self.anomaly.trees == 0 || self.anomaly.sample_size < 2 {
            return Err(eyre::eyre!(
                "anomaly.trees must be positive and anomaly.sample_size at least 2"
            ));
        }
        if self.wallet_clusters.eps <= 0.0 || self.wallet_clusters.min_samples == 0 {
            return Err(eyre::eyre!(
                "wallet_clusters.eps and wallet_clusters.min_samples must be positive"
            ));
        }
        if self.monitor.interval_secs == 0 {
            return Err(eyre::eyre!("monitor.interval_secs must be positive"));
        }
        if self.monitor.pass_timeout_secs == 0 {
            return Err(eyre::eyre!("monitor.pass_timeout_secs must be positive"));
        }
        if self.monitor.max_consecutive_failures == 0 {
            return Err(eyre::eyre!(
                "monitor.max_consecutive_failures must be at least 1"
            ));
        }
        self.thresholds.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Config {
        toml::from_str(
            r#"
[source]
path = "data/cache.json"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_config_defaults() {
        let config = minimal();
        assert_eq!(config.source.kind, SourceKind::Json);
        assert_eq!(config.source.max_batch, 10_000);
        assert_eq!(config.sync.threshold_secs, 180);
        assert_eq!(config.anomaly.seed, 42);
        assert_eq!(config.wallet_clusters.min_samples, 5);
        assert_eq!(config.monitor.interval_secs, 60);
        assert_eq!(config.thresholds, AlertThresholds::default());
        assert_eq!(config.api.port, 8765);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config_overrides() {
        let toml_str = r#"
[source]
kind = "csv"
path = "trades.csv"
markets_path = "markets.json"

[sync]
threshold_secs = 60

[monitor]
interval_secs = 15
max_consecutive_failures = 2
report_path = "out/clusters.json"

[thresholds]
risk_score = 70.0
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.source.kind, SourceKind::Csv);
        assert_eq!(config.source.markets_path.as_deref(), Some("markets.json"));
        assert_eq!(config.sync.threshold_secs, 60);
        assert_eq!(config.sync.volume_norm, 10_000.0); // default
        assert_eq!(config.monitor.interval_secs, 15);
        assert_eq!(config.monitor.failure_backoff_secs, 10); // default
        assert_eq!(config.thresholds.risk_score, 70.0);
        assert_eq!(config.thresholds.volume_spike, 2.0); // default
    }

    #[test]
    fn test_validate_bad_contamination() {
        let mut config = minimal();
        config.anomaly.contamination = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_threshold() {
        let mut config = minimal();
        config.thresholds.volume_spike = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_failure_budget() {
        let mut config = minimal();
        config.monitor.max_consecutive_failures = 0;
        assert!(config.validate().is_err());
        config.monitor.max_consecutive_failures = 1;
        assert!(config.validate().is_ok());
    }
}
