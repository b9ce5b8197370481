use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub ingestion: IngestionConfig,
    pub ranking: RankingConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub service_name: String,
    /// Optional JSON file holding the ad catalog served by the binary
    pub catalog_path: Option<String>,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestionConfig {
    pub rate_limit_max_events: u32,
    pub rate_limit_window_secs: i64,
    pub impression_dedup_window_secs: i64,
    pub recency_window_secs: i64,
    /// Used for watch-percent when an ad carries no creative duration
    pub default_creative_duration_secs: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankingConfig {
    pub exploration_swipe_threshold: u64,
    pub frequency_penalty: f64,
    pub jitter_max: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub timeout_ms: u64,
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            rate_limit_max_events: 100,
            rate_limit_window_secs: 60,
            impression_dedup_window_secs: 30 * 60,
            recency_window_secs: 60 * 60,
            default_creative_duration_secs: 15,
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            exploration_swipe_threshold: 5,
            frequency_penalty: 50.0,
            jitter_max: 5.0,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { timeout_ms: 2000 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                service_name: "ad-ranking-service".to_string(),
                catalog_path: None,
                sweep_interval_secs: 60,
            },
            ingestion: IngestionConfig::default(),
            ranking: RankingConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            service: ServiceConfig {
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "ad-ranking-service".to_string()),
                catalog_path: env::var("CATALOG_PATH").ok(),
                sweep_interval_secs: parse_var("SWEEP_INTERVAL_SECS", "60")?,
            },
            ingestion: IngestionConfig {
                rate_limit_max_events: parse_var("RATE_LIMIT_MAX_EVENTS", "100")?,
                rate_limit_window_secs: parse_var("RATE_LIMIT_WINDOW_SECS", "60")?,
                impression_dedup_window_secs: parse_var("IMPRESSION_DEDUP_WINDOW_SECS", "1800")?,
                recency_window_secs: parse_var("RECENCY_WINDOW_SECS", "3600")?,
                default_creative_duration_secs: parse_var("DEFAULT_CREATIVE_DURATION_SECS", "15")?,
            },
            ranking: RankingConfig {
                exploration_swipe_threshold: parse_var("EXPLORATION_SWIPE_THRESHOLD", "5")?,
                frequency_penalty: parse_var("FREQUENCY_PENALTY", "50.0")?,
                jitter_max: parse_var("RANKING_JITTER_MAX", "5.0")?,
            },
            store: StoreConfig {
                timeout_ms: parse_var("STORE_TIMEOUT_MS", "2000")?,
            },
        })
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}
