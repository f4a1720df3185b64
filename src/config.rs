use serde::Deserialize;

use crate::services::exposure::ExposureConfig;

/// Where exposure snapshots are kept
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExposureBackend {
    /// Process-local ring buffer, lost on restart and not shared between instances
    Memory,
    /// Shared Redis list
    Redis,
    /// Derived from the recommendation_history table
    Postgres,
}

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// PostgreSQL database connection URL. In-memory stores are used when unset.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Redis connection URL for the embedding cache and shared exposure history
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Base URL of the external outfit scorer
    #[serde(default = "default_scorer_url")]
    pub scorer_url: String,

    /// Base URL of the text/image embedding service
    #[serde(default = "default_embedder_url")]
    pub embedder_url: String,

    /// Timeout for scorer and text embedding calls
    #[serde(default = "default_upstream_timeout_ms")]
    pub upstream_timeout_ms: u64,

    /// Timeout for image embedding calls
    #[serde(default = "default_image_encode_timeout_ms")]
    pub image_encode_timeout_ms: u64,

    /// Candidates kept by vector retrieval before scoring
    #[serde(default = "default_retrieval_top_k")]
    pub retrieval_top_k: usize,

    /// Combinations requested from the scorer
    #[serde(default = "default_scorer_top_k")]
    pub scorer_top_k: usize,

    #[serde(default = "default_exposure_backend")]
    pub exposure_backend: ExposureBackend,

    #[serde(default = "default_exposure_lookback")]
    pub exposure_lookback: usize,

    #[serde(default = "default_exposure_penalty_per_hit")]
    pub exposure_penalty_per_hit: f64,

    #[serde(default = "default_exposure_max_penalty")]
    pub exposure_max_penalty: f64,

    #[serde(default)]
    pub exposure_min_score: f64,

    #[serde(default = "default_exposure_half_life")]
    pub exposure_half_life: f64,

    #[serde(default = "default_exposure_recency_boost_n")]
    pub exposure_recency_boost_n: usize,

    #[serde(default = "default_exposure_recency_boost_mult")]
    pub exposure_recency_boost_mult: f64,

    /// Fixed seed for the exploration RNG (reproducible runs)
    #[serde(default)]
    pub sampler_seed: Option<u64>,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_scorer_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_embedder_url() -> String {
    "http://localhost:8002".to_string()
}

fn default_upstream_timeout_ms() -> u64 {
    5_000
}

fn default_image_encode_timeout_ms() -> u64 {
    10_000
}

fn default_retrieval_top_k() -> usize {
    100
}

fn default_scorer_top_k() -> usize {
    10
}

fn default_exposure_backend() -> ExposureBackend {
    ExposureBackend::Memory
}

fn default_exposure_lookback() -> usize {
    ExposureConfig::default().lookback
}

fn default_exposure_penalty_per_hit() -> f64 {
    ExposureConfig::default().penalty_per_hit
}

fn default_exposure_max_penalty() -> f64 {
    ExposureConfig::default().max_penalty
}

fn default_exposure_half_life() -> f64 {
    ExposureConfig::default().half_life
}

fn default_exposure_recency_boost_n() -> usize {
    ExposureConfig::default().recency_boost_n
}

fn default_exposure_recency_boost_mult() -> f64 {
    ExposureConfig::default().recency_boost_mult
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    pub fn exposure(&self) -> ExposureConfig {
        ExposureConfig {
            lookback: self.exposure_lookback,
            penalty_per_hit: self.exposure_penalty_per_hit,
            max_penalty: self.exposure_max_penalty,
            min_score: self.exposure_min_score,
            half_life: self.exposure_half_life,
            recency_boost_n: self.exposure_recency_boost_n,
            recency_boost_mult: self.exposure_recency_boost_mult,
        }
    }
}
