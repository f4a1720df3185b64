//! Recent-exposure penalty
//!
//! Items shown in recent recommendation calls are penalized so the same pieces
//! do not keep resurfacing. Each past call is a snapshot; its weight decays with
//! age (half-life in calls) and is boosted for the last few calls.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};
use serde_json::Value;
use sqlx::{types::Json, PgPool};
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{ExposureSnapshot, Recommendation},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureConfig {
    /// Snapshots considered, most recent first
    pub lookback: usize,
    pub penalty_per_hit: f64,
    pub max_penalty: f64,
    pub min_score: f64,
    /// Age (in snapshots) at which weight halves
    pub half_life: f64,
    /// Snapshots younger than this get `recency_boost_mult`
    pub recency_boost_n: usize,
    pub recency_boost_mult: f64,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            lookback: 40,
            penalty_per_hit: 0.08,
            max_penalty: 0.6,
            min_score: 0.0,
            half_life: 8.0,
            recency_boost_n: 3,
            recency_boost_mult: 1.8,
        }
    }
}

impl ExposureConfig {
    fn effective_lookback(&self) -> usize {
        self.lookback.max(1)
    }
}

/// Weight of a snapshot `age` calls old
pub fn snapshot_weight(age: usize, config: &ExposureConfig) -> f64 {
    let half_life = config.half_life.max(1.0);
    let decay = (-std::f64::consts::LN_2 * age as f64 / half_life).exp();
    let boost = if age < config.recency_boost_n {
        config.recency_boost_mult
    } else {
        1.0
    };
    boost * decay
}

/// Decayed exposure mass per item ID. `snapshots` is ordered most recent first.
pub fn compute_exposure_counts(
    snapshots: &[ExposureSnapshot],
    config: &ExposureConfig,
) -> HashMap<String, f64> {
    let mut counts: HashMap<String, f64> = HashMap::new();

    for (age, snapshot) in snapshots.iter().take(config.effective_lookback()).enumerate() {
        let weight = snapshot_weight(age, config);
        for combination in snapshot {
            for item_id in combination {
                *counts.entry(item_id.clone()).or_insert(0.0) += weight;
            }
        }
    }

    counts
}

/// Lowers each score by its items' exposure and re-sorts, best first.
///
/// Ties keep their original order. With one or zero recommendations, or no
/// exposure data, the input is returned untouched.
pub fn rerank(
    recommendations: Vec<Recommendation>,
    exposure: &HashMap<String, f64>,
    config: &ExposureConfig,
) -> Vec<Recommendation> {
    if recommendations.len() <= 1 || exposure.is_empty() {
        return recommendations;
    }

    let mut adjusted: Vec<Recommendation> = recommendations
        .into_iter()
        .map(|mut rec| {
            let hits: f64 = rec
                .item_ids()
                .iter()
                .map(|id| exposure.get(id).copied().unwrap_or(0.0))
                .sum();
            let penalty = (hits * config.penalty_per_hit).min(config.max_penalty);
            rec.score = (rec.score - penalty).max(config.min_score);
            rec
        })
        .collect();

    // sort_by is stable
    adjusted.sort_by(|a, b| b.score.total_cmp(&a.score));
    adjusted
}

/// Bounded history of exposure snapshots
#[async_trait]
pub trait ExposureHistory: Send + Sync {
    async fn append(&self, snapshot: ExposureSnapshot) -> AppResult<()>;

    /// Up to `lookback` snapshots, most recent first
    async fn recent(&self, lookback: usize) -> AppResult<Vec<ExposureSnapshot>>;
}

/// Reranks with the history's current exposure. Any failure is logged and the
/// unpenalized ranking is returned.
pub async fn apply_exposure_penalty(
    history: &dyn ExposureHistory,
    recommendations: Vec<Recommendation>,
    config: &ExposureConfig,
) -> Vec<Recommendation> {
    if recommendations.len() <= 1 {
        return recommendations;
    }

    let snapshots = match history.recent(config.effective_lookback()).await {
        Ok(snapshots) => snapshots,
        Err(e) => {
            tracing::warn!(error = %e, "Recent exposure penalty skipped");
            return recommendations;
        }
    };

    let exposure = compute_exposure_counts(&snapshots, config);
    tracing::debug!(
        snapshots = snapshots.len(),
        exposed_items = exposure.len(),
        "Computed exposure counts"
    );
    rerank(recommendations, &exposure, config)
}

/// Process-local ring buffer.
///
/// Not durable: it is empty after a restart, and each instance has its own.
/// Use [`RedisExposureHistory`] when running more than one instance.
pub struct InMemoryExposureHistory {
    capacity: usize,
    snapshots: RwLock<VecDeque<ExposureSnapshot>>,
}

impl InMemoryExposureHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            snapshots: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }
}

#[async_trait]
impl ExposureHistory for InMemoryExposureHistory {
    async fn append(&self, snapshot: ExposureSnapshot) -> AppResult<()> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.push_front(snapshot);
        snapshots.truncate(self.capacity);
        Ok(())
    }

    async fn recent(&self, lookback: usize) -> AppResult<Vec<ExposureSnapshot>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots.iter().take(lookback).cloned().collect())
    }
}

const REDIS_EXPOSURE_KEY: &str = "exposure:snapshots";

/// Shared history kept in a Redis list, newest at the head
pub struct RedisExposureHistory {
    client: RedisClient,
    capacity: usize,
}

impl RedisExposureHistory {
    pub fn new(client: RedisClient, capacity: usize) -> Self {
        Self {
            client,
            capacity: capacity.max(1),
        }
    }
}

#[async_trait]
impl ExposureHistory for RedisExposureHistory {
    async fn append(&self, snapshot: ExposureSnapshot) -> AppResult<()> {
        let json = serde_json::to_string(&snapshot)
            .map_err(|e| AppError::Internal(format!("Snapshot serialization error: {}", e)))?;

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = redis::pipe()
            .atomic()
            .lpush(REDIS_EXPOSURE_KEY, json)
            .ignore()
            .ltrim(REDIS_EXPOSURE_KEY, 0, self.capacity as isize - 1)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn recent(&self, lookback: usize) -> AppResult<Vec<ExposureSnapshot>> {
        if lookback == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Vec<String> = conn
            .lrange(REDIS_EXPOSURE_KEY, 0, lookback as isize - 1)
            .await?;

        Ok(raw
            .iter()
            .filter_map(|json| match serde_json::from_str::<ExposureSnapshot>(json) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed exposure snapshot");
                    None
                }
            })
            .collect())
    }
}

/// Exposure read back from `recommendation_history`.
///
/// The history row written for each recommendation already holds its
/// combinations, so `append` has nothing to do.
pub struct PostgresExposureHistory {
    pool: PgPool,
}

impl PostgresExposureHistory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ITEM_SLOTS: [&str; 4] = ["top", "bottom", "dress", "outer"];

/// Distinct item IDs of a stored combination, from either nested items or `*_id` fields
fn stored_item_ids(combination: &Value) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for slot in ITEM_SLOTS {
        let nested = combination.get(slot).and_then(|item| item.get("id"));
        let flat = combination.get(format!("{}_id", slot));
        for id in [nested, flat].into_iter().flatten().filter_map(Value::as_str) {
            if !ids.iter().any(|seen| seen == id) {
                ids.push(id.to_string());
            }
        }
    }
    ids
}

#[async_trait]
impl ExposureHistory for PostgresExposureHistory {
    async fn append(&self, _snapshot: ExposureSnapshot) -> AppResult<()> {
        Ok(())
    }

    async fn recent(&self, lookback: usize) -> AppResult<Vec<ExposureSnapshot>> {
        let rows: Vec<(Option<Json<Value>>,)> = sqlx::query_as(
            r#"
            SELECT recommended_items
            FROM recommendation_history
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(lookback as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(items,)| match items {
                Some(Json(Value::Array(combinations))) => {
                    combinations.iter().map(stored_item_ids).collect()
                }
                _ => Vec::new(),
            })
            .collect())
    }
}
