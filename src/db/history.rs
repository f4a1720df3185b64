use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{RecommendationRecord, Weights},
};

/// Append-only log of recommendation calls
#[async_trait]
pub trait RecommendationHistory: Send + Sync {
    async fn save(&self, record: &RecommendationRecord) -> AppResult<Uuid>;

    /// θ_used of a past recommendation, `None` if the ID is unknown
    async fn find_hyperparams_used(&self, id: Uuid) -> AppResult<Option<Weights>>;
}

#[derive(Default)]
pub struct InMemoryRecommendationHistory {
    records: RwLock<HashMap<Uuid, RecommendationRecord>>,
}

impl InMemoryRecommendationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl RecommendationHistory for InMemoryRecommendationHistory {
    async fn save(&self, record: &RecommendationRecord) -> AppResult<Uuid> {
        self.records.write().await.insert(record.id, record.clone());
        Ok(record.id)
    }

    async fn find_hyperparams_used(&self, id: Uuid) -> AppResult<Option<Weights>> {
        Ok(self
            .records
            .read()
            .await
            .get(&id)
            .map(|record| record.hyperparams_used))
    }
}

pub struct PostgresRecommendationHistory {
    pool: PgPool,
}

impl PostgresRecommendationHistory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecommendationHistory for PostgresRecommendationHistory {
    async fn save(&self, record: &RecommendationRecord) -> AppResult<Uuid> {
        sqlx::query(
            r#"
            INSERT INTO recommendation_history
                (id, mood, weather_data, recommended_items, hyperparams_used, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(&record.mood)
        .bind(Json(&record.weather))
        .bind(Json(&record.recommendations))
        .bind(Json(&record.hyperparams_used))
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(record.id)
    }

    async fn find_hyperparams_used(&self, id: Uuid) -> AppResult<Option<Weights>> {
        let row: Option<(Option<Json<Weights>>,)> = sqlx::query_as(
            "SELECT hyperparams_used FROM recommendation_history WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(used,)| used).map(|Json(weights)| weights))
    }
}
