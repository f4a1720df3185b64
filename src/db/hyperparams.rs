use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{Hyperparams, Weights},
};

/// Storage for the single baseline θ record
///
/// The read-modify-write in [`HyperparamStore::update_baseline`] is atomic per
/// implementation, so concurrent feedback cannot lose an update.
#[async_trait]
pub trait HyperparamStore: Send + Sync {
    /// Current baseline, creating the default record on first use
    async fn get_baseline(&self) -> AppResult<Hyperparams>;

    /// Replaces the five weights with `update(current)`. `sigma` and `eta` are untouched.
    async fn update_baseline(
        &self,
        update: &(dyn for<'a> Fn(&'a Hyperparams) -> Weights + Send + Sync),
    ) -> AppResult<Weights>;
}

fn checked(weights: Weights) -> AppResult<Weights> {
    if !weights.is_within_bounds() {
        return Err(AppError::Internal(format!(
            "Refusing to persist out-of-bounds hyperparameters: {:?}",
            weights
        )));
    }
    Ok(weights)
}

/// Process-local baseline, reset on restart
#[derive(Default)]
pub struct InMemoryHyperparamStore {
    baseline: RwLock<Option<Hyperparams>>,
}

impl InMemoryHyperparamStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baseline(baseline: Hyperparams) -> Self {
        Self {
            baseline: RwLock::new(Some(baseline)),
        }
    }
}

#[async_trait]
impl HyperparamStore for InMemoryHyperparamStore {
    async fn get_baseline(&self) -> AppResult<Hyperparams> {
        if let Some(baseline) = *self.baseline.read().await {
            return Ok(baseline);
        }
        let mut guard = self.baseline.write().await;
        Ok(*guard.get_or_insert_with(Hyperparams::default))
    }

    async fn update_baseline(
        &self,
        update: &(dyn for<'a> Fn(&'a Hyperparams) -> Weights + Send + Sync),
    ) -> AppResult<Weights> {
        // Write lock held across read and write
        let mut guard = self.baseline.write().await;
        let current = guard.get_or_insert_with(Hyperparams::default);
        let weights = checked(update(current))?;
        current.weights = weights;
        Ok(weights)
    }
}

#[derive(sqlx::FromRow)]
struct HyperparamsRow {
    alpha_tb: f64,
    alpha_oi: f64,
    mmr_lambda: f64,
    beta_tb: f64,
    lambda_tbset: f64,
    sigma: f64,
    eta: f64,
}

impl From<HyperparamsRow> for Hyperparams {
    fn from(row: HyperparamsRow) -> Self {
        Hyperparams {
            weights: Weights {
                alpha_tb: row.alpha_tb,
                alpha_oi: row.alpha_oi,
                mmr_lambda: row.mmr_lambda,
                beta_tb: row.beta_tb,
                lambda_tbset: row.lambda_tbset,
            },
            sigma: row.sigma,
            eta: row.eta,
        }
    }
}

/// Baseline stored as the singleton row of `user_hyperparams`
pub struct PostgresHyperparamStore {
    pool: PgPool,
}

impl PostgresHyperparamStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ENSURE_ROW: &str = "INSERT INTO user_hyperparams (id) VALUES (1) ON CONFLICT (id) DO NOTHING";

const SELECT_ROW: &str = r#"
    SELECT alpha_tb, alpha_oi, mmr_lambda, beta_tb, lambda_tbset, sigma, eta
    FROM user_hyperparams
    WHERE id = 1
"#;

#[async_trait]
impl HyperparamStore for PostgresHyperparamStore {
    async fn get_baseline(&self) -> AppResult<Hyperparams> {
        sqlx::query(ENSURE_ROW).execute(&self.pool).await?;
        let row: HyperparamsRow = sqlx::query_as(SELECT_ROW).fetch_one(&self.pool).await?;
        Ok(row.into())
    }

    async fn update_baseline(
        &self,
        update: &(dyn for<'a> Fn(&'a Hyperparams) -> Weights + Send + Sync),
    ) -> AppResult<Weights> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(ENSURE_ROW).execute(&mut *tx).await?;
        let row: HyperparamsRow = sqlx::query_as(&format!("{} FOR UPDATE", SELECT_ROW))
            .fetch_one(&mut *tx)
            .await?;
        let current: Hyperparams = row.into();
        let weights = checked(update(&current))?;

        sqlx::query(
            r#"
            UPDATE user_hyperparams
            SET
                alpha_tb     = $1,
                alpha_oi     = $2,
                mmr_lambda   = $3,
                beta_tb      = $4,
                lambda_tbset = $5,
                updated_at   = NOW()
            WHERE id = 1
            "#,
        )
        .bind(weights.alpha_tb)
        .bind(weights.alpha_oi)
        .bind(weights.mmr_lambda)
        .bind(weights.beta_tb)
        .bind(weights.lambda_tbset)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(?weights, "Persisted hyperparameter baseline");
        Ok(weights)
    }
}
