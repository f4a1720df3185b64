use uuid::Uuid;

use crate::{
    db::{HyperparamStore, RecommendationHistory},
    error::{AppError, AppResult},
    models::{Hyperparams, Weights},
};

/// One learning step: θ_new = clip(θ ± η·(θ_used − θ)).
///
/// Liked moves each weight toward `used`, disliked moves it away by the same
/// pre-clip magnitude.
pub fn learn_step(baseline: &Hyperparams, used: &Weights, liked: bool) -> Weights {
    let sign = if liked { 1.0 } else { -1.0 };
    let eta = baseline.eta;
    Weights::from_fn(|key| {
        let current = baseline.weights.get(key);
        let diff = used.get(key) - current;
        current + sign * eta * diff
    })
}

/// Applies like/dislike feedback for a past recommendation to the baseline.
///
/// The update anchors on the baseline at feedback time, read and written under
/// the store's atomic update.
pub async fn apply_feedback(
    history: &dyn RecommendationHistory,
    store: &dyn HyperparamStore,
    recommendation_id: &str,
    liked: bool,
) -> AppResult<Weights> {
    let not_found = || AppError::NotFound(format!("Recommendation {}", recommendation_id));

    let id = Uuid::parse_str(recommendation_id).map_err(|_| not_found())?;
    let used = history
        .find_hyperparams_used(id)
        .await?
        .ok_or_else(not_found)?;

    let updated = store
        .update_baseline(&move |baseline| learn_step(baseline, &used, liked))
        .await?;

    tracing::info!(
        recommendation_id = %id,
        liked,
        alpha_tb = updated.alpha_tb,
        alpha_oi = updated.alpha_oi,
        mmr_lambda = updated.mmr_lambda,
        beta_tb = updated.beta_tb,
        lambda_tbset = updated.lambda_tbset,
        "Applied recommendation feedback"
    );

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryHyperparamStore, InMemoryRecommendationHistory};
    use crate::models::{RecommendationRecord, WeatherSnapshot, WeightKey};

    fn baseline() -> Hyperparams {
        Hyperparams {
            weights: Weights {
                alpha_tb: 0.5,
                alpha_oi: 0.5,
                mmr_lambda: 0.5,
                beta_tb: 0.5,
                lambda_tbset: 0.1,
            },
            sigma: 0.05,
            eta: 0.5,
        }
    }

    fn used() -> Weights {
        Weights {
            alpha_tb: 0.7,
            alpha_oi: 0.3,
            mmr_lambda: 0.5,
            beta_tb: 0.6,
            lambda_tbset: 0.2,
        }
    }

    #[test]
    fn test_liked_moves_toward_used() {
        let base = baseline();
        let new = learn_step(&base, &used(), true);
        assert!((new.alpha_tb - 0.6).abs() < 1e-12);
        assert!((new.alpha_oi - 0.4).abs() < 1e-12);
        assert_eq!(new.mmr_lambda, 0.5);
        for key in WeightKey::ALL {
            let before = (used().get(key) - base.weights.get(key)).abs();
            let after = (used().get(key) - new.get(key)).abs();
            assert!(after <= before);
        }
    }

    #[test]
    fn test_disliked_moves_away_symmetrically() {
        let base = baseline();
        let liked = learn_step(&base, &used(), true);
        let disliked = learn_step(&base, &used(), false);
        assert!((disliked.alpha_tb - 0.4).abs() < 1e-12);
        assert!((disliked.alpha_oi - 0.6).abs() < 1e-12);
        for key in [WeightKey::AlphaTb, WeightKey::AlphaOi, WeightKey::BetaTb] {
            let up = liked.get(key) - base.weights.get(key);
            let down = base.weights.get(key) - disliked.get(key);
            assert!((up - down).abs() < 1e-12);
        }
    }

    #[test]
    fn test_disliked_is_clipped_at_bound() {
        let mut base = baseline();
        base.weights.lambda_tbset = 0.01;
        base.eta = 1.0;
        let used = Weights {
            lambda_tbset: 0.3,
            ..base.weights
        };
        let new = learn_step(&base, &used, false);
        assert_eq!(new.lambda_tbset, 0.0);
    }

    #[test]
    fn test_repeated_likes_approach_without_overshoot() {
        let mut base = baseline();
        let target = used();
        for _ in 0..50 {
            base.weights = learn_step(&base, &target, true);
            assert!(base.weights.alpha_tb <= target.alpha_tb + 1e-12);
        }
        assert!((base.weights.alpha_tb - target.alpha_tb).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_apply_feedback_updates_store() {
        let history = InMemoryRecommendationHistory::new();
        let store = InMemoryHyperparamStore::with_baseline(baseline());
        let record =
            RecommendationRecord::new("minimal".to_string(), WeatherSnapshot::default(), vec![], used());
        history.save(&record).await.unwrap();

        let updated = apply_feedback(&history, &store, &record.id.to_string(), true)
            .await
            .unwrap();
        assert!((updated.alpha_tb - 0.6).abs() < 1e-12);

        let stored = store.get_baseline().await.unwrap();
        assert_eq!(stored.weights, updated);
        assert_eq!(stored.eta, 0.5);
    }

    #[tokio::test]
    async fn test_apply_feedback_unknown_or_malformed_id() {
        let history = InMemoryRecommendationHistory::new();
        let store = InMemoryHyperparamStore::with_baseline(baseline());

        let unknown = apply_feedback(&history, &store, &Uuid::new_v4().to_string(), true).await;
        assert!(matches!(unknown, Err(AppError::NotFound(_))));

        let malformed = apply_feedback(&history, &store, "rec_1", false).await;
        assert!(matches!(malformed, Err(AppError::NotFound(_))));

        assert_eq!(store.get_baseline().await.unwrap(), baseline());
    }
}
