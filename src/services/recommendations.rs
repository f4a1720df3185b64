use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;

use crate::{
    db::{ClosetRepository, HyperparamStore, RecommendationHistory},
    error::{AppError, AppResult},
    models::{
        exposure_snapshot, ClosetItem, RecommendRequest, RecommendResponse, Recommendation,
        RecommendationRecord, Weights,
    },
    services::{
        exposure::{apply_exposure_penalty, ExposureConfig, ExposureHistory},
        fallback,
        providers::{CandidateItem, Embedder, ScoreRequest, ScoredOutfits, Scorer, UserContext},
        retrieval, sampler,
    },
};

const MIN_MOOD_CHARS: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct RecommenderSettings {
    /// Candidates kept after vector retrieval
    pub retrieval_top_k: usize,
    /// Combinations requested from the scorer
    pub scorer_top_k: usize,
    /// Upper bound on each scorer/embedder call
    pub upstream_timeout: Duration,
    pub exposure: ExposureConfig,
}

impl Default for RecommenderSettings {
    fn default() -> Self {
        Self {
            retrieval_top_k: 100,
            scorer_top_k: 10,
            upstream_timeout: Duration::from_secs(5),
            exposure: ExposureConfig::default(),
        }
    }
}

/// Where a response's combinations came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationSource {
    Scorer,
    Fallback,
}

/// Recommendation orchestrator
///
/// Samples θ_used, asks the external scorer (falling back to the rule engine),
/// applies the exposure penalty, then persists the record and exposure snapshot.
pub struct Recommender {
    closet: Arc<dyn ClosetRepository>,
    hyperparams: Arc<dyn HyperparamStore>,
    history: Arc<dyn RecommendationHistory>,
    exposure: Arc<dyn ExposureHistory>,
    scorer: Arc<dyn Scorer>,
    embedder: Arc<dyn Embedder>,
    rng: Mutex<StdRng>,
    settings: RecommenderSettings,
}

impl Recommender {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        closet: Arc<dyn ClosetRepository>,
        hyperparams: Arc<dyn HyperparamStore>,
        history: Arc<dyn RecommendationHistory>,
        exposure: Arc<dyn ExposureHistory>,
        scorer: Arc<dyn Scorer>,
        embedder: Arc<dyn Embedder>,
        rng: StdRng,
        settings: RecommenderSettings,
    ) -> Self {
        Self {
            closet,
            hyperparams,
            history,
            exposure,
            scorer,
            embedder,
            rng: Mutex::new(rng),
            settings,
        }
    }

    pub async fn recommend(&self, request: RecommendRequest) -> AppResult<RecommendResponse> {
        let start = Instant::now();
        let mood = request.mood.trim().to_string();
        if mood.chars().count() < MIN_MOOD_CHARS {
            return Err(AppError::InvalidInput(format!(
                "mood must be at least {} characters",
                MIN_MOOD_CHARS
            )));
        }

        let inventory = self.closet.find_all().await?;
        if inventory.is_empty() {
            return Err(AppError::InvalidInput("The closet has no items".to_string()));
        }

        let baseline = self.hyperparams.get_baseline().await?;
        let used = self.sample_weights(&baseline.weights, baseline.sigma);

        let (recommendations, selected_items, source) =
            match self.score_with_model(&request, &mood, &inventory, &used).await {
                Ok(outfits) => (outfits.recommendations, outfits.selected_items, RecommendationSource::Scorer),
                Err(e) => {
                    if e.is_upstream() {
                        tracing::warn!(error = %e, scorer = self.scorer.name(), "Scorer unavailable, using fallback");
                    } else {
                        tracing::error!(error = %e, scorer = self.scorer.name(), "Scorer failed, using fallback");
                    }
                    let season = fallback::current_season(request.temperature);
                    let recommendations = fallback::generate_fallback(&mood, season, &inventory);
                    let selected = selected_by_category(&recommendations);
                    (recommendations, selected, RecommendationSource::Fallback)
                }
            };

        let mut recommendations =
            apply_exposure_penalty(self.exposure.as_ref(), recommendations, &self.settings.exposure).await;
        renumber(&mut recommendations);

        let record = RecommendationRecord::new(mood, request.weather(), recommendations, used);
        let recommendation_id = match self.history.save(&record).await {
            Ok(id) => Some(id.to_string()),
            Err(e) => {
                tracing::error!(error = %e, "Failed to persist recommendation record");
                None
            }
        };

        if let Err(e) = self.exposure.append(exposure_snapshot(&record.recommendations)).await {
            tracing::warn!(error = %e, "Failed to record exposure snapshot");
        }

        tracing::info!(
            recommendation_id = ?recommendation_id,
            source = ?source,
            count = record.recommendations.len(),
            processing_time_ms = start.elapsed().as_millis(),
            "Recommendation completed"
        );

        Ok(RecommendResponse {
            recommendation_id,
            selected_items,
            recommendations: record.recommendations,
        })
    }

    fn sample_weights(&self, baseline: &Weights, sigma: f64) -> Weights {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        sampler::sample(baseline, sigma, &mut *rng)
    }

    /// Candidate items for the scorer: vector-nearest to the mood text, or the
    /// whole inventory when encoding fails or no item has a usable vector.
    async fn candidates(&self, text: &str, inventory: &[ClosetItem]) -> Vec<ClosetItem> {
        let encoded = tokio::time::timeout(self.settings.upstream_timeout, self.embedder.encode_text(text)).await;
        let vector = match encoded {
            Ok(Ok(vector)) => vector,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Text encoding failed, skipping vector retrieval");
                return inventory.to_vec();
            }
            Err(_) => {
                tracing::warn!("Text encoding timed out, skipping vector retrieval");
                return inventory.to_vec();
            }
        };

        let similar = retrieval::find_similar(inventory, &vector, self.settings.retrieval_top_k);
        if similar.is_empty() {
            tracing::debug!("No items with usable vectors, using full inventory");
            return inventory.to_vec();
        }
        similar
    }

    async fn score_with_model(
        &self,
        request: &RecommendRequest,
        mood: &str,
        inventory: &[ClosetItem],
        used: &Weights,
    ) -> AppResult<ScoredOutfits> {
        let comment = request.comment.clone().unwrap_or_default();
        let text = if comment.trim().is_empty() {
            mood.to_string()
        } else {
            format!("{} {}", mood, comment.trim())
        };

        let candidates = self.candidates(&text, inventory).await;

        let score_request = ScoreRequest {
            user_context: UserContext {
                text: mood.to_string(),
                comment,
                weather: request.weather().into(),
            },
            closet_items: candidates.iter().map(CandidateItem::from).collect(),
            top_k: self.settings.scorer_top_k,
            hyperparams: *used,
        };

        let response = tokio::time::timeout(self.settings.upstream_timeout, self.scorer.score(&score_request))
            .await
            .map_err(|_| AppError::UpstreamUnavailable("Scorer timed out".to_string()))??;

        response.resolve(&candidates, mood)
    }
}

/// Ids follow the final order: `rec_1` is the first entry
fn renumber(recommendations: &mut [Recommendation]) {
    for (index, rec) in recommendations.iter_mut().enumerate() {
        rec.id = format!("rec_{}", index + 1);
    }
}

/// Distinct items of the combinations grouped by category label
fn selected_by_category(recommendations: &[Recommendation]) -> BTreeMap<String, Vec<ClosetItem>> {
    let mut selected: BTreeMap<String, Vec<ClosetItem>> = BTreeMap::new();
    for item in recommendations.iter().flat_map(Recommendation::items) {
        let group = selected.entry(item.category().to_string()).or_default();
        if !group.iter().any(|existing| existing.id == item.id) {
            group.push(item.clone());
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryClosetRepository, InMemoryHyperparamStore, InMemoryRecommendationHistory};
    use crate::models::{Category, Hyperparams, ItemAttributes, RecommendationType};
    use crate::services::exposure::InMemoryExposureHistory;
    use crate::services::providers::{MockEmbedder, MockScorer, ScoreResponse};
    use async_trait::async_trait;
    use chrono::Utc;
    use rand::SeedableRng;

    fn item(id: &str, category: Category, vector: Option<Vec<f32>>) -> ClosetItem {
        ClosetItem {
            id: id.to_string(),
            image_url: String::new(),
            attributes: ItemAttributes::new(category),
            name: None,
            tags: vec![],
            season: vec![],
            image_vector: vector,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn inventory() -> Vec<ClosetItem> {
        vec![
            item("t1", Category::Top, Some(vec![1.0, 0.0])),
            item("b1", Category::Bottom, Some(vec![0.0, 1.0])),
            item("o1", Category::Outer, None),
        ]
    }

    struct Harness {
        recommender: Recommender,
        history: Arc<InMemoryRecommendationHistory>,
        exposure: Arc<InMemoryExposureHistory>,
    }

    fn harness(scorer: Arc<dyn Scorer>, embedder: Arc<dyn Embedder>, sigma: f64) -> Harness {
        let history = Arc::new(InMemoryRecommendationHistory::new());
        let exposure = Arc::new(InMemoryExposureHistory::new(40));
        let store = InMemoryHyperparamStore::with_baseline(Hyperparams {
            sigma,
            ..Hyperparams::default()
        });
        let recommender = Recommender::new(
            Arc::new(InMemoryClosetRepository::with_items(inventory())),
            Arc::new(store),
            history.clone(),
            exposure.clone(),
            scorer,
            embedder,
            StdRng::seed_from_u64(11),
            RecommenderSettings {
                upstream_timeout: Duration::from_millis(100),
                ..RecommenderSettings::default()
            },
        );
        Harness {
            recommender,
            history,
            exposure,
        }
    }

    fn failing_scorer() -> Arc<dyn Scorer> {
        let mut scorer = MockScorer::new();
        scorer
            .expect_score()
            .returning(|_| Err(AppError::UpstreamUnavailable("down".to_string())));
        scorer.expect_name().return_const("mock");
        Arc::new(scorer)
    }

    fn failing_embedder() -> Arc<dyn Embedder> {
        let mut embedder = MockEmbedder::new();
        embedder
            .expect_encode_text()
            .returning(|_| Err(AppError::UpstreamUnavailable("down".to_string())));
        Arc::new(embedder)
    }

    fn request(mood: &str, temperature: Option<f64>) -> RecommendRequest {
        RecommendRequest {
            mood: mood.to_string(),
            comment: None,
            temperature,
            feels_like: None,
            precipitation: None,
        }
    }

    #[tokio::test]
    async fn test_short_mood_is_rejected() {
        let h = harness(failing_scorer(), failing_embedder(), 0.05);
        let result = h.recommender.recommend(request("ab", None)).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert_eq!(h.history.len().await, 0);
    }

    #[tokio::test]
    async fn test_scorer_failure_falls_back() {
        let h = harness(failing_scorer(), failing_embedder(), 0.05);
        let response = h.recommender.recommend(request("interview", Some(25.0))).await.unwrap();

        assert!(response.recommendation_id.is_some());
        assert_eq!(response.recommendations.len(), 1);
        let rec = &response.recommendations[0];
        assert_eq!(rec.kind, RecommendationType::TwoPiece);
        assert!(rec.outer.is_none());
        assert!(response.selected_items.contains_key("top"));
        assert_eq!(h.history.len().await, 1);
        assert_eq!(h.exposure.recent(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cold_fallback_adds_outer() {
        let h = harness(failing_scorer(), failing_embedder(), 0.05);
        let response = h.recommender.recommend(request("commute", Some(3.0))).await.unwrap();
        assert!(response.recommendations[0].outer.is_some());
    }

    #[tokio::test]
    async fn test_scorer_path_uses_sampled_weights_and_retrieval() {
        let mut scorer = MockScorer::new();
        scorer
            .expect_score()
            .withf(|req: &ScoreRequest| {
                // Retrieval keeps only items with vectors
                req.closet_items.len() == 2
                    && req.hyperparams == Weights::default()
                    && req.user_context.text == "minimal"
            })
            .times(1)
            .returning(|_| {
                Ok(serde_json::from_str::<ScoreResponse>(
                    r#"{ "recommendations": [ { "top_id": "t1", "bottom_id": "b1", "score": 0.91 } ],
                         "selected_items": { "top": ["t1"], "bottom": ["b1"] } }"#,
                )
                .unwrap())
            });
        scorer.expect_name().return_const("mock");

        let mut embedder = MockEmbedder::new();
        embedder
            .expect_encode_text()
            .withf(|text: &str| text == "minimal")
            .returning(|_| Ok(vec![1.0, 0.2]));

        // sigma 0 keeps θ_used equal to the baseline
        let h = harness(Arc::new(scorer), Arc::new(embedder), 0.0);
        let response = h.recommender.recommend(request("minimal", Some(18.0))).await.unwrap();

        assert_eq!(response.recommendations.len(), 1);
        assert_eq!(response.recommendations[0].score, 0.91);
        assert_eq!(response.selected_items["bottom"][0].id, "b1");
    }

    #[tokio::test]
    async fn test_malformed_scorer_payload_falls_back() {
        let mut scorer = MockScorer::new();
        scorer.expect_score().returning(|_| {
            Ok(serde_json::from_str::<ScoreResponse>(
                r#"{ "recommendations": [ { "top_id": "ghost", "bottom_id": "b1", "score": 0.9 } ] }"#,
            )
            .unwrap())
        });
        scorer.expect_name().return_const("mock");

        let h = harness(Arc::new(scorer), failing_embedder(), 0.05);
        let response = h.recommender.recommend(request("street", Some(22.0))).await.unwrap();
        assert_eq!(response.recommendations[0].top.as_ref().unwrap().id, "t1");
    }

    struct SlowScorer;

    #[async_trait]
    impl Scorer for SlowScorer {
        async fn score(&self, _request: &ScoreRequest) -> AppResult<ScoreResponse> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(AppError::Internal("unreachable".to_string()))
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_scorer_timeout_falls_back() {
        let h = harness(Arc::new(SlowScorer), failing_embedder(), 0.05);
        let started = Instant::now();
        let response = h.recommender.recommend(request("picnic", Some(24.0))).await.unwrap();
        assert!(!response.recommendations.is_empty());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    struct BrokenHistory;

    #[async_trait]
    impl RecommendationHistory for BrokenHistory {
        async fn save(&self, _record: &RecommendationRecord) -> AppResult<uuid::Uuid> {
            Err(AppError::Persistence("disk full".to_string()))
        }

        async fn find_hyperparams_used(&self, _id: uuid::Uuid) -> AppResult<Option<Weights>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_persistence_failure_returns_null_id() {
        let recommender = Recommender::new(
            Arc::new(InMemoryClosetRepository::with_items(inventory())),
            Arc::new(InMemoryHyperparamStore::new()),
            Arc::new(BrokenHistory),
            Arc::new(InMemoryExposureHistory::new(10)),
            failing_scorer(),
            failing_embedder(),
            StdRng::seed_from_u64(5),
            RecommenderSettings::default(),
        );
        let response = recommender.recommend(request("gallery", Some(15.0))).await.unwrap();
        assert_eq!(response.recommendation_id, None);
        assert!(!response.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_record_stores_sampled_weights_within_bounds() {
        let h = harness(failing_scorer(), failing_embedder(), 2.0);
        let response = h.recommender.recommend(request("festival", Some(30.0))).await.unwrap();
        let id = uuid::Uuid::parse_str(response.recommendation_id.as_deref().unwrap()).unwrap();
        let used = h.history.find_hyperparams_used(id).await.unwrap().unwrap();
        assert!(used.is_within_bounds());
    }

    struct BrokenScorer;

    #[async_trait]
    impl Scorer for BrokenScorer {
        async fn score(&self, _request: &ScoreRequest) -> AppResult<ScoreResponse> {
            Err(AppError::Internal("scorer panicked".to_string()))
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_non_upstream_scorer_error_still_falls_back() {
        let h = harness(Arc::new(BrokenScorer), failing_embedder(), 0.05);
        let response = h.recommender.recommend(request("museum", Some(23.0))).await.unwrap();
        assert_eq!(response.recommendations.len(), 1);
        assert_eq!(response.recommendations[0].id, "rec_1");
    }

    #[tokio::test]
    async fn test_ids_follow_order_after_exposure_rerank() {
        let exposure = Arc::new(InMemoryExposureHistory::new(40));
        exposure.append(vec![vec!["t1".to_string()]]).await.unwrap();

        let recommender = Recommender::new(
            Arc::new(InMemoryClosetRepository::with_items(vec![
                item("t1", Category::Top, None),
                item("t2", Category::Top, None),
                item("b1", Category::Bottom, None),
            ])),
            Arc::new(InMemoryHyperparamStore::new()),
            Arc::new(InMemoryRecommendationHistory::new()),
            exposure,
            failing_scorer(),
            failing_embedder(),
            StdRng::seed_from_u64(3),
            RecommenderSettings::default(),
        );

        // Fallback scores (t1,b1) 0.90 and (t2,b1) 0.87; recent exposure of t1 flips them
        let response = recommender.recommend(request("library", Some(24.0))).await.unwrap();
        let recs = &response.recommendations;
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].id, "rec_1");
        assert_eq!(recs[0].top.as_ref().unwrap().id, "t2");
        assert_eq!(recs[1].id, "rec_2");
        assert_eq!(recs[1].top.as_ref().unwrap().id, "t1");
        assert!(recs[0].score >= recs[1].score);
    }

    #[tokio::test]
    async fn test_empty_closet_is_rejected() {
        let recommender = Recommender::new(
            Arc::new(InMemoryClosetRepository::new()),
            Arc::new(InMemoryHyperparamStore::new()),
            Arc::new(InMemoryRecommendationHistory::new()),
            Arc::new(InMemoryExposureHistory::new(10)),
            failing_scorer(),
            failing_embedder(),
            StdRng::seed_from_u64(5),
            RecommenderSettings::default(),
        );
        let result = recommender.recommend(request("gallery", None)).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
