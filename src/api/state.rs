use std::sync::Arc;

use rand::{rngs::StdRng, SeedableRng};

use crate::{
    db::{
        ClosetRepository, HyperparamStore, InMemoryClosetRepository, InMemoryHyperparamStore,
        InMemoryRecommendationHistory, RecommendationHistory,
    },
    services::{
        exposure::{ExposureHistory, InMemoryExposureHistory},
        providers::{Embedder, Scorer},
        Recommender, RecommenderSettings,
    },
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub closet: Arc<dyn ClosetRepository>,
    pub hyperparams: Arc<dyn HyperparamStore>,
    pub history: Arc<dyn RecommendationHistory>,
    pub embedder: Arc<dyn Embedder>,
    pub recommender: Arc<Recommender>,
}

/// Collaborators the state is assembled from
pub struct Backends {
    pub closet: Arc<dyn ClosetRepository>,
    pub hyperparams: Arc<dyn HyperparamStore>,
    pub history: Arc<dyn RecommendationHistory>,
    pub exposure: Arc<dyn ExposureHistory>,
    pub scorer: Arc<dyn Scorer>,
    pub embedder: Arc<dyn Embedder>,
}

impl AppState {
    pub fn new(backends: Backends, settings: RecommenderSettings, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let recommender = Recommender::new(
            backends.closet.clone(),
            backends.hyperparams.clone(),
            backends.history.clone(),
            backends.exposure,
            backends.scorer,
            backends.embedder.clone(),
            rng,
            settings,
        );

        Self {
            closet: backends.closet,
            hyperparams: backends.hyperparams,
            history: backends.history,
            embedder: backends.embedder,
            recommender: Arc::new(recommender),
        }
    }

    /// Process-local stores around the given providers
    pub fn in_memory(
        scorer: Arc<dyn Scorer>,
        embedder: Arc<dyn Embedder>,
        settings: RecommenderSettings,
        seed: Option<u64>,
    ) -> Self {
        let backends = Backends {
            closet: Arc::new(InMemoryClosetRepository::new()),
            hyperparams: Arc::new(InMemoryHyperparamStore::new()),
            history: Arc::new(InMemoryRecommendationHistory::new()),
            exposure: Arc::new(InMemoryExposureHistory::new(settings.exposure.lookback)),
            scorer,
            embedder,
        };
        Self::new(backends, settings, seed)
    }
}
