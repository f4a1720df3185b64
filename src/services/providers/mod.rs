//! External model services
//!
//! The outfit scorer ranks combinations from candidate items and the sampled
//! weights; the embedder turns mood text and garment images into vectors. Both
//! are optional collaborators: every failure surfaces as
//! `AppError::UpstreamUnavailable` and the caller degrades locally.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::{
        ClosetItem, ItemAttributes, Recommendation, RecommendationType, Season, WeatherSnapshot,
        Weights,
    },
    services::fallback::generate_reason,
};

pub mod clip;
pub mod ml_scorer;

pub use clip::{CachedEmbedder, ClipEmbedder};
pub use ml_scorer::MlScorer;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, request: &ScoreRequest) -> AppResult<ScoreResponse>;

    fn name(&self) -> &'static str;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    async fn encode_text(&self, text: &str) -> AppResult<Vec<f32>>;

    async fn encode_image(&self, image: Vec<u8>, file_name: String) -> AppResult<Vec<f32>>;
}

// ============================================================================
// Scorer wire types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct UserContext {
    pub text: String,
    pub comment: String,
    pub weather: WeatherPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeatherPayload {
    pub temperature: f64,
    pub feels_like: f64,
    pub precipitation: f64,
}

impl From<WeatherSnapshot> for WeatherPayload {
    fn from(weather: WeatherSnapshot) -> Self {
        Self {
            temperature: weather.temperature.unwrap_or(0.0),
            feels_like: weather.feels_like.unwrap_or(0.0),
            precipitation: weather.precipitation.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateItem {
    pub id: String,
    pub vector: Option<Vec<f32>>,
    pub attributes: ItemAttributes,
    pub season: Vec<Season>,
}

impl From<&ClosetItem> for CandidateItem {
    fn from(item: &ClosetItem) -> Self {
        Self {
            id: item.id.clone(),
            vector: item.image_vector.clone(),
            attributes: item.attributes.clone(),
            season: item.season.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreRequest {
    pub user_context: UserContext,
    pub closet_items: Vec<CandidateItem>,
    pub top_k: usize,
    pub hyperparams: Weights,
}

/// Ranked combination as sent by the scorer
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredCombination {
    #[serde(rename = "type", default)]
    pub kind: Option<RecommendationType>,
    #[serde(default)]
    pub top_id: Option<String>,
    #[serde(default)]
    pub bottom_id: Option<String>,
    #[serde(default)]
    pub dress_id: Option<String>,
    #[serde(default)]
    pub outer_id: Option<String>,
    pub score: f64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoreResponse {
    pub recommendations: Vec<ScoredCombination>,
    #[serde(default)]
    pub selected_items: HashMap<String, Vec<String>>,
}

/// Validated scorer output resolved against the candidate items
#[derive(Debug, Clone)]
pub struct ScoredOutfits {
    pub recommendations: Vec<Recommendation>,
    pub selected_items: BTreeMap<String, Vec<ClosetItem>>,
}

fn malformed(message: impl Into<String>) -> AppError {
    AppError::UpstreamUnavailable(format!("Malformed scorer response: {}", message.into()))
}

impl ScoreResponse {
    /// Resolves item IDs against `candidates`. Unknown IDs, wrong slots for the
    /// combination type, or scores outside [0, 1] reject the whole response.
    pub fn resolve(self, candidates: &[ClosetItem], mood: &str) -> AppResult<ScoredOutfits> {
        if self.recommendations.is_empty() {
            return Err(malformed("no recommendations"));
        }

        let by_id: HashMap<&str, &ClosetItem> =
            candidates.iter().map(|item| (item.id.as_str(), item)).collect();
        let lookup = |slot: &str, id: &Option<String>| -> AppResult<Option<ClosetItem>> {
            match id {
                None => Ok(None),
                Some(id) => by_id
                    .get(id.as_str())
                    .map(|item| Some((*item).clone()))
                    .ok_or_else(|| malformed(format!("unknown {} item {}", slot, id))),
            }
        };

        let mut recommendations = Vec::with_capacity(self.recommendations.len());
        for (index, combo) in self.recommendations.iter().enumerate() {
            if !combo.score.is_finite() || !(0.0..=1.0).contains(&combo.score) {
                return Err(malformed(format!("score {} out of range", combo.score)));
            }

            let kind = combo.kind.unwrap_or(if combo.dress_id.is_some() && combo.top_id.is_none() {
                RecommendationType::Dress
            } else {
                RecommendationType::TwoPiece
            });

            let top = lookup("top", &combo.top_id)?;
            let bottom = lookup("bottom", &combo.bottom_id)?;
            let dress = lookup("dress", &combo.dress_id)?;
            let outer = lookup("outer", &combo.outer_id)?;

            let complete = match kind {
                RecommendationType::TwoPiece => top.is_some() && bottom.is_some() && dress.is_none(),
                RecommendationType::Dress => dress.is_some() && top.is_none() && bottom.is_none(),
            };
            if !complete {
                return Err(malformed(format!("combination {} has the wrong slots", index)));
            }

            recommendations.push(Recommendation {
                id: format!("rec_{}", index + 1),
                kind,
                top,
                bottom,
                dress,
                outer,
                score: combo.score,
                reason: combo
                    .reason
                    .clone()
                    .filter(|reason| !reason.trim().is_empty())
                    .unwrap_or_else(|| generate_reason(mood, combo.score)),
            });
        }

        let mut selected_items: BTreeMap<String, Vec<ClosetItem>> = BTreeMap::new();
        for (label, ids) in self.selected_items {
            let items: Vec<ClosetItem> = ids
                .iter()
                .filter_map(|id| by_id.get(id.as_str()).map(|item| (*item).clone()))
                .collect();
            if items.len() != ids.len() {
                tracing::debug!(label = %label, "Dropped unknown selected item IDs");
            }
            if !items.is_empty() {
                selected_items.insert(label, items);
            }
        }

        Ok(ScoredOutfits {
            recommendations,
            selected_items,
        })
    }
}
