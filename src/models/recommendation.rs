use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ClosetItem, Weights};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    TwoPiece,
    Dress,
}

/// One outfit combination returned to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RecommendationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<ClosetItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<ClosetItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dress: Option<ClosetItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outer: Option<ClosetItem>,
    pub score: f64,
    pub reason: String,
}

impl Recommendation {
    /// Items in slot order
    pub fn items(&self) -> impl Iterator<Item = &ClosetItem> {
        [&self.top, &self.bottom, &self.dress, &self.outer]
            .into_iter()
            .flatten()
    }

    /// Distinct item IDs referenced by this combination
    pub fn item_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::with_capacity(4);
        for item in self.items() {
            if !ids.contains(&item.id) {
                ids.push(item.id.clone());
            }
        }
        ids
    }
}

/// Weather context supplied with a recommendation request
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub feels_like: Option<f64>,
    #[serde(default)]
    pub precipitation: Option<f64>,
}

/// Persisted result of one recommendation call. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub id: Uuid,
    pub mood: String,
    pub weather: WeatherSnapshot,
    pub recommendations: Vec<Recommendation>,
    /// The sampled weights, not the baseline
    pub hyperparams_used: Weights,
    pub created_at: DateTime<Utc>,
}

impl RecommendationRecord {
    pub fn new(
        mood: String,
        weather: WeatherSnapshot,
        recommendations: Vec<Recommendation>,
        hyperparams_used: Weights,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            mood,
            weather,
            recommendations,
            hyperparams_used,
            created_at: Utc::now(),
        }
    }
}

/// Item IDs shown by one recommendation call, one entry per combination
pub type ExposureSnapshot = Vec<Vec<String>>;

pub fn exposure_snapshot(recommendations: &[Recommendation]) -> ExposureSnapshot {
    recommendations.iter().map(Recommendation::item_ids).collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendRequest {
    #[serde(default)]
    pub mood: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub feels_like: Option<f64>,
    #[serde(default)]
    pub precipitation: Option<f64>,
}

impl RecommendRequest {
    pub fn weather(&self) -> WeatherSnapshot {
        WeatherSnapshot {
            temperature: self.temperature,
            feels_like: self.feels_like,
            precipitation: self.precipitation,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub recommendation_id: Option<String>,
    #[serde(rename = "selectedItems")]
    pub selected_items: BTreeMap<String, Vec<ClosetItem>>,
    pub recommendations: Vec<Recommendation>,
}

/// Feedback body as received; field types are checked by the handler
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub recommendation_id: Option<String>,
    #[serde(default)]
    pub liked: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub ok: bool,
    pub updated: Weights,
}
