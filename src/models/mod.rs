pub mod closet;
pub mod hyperparams;
pub mod recommendation;

pub use closet::{Category, ClosetItem, ItemAttributes, NewClosetItem, Season, WeightedLabel};
pub use hyperparams::{Hyperparams, WeightKey, Weights};
pub use recommendation::{
    exposure_snapshot, ExposureSnapshot, FeedbackRequest, FeedbackResponse, Recommendation,
    RecommendationRecord, RecommendationType, RecommendRequest, RecommendResponse,
    WeatherSnapshot,
};
