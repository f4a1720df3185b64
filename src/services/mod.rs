pub mod exposure;
pub mod fallback;
pub mod feedback;
pub mod providers;
pub mod recommendations;
pub mod retrieval;
pub mod sampler;

pub use recommendations::{RecommendationSource, Recommender, RecommenderSettings};
