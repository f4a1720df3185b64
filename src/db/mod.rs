pub mod closet;
pub mod history;
pub mod hyperparams;
pub mod postgres;
pub mod redis;

pub use closet::{ClosetRepository, InMemoryClosetRepository, PostgresClosetRepository};
pub use history::{
    InMemoryRecommendationHistory, PostgresRecommendationHistory, RecommendationHistory,
};
pub use hyperparams::{HyperparamStore, InMemoryHyperparamStore, PostgresHyperparamStore};
pub use self::postgres::create_pool;
pub use self::redis::{create_redis_client, Cache, CacheKey, CacheWriterHandle};
