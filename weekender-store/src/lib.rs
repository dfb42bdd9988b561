pub mod app_config;
pub mod database;
pub mod memory_repo;
pub mod price_observation_repo;
pub mod redis_repo;
pub mod window_check_repo;

pub use app_config::Config;
pub use database::DbClient;
pub use memory_repo::{InMemoryPriceObservationRepository, InMemoryWindowCheckRepository};
pub use price_observation_repo::PostgresPriceObservationRepository;
pub use redis_repo::RedisClient;
pub use window_check_repo::PostgresWindowCheckRepository;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Window check {window_key} at {provider} was updated concurrently")]
    ConcurrentUpdate { provider: String, window_key: String },
}
