use async_trait::async_trait;

use crate::check::{WindowCheck, WindowCheckUpsert};
use crate::observation::{NewPriceObservation, PriceObservation};

pub type RepositoryError = Box<dyn std::error::Error + Send + Sync>;

/// Repository trait for recheck history access
#[async_trait]
pub trait WindowCheckRepository: Send + Sync {
    /// Batched lookup; keys without history are simply absent from the result.
    async fn find_by_provider_and_window_keys(
        &self,
        provider: &str,
        window_keys: &[String],
    ) -> Result<Vec<WindowCheck>, RepositoryError>;

    /// Upsert by `(provider, window_key)`. Either the whole batch is
    /// committed or none of it is.
    ///
    /// An update only applies on top of the count it was computed from
    /// (`check_count - 1`); a record moved on by another writer fails the
    /// batch.
    async fn save_all(&self, checks: &[WindowCheckUpsert]) -> Result<(), RepositoryError>;
}

/// Append-only price history
#[async_trait]
pub trait PriceObservationRepository: Send + Sync {
    /// Inserts the whole batch or none of it.
    async fn insert_all(&self, observations: &[NewPriceObservation]) -> Result<(), RepositoryError>;

    /// Oldest first.
    async fn find_by_window_key(
        &self,
        provider: &str,
        window_key: &str,
    ) -> Result<Vec<PriceObservation>, RepositoryError>;
}
