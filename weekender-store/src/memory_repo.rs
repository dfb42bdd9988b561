use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use weekender_core::{
    NewPriceObservation, PriceObservation, PriceObservationRepository, RepositoryError, WindowCheck,
    WindowCheckRepository, WindowCheckUpsert,
};

use crate::StoreError;

/// Process-local recheck history for dry runs and tests.
///
/// A batch is applied under a single write lock, so readers never observe a
/// half-written batch.
#[derive(Default)]
pub struct InMemoryWindowCheckRepository {
    checks: RwLock<HashMap<(String, String), WindowCheck>>,
    next_id: AtomicI64,
    fail_writes: AtomicBool,
}

impl InMemoryWindowCheckRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `save_all` fail until switched back.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn get(&self, provider: &str, window_key: &str) -> Option<WindowCheck> {
        self.checks
            .read()
            .await
            .get(&(provider.to_string(), window_key.to_string()))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.checks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.checks.read().await.is_empty()
    }
}

#[async_trait]
impl WindowCheckRepository for InMemoryWindowCheckRepository {
    async fn find_by_provider_and_window_keys(
        &self,
        provider: &str,
        window_keys: &[String],
    ) -> Result<Vec<WindowCheck>, RepositoryError> {
        let checks = self.checks.read().await;
        Ok(window_keys
            .iter()
            .filter_map(|key| checks.get(&(provider.to_string(), key.clone())))
            .cloned()
            .collect())
    }

    async fn save_all(&self, upserts: &[WindowCheckUpsert]) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err("in-memory store rejected the write".into());
        }

        let now = Utc::now();
        let mut checks = self.checks.write().await;

        // The whole batch must apply on top of the counts it was computed from
        for upsert in upserts {
            let key = (upsert.provider.clone(), upsert.window_key.clone());
            let current = checks.get(&key).map_or(0, |existing| existing.check_count);
            if current != upsert.check_count - 1 {
                return Err(StoreError::ConcurrentUpdate {
                    provider: upsert.provider.clone(),
                    window_key: upsert.window_key.clone(),
                }
                .into());
            }
        }

        for upsert in upserts {
            let key = (upsert.provider.clone(), upsert.window_key.clone());
            match checks.get_mut(&key) {
                Some(existing) => {
                    existing.last_checked_at = Some(upsert.last_checked_at);
                    existing.check_count = upsert.check_count;
                    existing.updated_at = now;
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                    checks.insert(
                        key,
                        WindowCheck {
                            id,
                            provider: upsert.provider.clone(),
                            origin: upsert.origin.clone(),
                            destination: upsert.destination.clone(),
                            depart_date: upsert.depart_date,
                            return_date: upsert.return_date,
                            window_key: upsert.window_key.clone(),
                            last_checked_at: Some(upsert.last_checked_at),
                            check_count: upsert.check_count,
                            created_at: now,
                            updated_at: now,
                        },
                    );
                }
            }
        }

        Ok(())
    }
}

/// Process-local price log, oldest first.
#[derive(Default)]
pub struct InMemoryPriceObservationRepository {
    observations: RwLock<Vec<PriceObservation>>,
    next_id: AtomicI64,
}

impl InMemoryPriceObservationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.observations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.observations.read().await.is_empty()
    }
}

#[async_trait]
impl PriceObservationRepository for InMemoryPriceObservationRepository {
    async fn insert_all(&self, observations: &[NewPriceObservation]) -> Result<(), RepositoryError> {
        let mut stored = self.observations.write().await;
        for observation in observations {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            stored.push(PriceObservation {
                id,
                observed_at: observation.observed_at,
                provider: observation.provider.clone(),
                origin: observation.origin.clone(),
                destination: observation.destination.clone(),
                depart_date: observation.depart_date,
                return_date: observation.return_date,
                full_days: observation.full_days,
                departure_month: observation.departure_month,
                window_key: observation.window_key.clone(),
                offer_key: observation.offer_key.clone(),
                price_pln: observation.price_pln,
            });
        }
        Ok(())
    }

    async fn find_by_window_key(
        &self,
        provider: &str,
        window_key: &str,
    ) -> Result<Vec<PriceObservation>, RepositoryError> {
        let mut found: Vec<PriceObservation> = self
            .observations
            .read()
            .await
            .iter()
            .filter(|o| o.provider == provider && o.window_key == window_key)
            .cloned()
            .collect();
        found.sort_by_key(|o| (o.observed_at, o.id));
        Ok(found)
    }
}
