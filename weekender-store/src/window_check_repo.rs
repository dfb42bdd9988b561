use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::debug;
use weekender_core::{RepositoryError, WindowCheck, WindowCheckRepository, WindowCheckUpsert};

use crate::StoreError;

pub struct PostgresWindowCheckRepository {
    pool: PgPool,
}

impl PostgresWindowCheckRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct WindowCheckRow {
    id: i64,
    provider: String,
    origin: String,
    destination: String,
    depart_date: NaiveDate,
    return_date: NaiveDate,
    window_key: String,
    last_checked_at: Option<DateTime<Utc>>,
    check_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WindowCheckRow> for WindowCheck {
    fn from(row: WindowCheckRow) -> Self {
        Self {
            id: row.id,
            provider: row.provider,
            origin: row.origin,
            destination: row.destination,
            depart_date: row.depart_date,
            return_date: row.return_date,
            window_key: row.window_key,
            last_checked_at: row.last_checked_at,
            check_count: row.check_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl WindowCheckRepository for PostgresWindowCheckRepository {
    async fn find_by_provider_and_window_keys(
        &self,
        provider: &str,
        window_keys: &[String],
    ) -> Result<Vec<WindowCheck>, RepositoryError> {
        if window_keys.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, WindowCheckRow>(
            r#"
            SELECT id, provider, origin, destination, depart_date, return_date,
                   window_key, last_checked_at, check_count, created_at, updated_at
            FROM window_check
            WHERE provider = $1 AND window_key = ANY($2)
            "#,
        )
        .bind(provider)
        .bind(window_keys)
        .fetch_all(&self.pool)
        .await?;

        debug!(
            "Loaded {} of {} window checks for {}",
            rows.len(),
            window_keys.len(),
            provider
        );

        Ok(rows.into_iter().map(WindowCheck::from).collect())
    }

    async fn save_all(&self, checks: &[WindowCheckUpsert]) -> Result<(), RepositoryError> {
        if checks.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for check in checks {
            // Only move a record on from the count this upsert was computed from
            let result = sqlx::query(
                r#"
                INSERT INTO window_check (provider, origin, destination, depart_date, return_date,
                                          window_key, last_checked_at, check_count)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (provider, window_key) DO UPDATE
                SET last_checked_at = EXCLUDED.last_checked_at,
                    check_count = EXCLUDED.check_count,
                    updated_at = NOW()
                WHERE window_check.check_count = EXCLUDED.check_count - 1
                "#,
            )
            .bind(&check.provider)
            .bind(&check.origin)
            .bind(&check.destination)
            .bind(check.depart_date)
            .bind(check.return_date)
            .bind(&check.window_key)
            .bind(check.last_checked_at)
            .bind(check.check_count)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                // Dropping the transaction rolls the batch back
                return Err(StoreError::ConcurrentUpdate {
                    provider: check.provider.clone(),
                    window_key: check.window_key.clone(),
                }
                .into());
            }
        }

        tx.commit().await?;

        debug!("Upserted {} window checks", checks.len());
        Ok(())
    }
}
