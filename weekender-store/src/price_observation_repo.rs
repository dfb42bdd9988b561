use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::debug;
use weekender_core::{NewPriceObservation, PriceObservation, PriceObservationRepository, RepositoryError};

pub struct PostgresPriceObservationRepository {
    pool: PgPool,
}

impl PostgresPriceObservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PriceObservationRow {
    id: i64,
    observed_at: DateTime<Utc>,
    provider: String,
    origin: String,
    destination: String,
    depart_date: NaiveDate,
    return_date: NaiveDate,
    full_days: i16,
    departure_month: NaiveDate,
    window_key: String,
    offer_key: String,
    price_pln: i32,
}

impl From<PriceObservationRow> for PriceObservation {
    fn from(row: PriceObservationRow) -> Self {
        Self {
            id: row.id,
            observed_at: row.observed_at,
            provider: row.provider,
            origin: row.origin,
            destination: row.destination,
            depart_date: row.depart_date,
            return_date: row.return_date,
            full_days: row.full_days,
            departure_month: row.departure_month,
            window_key: row.window_key,
            offer_key: row.offer_key,
            price_pln: row.price_pln,
        }
    }
}

#[async_trait]
impl PriceObservationRepository for PostgresPriceObservationRepository {
    async fn insert_all(&self, observations: &[NewPriceObservation]) -> Result<(), RepositoryError> {
        if observations.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for observation in observations {
            sqlx::query(
                r#"
                INSERT INTO price_observation (observed_at, provider, origin, destination, depart_date,
                                               return_date, full_days, departure_month, window_key,
                                               offer_key, price_pln)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(observation.observed_at)
            .bind(&observation.provider)
            .bind(&observation.origin)
            .bind(&observation.destination)
            .bind(observation.depart_date)
            .bind(observation.return_date)
            .bind(observation.full_days)
            .bind(observation.departure_month)
            .bind(&observation.window_key)
            .bind(&observation.offer_key)
            .bind(observation.price_pln)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!("Recorded {} price observations", observations.len());
        Ok(())
    }

    async fn find_by_window_key(
        &self,
        provider: &str,
        window_key: &str,
    ) -> Result<Vec<PriceObservation>, RepositoryError> {
        let rows = sqlx::query_as::<_, PriceObservationRow>(
            r#"
            SELECT id, observed_at, provider, origin, destination, depart_date, return_date,
                   full_days, departure_month, window_key, offer_key, price_pln
            FROM price_observation
            WHERE provider = $1 AND window_key = $2
            ORDER BY observed_at, id
            "#,
        )
        .bind(provider)
        .bind(window_key)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PriceObservation::from).collect())
    }
}
