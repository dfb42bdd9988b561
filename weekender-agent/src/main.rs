use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use weekender_agent::{ScanCycle, ScanLock, Scheduler};
use weekender_core::{Clock, SystemClock};
use weekender_store::{Config, DbClient, RedisClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weekender_agent=debug,weekender_planner=info,weekender_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    let clock = SystemClock::from_name(&config.timezone)?;
    tracing::info!(
        "Starting weekender agent in {} (today is {})",
        clock.tz(),
        clock.today()
    );

    let db = DbClient::new(&config.database.url)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;
    db.ping().await?;

    let lock = match &config.redis {
        Some(redis) => {
            let client = RedisClient::new(&redis.url)
                .await
                .context("Failed to connect to Redis")?;
            Some(ScanLock::new(client))
        }
        None => None,
    };

    let clock: Arc<dyn Clock> = Arc::new(clock);
    let cycle = ScanCycle::from_config(
        &config,
        clock.clone(),
        Arc::new(db.window_checks()),
        Arc::new(db.price_observations()),
    )?;

    Scheduler::new(cycle, clock, config.run_at()?, config.tz()?, config.scan.run_on_start)
        .with_lock(lock)
        .run()
        .await;

    Ok(())
}
