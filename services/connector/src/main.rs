use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;

use catsync_config::{init_tracing, AppConfig};
use catsync_db::backend::pg_repository::PgBackendRepository;
use catsync_db::binding::pg_repository::PgCategoryBindingRepository;
use catsync_db::jobs::pg_repository::PgJobQueue;

use catsync_connector::magento::factory::{RemoteAdapterFactory, RemoteSettings};
use catsync_connector::scheduler::BatchScheduler;
use catsync_connector::worker::JobWorker;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("info");
    let config = AppConfig::from_env()?;

    tracing::info!(
        service = "catsync-connector",
        channel = %config.job_channel,
        tick_secs = config.scheduler_tick_secs,
        poll_secs = config.worker_poll_secs,
        "starting"
    );

    let pool = catsync_db::create_pool(&config.database_url).await?;
    catsync_db::ensure_schema(&pool).await?;

    let backends = PgBackendRepository::new(pool.clone());
    let queue = PgJobQueue::new(pool.clone());
    let scheduler = BatchScheduler::new(backends.clone(), queue.clone());
    let worker = JobWorker::new(
        backends,
        PgCategoryBindingRepository::new(pool.clone()),
        queue,
        RemoteAdapterFactory::new(RemoteSettings {
            timeout_secs: config.remote_timeout_secs,
            max_retries: config.remote_max_retries,
        }),
    );

    let mut tick = tokio::time::interval(Duration::from_secs(config.scheduler_tick_secs));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut poll = tokio::time::interval(Duration::from_secs(config.worker_poll_secs));
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                // One timestamp per tick, shared by every backend.
                let now = Utc::now();
                if let Err(e) = scheduler.export_products(now).await {
                    tracing::error!(error = %e, "product export tick failed");
                }
                if let Err(e) = scheduler.import_categories(now).await {
                    tracing::error!(error = %e, "category import tick failed");
                }
            }
            _ = poll.tick() => {
                loop {
                    match worker.run_once(&config.job_channel).await {
                        Ok(Some(_)) => continue,
                        Ok(None) => break,
                        Err(e) => {
                            tracing::error!(channel = %config.job_channel, error = %e, "worker poll failed");
                            break;
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested");
                break;
            }
        }
    }

    pool.close().await;
    tracing::info!("stopped");
    Ok(())
}
