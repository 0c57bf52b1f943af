use crate::cache::CacheStore;
use anyhow::Result;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

/// Top of every hour. Cron format: "second minute hour day month day_of_week"
pub const PURGE_SCHEDULE: &str = "0 0 * * * *";

/// Start the hourly purge of expired cache entries
pub async fn start_scheduler(store: Arc<dyn CacheStore>) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    info!("Scheduling cache purge (cron: {})", PURGE_SCHEDULE);

    let job = Job::new_async(PURGE_SCHEDULE, move |_uuid, _l| {
        let store = Arc::clone(&store);

        Box::pin(async move {
            run_purge_job(store.as_ref()).await;
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;
    info!("Scheduler started");

    Ok(scheduler)
}

/// Remove expired entries, returning how many were dropped
pub async fn run_purge_job(store: &dyn CacheStore) -> u64 {
    match store.purge_expired().await {
        Ok(0) => 0,
        Ok(purged) => {
            info!("Purged {} expired translations", purged);
            purged
        }
        Err(e) => {
            error!("Cache purge failed: {}", e);
            0
        }
    }
}
