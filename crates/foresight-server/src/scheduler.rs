//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! forecast-expiry sweep.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use foresight_learning::EXPIRY_GRACE_DAYS;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process — dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(pool: PgPool) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_expiry_sweep(&scheduler, pool).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the daily forecast-expiry sweep.
///
/// Runs every day at 03:00 UTC (`0 0 3 * * *`). Pending forecasts whose
/// target date passed more than [`EXPIRY_GRACE_DAYS`] ago transition to
/// `expired`; completed and expired records are untouched, so reruns are
/// idempotent.
async fn register_expiry_sweep(
    scheduler: &JobScheduler,
    pool: PgPool,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);

    let job = Job::new_async("0 0 3 * * *", move |_uuid, _lock| {
        let pool = Arc::clone(&pool);

        Box::pin(async move {
            run_expiry_sweep(&pool).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn run_expiry_sweep(pool: &PgPool) {
    let cutoff = Utc::now() - Duration::days(EXPIRY_GRACE_DAYS);
    match foresight_db::forecasts::expire_overdue_forecasts(pool, cutoff).await {
        Ok(0) => {
            tracing::debug!("scheduler: expiry sweep found nothing overdue");
        }
        Ok(n) => {
            tracing::info!(expired = n, "scheduler: expired overdue pending forecasts");
        }
        Err(e) => {
            tracing::error!(error = %e, "scheduler: expiry sweep failed");
        }
    }
}
