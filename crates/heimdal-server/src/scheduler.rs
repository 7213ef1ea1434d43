//! Background job scheduler.
//!
//! Registers the recurring collection job. The job never runs a cycle itself;
//! it hands the request to the shared [`CycleTrigger`] so cron and on-demand
//! fetches are serialized through the same single-flight gate.

use heimdal_collectors::{CycleSource, CycleTrigger};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, the
/// cron expression is rejected, or the scheduler fails to start.
pub async fn build_scheduler(
    trigger: CycleTrigger,
    schedule: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_collection_job(&scheduler, trigger, schedule).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_collection_job(
    scheduler: &JobScheduler,
    trigger: CycleTrigger,
    schedule: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(schedule, move |_uuid, _lock| {
        let trigger = trigger.clone();

        Box::pin(async move {
            let ack = trigger.request(CycleSource::Scheduled);
            tracing::info!(ack = ?ack, "scheduler: collection cycle requested");
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %schedule, "scheduler: registered collection job");
    Ok(())
}
