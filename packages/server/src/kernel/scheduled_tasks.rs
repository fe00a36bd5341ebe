//! Scheduled enrichment runs using tokio-cron-scheduler.
//!
//! Optional: only started when `ENRICHMENT_SCHEDULE` is set. Runs use the
//! same orchestrator as the cron endpoint, so an external trigger and the
//! in-process schedule can overlap safely; claims keep them apart.

use std::sync::Arc;

use anyhow::Result;
use site_enrichment::{CancellationToken, Orchestrator, RunOptions};
use tokio_cron_scheduler::{Job, JobScheduler};

/// Start the enrichment schedule.
pub async fn start_scheduler(
    orchestrator: Arc<Orchestrator>,
    schedule: &str,
    shutdown: CancellationToken,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_uuid, _lock| {
        let orchestrator = orchestrator.clone();
        let shutdown = shutdown.clone();
        Box::pin(async move {
            if let Err(e) = run_scheduled_enrichment(&orchestrator, shutdown).await {
                tracing::error!(error = %e, "Scheduled enrichment run failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    tracing::info!(schedule, "Scheduled enrichment started");
    Ok(scheduler)
}

async fn run_scheduled_enrichment(orchestrator: &Orchestrator, shutdown: CancellationToken) -> Result<()> {
    tracing::info!("Running scheduled enrichment");

    let report = orchestrator
        .run(RunOptions::default(), shutdown.child_token())
        .await?;

    tracing::info!(
        succeeded = report.succeeded,
        failed = report.failed,
        not_dispatched = report.not_dispatched,
        "Scheduled enrichment complete"
    );
    Ok(())
}
