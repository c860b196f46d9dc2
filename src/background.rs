use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use tokio::time::sleep;
use tracing::{error, info, warn, info_span, Instrument};

use crate::domain::models::job::{retry_delay, Job, JobStatus};
use crate::domain::services::calendar::generate_ics;
use crate::domain::services::notification::render_ticket_message;
use crate::error::AppError;
use crate::state::AppState;

/// What happened to a claimed job, recorded as its final status.
#[derive(Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Skipped(String),
}

pub async fn start_background_worker(state: Arc<AppState>) {
    info!("Starting background job worker...");
    let interval = Duration::from_secs(state.config.worker_poll_interval_secs.max(1));

    loop {
        run_once(&state).await;
        sleep(interval).await;
    }
}

const CLAIM_BATCH: i64 = 10;

/// One worker tick: drain a batch of jobs, then housekeeping.
pub async fn run_once(state: &Arc<AppState>) {
    let now = Utc::now();
    let stale_before = now - chrono::Duration::seconds(state.config.job_lease_secs.max(1));

    match state.job_repo.claim_due(now, stale_before, CLAIM_BATCH).await {
        Ok(jobs) => {
            for job in jobs {
                let span = info_span!(
                    "background_job",
                    job_id = %job.id,
                    job_kind = %job.kind,
                    ticket_id = %job.ticket_id,
                    attempt = job.attempts
                );
                run_job(state, &job).instrument(span).await;
            }
        }
        Err(e) => error!("Failed to claim due jobs: {:?}", e),
    }

    if state.config.sweep_expired_holds {
        sweep_expired_holds(state).await;
    }

    match state.rate_limit_repo.purge_expired(Utc::now().timestamp_millis()).await {
        Ok(0) => {}
        Ok(purged) => info!(purged, "purged expired rate limit buckets"),
        Err(e) => error!("Failed to purge rate limit buckets: {:?}", e),
    }
}

async fn run_job(state: &Arc<AppState>, job: &Job) {
    let max_attempts = state.config.job_max_attempts.max(1);

    // Only reachable through lease reclaims: the worker holding it died.
    if job.attempts > i64::from(max_attempts) {
        let note = format!("abandoned after {} claims", job.attempts);
        error!("Job failed: {}", note);
        record(state.job_repo.finish(job, JobStatus::Failed, Some(note.as_str()), Utc::now()).await);
        return;
    }

    info!("Processing job: {}", job.kind);
    let recorded = match process_job(state, job).await {
        Ok(JobOutcome::Completed) => {
            info!("Job completed successfully");
            state.job_repo.finish(job, JobStatus::Completed, None, Utc::now()).await
        }
        Ok(JobOutcome::Skipped(reason)) => {
            warn!("Job skipped: {}", reason);
            state.job_repo.finish(job, JobStatus::Skipped, Some(reason.as_str()), Utc::now()).await
        }
        Err(e) if job.can_retry(max_attempts) => {
            let err_msg = e.to_string();
            let run_at = Utc::now() + retry_delay(job.attempts);
            warn!(retry_at = %run_at, "Job attempt failed, will retry: {}", err_msg);
            state.job_repo.reschedule(job, run_at, &err_msg, Utc::now()).await
        }
        Err(e) => {
            let err_msg = e.to_string();
            error!("Job failed with error: {}", err_msg);
            state.job_repo.finish(job, JobStatus::Failed, Some(err_msg.as_str()), Utc::now()).await
        }
    };
    record(recorded);
}

fn record(recorded: Result<bool, AppError>) {
    match recorded {
        Ok(true) => {}
        Ok(false) => warn!("Job lease was taken over before its outcome was recorded"),
        Err(e) => error!("Failed to record job outcome: {:?}", e),
    }
}

async fn sweep_expired_holds(state: &Arc<AppState>) {
    match state.ticket_repo.cancel_expired_holds(Utc::now()).await {
        Ok(ids) => {
            for id in ids {
                info!(ticket_id = %id, "pending hold expired, ticket cancelled");
                if let Err(e) = state.job_repo.cancel_pending_for_ticket(&id, Utc::now()).await {
                    error!(ticket_id = %id, "failed to cancel notifications for expired hold: {:?}", e);
                }
            }
        }
        Err(e) => error!("Failed to sweep expired holds: {:?}", e),
    }
}

pub async fn process_job(state: &Arc<AppState>, job: &Job) -> Result<JobOutcome, AppError> {
    let ticket_id = &job.ticket_id;

    // Soft-deleted tickets are invisible to the repository.
    let Some(ticket) = state.ticket_repo.find_by_id(ticket_id).await? else {
        return Ok(JobOutcome::Skipped(format!("ticket {ticket_id} no longer exists")));
    };
    if !ticket.status.is_active() {
        return Ok(JobOutcome::Skipped(format!("ticket {ticket_id} is {}", ticket.status)));
    }

    let event = state.event_repo.find_by_id(&ticket.event_id).await?
        .ok_or(AppError::NotFound(format!("Event {} not found", ticket.event_id)))?;

    let message = render_ticket_message(&state.templates, &ticket, &event)?;
    let ics = generate_ics(&event, &ticket);

    info!("Sending ticket email to {}", ticket.email);
    state.email_service
        .send(&ticket.email, &message.subject, &message.html_body, Some("ticket.ics"), Some(ics.as_bytes()))
        .await?;

    Ok(JobOutcome::Completed)
}
