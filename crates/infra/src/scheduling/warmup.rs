//! Proactive cache warmup scheduler.
//!
//! Cron-driven invocation of the busy-window aggregator for a configured set
//! of tutors, so that provider outages are bridged by a recently warmed
//! cache. The maintenance half of each tick runs the retention sweep over
//! long-soft-deleted cache rows. Lifecycle is explicit: jobs check a
//! cancellation token, and every aggregator call runs under a timeout.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tutorlane_core::{BusyWindowAggregator, EventCacheRepository};
use tutorlane_domain::constants::{DEFAULT_LOOKAHEAD_DAYS, DEFAULT_RETENTION_DAYS};

use super::error::{SchedulerError, SchedulerResult};

/// Configuration for the warmup scheduler.
#[derive(Debug, Clone)]
pub struct WarmupSchedulerConfig {
    /// Cron expression describing the execution schedule.
    pub cron_expression: String,
    /// Tutors whose caches are kept warm.
    pub tutor_ids: Vec<String>,
    /// Availability lookahead warmed on each tick.
    pub lookahead_days: i64,
    /// Timeout applied to a single tutor's warmup.
    pub job_timeout: Duration,
    /// Age threshold for the retention sweep.
    pub retention_days: i64,
}

impl Default for WarmupSchedulerConfig {
    fn default() -> Self {
        Self {
            cron_expression: "0 */10 * * * *".into(), // every 10 minutes
            tutor_ids: Vec::new(),
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
            job_timeout: Duration::from_secs(120),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

/// Calendar cache warmup scheduler with explicit lifecycle management.
pub struct CalendarWarmupScheduler {
    scheduler: Option<JobScheduler>,
    config: WarmupSchedulerConfig,
    aggregator: Arc<BusyWindowAggregator>,
    cache: Arc<dyn EventCacheRepository>,
    cancellation: CancellationToken,
}

impl CalendarWarmupScheduler {
    pub fn new(
        config: WarmupSchedulerConfig,
        aggregator: Arc<BusyWindowAggregator>,
        cache: Arc<dyn EventCacheRepository>,
    ) -> Self {
        Self { scheduler: None, config, aggregator, cache, cancellation: CancellationToken::new() }
    }

    /// Register the warmup job and start the scheduler.
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.scheduler.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::CreationFailed(e.to_string()))?;

        let aggregator = self.aggregator.clone();
        let cache = self.cache.clone();
        let config = self.config.clone();
        let cancellation = self.cancellation.child_token();

        let job = Job::new_async(self.config.cron_expression.as_str(), move |_id, _scheduler| {
            let aggregator = aggregator.clone();
            let cache = cache.clone();
            let config = config.clone();
            let cancellation = cancellation.clone();

            Box::pin(async move {
                if cancellation.is_cancelled() {
                    return;
                }

                for tutor_id in &config.tutor_ids {
                    let warmup = aggregator.busy_windows(
                        tutor_id,
                        Utc::now(),
                        config.lookahead_days,
                    );
                    match tokio::time::timeout(config.job_timeout, warmup).await {
                        Ok(Ok(windows)) => {
                            debug!(tutor_id, count = windows.len(), "warmed calendar cache");
                        }
                        Ok(Err(err)) => {
                            warn!(tutor_id, error = %err, "calendar cache warmup failed");
                        }
                        Err(_) => {
                            warn!(
                                tutor_id,
                                timeout_secs = config.job_timeout.as_secs(),
                                "calendar cache warmup timed out"
                            );
                        }
                    }
                }

                match cache.purge_deleted_older_than(config.retention_days).await {
                    Ok(0) => {}
                    Ok(purged) => info!(purged, "retention sweep removed expired cache rows"),
                    Err(err) => warn!(error = %err, "retention sweep failed"),
                }
            })
        })
        .map_err(|e| SchedulerError::JobRegistrationFailed(e.to_string()))?;

        scheduler
            .add(job)
            .await
            .map_err(|e| SchedulerError::JobRegistrationFailed(e.to_string()))?;
        scheduler.start().await.map_err(|e| SchedulerError::StartFailed(e.to_string()))?;

        info!(
            cron = %self.config.cron_expression,
            tutors = self.config.tutor_ids.len(),
            "calendar warmup scheduler started"
        );

        self.scheduler = Some(scheduler);
        Ok(())
    }

    /// Cancel pending work and shut the scheduler down.
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        self.cancellation.cancel();
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler
                .shutdown()
                .await
                .map_err(|e| SchedulerError::StopFailed(e.to_string()))?;
            info!("calendar warmup scheduler stopped");
        }
        Ok(())
    }

    /// Whether the scheduler is currently running.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }
}
