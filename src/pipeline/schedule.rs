use std::{sync::Arc, time::Duration};

use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::{JobflowError, Result, common::Shutdown, model::JobModel};

use super::{JobPipeline, JobReport};

/// Parses a schedule interval such as `"90"`, `"30s"`, `"5m"`, `"2h"` or `"1d"`.
/// A bare number is seconds.
pub fn parse_interval(interval: &str) -> Result<Duration> {
    let interval = interval.trim();
    let invalid = || JobflowError::Config(format!("invalid scheduling interval '{}'", interval));

    let (digits, unit) = match interval.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => interval.split_at(pos),
        None => (interval, "s"),
    };
    let value: u64 = digits.parse().map_err(|_| invalid())?;
    let scale = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(invalid()),
    };

    match value.checked_mul(scale) {
        Some(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(invalid()),
    }
}

impl JobPipeline {
    /// Runs `job` on its schedule until `shutdown` fires.
    ///
    /// The first run starts immediately. With `retry_on_failure`, an
    /// unsuccessful run is repeated up to `max_retries` times before waiting
    /// for the next tick. A job without scheduling runs exactly once.
    /// Every report is handed to `on_report`.
    pub async fn run_scheduled<F>(
        &self,
        job: &JobModel,
        shutdown: Arc<Shutdown>,
        mut on_report: F,
    ) -> Result<()>
    where
        F: FnMut(&JobReport),
    {
        let scheduling = &job.config.scheduling;
        if !scheduling.enabled {
            on_report(&self.run_job(job).await);
            return Ok(());
        }

        let interval = scheduling.interval.as_deref().ok_or_else(|| JobflowError::Config("scheduling.interval is required when scheduling is enabled".to_string()))?;
        let mut ticker = tokio::time::interval(parse_interval(interval)?);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("job '{}' scheduled every {}", job.job_id, interval);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {}
            }

            let mut retries = 0;
            loop {
                let report = self.run_job(job).await;
                let success = report.status.is_success();
                on_report(&report);

                if success || !scheduling.retry_on_failure || retries >= scheduling.max_retries || shutdown.is_terminated() {
                    break;
                }
                retries += 1;
                debug!("job '{}' run failed, retry {}/{}", job.job_id, retries, scheduling.max_retries);
            }
        }

        info!("schedule of job '{}' stopped", job.job_id);
        Ok(())
    }
}
