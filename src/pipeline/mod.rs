//! Job orchestration.
//!
//! Actions run one after another in document order. Within an action the
//! targets run on tokio tasks bounded by the action's `max_concurrent` and the
//! job-wide `parallel_threads`, in batches of `batch_size`.

mod report;
mod schedule;

#[cfg(test)]
pub(crate) mod fixtures;

use std::{sync::Arc, time::Duration};

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::{
    Config, JobflowError,
    events::{ActionEvent, JobEvent, JobStartedEvent, RunEvent},
    extract::ResultExtractor,
    model::{ActionModel, ErrorHandling, JobModel},
    persist::StorageSink,
    registry::CommandRegistry,
    runtime::{ActionRunner, Channel, Context, TargetWorker},
    targets::TargetExpander,
    utils,
};

pub use report::{ActionReport, ActionStatus, JobReport, JobStatus, TargetReport, TargetStatus};
pub use schedule::parse_interval;

/// Runs jobs against the collaborators it was built with.
///
/// Build one with [`crate::PipelineBuilder`].
pub struct JobPipeline {
    pub(crate) runner: Arc<dyn ActionRunner>,
    pub(crate) expander: TargetExpander,
    pub(crate) extractor: Arc<ResultExtractor>,
    pub(crate) storage: Arc<dyn StorageSink>,
    pub(crate) registry: Option<Arc<CommandRegistry>>,
    pub(crate) config: Config,
    pub(crate) channel: Arc<Channel>,
}

impl JobPipeline {
    /// Runs every action of `job` and reports the outcome.
    ///
    /// Never fails as a whole: validation, resolution, execution and
    /// persistence errors are recorded in the report at the level they
    /// happened.
    pub async fn run_job(
        &self,
        job: &JobModel,
    ) -> JobReport {
        self.channel.listen();

        let ctx = Arc::new(Context::new(utils::longid(), self.channel.clone(), job.config.logging.clone()));
        let start_time = utils::time::time_millis();
        info!("run {} of job '{}' started with {} actions", ctx.run_id(), job.job_id, job.actions.len());
        ctx.emit(
            None,
            "",
            RunEvent::Job(JobEvent::Started(JobStartedEvent {
                job_id: job.job_id.clone(),
                actions: job.actions.len(),
            })),
        );

        let timer = (job.config.global_timeout > 0).then(|| {
            let ctx = ctx.clone();
            let limit = Duration::from_secs(job.config.global_timeout);
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                warn!("run {} hit its global timeout of {}s", ctx.run_id(), limit.as_secs());
                ctx.cancel();
            })
        });

        // 0 leaves the job unbounded
        let job_permits = (job.config.parallel_threads > 0).then(|| Arc::new(Semaphore::new(job.config.parallel_threads as usize)));

        let mut actions = Vec::with_capacity(job.actions.len());
        let mut halted = false;
        for (index, action) in job.actions.iter().enumerate() {
            if ctx.is_cancelled() {
                actions.push(self.close_action(&ctx, index, action, ActionStatus::Cancelled));
                continue;
            }
            if halted {
                actions.push(self.close_action(&ctx, index, action, ActionStatus::NotStarted));
                continue;
            }
            if !action.enabled {
                ctx.emit(Some(index), "", RunEvent::Action(ActionEvent::Skipped));
                actions.push(ActionReport::new(index, action, ActionStatus::Skipped));
                continue;
            }

            let action = Arc::new(action.clone());
            let mut report = self.run_action(&ctx, index, &action, job, &job_permits).await;
            report.attempts = 1;

            if job.config.error_handling == ErrorHandling::Retry {
                while report.status == ActionStatus::Failed && report.attempts <= job.config.scheduling.max_retries && !ctx.is_cancelled() {
                    let attempts = report.attempts;
                    debug!("retrying action {} of run {} ({}/{})", index, ctx.run_id(), attempts, job.config.scheduling.max_retries);
                    ctx.emit(Some(index), "", RunEvent::Action(ActionEvent::Retry(attempts)));
                    report = self.run_action(&ctx, index, &action, job, &job_permits).await;
                    report.attempts = attempts + 1;
                }
            }

            if report.status == ActionStatus::Failed && job.config.error_handling != ErrorHandling::Continue {
                info!("action {} of run {} failed, stopping job", index, ctx.run_id());
                halted = true;
            }
            actions.push(report);
        }

        if let Some(timer) = timer {
            timer.abort();
        }

        let status = if actions.iter().any(|a| a.status == ActionStatus::Cancelled) {
            JobStatus::Cancelled
        } else if actions.iter().any(|a| a.status == ActionStatus::Failed) {
            JobStatus::Failed
        } else {
            JobStatus::Succeeded
        };

        info!("run {} of job '{}' finished: {}", ctx.run_id(), job.job_id, status.as_ref());
        ctx.emit(None, "", RunEvent::Job(JobEvent::Finished(status)));

        JobReport {
            run_id: ctx.run_id(),
            job_id: job.job_id.clone(),
            status,
            start_time,
            end_time: utils::time::time_millis(),
            actions,
        }
    }

    /// Returns the event channel the pipeline publishes on.
    pub fn channel(&self) -> Arc<Channel> {
        self.channel.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    async fn run_action(
        &self,
        ctx: &Arc<Context>,
        index: usize,
        action: &Arc<ActionModel>,
        job: &JobModel,
        job_permits: &Option<Arc<Semaphore>>,
    ) -> ActionReport {
        let start = std::time::Instant::now();
        let mut report = ActionReport::new(index, action, ActionStatus::Failed);

        let prepared = tokio::select! {
            biased;
            _ = ctx.wait_cancel() => None,
            res = self.prepare(action) => Some(res),
        };
        let expansion = match prepared {
            Some(Ok(expansion)) => expansion,
            None => {
                warn!("action {} of run {} cancelled while resolving targets", index, ctx.run_id());
                report.status = ActionStatus::Cancelled;
                report.error = Some(JobflowError::Cancelled(format!("action {} interrupted by global timeout", index)));
                report.duration_ms = start.elapsed().as_millis() as u64;
                ctx.emit(Some(index), "", RunEvent::Action(ActionEvent::Finished(report.status)));
                return report;
            }
            Some(Err(err)) => {
                warn!("action {} of run {} rejected: {}", index, ctx.run_id(), err);
                report.error = Some(err);
                report.settle(self.config.pipeline.stop_policy);
                ctx.emit(Some(index), "", RunEvent::Action(ActionEvent::Finished(report.status)));
                return report;
            }
        };
        report.groups = expansion.groups;
        let targets = expansion.targets;

        ctx.emit(
            Some(index),
            "",
            RunEvent::Action(ActionEvent::Started {
                action_type: action.action_type.clone(),
                targets: targets.len(),
            }),
        );

        let worker = Arc::new(TargetWorker {
            index,
            action: action.clone(),
            runner: self.runner.clone(),
            extractor: self.extractor.clone(),
            storage: self.storage.clone(),
            ctx: ctx.clone(),
        });
        let action_permits = Arc::new(Semaphore::new(action.targeting.max_concurrent as usize));

        let batch_size = match job.config.batch_size as usize {
            0 => targets.len().max(1),
            n => n,
        };

        for batch in targets.chunks(batch_size) {
            let handles: Vec<_> = batch
                .iter()
                .map(|target| {
                    let worker = worker.clone();
                    let target = target.clone();
                    let action_permits = action_permits.clone();
                    let job_permits = job_permits.clone();
                    tokio::spawn(async move {
                        // permits are released when the task ends; the semaphores are never closed
                        let _job_permit = match job_permits {
                            Some(permits) => permits.acquire_owned().await.ok(),
                            None => None,
                        };
                        let _permit = action_permits.acquire_owned().await.ok();
                        worker.run(&target).await
                    })
                })
                .collect();

            for (target, joined) in batch.iter().zip(futures::future::join_all(handles).await) {
                report.targets.push(joined.unwrap_or_else(|e| {
                    let mut failed = TargetReport::new(target);
                    failed.fail(JobflowError::Execution(format!("target task aborted: {}", e)));
                    failed
                }));
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        report.settle(self.config.pipeline.stop_policy);
        debug!(
            "action {} of run {}: {} succeeded, {} failed, {}",
            index,
            ctx.run_id(),
            report.succeeded(),
            report.failed(),
            report.status.as_ref()
        );
        ctx.emit(Some(index), "", RunEvent::Action(ActionEvent::Finished(report.status)));
        report
    }

    /// Validation then target resolution, both before any target is dispatched.
    async fn prepare(
        &self,
        action: &ActionModel,
    ) -> crate::Result<crate::targets::Expansion> {
        action.validate(self.registry.as_deref())?;
        self.expander.expand_detailed(&action.targeting).await
    }

    fn close_action(
        &self,
        ctx: &Context,
        index: usize,
        action: &ActionModel,
        status: ActionStatus,
    ) -> ActionReport {
        ctx.emit(Some(index), "", RunEvent::Action(ActionEvent::Finished(status)));
        ActionReport::new(index, action, status)
    }
}

impl Drop for JobPipeline {
    fn drop(&mut self) {
        self.channel.shutdown();
    }
}
