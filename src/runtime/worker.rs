//! Per-target execution: resolve, run with retries, extract and persist.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{debug, warn};

use crate::{
    JobflowError, Result,
    events::{RunEvent, TargetEvent},
    extract::ResultExtractor,
    model::{ActionModel, LogLevel},
    persist::{PersistenceMapper, StorageSink},
    pipeline::{TargetReport, TargetStatus},
    runtime::{ActionRunner, Context, RunResult, check_success},
    template, utils,
};

/// Outcome of one attempt against a target.
enum Attempt {
    /// The main command returned a result.
    Ran {
        run: RunResult,
        /// first unmet success condition, `None` when the attempt succeeded
        failure: Option<String>,
        warnings: Vec<String>,
    },
    /// pre_command failed, the target is not retried.
    Aborted(JobflowError),
}

/// Runs one action against single targets. Shared by all target tasks of
/// the action.
pub(crate) struct TargetWorker {
    pub index: usize,
    pub action: Arc<ActionModel>,
    pub runner: Arc<dyn ActionRunner>,
    pub extractor: Arc<ResultExtractor>,
    pub storage: Arc<dyn StorageSink>,
    pub ctx: Arc<Context>,
}

impl TargetWorker {
    pub async fn run(
        &self,
        target: &str,
    ) -> TargetReport {
        let mut report = TargetReport::new(target);
        if self.ctx.is_cancelled() {
            report.cancel();
            return self.finish(report);
        }

        let start = Instant::now();
        report.status = TargetStatus::Running;
        self.emit(target, TargetEvent::Running(utils::time::time_millis()));

        let login = &self.action.login_method;
        let command = match template::resolve(&login.command_template, &login.parameters, target) {
            Ok(command) => command,
            Err(err) => {
                report.fail(err);
                return self.finish(report);
            }
        };
        report.command = Some(command.clone());
        self.log(target, LogLevel::Debug, format!("running '{}'", command));

        let retry_count = self.action.targeting.retry_count;
        let retry_delay = self.action.targeting.retry_delay;
        let mut output = None;

        loop {
            report.attempts += 1;
            report.exit_code = None;
            report.timed_out = false;
            report.stdout = None;
            report.stderr = None;

            let ret = tokio::select! {
                biased;
                _ = self.ctx.wait_cancel() => {
                    report.cancel();
                    break;
                }
                res = self.attempt(&command, target) => res,
            };

            let should_retry = match ret {
                Ok(Attempt::Ran {
                    run,
                    failure,
                    warnings,
                }) => {
                    output = Some(self.record(&mut report, run, warnings));
                    match failure {
                        None => {
                            report.status = TargetStatus::Succeeded;
                            report.error = None;
                            false
                        }
                        Some(reason) => {
                            report.fail(JobflowError::Execution(reason));
                            true
                        }
                    }
                }
                Ok(Attempt::Aborted(err)) => {
                    output = None;
                    report.fail(err);
                    false
                }
                Err(err) => {
                    output = None;
                    report.fail(err);
                    true
                }
            };

            if !should_retry || report.attempts > retry_count {
                break;
            }

            if let Some(err) = &report.error {
                self.log(target, LogLevel::Warn, format!("attempt {} failed: {}", report.attempts, err));
            }
            if retry_delay > 0 {
                tokio::select! {
                    biased;
                    _ = self.ctx.wait_cancel() => {
                        report.cancel();
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_secs(retry_delay)) => {}
                }
            }
            self.emit(target, TargetEvent::Retry(report.attempts));
        }

        // failed attempts still carry output worth parsing, e.g. an offline status
        let output = output.filter(|_| report.status != TargetStatus::Cancelled);
        if let Some(output) = output {
            self.extract_and_write(&mut report, target, &output).await;
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        self.finish(report)
    }

    /// pre_command, the main command, then post_command. `Err` is a runner
    /// failure of the main command.
    async fn attempt(
        &self,
        command: &str,
        target: &str,
    ) -> Result<Attempt> {
        let login = &self.action.login_method;
        let execution = &self.action.execution;
        let mut warnings = vec![];

        if let Some(pre) = &execution.pre_command {
            let pre = match template::resolve(pre, &login.parameters, target) {
                Ok(pre) => pre,
                Err(err) => return Ok(Attempt::Aborted(err)),
            };
            let failed = match self.run_bounded(&pre, target).await {
                Ok(run) if run.timed_out => Some(format!("pre_command '{}' timed out", pre)),
                Ok(run) if run.exit_code != 0 => Some(format!("pre_command '{}' failed with exit code {}", pre, run.exit_code)),
                Ok(_) => None,
                Err(err) => Some(format!("pre_command '{}' failed: {}", pre, err)),
            };
            if let Some(reason) = failed {
                return Ok(Attempt::Aborted(JobflowError::Execution(reason)));
            }
        }

        let run = self.run_bounded(command, target).await?;
        let failure = check_success(&login.success_criteria, &run).err();

        if let Some(post) = &execution.post_command {
            match template::resolve(post, &login.parameters, target) {
                Ok(post) => match self.run_bounded(&post, target).await {
                    Ok(r) if !r.timed_out && r.exit_code == 0 => {}
                    Ok(r) => warnings.push(format!("post_command '{}' failed with exit code {}", post, r.exit_code)),
                    Err(err) => warnings.push(format!("post_command '{}' failed: {}", post, err)),
                },
                Err(err) => warnings.push(err.to_string()),
            }
        }

        Ok(Attempt::Ran {
            run,
            failure,
            warnings,
        })
    }

    /// One runner call bounded by `execution.timeout`.
    async fn run_bounded(
        &self,
        command: &str,
        target: &str,
    ) -> Result<RunResult> {
        let execution = &self.action.execution;
        if execution.timeout == 0 {
            return self.runner.run(command, execution, target).await;
        }

        let limit = Duration::from_secs(execution.timeout);
        match tokio::time::timeout(limit, self.runner.run(command, execution, target)).await {
            Ok(ret) => ret,
            Err(_) => {
                debug!("'{}' on {} timed out after {}s", command, target, execution.timeout);
                Ok(RunResult::timeout(limit))
            }
        }
    }

    /// Copies an attempt into the report and hands back its stdout.
    fn record(
        &self,
        report: &mut TargetReport,
        run: RunResult,
        warnings: Vec<String>,
    ) -> String {
        report.exit_code = Some(run.exit_code);
        report.timed_out = run.timed_out;
        report.warnings.extend(warnings);
        if self.ctx.capture_output() {
            report.stdout = Some(run.stdout.clone());
            report.stderr = Some(run.stderr);
        }
        run.stdout
    }

    async fn extract_and_write(
        &self,
        report: &mut TargetReport,
        target: &str,
        output: &str,
    ) {
        let extraction = self.extractor.extract(output, &self.action.result_parsing);
        report.fields = extraction.fields;
        report.patterns = extraction.patterns;

        let Some(database) = &self.action.database else {
            return;
        };
        let request = PersistenceMapper::apply(&report.fields, database, target);
        match self.storage.write(&request).await {
            Ok(result) => report.write = Some(result),
            Err(err) => {
                warn!("write to '{}' for {} failed: {}", request.table, target, err);
                if report.is_success() {
                    report.fail(err);
                } else {
                    report.warnings.push(err.to_string());
                }
            }
        }
    }

    fn finish(
        &self,
        report: TargetReport,
    ) -> TargetReport {
        match &report.error {
            Some(err) => self.log(&report.target, LogLevel::Error, format!("{}: {}", report.status.as_ref(), err)),
            None => self.log(&report.target, LogLevel::Info, format!("{} after {} attempt(s)", report.status.as_ref(), report.attempts)),
        }
        self.emit(&report.target, TargetEvent::Finished(report.status));
        report
    }

    fn emit(
        &self,
        target: &str,
        event: TargetEvent,
    ) {
        self.ctx.emit(Some(self.index), target, RunEvent::Target(event));
    }

    fn log(
        &self,
        target: &str,
        level: LogLevel,
        content: String,
    ) {
        self.ctx.emit_log(Some(self.index), target, level, content);
    }
}
