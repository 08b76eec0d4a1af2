use std::{process::Stdio, sync::Arc, time::Instant};

use async_trait::async_trait;
use jobflow::{ActionRunner, ChannelEvent, ChannelOptions, Execution, JobModel, JobflowError, MemStorage, PipelineBuilder, RunResult};

/// Runs commands through the local shell.
struct ShellRunner;

#[async_trait]
impl ActionRunner for ShellRunner {
    async fn run(
        &self,
        command: &str,
        execution: &Execution,
        _target: &str,
    ) -> jobflow::Result<RunResult> {
        let start = Instant::now();
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(command).envs(&execution.environment).stdin(Stdio::null()).kill_on_drop(true);
        if let Some(dir) = &execution.working_directory {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|e| JobflowError::Execution(e.to_string()))?;
        Ok(RunResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
            timed_out: false,
        })
    }
}

#[tokio::main]
async fn main() {
    let storage = Arc::new(MemStorage::new());
    let pipeline = PipelineBuilder::new().runner(Arc::new(ShellRunner)).storage(storage.clone()).build().unwrap();

    ChannelEvent::channel(pipeline.channel(), ChannelOptions::default()).unwrap().on_log(move |log| {
        println!("[{}] {}: {}", log.level.as_ref(), log.target, log.content);
    });

    let text = include_str!("../inventory_job.json");
    let job = JobModel::from_json(text).unwrap();

    let report = pipeline.run_job(&job).await;
    println!("Job {}: {}", report.job_id, report.status.as_ref());
    println!("Devices: {:#?}", storage.rows("devices"));
}
