//! Test doubles shared by the pipeline and worker tests.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    Config, JobflowError, PipelineBuilder, Result,
    model::{ActionModel, Execution, JobModel, LoginMethod, Targeting},
    persist::StorageSink,
    pipeline::JobPipeline,
    runtime::{ActionRunner, RunResult},
};

#[derive(Clone)]
struct Script {
    stdout: String,
    exit_code: i32,
}

/// Runner answering from a script instead of a transport.
pub(crate) struct ScriptedRunner {
    default: Script,
    targets: HashMap<String, Script>,
    delay: Duration,
    /// failing attempts before the script applies, per target
    fail_first: u32,
    errors: Vec<String>,
    /// calls from this one on fail with a transport error, per target
    error_from: Option<u32>,

    attempts: Mutex<HashMap<String, u32>>,
    commands: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedRunner {
    fn new(
        stdout: &str,
        exit_code: i32,
    ) -> Self {
        Self {
            default: Script {
                stdout: stdout.to_string(),
                exit_code,
            },
            targets: HashMap::new(),
            delay: Duration::ZERO,
            fail_first: 0,
            errors: vec![],
            error_from: None,
            attempts: Mutex::new(HashMap::new()),
            commands: Mutex::new(vec![]),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn ok(stdout: &str) -> Self {
        Self::new(stdout, 0)
    }

    pub fn fail(exit_code: i32) -> Self {
        Self::new("", exit_code)
    }

    pub fn target(
        mut self,
        target: &str,
        stdout: &str,
        exit_code: i32,
    ) -> Self {
        self.targets.insert(
            target.to_string(),
            Script {
                stdout: stdout.to_string(),
                exit_code,
            },
        );
        self
    }

    pub fn delay(
        mut self,
        delay: Duration,
    ) -> Self {
        self.delay = delay;
        self
    }

    pub fn fail_first(
        mut self,
        attempts: u32,
    ) -> Self {
        self.fail_first = attempts;
        self
    }

    /// Commands equal to `command` fail with a transport error.
    pub fn error_on(
        mut self,
        command: &str,
    ) -> Self {
        self.errors.push(command.to_string());
        self
    }

    pub fn error_from(
        mut self,
        attempt: u32,
    ) -> Self {
        self.error_from = Some(attempt);
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionRunner for ScriptedRunner {
    async fn run(
        &self,
        command: &str,
        _execution: &Execution,
        target: &str,
    ) -> Result<RunResult> {
        self.commands.lock().unwrap().push(command.to_string());
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(target.to_string()).or_default();
            *n += 1;
            *n
        };
        if self.errors.iter().any(|c| c == command) || self.error_from.is_some_and(|n| attempt >= n) {
            return Err(JobflowError::Execution(format!("cannot reach {}", target)));
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let script = if attempt <= self.fail_first {
            Script {
                stdout: String::new(),
                exit_code: 1,
            }
        } else {
            self.targets.get(target).unwrap_or(&self.default).clone()
        };

        Ok(RunResult {
            stdout: script.stdout,
            stderr: String::new(),
            exit_code: script.exit_code,
            duration: self.delay,
            timed_out: false,
        })
    }
}

pub(crate) fn pipeline(runner: impl Into<Arc<ScriptedRunner>>) -> JobPipeline {
    pipeline_with(runner, Config::default(), None)
}

pub(crate) fn pipeline_with(
    runner: impl Into<Arc<ScriptedRunner>>,
    config: Config,
    storage: Option<Arc<dyn StorageSink>>,
) -> JobPipeline {
    let runner: Arc<ScriptedRunner> = runner.into();
    let mut builder = PipelineBuilder::new().config(config).runner(runner);
    if let Some(storage) = storage {
        builder = builder.storage(storage);
    }
    builder.build().unwrap()
}

pub(crate) fn action(
    template: &str,
    targets: &str,
) -> ActionModel {
    let login = LoginMethod {
        platform: "linux".to_string(),
        command_id: "check".to_string(),
        command_template: template.to_string(),
        ..Default::default()
    };
    ActionModel::new(login, Targeting::list(targets))
}

pub(crate) fn job(actions: Vec<ActionModel>) -> JobModel {
    JobModel {
        job_id: "job-1".to_string(),
        name: "test job".to_string(),
        actions,
        ..Default::default()
    }
}
