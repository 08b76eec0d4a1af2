use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Result, model::Execution};

/// Raw outcome of one command run against one target.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RunResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
    /// the run was cut short by `execution.timeout`
    pub timed_out: bool,
}

impl RunResult {
    pub(crate) fn timeout(duration: Duration) -> Self {
        Self {
            exit_code: -1,
            duration,
            timed_out: true,
            ..Default::default()
        }
    }
}

/// Transport that executes a resolved command against a target.
///
/// Implementations honor `execution.timeout`, `kill_signal`,
/// `working_directory` and `environment`. A non-zero exit is reported in
/// [`RunResult::exit_code`]; an `Err` means the command could not be run at all.
#[async_trait]
pub trait ActionRunner: Send + Sync {
    async fn run(
        &self,
        command: &str,
        execution: &Execution,
        target: &str,
    ) -> Result<RunResult>;
}
