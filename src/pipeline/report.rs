//! Structured outcome of a job run.

use serde::{Deserialize, Serialize};

use crate::{
    JobflowError, StopPolicy,
    extract::{Fields, PatternResult},
    model::ActionModel,
    persist::WriteResult,
    runtime::RunId,
    targets::GroupSummary,
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_success(&self) -> bool {
        *self == JobStatus::Succeeded
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionStatus {
    Succeeded,
    Failed,
    /// disabled in the job document
    Skipped,
    /// interrupted by the job's global timeout
    Cancelled,
    /// a previous action stopped the job
    NotStarted,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TargetStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct TargetReport {
    pub target: String,
    pub status: TargetStatus,
    /// attempts made, 0 when the command never ran
    pub attempts: u32,
    /// the resolved command
    pub command: Option<String>,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// raw output of the last attempt, kept when `logging.capture_output` is set
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub duration_ms: u64,
    pub error: Option<JobflowError>,
    pub warnings: Vec<String>,
    pub fields: Fields,
    pub patterns: Vec<PatternResult>,
    pub write: Option<WriteResult>,
}

impl TargetReport {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            ..Default::default()
        }
    }

    pub(crate) fn fail(
        &mut self,
        error: JobflowError,
    ) {
        self.status = TargetStatus::Failed;
        self.error = Some(error);
    }

    pub(crate) fn cancel(&mut self) {
        self.status = TargetStatus::Cancelled;
        self.error = Some(JobflowError::Cancelled(format!("target '{}' interrupted by global timeout", self.target)));
    }

    pub fn is_success(&self) -> bool {
        self.status == TargetStatus::Succeeded
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ActionReport {
    /// position of the action in the job
    pub index: usize,
    pub action_type: String,
    pub status: ActionStatus,
    /// whole-action runs, more than one under `error_handling = retry`
    pub attempts: u32,
    /// per target, in expansion order
    pub targets: Vec<TargetReport>,
    pub groups: Vec<GroupSummary>,
    /// validation or target resolution failure
    pub error: Option<JobflowError>,
    pub duration_ms: u64,
}

impl ActionReport {
    pub(crate) fn new(
        index: usize,
        action: &ActionModel,
        status: ActionStatus,
    ) -> Self {
        Self {
            index,
            action_type: action.action_type.clone(),
            status,
            attempts: 0,
            targets: vec![],
            groups: vec![],
            error: None,
            duration_ms: 0,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.targets.iter().filter(|t| t.status == TargetStatus::Succeeded).count()
    }

    pub fn failed(&self) -> usize {
        self.targets.iter().filter(|t| t.status == TargetStatus::Failed).count()
    }

    /// Derives the action status from its target outcomes.
    pub(crate) fn settle(
        &mut self,
        policy: StopPolicy,
    ) {
        self.status = if self.error.is_some() {
            ActionStatus::Failed
        } else if self.targets.iter().any(|t| t.status == TargetStatus::Cancelled) {
            ActionStatus::Cancelled
        } else {
            let failed = match policy {
                StopPolicy::AnyTarget => self.failed() > 0,
                StopPolicy::AllTargets => !self.targets.is_empty() && self.succeeded() == 0,
            };
            if failed { ActionStatus::Failed } else { ActionStatus::Succeeded }
        };
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct JobReport {
    pub run_id: RunId,
    pub job_id: String,
    pub status: JobStatus,
    pub start_time: i64,
    pub end_time: i64,
    pub actions: Vec<ActionReport>,
}

impl JobReport {
    pub fn action(
        &self,
        index: usize,
    ) -> Option<&ActionReport> {
        self.actions.get(index)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
