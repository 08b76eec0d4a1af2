//! Event types for job execution.
//!
//! Events are emitted while a job runs to notify subscribers about job,
//! action and target state changes, and about log records.

mod action;
mod job;
mod target;

pub use action::*;
pub use job::*;
pub use target::*;

use serde::{Deserialize, Serialize};

use crate::{model::LogLevel, runtime::RunId};

/// Generic event wrapper.
#[derive(Debug, Clone)]
pub struct Event<T> {
    inner: T,
}

/// Top-level event type for a job run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    /// Job-level events (started, finished).
    Job(JobEvent),
    /// Action-level events (started, skipped, retry, finished).
    Action(ActionEvent),
    /// Target-level events (running, retry, finished).
    Target(TargetEvent),
}

/// Event message carrying the run, action and target it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Run that generated this event.
    pub run_id: RunId,
    /// Index of the action in the job, `None` for job events.
    pub action: Option<usize>,
    /// Target of the event, empty for job and action events.
    pub target: String,
    pub event: RunEvent,
}

/// Log record emitted while a target is processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Log {
    pub run_id: RunId,
    pub action: Option<usize>,
    pub target: String,
    pub level: LogLevel,
    pub content: String,
    /// Timestamp in milliseconds.
    pub timestamp: i64,
}

impl<T> std::ops::Deref for Event<T>
where
    T: std::fmt::Debug + Clone,
{
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> Event<T>
where
    T: std::fmt::Debug + Clone,
{
    pub fn new(inner: &T) -> Self {
        Self {
            inner: inner.clone(),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl RunEvent {
    pub fn is_complete(&self) -> bool {
        matches!(self, RunEvent::Job(JobEvent::Finished(_)))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RunEvent::Job(JobEvent::Finished(status)) if !status.is_success())
    }

    pub fn str(&self) -> &str {
        match self {
            RunEvent::Job(e) => e.str(),
            RunEvent::Action(e) => e.str(),
            RunEvent::Target(e) => e.str(),
        }
    }
}
