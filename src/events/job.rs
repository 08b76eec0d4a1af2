use serde::{Deserialize, Serialize};

use crate::pipeline::JobStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobEvent {
    Started(JobStartedEvent),
    Finished(JobStatus),
}

impl JobEvent {
    pub fn str(&self) -> &str {
        match self {
            JobEvent::Started(_) => "Started",
            JobEvent::Finished(status) => status.as_ref(),
        }
    }
}

/// Event emitted when a job run starts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStartedEvent {
    pub job_id: String,
    /// number of actions in the job, enabled or not
    pub actions: usize,
}
