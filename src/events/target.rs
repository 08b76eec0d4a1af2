use serde::{Deserialize, Serialize};

use crate::pipeline::TargetStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TargetEvent {
    Running(i64),
    Retry(u32),
    Finished(TargetStatus),
}

impl TargetEvent {
    pub fn str(&self) -> &str {
        match self {
            TargetEvent::Running(_) => "Running",
            TargetEvent::Retry(_) => "Retry",
            TargetEvent::Finished(status) => status.as_ref(),
        }
    }
}
