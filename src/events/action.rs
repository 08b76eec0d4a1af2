use serde::{Deserialize, Serialize};

use crate::pipeline::ActionStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ActionEvent {
    /// Targets resolved, `targets` workers about to be dispatched.
    Started {
        action_type: String,
        targets: usize,
    },
    Skipped,
    /// The whole action is run again, `attempt` starts at 1.
    Retry(u32),
    Finished(ActionStatus),
}

impl ActionEvent {
    pub fn str(&self) -> &str {
        match self {
            ActionEvent::Started {
                ..
            } => "Started",
            ActionEvent::Skipped => "Skipped",
            ActionEvent::Retry(_) => "Retry",
            ActionEvent::Finished(status) => status.as_ref(),
        }
    }
}
