use serde::{Deserialize, Serialize};

use crate::{JobflowError, Result, model::ActionModel, registry::CommandRegistry};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorHandling {
    #[default]
    Continue,
    Stop,
    Retry,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// lowest level published on the event channel
    #[serde(default)]
    pub level: LogLevel,
    /// keep raw stdout/stderr in target reports
    #[serde(default = "default_capture_output")]
    pub capture_output: bool,
}

fn default_capture_output() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            capture_output: default_capture_output(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SchedulingConfig {
    #[serde(default)]
    pub enabled: bool,
    /// run interval such as `"30s"`, `"5m"`, `"2h"`, `"1d"` or plain seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default)]
    pub retry_on_failure: bool,
    /// also bounds whole-action retries for `error_handling = retry`
    #[serde(default)]
    pub max_retries: u32,
}

/// Execution knobs shared by every action of a job.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct JobConfig {
    /// bound on in-flight target executions across the whole job, 0 is unbounded
    #[serde(default)]
    pub parallel_threads: u32,
    /// targets dispatched per batch, 0 dispatches all at once
    #[serde(default)]
    pub batch_size: u32,
    /// seconds for the whole run, 0 disables the limit
    #[serde(default)]
    pub global_timeout: u64,
    #[serde(default)]
    pub error_handling: ErrorHandling,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
}

/// A job document as produced by the builder.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct JobModel {
    pub job_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// execution order
    #[serde(default)]
    pub actions: Vec<ActionModel>,
    #[serde(default)]
    pub config: JobConfig,
}

impl JobModel {
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str::<JobModel>(s).map_err(|e| JobflowError::Convert(format!("invalid job document: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validates the job and every enabled action, returning the first error.
    pub fn validate(
        &self,
        registry: Option<&CommandRegistry>,
    ) -> Result<()> {
        if self.job_id.trim().is_empty() {
            return Err(JobflowError::Validation("missing job_id in job".to_string()));
        }
        for (index, action) in self.actions.iter().enumerate().filter(|(_, a)| a.enabled) {
            action.validate(registry).map_err(|e| match e {
                JobflowError::Template(msg) => JobflowError::Template(format!("action {}: {}", index, msg)),
                JobflowError::Validation(msg) => JobflowError::Validation(format!("action {}: {}", index, msg)),
                other => other,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DefaultValue, TargetSource, WriteOperation};

    const SAMPLE: &str = include_str!("../../demos/inventory_job.json");

    #[test]
    fn test_parse_sample_job() {
        let job = JobModel::from_json(SAMPLE).unwrap();
        assert_eq!(job.job_id, "inventory-discovery");
        assert_eq!(job.actions.len(), 2);
        assert_eq!(job.config.error_handling, ErrorHandling::Stop);

        let ping = &job.actions[0];
        assert_eq!(ping.action_type, "ping");
        assert_eq!(ping.targeting.source, TargetSource::NetworkRange);
        assert_eq!(ping.result_parsing.default_values.get("last_seen"), Some(&DefaultValue::Now));
        assert_eq!(ping.database.as_ref().unwrap().operation, WriteOperation::Upsert);
        assert!(!job.actions[1].enabled);
        assert!(job.validate(None).is_ok());
    }

    #[test]
    fn test_round_trip_is_lossless() {
        let job = JobModel::from_json(SAMPLE).unwrap();
        let text = job.to_json().unwrap();
        let again = JobModel::from_json(&text).unwrap();
        assert_eq!(job, again);
        assert_eq!(again.actions[0].login_method.command_id, "ping");
        assert_eq!(again.actions[1].login_method.command_id, "ssh_version");
    }

    #[test]
    fn test_unused_source_fields_survive() {
        let mut job = JobModel::from_json(SAMPLE).unwrap();
        job.actions[0].targeting.target_list = Some("not an address at all".to_string());
        let again = JobModel::from_json(&job.to_json().unwrap()).unwrap();
        assert_eq!(again.actions[0].targeting.target_list.as_deref(), Some("not an address at all"));
        assert!(again.validate(None).is_ok());
    }

    #[test]
    fn test_minimal_document_defaults() {
        let job = JobModel::from_json(r#"{"job_id": "j1"}"#).unwrap();
        assert!(job.actions.is_empty());
        assert_eq!(job.config.error_handling, ErrorHandling::Continue);
        assert!(job.config.logging.capture_output);
    }

    #[test]
    fn test_invalid_document() {
        assert!(matches!(JobModel::from_json(r#"{"name": "no id"}"#), Err(JobflowError::Convert(_))));
        let job = JobModel::from_json(r#"{"job_id": " "}"#).unwrap();
        assert!(job.validate(None).is_err());
    }

    #[test]
    fn test_validate_prefixes_action_index() {
        let mut job = JobModel::from_json(SAMPLE).unwrap();
        job.actions[0].login_method.command_template = "ping {missing} {target}".to_string();
        let err = job.validate(None).unwrap_err();
        assert!(matches!(err, JobflowError::Template(_)));
        assert!(err.to_string().contains("action 0"));
    }
}
