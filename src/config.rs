use std::{fs, path::Path};

use serde::Deserialize;

use crate::{JobflowError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// pipeline config
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// event channel config
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// when an action counts as failed for `error_handling = stop`
    pub stop_policy: StopPolicy,
    /// number of compiled result patterns kept in memory, defaults to 256
    pub regex_cache_capacity: usize,
    /// largest number of hosts a single network range may expand to, defaults to 65536
    pub max_range_hosts: usize,
}

/// Decides when an action is considered failed.
///
/// `AnyTarget` fails the action as soon as one target fails. `AllTargets`
/// tolerates partial failure and only fails the action when no target
/// succeeded (an action with zero targets never fails this way unless its
/// targets could not be resolved).
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StopPolicy {
    #[default]
    AnyTarget,
    AllTargets,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// capacity of the run event queue
    pub event_queue_size: usize,
    /// capacity of the log record queue
    pub log_queue_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stop_policy: StopPolicy::default(),
            regex_cache_capacity: 256,
            max_range_hosts: 65536,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            event_queue_size: 2048,
            log_queue_size: 4096,
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref()).map_err(|e| JobflowError::Config(format!("failed to load config file {:?}: {}", path.as_ref(), e)))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        if config.pipeline.max_range_hosts == 0 {
            return Err(JobflowError::Config("pipeline.max_range_hosts must be at least 1".to_string()));
        }
        Ok(config)
    }
}
