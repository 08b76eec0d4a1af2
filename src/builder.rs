use std::sync::Arc;

use crate::{
    Config, JobflowError, Result,
    extract::ResultExtractor,
    persist::{MemStorage, StorageSink},
    pipeline::JobPipeline,
    registry::CommandRegistry,
    runtime::{ActionRunner, Channel},
    targets::{GroupResolver, QueryResolver, TargetExpander},
};

/// Wires the collaborators of a [`JobPipeline`].
///
/// Only the runner is required. Without a storage sink, writes go to a
/// fresh [`MemStorage`]; without a registry, login parameters are not
/// checked against command schemas.
#[derive(Default)]
pub struct PipelineBuilder {
    config: Config,
    runner: Option<Arc<dyn ActionRunner>>,
    storage: Option<Arc<dyn StorageSink>>,
    registry: Option<Arc<CommandRegistry>>,
    groups: Option<Arc<dyn GroupResolver>>,
    queries: Option<Arc<dyn QueryResolver>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn runner(
        mut self,
        runner: Arc<dyn ActionRunner>,
    ) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn storage(
        mut self,
        storage: Arc<dyn StorageSink>,
    ) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn registry(
        mut self,
        registry: CommandRegistry,
    ) -> Self {
        self.registry = Some(Arc::new(registry));
        self
    }

    pub fn group_resolver(
        mut self,
        groups: Arc<dyn GroupResolver>,
    ) -> Self {
        self.groups = Some(groups);
        self
    }

    pub fn query_resolver(
        mut self,
        queries: Arc<dyn QueryResolver>,
    ) -> Self {
        self.queries = Some(queries);
        self
    }

    pub fn build(self) -> Result<JobPipeline> {
        let runner = self.runner.ok_or_else(|| JobflowError::Config("an action runner is required".to_string()))?;
        if self.config.pipeline.max_range_hosts == 0 {
            return Err(JobflowError::Config("pipeline.max_range_hosts must be at least 1".to_string()));
        }

        let mut expander = TargetExpander::new(self.config.pipeline.max_range_hosts);
        if let Some(groups) = self.groups {
            expander = expander.with_group_resolver(groups);
        }
        if let Some(queries) = self.queries {
            expander = expander.with_query_resolver(queries);
        }

        Ok(JobPipeline {
            runner,
            expander,
            extractor: Arc::new(ResultExtractor::new(self.config.pipeline.regex_cache_capacity)),
            storage: self.storage.unwrap_or_else(|| Arc::new(MemStorage::new())),
            registry: self.registry,
            channel: Arc::new(Channel::new(&self.config.events)),
            config: self.config,
        })
    }
}
