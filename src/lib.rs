//! # Jobflow
//!
//! Jobflow runs network inventory jobs: ordered lists of actions that each
//! execute a command template against a set of targets, extract fields from
//! the output with named regex patterns and write them to a storage sink.
//!
//! ## Core Features
//!
//! - **Target expansion**: network ranges, lists, groups and queries, with exclusions
//! - **Async execution**: targets run on `tokio` tasks bounded per action and per job
//! - **Result extraction**: ordered regex patterns with capture-group field mapping and defaults
//! - **Pluggable collaborators**: the command transport, group lookups and storage are traits
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use jobflow::{JobModel, PipelineBuilder};
//!
//! let pipeline = PipelineBuilder::new().runner(Arc::new(my_runner)).build()?;
//!
//! let job = JobModel::from_json(json_str)?;
//! let report = pipeline.run_job(&job).await;
//! println!("{}", report.to_json()?);
//! ```

mod builder;
mod common;
mod config;
mod error;
pub mod events;
mod extract;
mod model;
mod persist;
mod pipeline;
mod registry;
mod runtime;
mod targets;
pub mod template;
mod utils;

use std::sync::{Arc, RwLock};

pub use builder::PipelineBuilder;
pub use common::Shutdown;
pub use config::{Config, EventsConfig, PipelineConfig, StopPolicy};
pub use error::JobflowError;
pub use extract::{Extraction, Fields, PatternCondition, PatternResult, ResultExtractor};
pub use model::*;
pub use persist::{MemStorage, PersistenceMapper, StorageSink, WriteOutcome, WriteRequest, WriteResult};
pub use pipeline::{ActionReport, ActionStatus, JobPipeline, JobReport, JobStatus, TargetReport, TargetStatus, parse_interval};
pub use registry::{CommandId, CommandRegistry, CommandRegistryBuilder, CommandSpec, PlatformId};
pub use runtime::{ActionRunner, Channel, ChannelEvent, ChannelOptions, Context, RunId, RunResult, check_success};
pub use targets::{Expansion, Group, GroupKind, GroupMember, GroupResolver, GroupSummary, MemGroupResolver, MemberStatus, QueryResolver, TargetExpander, expand_network_range, parse_target_list};

/// Result type alias for Jobflow operations.
pub type Result<T> = std::result::Result<T, JobflowError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
