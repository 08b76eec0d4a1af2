mod action;
mod database;
mod job;
mod parsing;
mod scalar;
mod targeting;

pub use action::{ActionModel, Execution, LoginMethod, SuccessCriteria};
pub use database::{DatabaseSpec, WriteOperation};
pub use job::{ErrorHandling, JobConfig, JobModel, LogLevel, LoggingConfig, SchedulingConfig};
pub use parsing::{ParserType, Pattern, ResultParsing};
pub use scalar::{DefaultValue, NOW_SENTINEL, Scalar};
pub use targeting::{GroupFilter, StatusFilter, TargetSource, Targeting};
