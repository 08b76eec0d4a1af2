mod channel;
mod context;
mod criteria;
mod runner;
mod worker;

pub use channel::{Channel, ChannelEvent, ChannelOptions};
pub use context::Context;
pub use criteria::check_success;
pub use runner::{ActionRunner, RunResult};
pub(crate) use worker::TargetWorker;

pub type RunId = String;
