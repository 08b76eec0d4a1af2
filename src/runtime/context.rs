use std::sync::Arc;

use tracing::trace;

use crate::{
    common::Shutdown,
    events::{Event, Log, Message, RunEvent},
    model::{LogLevel, LoggingConfig},
    runtime::{Channel, RunId},
    utils,
};

/// State shared by every worker of one job run.
#[derive(Clone)]
pub struct Context {
    run_id: RunId,
    channel: Arc<Channel>,
    logging: LoggingConfig,

    cancel: Arc<Shutdown>,
}

impl Context {
    pub fn new(
        run_id: RunId,
        channel: Arc<Channel>,
        logging: LoggingConfig,
    ) -> Self {
        Self {
            run_id,
            channel,
            logging,
            cancel: Arc::new(Shutdown::new()),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id.to_owned()
    }

    pub fn capture_output(&self) -> bool {
        self.logging.capture_output
    }

    pub fn emit(
        &self,
        action: Option<usize>,
        target: &str,
        event: RunEvent,
    ) {
        trace!("run {} action {:?} target '{}': {}", self.run_id, action, target, event.str());
        // nobody listening is not an error
        let _ = self.channel.event_queue().send(Event::new(&Message {
            run_id: self.run_id(),
            action,
            target: target.to_string(),
            event,
        }));
    }

    /// Publishes a log record unless it is below the job's logging level.
    pub fn emit_log(
        &self,
        action: Option<usize>,
        target: &str,
        level: LogLevel,
        content: String,
    ) {
        if level < self.logging.level {
            return;
        }
        let log = Log {
            run_id: self.run_id(),
            action,
            target: target.to_string(),
            level,
            content,
            timestamp: utils::time::time_millis(),
        };
        let _ = self.channel.log_queue().send(Event::new(&log));
    }

    /// Cancels the run. In-flight targets stop at their next suspension point.
    pub fn cancel(&self) {
        self.cancel.shutdown();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_terminated()
    }

    pub fn wait_cancel(&self) -> impl Future<Output = ()> + Send + 'static {
        self.cancel.wait()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::{config::EventsConfig, runtime::ChannelEvent, runtime::ChannelOptions};

    #[tokio::test]
    async fn test_log_level_filter() {
        let channel = Arc::new(Channel::new(&EventsConfig::default()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        ChannelEvent::channel(channel.clone(), ChannelOptions::default()).unwrap().on_log(move |l| {
            let _ = tx.send(l.content.clone());
        });
        channel.listen();

        let ctx = Context::new(
            "run".to_string(),
            channel.clone(),
            LoggingConfig {
                level: LogLevel::Warn,
                capture_output: true,
            },
        );
        ctx.emit_log(None, "h", LogLevel::Debug, "dropped".to_string());
        ctx.emit_log(None, "h", LogLevel::Info, "dropped".to_string());
        ctx.emit_log(None, "h", LogLevel::Error, "kept".to_string());

        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(got, "kept");
        channel.shutdown();
    }

    #[test]
    fn test_cancel() {
        let ctx = Context::new("run".to_string(), Arc::new(Channel::new(&EventsConfig::default())), LoggingConfig::default());
        assert!(!ctx.is_cancelled());
        ctx.cancel();
        assert!(ctx.is_cancelled());
    }
}
