use std::sync::{
    Arc, RwLock,
    atomic::{AtomicBool, Ordering},
};

use futures::future::BoxFuture;

use crate::{
    JobflowError, Result, ShareLock,
    common::{BroadcastQueue, Shutdown},
    config::EventsConfig,
    events::{Event, Log, Message},
    runtime::RunId,
};

macro_rules! dispatch_event {
    ($handles:expr, $(&$item:ident), +) => {
        if let Ok(handlers) = $handles.read() {
            for handle in handlers.iter() {
                (handle)($(&$item),+);
            }
        }
    };
}

macro_rules! dispatch_event_async {
    ($handles:expr, $(&$item:ident), +) => {
        let handles = $handles.clone();

        tokio::spawn(async move {
            let handlers = match handles.read() {
                Ok(handlers) => handlers.clone(),
                Err(_) => return,
            };
            for handle in handlers.iter() {
                (handle)($(&$item),+).await;
            }
        });
    };
}

pub type RunEventHandle = Arc<dyn Fn(&Event<Message>) + Send + Sync>;
pub type RunLogHandle = Arc<dyn Fn(&Event<Log>) + Send + Sync>;
pub type RunEventHandleAsync = Arc<dyn Fn(&Event<Message>) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// use the glob pattern to match the run id
    /// eg. abc*
    pub run_id: String,

    /// use the glob pattern to match the target, job and action events have
    /// an empty target
    /// eg. 10.0.0.*
    pub target: String,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            run_id: "*".to_string(),
            target: "*".to_string(),
        }
    }
}

impl ChannelOptions {
    pub fn new(
        run_id: String,
        target: String,
    ) -> Self {
        Self {
            run_id,
            target,
        }
    }

    pub fn with_run_id(run_id: String) -> Self {
        Self {
            run_id,
            ..Default::default()
        }
    }

    pub fn with_target(target: String) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }
}

/// Broadcast channel for run events and log records.
#[derive(Clone)]
pub struct Channel {
    event_queue: Arc<BroadcastQueue<Event<Message>>>,
    log_queue: Arc<BroadcastQueue<Event<Log>>>,

    events: ShareLock<Vec<RunEventHandle>>,
    logs: ShareLock<Vec<RunLogHandle>>,
    events_async: ShareLock<Vec<RunEventHandleAsync>>,

    listening: Arc<AtomicBool>,
    shutdown: Arc<Shutdown>,
}

impl Channel {
    pub(crate) fn new(config: &EventsConfig) -> Self {
        Self {
            event_queue: BroadcastQueue::new(config.event_queue_size),
            log_queue: BroadcastQueue::new(config.log_queue_size),
            events: Arc::new(RwLock::new(Vec::new())),
            logs: Arc::new(RwLock::new(Vec::new())),
            events_async: Arc::new(RwLock::new(Vec::new())),
            listening: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    pub(crate) fn log_queue(&self) -> Arc<BroadcastQueue<Event<Log>>> {
        self.log_queue.clone()
    }

    pub(crate) fn event_queue(&self) -> Arc<BroadcastQueue<Event<Message>>> {
        self.event_queue.clone()
    }

    /// Starts dispatching queued records to the registered handlers.
    /// Must be called from within a tokio runtime; later calls are no-ops.
    pub(crate) fn listen(&self) {
        if self.listening.swap(true, Ordering::Relaxed) {
            return;
        }

        let mut event_queue = self.event_queue.subscribe();
        let mut log_queue = self.log_queue.subscribe();
        let events = self.events.clone();
        let logs = self.logs.clone();
        let events_async = self.events_async.clone();

        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Ok(e) = event_queue.recv() => {
                        let evt = e.clone();
                        dispatch_event!(events, &evt);
                        dispatch_event_async!(events_async, &e);
                    }
                    Ok(log) = log_queue.recv() => {
                        dispatch_event!(logs, &log);
                    }
                }
            }
        });
    }

    pub(crate) fn shutdown(&self) {
        self.shutdown.shutdown();
    }
}

/// A filtered view on a [`Channel`] for registering handlers.
#[derive(Clone)]
pub struct ChannelEvent {
    channel: Arc<Channel>,

    glob: (globset::GlobMatcher, globset::GlobMatcher),
}

impl ChannelEvent {
    pub fn channel(
        channel: Arc<Channel>,
        options: ChannelOptions,
    ) -> Result<Self> {
        Ok(Self {
            channel,
            glob: (compile(&options.run_id)?, compile(&options.target)?),
        })
    }

    /// Called with the run id when a job run finishes, whatever its status.
    pub fn on_complete(
        &self,
        f: impl Fn(RunId) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        let handle: RunEventHandle = Arc::new(move |e: &Event<Message>| {
            if e.event.is_complete() && is_match(&glob, &e.run_id, &e.target) {
                f(e.run_id.clone());
            }
        });
        push(&self.channel.events, handle);
    }

    /// Called when a job run finishes unsuccessfully.
    pub fn on_error(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        let handle: RunEventHandle = Arc::new(move |e: &Event<Message>| {
            if e.event.is_error() && is_match(&glob, &e.run_id, &e.target) {
                f(e);
            }
        });
        push(&self.channel.events, handle);
    }

    pub fn on_event(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        let handle: RunEventHandle = Arc::new(move |e: &Event<Message>| {
            if is_match(&glob, &e.run_id, &e.target) {
                f(e);
            }
        });
        push(&self.channel.events, handle);
    }

    pub fn on_log(
        &self,
        f: impl Fn(&Event<Log>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        let handle: RunLogHandle = Arc::new(move |e: &Event<Log>| {
            if is_match(&glob, &e.run_id, &e.target) {
                f(e);
            }
        });
        push(&self.channel.logs, handle);
    }

    pub fn on_event_async<F>(
        &self,
        f: F,
    ) where
        F: Fn(&Event<Message>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let glob = self.glob.clone();

        let handle: RunEventHandleAsync = Arc::new(move |e: &Event<Message>| {
            if is_match(&glob, &e.run_id, &e.target) {
                f(e)
            } else {
                Box::pin(async {})
            }
        });
        push(&self.channel.events_async, handle);
    }
}

fn compile(pattern: &str) -> Result<globset::GlobMatcher> {
    globset::Glob::new(pattern).map(|g| g.compile_matcher()).map_err(|e| JobflowError::Config(format!("invalid channel filter '{}': {}", pattern, e)))
}

fn push<H>(
    handles: &ShareLock<Vec<H>>,
    handle: H,
) {
    match handles.write() {
        Ok(mut handlers) => handlers.push(handle),
        Err(poisoned) => poisoned.into_inner().push(handle),
    }
}

fn is_match(
    glob: &(globset::GlobMatcher, globset::GlobMatcher),
    run_id: &str,
    target: &str,
) -> bool {
    let (pat_run, pat_target) = glob;
    pat_run.is_match(run_id) && pat_target.is_match(target)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        events::{JobEvent, RunEvent, TargetEvent},
        model::LogLevel,
        pipeline::{JobStatus, TargetStatus},
    };

    fn message(
        run_id: &str,
        target: &str,
    ) -> Event<Message> {
        Event::new(&Message {
            run_id: run_id.to_string(),
            action: Some(0),
            target: target.to_string(),
            event: RunEvent::Target(TargetEvent::Finished(TargetStatus::Succeeded)),
        })
    }

    #[tokio::test]
    async fn test_target_filter() {
        let channel = Arc::new(Channel::new(&EventsConfig::default()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        ChannelEvent::channel(channel.clone(), ChannelOptions::with_target("10.0.0.*".to_string())).unwrap().on_event(move |e| {
            let _ = tx.send(e.target.clone());
        });
        channel.listen();

        channel.event_queue().send(message("r1", "192.168.1.1")).unwrap();
        channel.event_queue().send(message("r1", "10.0.0.7")).unwrap();

        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(got, "10.0.0.7");
        channel.shutdown();
    }

    #[tokio::test]
    async fn test_log_handler() {
        let channel = Arc::new(Channel::new(&EventsConfig::default()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        ChannelEvent::channel(channel.clone(), ChannelOptions::with_run_id("r2".to_string())).unwrap().on_log(move |l| {
            let _ = tx.send(l.content.clone());
        });
        channel.listen();

        for run_id in ["r1", "r2"] {
            channel
                .log_queue()
                .send(Event::new(&Log {
                    run_id: run_id.to_string(),
                    action: None,
                    target: String::new(),
                    level: LogLevel::Info,
                    content: format!("hello {}", run_id),
                    timestamp: 0,
                }))
                .unwrap();
        }

        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(got, "hello r2");
        channel.shutdown();
    }

    fn job_finished(
        run_id: &str,
        status: JobStatus,
    ) -> Event<Message> {
        Event::new(&Message {
            run_id: run_id.to_string(),
            action: None,
            target: String::new(),
            event: RunEvent::Job(JobEvent::Finished(status)),
        })
    }

    #[tokio::test]
    async fn test_error_handler() {
        let channel = Arc::new(Channel::new(&EventsConfig::default()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        ChannelEvent::channel(channel.clone(), ChannelOptions::default()).unwrap().on_error(move |e| {
            let _ = tx.send(e.inner().clone());
        });
        channel.listen();

        channel.event_queue().send(message("r1", "10.0.0.7")).unwrap();
        channel.event_queue().send(job_finished("r1", JobStatus::Succeeded)).unwrap();
        channel.event_queue().send(job_finished("r2", JobStatus::Failed)).unwrap();

        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(got.run_id, "r2");
        assert!(matches!(got.event, RunEvent::Job(JobEvent::Finished(JobStatus::Failed))));
        assert!(rx.try_recv().is_err());
        channel.shutdown();
    }

    #[tokio::test]
    async fn test_async_event_handler() {
        let channel = Arc::new(Channel::new(&EventsConfig::default()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        ChannelEvent::channel(channel.clone(), ChannelOptions::with_target("10.0.0.*".to_string())).unwrap().on_event_async(move |e| {
            let tx = tx.clone();
            let target = e.target.clone();
            Box::pin(async move {
                let _ = tx.send(target);
            })
        });
        channel.listen();

        channel.event_queue().send(message("r1", "192.168.1.1")).unwrap();
        channel.event_queue().send(message("r1", "10.0.0.9")).unwrap();

        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(got, "10.0.0.9");
        channel.shutdown();
    }

    #[test]
    fn test_invalid_filter() {
        let channel = Arc::new(Channel::new(&EventsConfig::default()));
        assert!(ChannelEvent::channel(channel, ChannelOptions::with_target("[".to_string())).is_err());
    }
}
