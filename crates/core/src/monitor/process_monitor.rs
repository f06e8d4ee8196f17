//! Polling monitor bound to one scheduler output file.
//!
//! A `ProcessMonitor` owns the parse state for its target: completion flag,
//! exit value, execution host, captured stdout and the number of lines
//! already consumed. Nothing else mutates that state.
//!
//! Listeners subscribe to receive `MonitorEvent`s. Adding the first listener
//! starts the poll loop on its own tokio task; removing the last one stops
//! it. Each listener receives events in the order the lines were appended
//! to the target, and a terminal event is always the last one delivered.

use crate::monitor::classifier::{LineClass, LineClassifier};
use crate::monitor::error::{MonitorError, MonitorResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, instrument, warn};

/// Default polling interval.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(15);

/// Events delivered to monitor listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// New stdout lines captured from a job that has not finished yet.
    Update { lines: Vec<String> },

    /// The job reached a terminal banner line.
    Complete {
        exit_value: i32,
        execution_host: Option<String>,
        output: Vec<String>,
    },

    /// The target vanished or could not be parsed. `exit_value` is -1.
    Error {
        exit_value: i32,
        output: Vec<String>,
        reason: String,
    },
}

impl MonitorEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MonitorEvent::Update { .. })
    }
}

/// Value published to `wait_for_exit_code` callers.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Completion {
    Pending,
    Exited(i32),
    Deleted,
    Unparseable(String),
    Stopped,
}

#[derive(Debug)]
struct MonitorState {
    detected: bool,
    complete: bool,
    failed: bool,
    exit_value: i32,
    execution_host: Option<String>,
    output: Vec<String>,
    capturing: bool,
    lines_consumed: usize,
    last_modified: Option<SystemTime>,
    last_len: u64,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self {
            detected: false,
            complete: false,
            failed: false,
            exit_value: -1,
            execution_host: None,
            output: Vec::new(),
            capturing: false,
            lines_consumed: 0,
            last_modified: None,
            last_len: 0,
        }
    }
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    senders: HashMap<u64, mpsc::UnboundedSender<MonitorEvent>>,
    /// Dropping this sender ends the running poll loop.
    stop: Option<watch::Sender<()>>,
    terminal: Option<MonitorEvent>,
}

struct Shared {
    target: PathBuf,
    interval: Duration,
    classifier: Arc<dyn LineClassifier>,
    state: Mutex<MonitorState>,
    listeners: std::sync::Mutex<Listeners>,
    finished: AtomicBool,
    completion: watch::Sender<Completion>,
}

impl Shared {
    fn listeners(&self) -> std::sync::MutexGuard<'_, Listeners> {
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn dispatch(&self, event: &MonitorEvent) {
        let mut listeners = self.listeners();
        listeners
            .senders
            .retain(|_, tx| tx.send(event.clone()).is_ok());
        if event.is_terminal() {
            listeners.terminal = Some(event.clone());
        }
    }

    fn remove_listener(&self, id: u64) {
        let mut listeners = self.listeners();
        listeners.senders.remove(&id);
        if listeners.senders.is_empty() && listeners.stop.take().is_some() {
            debug!(target = %self.target.display(), "last listener removed, stopping monitor");
        }
    }
}

/// Receiving end of a monitor listener registration.
///
/// Dropping the subscription removes the listener.
pub struct MonitorSubscription {
    id: u64,
    shared: Arc<Shared>,
    events: mpsc::UnboundedReceiver<MonitorEvent>,
}

impl MonitorSubscription {
    /// Wait for the next event. Returns `None` once the monitor is cancelled.
    pub async fn recv(&mut self) -> Option<MonitorEvent> {
        self.events.recv().await
    }

    /// Take an already delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<MonitorEvent> {
        self.events.try_recv().ok()
    }
}

impl Drop for MonitorSubscription {
    fn drop(&mut self) {
        self.shared.remove_listener(self.id);
    }
}

/// Polling monitor for one scheduler output file.
///
/// Cloning yields another handle to the same monitor.
#[derive(Clone)]
pub struct ProcessMonitor {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ProcessMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessMonitor")
            .field("target", &self.shared.target)
            .field("interval", &self.shared.interval)
            .finish()
    }
}

impl ProcessMonitor {
    /// Create a monitor for `target`, polled every `interval`.
    pub fn new(
        target: impl Into<PathBuf>,
        interval: Duration,
        classifier: Arc<dyn LineClassifier>,
    ) -> Self {
        let (completion, _) = watch::channel(Completion::Pending);
        Self {
            shared: Arc::new(Shared {
                target: target.into(),
                interval,
                classifier,
                state: Mutex::new(MonitorState::default()),
                listeners: std::sync::Mutex::new(Listeners::default()),
                finished: AtomicBool::new(false),
                completion,
            }),
        }
    }

    pub fn target(&self) -> &Path {
        &self.shared.target
    }

    /// Register a listener, starting the poll loop if this is the first one.
    ///
    /// A listener added after the job finished immediately receives the
    /// terminal event. Must be called from within a tokio runtime.
    pub fn subscribe(&self) -> MonitorSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut listeners = self.shared.listeners();
        let id = listeners.next_id;
        listeners.next_id += 1;

        if let Some(terminal) = &listeners.terminal {
            let _ = tx.send(terminal.clone());
        } else {
            listeners.senders.insert(id, tx);
            if listeners.stop.is_none() && !self.shared.finished.load(Ordering::SeqCst) {
                let (stop_tx, stop_rx) = watch::channel(());
                listeners.stop = Some(stop_tx);
                tokio::spawn(run_poll_loop(Arc::clone(&self.shared), stop_rx));
            }
        }
        drop(listeners);

        MonitorSubscription {
            id,
            shared: Arc::clone(&self.shared),
            events: rx,
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.shared.listeners().senders.len()
    }

    /// Whether a poll loop is currently running.
    pub fn is_polling(&self) -> bool {
        self.shared.listeners().stop.is_some()
    }

    /// Stop polling and wake every waiter with `MonitorError::Cancelled`.
    ///
    /// Listeners see their channel close.
    pub fn cancel(&self) {
        self.shared.finished.store(true, Ordering::SeqCst);
        {
            let mut listeners = self.shared.listeners();
            listeners.stop = None;
            listeners.senders.clear();
        }
        self.shared.completion.send_if_modified(|current| {
            if *current == Completion::Pending {
                *current = Completion::Stopped;
                true
            } else {
                false
            }
        });
    }

    /// Check the target once and deliver any resulting events.
    ///
    /// Returns the events raised by this poll. Re-polling an unchanged
    /// target raises nothing.
    pub async fn poll_once(&self) -> MonitorResult<Vec<MonitorEvent>> {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        if state.complete || state.failed {
            return Ok(Vec::new());
        }

        let metadata = match tokio::fs::metadata(&shared.target).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if !state.detected {
                    return Ok(Vec::new());
                }
                warn!(target = %shared.target.display(), "monitor target deleted before completion");
                state.failed = true;
                let event = MonitorEvent::Error {
                    exit_value: -1,
                    output: Vec::new(),
                    reason: format!("{} was deleted", shared.target.display()),
                };
                self.finish(&event, Completion::Deleted);
                return Ok(vec![event]);
            }
            Err(source) => {
                return Err(MonitorError::Io {
                    path: shared.target.clone(),
                    source,
                })
            }
        };

        let modified = metadata.modified().ok();
        let len = metadata.len();
        if state.detected && modified == state.last_modified && len == state.last_len {
            return Ok(Vec::new());
        }
        if !state.detected {
            debug!(target = %shared.target.display(), "monitor target detected");
        }
        state.detected = true;
        state.last_modified = modified;
        state.last_len = len;

        let content = tokio::fs::read_to_string(&shared.target)
            .await
            .map_err(|source| MonitorError::Io {
                path: shared.target.clone(),
                source,
            })?;

        let mut captured = Vec::new();
        let mut consumed = 0;
        for line in content.lines().skip(state.lines_consumed) {
            consumed += 1;
            match shared.classifier.classify(line) {
                Ok(LineClass::Completed) => {
                    state.exit_value = 0;
                    state.complete = true;
                }
                Ok(LineClass::ExitedWithCode(code)) => {
                    state.exit_value = code;
                    state.complete = true;
                }
                Ok(LineClass::HostAnnounce(host)) => state.execution_host = Some(host),
                Ok(LineClass::StdoutBegin) => state.capturing = true,
                Ok(LineClass::Plain) => {
                    if state.capturing {
                        captured.push(line.to_string());
                    }
                }
                Err(e) => {
                    warn!(target = %shared.target.display(), error = %e, "failed to parse monitor output");
                    state.lines_consumed += consumed;
                    state.output.extend(captured);
                    state.failed = true;
                    let event = MonitorEvent::Error {
                        exit_value: -1,
                        output: state.output.clone(),
                        reason: e.to_string(),
                    };
                    self.finish(&event, Completion::Unparseable(line.to_string()));
                    return Ok(vec![event]);
                }
            }
        }
        state.lines_consumed += consumed;
        state.output.extend(captured.iter().cloned());

        if state.complete {
            let event = MonitorEvent::Complete {
                exit_value: state.exit_value,
                execution_host: state.execution_host.clone(),
                output: state.output.clone(),
            };
            self.finish(&event, Completion::Exited(state.exit_value));
            Ok(vec![event])
        } else if !captured.is_empty() {
            let event = MonitorEvent::Update { lines: captured };
            shared.dispatch(&event);
            Ok(vec![event])
        } else {
            Ok(Vec::new())
        }
    }

    fn finish(&self, event: &MonitorEvent, completion: Completion) {
        self.shared.finished.store(true, Ordering::SeqCst);
        self.shared.dispatch(event);
        self.shared.completion.send_replace(completion);
    }

    /// Block until the job completes and return its exit value.
    ///
    /// Keeps the poll loop alive while waiting. Fails with `Timeout` when
    /// `timeout` elapses first, `ExternalDeletion` when the target vanished,
    /// and `Cancelled` when the monitor is cancelled.
    #[instrument(skip(self), fields(target = %self.shared.target.display()))]
    pub async fn wait_for_exit_code(&self, timeout: Option<Duration>) -> MonitorResult<i32> {
        let _listener = self.subscribe();
        let mut completion = self.shared.completion.subscribe();

        let wait = async {
            loop {
                let current = completion.borrow_and_update().clone();
                match current {
                    Completion::Pending => {}
                    Completion::Exited(code) => return Ok(code),
                    Completion::Deleted => {
                        return Err(MonitorError::ExternalDeletion {
                            path: self.shared.target.clone(),
                        })
                    }
                    Completion::Unparseable(line) => return Err(MonitorError::BannerParse(line)),
                    Completion::Stopped => return Err(MonitorError::Cancelled),
                }
                if completion.changed().await.is_err() {
                    return Err(MonitorError::Cancelled);
                }
            }
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| MonitorError::Timeout(limit))?,
            None => wait.await,
        }
    }

    pub async fn is_complete(&self) -> bool {
        self.shared.state.lock().await.complete
    }

    /// -1 until the job completes.
    pub async fn exit_value(&self) -> i32 {
        self.shared.state.lock().await.exit_value
    }

    pub async fn execution_host(&self) -> Option<String> {
        self.shared.state.lock().await.execution_host.clone()
    }

    /// Every stdout line captured so far.
    pub async fn output(&self) -> Vec<String> {
        self.shared.state.lock().await.output.clone()
    }
}

#[instrument(skip_all, fields(target = %shared.target.display()))]
async fn run_poll_loop(shared: Arc<Shared>, mut stop: watch::Receiver<()>) {
    let monitor = ProcessMonitor {
        shared: Arc::clone(&shared),
    };
    let start = tokio::time::Instant::now() + shared.interval;
    let mut ticker = tokio::time::interval_at(start, shared.interval);
    debug!(interval = ?shared.interval, "monitor poll loop started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match monitor.poll_once().await {
                    Ok(events) if events.iter().any(MonitorEvent::is_terminal) => {
                        shared.listeners().stop = None;
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "monitor poll failed, retrying next tick"),
                }
            }
            // Err once the stop sender is dropped
            result = stop.changed() => {
                if result.is_err() {
                    break;
                }
            }
        }
    }
    debug!("monitor poll loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::classifier::LsfBannerClassifier;
    use std::io::Write;

    fn monitor_for(path: &Path, interval: Duration) -> ProcessMonitor {
        ProcessMonitor::new(path, interval, Arc::new(LsfBannerClassifier))
    }

    fn append(path: &Path, line: &str) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        writeln!(file, "{line}").unwrap();
    }

    #[tokio::test]
    async fn test_missing_target_raises_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor_for(&dir.path().join("job.log"), Duration::from_secs(3600));
        assert!(monitor.poll_once().await.unwrap().is_empty());
        assert_eq!(monitor.exit_value().await, -1);
    }

    #[tokio::test]
    async fn test_exit_code_completion() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.log");
        let monitor = monitor_for(&path, Duration::from_secs(3600));

        append(&path, "Exited with exit code 2.");
        let events = monitor.poll_once().await.unwrap();
        assert_eq!(
            events,
            vec![MonitorEvent::Complete {
                exit_value: 2,
                execution_host: None,
                output: vec![],
            }]
        );
        assert!(monitor.is_complete().await);
        assert_eq!(monitor.exit_value().await, 2);
    }

    #[tokio::test]
    async fn test_output_after_completion_line_is_captured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.log");
        let monitor = monitor_for(&path, Duration::from_secs(3600));

        // LSF writes its whole report at once, output section last
        std::fs::write(
            &path,
            "Job was executed on host(s) <node7>, in queue <normal>\n\
             Successfully completed.\n\
             Resource usage summary:\n\
             The output (if any) follows:\n\
             42\n",
        )
        .unwrap();

        let events = monitor.poll_once().await.unwrap();
        assert_eq!(
            events,
            vec![MonitorEvent::Complete {
                exit_value: 0,
                execution_host: Some("node7".to_string()),
                output: vec!["42".to_string()],
            }]
        );
    }

    #[tokio::test]
    async fn test_unparseable_banner_fails_loudly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.log");
        let monitor = monitor_for(&path, Duration::from_secs(3600));

        append(&path, "Exited with signal termination: Killed.");
        let events = monitor.poll_once().await.unwrap();
        assert!(matches!(
            events.as_slice(),
            [MonitorEvent::Error { exit_value: -1, .. }]
        ));
        let result = monitor.wait_for_exit_code(None).await;
        assert!(matches!(result, Err(MonitorError::BannerParse(_))));
    }

    #[tokio::test]
    async fn test_listener_refcount_starts_and_stops_loop() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor_for(&dir.path().join("job.log"), Duration::from_secs(3600));
        assert!(!monitor.is_polling());

        let first = monitor.subscribe();
        let second = monitor.subscribe();
        assert!(monitor.is_polling());
        assert_eq!(monitor.listener_count(), 2);

        drop(first);
        assert!(monitor.is_polling());
        drop(second);
        assert!(!monitor.is_polling());
        assert_eq!(monitor.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_late_subscriber_receives_terminal_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.log");
        let monitor = monitor_for(&path, Duration::from_secs(3600));

        append(&path, "Successfully completed.");
        monitor.poll_once().await.unwrap();

        let mut late = monitor.subscribe();
        assert!(matches!(
            late.try_recv(),
            Some(MonitorEvent::Complete { exit_value: 0, .. })
        ));
        assert!(!monitor.is_polling());
    }

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor_for(&dir.path().join("job.log"), Duration::from_secs(3600));

        let waiter = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.wait_for_exit_code(None).await })
        };
        tokio::task::yield_now().await;
        monitor.cancel();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(MonitorError::Cancelled)));
        assert!(!monitor.is_polling());
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor_for(&dir.path().join("job.log"), Duration::from_secs(3600));

        let result = monitor
            .wait_for_exit_code(Some(Duration::from_millis(50)))
            .await;
        assert!(matches!(result, Err(MonitorError::Timeout(_))));
        // The waiter's listener is gone, so the loop stopped
        assert!(!monitor.is_polling());
    }

    #[tokio::test]
    async fn test_poll_loop_detects_completion() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.log");
        let monitor = monitor_for(&path, Duration::from_millis(20));

        append(&path, "The output (if any) follows:");
        append(&path, "done");
        append(&path, "Successfully completed.");

        let exit = monitor
            .wait_for_exit_code(Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(exit, 0);
        assert_eq!(monitor.output().await, vec!["done".to_string()]);
    }
}
