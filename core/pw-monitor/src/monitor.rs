//! Owns the `pw-dump -m` child process and the worker thread that turns its
//! output into sink notifications.
//!
//! The worker blocks on the child's stdout. Clearing the running flag alone
//! cannot wake it, so `stop` also terminates the child, which closes the pipe
//! and lets the blocked read return end-of-stream.

use std::io::BufReader;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::classify::classify;
use crate::error::{MonitorError, Result};
use crate::framer::SnapshotFrames;
use crate::reconcile::Reconciler;
use crate::sink::{deliver, StreamSink};
use crate::types::StreamEvent;

pub const DEFAULT_PRODUCER_COMMAND: &str = "pw-dump";
pub const DEFAULT_PRODUCER_ARGS: &[&str] = &["-m"];
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 2_000;

const TERMINATE_GRACE_MS: u64 = 500;
const REAP_POLL_MS: u64 = 20;
const WORKER_THREAD_NAME: &str = "pw-monitor-worker";

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Upper bound on how long `stop` waits for the worker.
    pub join_timeout: Duration,
    /// Cap on a single buffered snapshot. `None` means unbounded.
    pub max_snapshot_bytes: Option<usize>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_PRODUCER_COMMAND.to_string(),
            args: DEFAULT_PRODUCER_ARGS
                .iter()
                .map(|arg| arg.to_string())
                .collect(),
            join_timeout: Duration::from_millis(DEFAULT_JOIN_TIMEOUT_MS),
            max_snapshot_bytes: None,
        }
    }
}

/// Watches the PipeWire graph and reports streams starting and stopping.
///
/// `Stopped` until `start`, `Running` until `stop` or until the producer
/// exits on its own. Each start begins a fresh session with empty state.
pub struct StreamMonitor {
    config: MonitorConfig,
    sink: Arc<dyn StreamSink>,
    session: Option<Session>,
}

struct Session {
    running: Arc<AtomicBool>,
    child: Arc<Mutex<Child>>,
    done_rx: Receiver<()>,
    join: JoinHandle<()>,
}

impl StreamMonitor {
    pub fn new(config: MonitorConfig, sink: Arc<dyn StreamSink>) -> Self {
        Self {
            config,
            sink,
            session: None,
        }
    }

    /// True while the worker is alive and has not been asked to stop.
    pub fn is_running(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.running.load(Ordering::Acquire))
    }

    /// Spawns the producer and the worker. No-op while already running.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        // A previous worker that ended on its own still needs joining.
        if let Some(session) = self.session.take() {
            session.finish(self.config.join_timeout);
        }

        let mut child = Command::new(&self.config.command)
            .args(&self.config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| MonitorError::Spawn {
                command: self.config.command.clone(),
                source,
            })?;
        let pid = child.id();

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(MonitorError::MissingStdout {
                command: self.config.command.clone(),
            });
        };

        let child = Arc::new(Mutex::new(child));
        let running = Arc::new(AtomicBool::new(true));
        let (done_tx, done_rx) = mpsc::channel();

        let worker = Worker {
            frames: SnapshotFrames::with_limit(
                BufReader::new(stdout),
                self.config.max_snapshot_bytes,
            ),
            sink: Arc::clone(&self.sink),
            running: Arc::clone(&running),
            _reaper: ChildReaper {
                child: Arc::clone(&child),
            },
            _flag: RunningFlagGuard {
                running: Arc::clone(&running),
            },
            _done: done_tx,
        };

        // On spawn failure the closure, and with it the worker, is dropped,
        // which reaps the child and clears the flag.
        let join = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run())
            .map_err(MonitorError::Worker)?;

        info!(
            command = %self.config.command,
            pid,
            "Started monitoring PipeWire streams"
        );

        self.session = Some(Session {
            running,
            child,
            done_rx,
            join,
        });
        Ok(())
    }

    /// Stops the worker and the producer, waiting at most `join_timeout`.
    ///
    /// Once this returns (without a timeout warning) the sink receives no
    /// further calls.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        session.running.store(false, Ordering::Release);
        signal_terminate(&session.child);
        session.finish(self.config.join_timeout);
        info!("Stopped monitoring PipeWire streams");
    }
}

impl Drop for StreamMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Session {
    fn finish(self, timeout: Duration) {
        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.join.join().is_err() {
                    warn!("Monitor worker panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                // Dropping the handle detaches the thread.
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Monitor worker did not exit in time; detaching"
                );
            }
        }
    }
}

struct Worker {
    frames: SnapshotFrames<BufReader<ChildStdout>>,
    sink: Arc<dyn StreamSink>,
    running: Arc<AtomicBool>,
    _reaper: ChildReaper,
    _flag: RunningFlagGuard,
    // Dropped last; disconnecting it tells `finish` the worker is done.
    _done: Sender<()>,
}

impl Worker {
    fn run(mut self) {
        let mut reconciler = Reconciler::new();

        while self.running.load(Ordering::Acquire) {
            let document = match self.frames.next() {
                Some(Ok(document)) => document,
                Some(Err(err)) => {
                    warn!(error = %err, "Snapshot feed failed; stopping monitor");
                    break;
                }
                None => {
                    info!("PipeWire producer output closed");
                    break;
                }
            };

            let nodes = classify(&document);
            let events = reconciler.reconcile(&nodes);
            debug!(
                relevant = nodes.len(),
                events = events.len(),
                active = reconciler.active_streams().len(),
                "Snapshot reconciled"
            );

            for event in &events {
                if !self.running.load(Ordering::Acquire) {
                    return;
                }
                log_event(event);
                deliver(self.sink.as_ref(), event);
            }
        }
    }
}

fn log_event(event: &StreamEvent) {
    match event {
        StreamEvent::Started { node_id, app_name } => {
            info!(node_id, app = %app_name, "Stream started");
        }
        StreamEvent::Stopped {
            node_id,
            app_name,
            cause,
        } => {
            info!(node_id, app = %app_name, cause = ?cause, "Stream stopped");
        }
    }
}

struct RunningFlagGuard {
    running: Arc<AtomicBool>,
}

impl Drop for RunningFlagGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

struct ChildReaper {
    child: Arc<Mutex<Child>>,
}

impl Drop for ChildReaper {
    fn drop(&mut self) {
        terminate_and_reap(&self.child);
    }
}

/// Asks a still-running producer to exit. Safe to call repeatedly and
/// concurrently with the worker's blocked read.
fn signal_terminate(child: &Mutex<Child>) {
    let mut child = child.lock().unwrap_or_else(PoisonError::into_inner);
    // Only signal an unreaped pid; a reaped one may already be recycled.
    if let Ok(None) = child.try_wait() {
        send_sigterm(&mut child);
    }
}

fn terminate_and_reap(child: &Mutex<Child>) {
    let mut child = child.lock().unwrap_or_else(PoisonError::into_inner);
    match child.try_wait() {
        Ok(Some(status)) => {
            debug!(%status, "PipeWire producer already exited");
            return;
        }
        Ok(None) => send_sigterm(&mut child),
        Err(err) => warn!(error = %err, "Failed to poll PipeWire producer"),
    }

    let deadline = Instant::now() + Duration::from_millis(TERMINATE_GRACE_MS);
    while Instant::now() < deadline {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(%status, "PipeWire producer exited");
                return;
            }
            Ok(None) => thread::sleep(Duration::from_millis(REAP_POLL_MS)),
            Err(_) => break,
        }
    }

    warn!(pid = child.id(), "PipeWire producer ignored SIGTERM; killing");
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
fn send_sigterm(child: &mut Child) {
    let pid = child.id() as libc::pid_t;
    // SAFETY: kill(2) with SIGTERM only delivers a signal. Callers hold the
    // child lock and have seen try_wait return None, so the pid is unreaped
    // and still ours. A failure falls back to Child::kill.
    let result = unsafe { libc::kill(pid, libc::SIGTERM) };
    if result != 0 {
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn send_sigterm(child: &mut Child) {
    let _ = child.kill();
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullSink;

    impl StreamSink for NullSink {
        fn on_start(&self, _node_id: crate::NodeId, _app_name: &str) {}
        fn on_stop(&self, _node_id: crate::NodeId, _app_name: &str) {}
    }

    #[test]
    fn default_config_runs_pw_dump_in_monitor_mode() {
        let config = MonitorConfig::default();
        assert_eq!(config.command, "pw-dump");
        assert_eq!(config.args, vec!["-m".to_string()]);
        assert_eq!(config.join_timeout, Duration::from_secs(2));
        assert!(config.max_snapshot_bytes.is_none());
    }

    #[test]
    fn new_monitor_is_stopped_and_stop_is_noop() {
        let mut monitor = StreamMonitor::new(MonitorConfig::default(), Arc::new(NullSink));
        assert!(!monitor.is_running());
        monitor.stop();
        assert!(!monitor.is_running());
    }

    #[test]
    fn start_reports_missing_producer() {
        let config = MonitorConfig {
            command: "pw-monitor-test-no-such-binary".to_string(),
            ..MonitorConfig::default()
        };
        let mut monitor = StreamMonitor::new(config, Arc::new(NullSink));
        let err = monitor.start().expect_err("spawn should fail");
        assert!(matches!(err, MonitorError::Spawn { .. }));
        assert!(!monitor.is_running());
    }
}
