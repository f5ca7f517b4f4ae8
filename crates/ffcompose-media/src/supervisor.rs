//! FFmpeg process supervision.
//!
//! [`FfmpegRunner`] owns the full lifecycle of one encode process: spawn
//! with stderr piped and stdout discarded, concurrent stderr consumption
//! feeding the progress tracker, throttled snapshot publication on a watch
//! channel, cooperative cancellation with a bounded grace period, and
//! guaranteed termination on every exit path (`kill_on_drop` backstops
//! panics and dropped futures).

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use ffcompose_models::ProgressState;

use crate::error::{MediaError, MediaResult};
use crate::progress::{KvProgressParser, ProgressTracker};

/// Recent stderr lines kept for failure diagnostics.
const STDERR_TAIL_LINES: usize = 200;

/// Final snapshot of a successfully finished encode.
#[derive(Debug, Clone)]
pub struct EncodeOutcome {
    /// Last progress state observed before exit
    pub progress: ProgressState,
    /// Total media duration, when the stream header revealed it
    pub duration: Option<f64>,
}

/// Supervisor for one FFmpeg process.
///
/// A runner is configured once and can supervise one process per `run`
/// call; each job gets its own cancel and progress channels.
pub struct FfmpegRunner {
    program: String,
    cancel_rx: Option<watch::Receiver<bool>>,
    progress_tx: Option<Arc<watch::Sender<ProgressState>>>,
    report_interval: Duration,
    term_grace: Duration,
    progress_file: Option<(PathBuf, Duration)>,
}

impl FfmpegRunner {
    /// Create a runner for the given FFmpeg binary (name or path).
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            cancel_rx: None,
            progress_tx: None,
            report_interval: Duration::from_secs(1),
            term_grace: Duration::from_secs(5),
            progress_file: None,
        }
    }

    /// Arm cooperative cancellation.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Publish progress snapshots on this channel.
    pub fn with_progress(mut self, progress_tx: watch::Sender<ProgressState>) -> Self {
        self.progress_tx = Some(Arc::new(progress_tx));
        self
    }

    /// Minimum interval between published snapshots (default 1s).
    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Grace period between SIGTERM and SIGKILL on cancellation (default 5s).
    pub fn termination_grace(mut self, grace: Duration) -> Self {
        self.term_grace = grace;
        self
    }

    /// Also poll a `-progress` key=value file at the given interval.
    pub fn poll_progress_file(mut self, path: impl Into<PathBuf>, interval: Duration) -> Self {
        self.progress_file = Some((path.into(), interval));
        self
    }

    /// Run FFmpeg to completion or cancellation.
    ///
    /// Blocks the calling task for the lifetime of the process. On any exit
    /// the final progress snapshot is published unthrottled.
    pub async fn run(&self, args: &[String]) -> MediaResult<EncodeOutcome> {
        check_ffmpeg(&self.program)?;

        debug!(program = %self.program, "spawning: {} {}", self.program, args.join(" "));

        // stdout is discarded rather than piped: nothing reads it, and a
        // piped-but-undrained stream would block the encoder once the pipe
        // buffer fills.
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::spawn_failed(&self.program, e))?;

        let pid = child.id();
        let started = Instant::now();
        let tracker = Arc::new(Mutex::new(ProgressTracker::new()));

        // Publish pid and `processing` before any stream data, so an
        // out-of-band cancel always has a live target.
        publish(&self.progress_tx, &tracker, |t| t.mark_processing(pid));
        info!(pid = ?pid, "FFmpeg process started");

        let reader = spawn_stderr_reader(
            child.stderr.take(),
            Arc::clone(&tracker),
            self.progress_tx.clone(),
            self.report_interval,
            started,
        );
        let poller = self.progress_file.as_ref().map(|(path, interval)| {
            spawn_file_poller(
                path.clone(),
                *interval,
                Arc::downgrade(&tracker),
                self.progress_tx.clone(),
            )
        });

        let waited = self.supervise(&mut child, pid).await;

        // The pipe closes when the process exits (or is killed), ending the
        // reader; collect whatever diagnostics it retained.
        let stderr_tail = reader.await.unwrap_or_default();
        if let Some(poller) = poller {
            poller.abort();
        }

        publish(&self.progress_tx, &tracker, |_| {});

        let status = match waited? {
            WaitOutcome::Exited(status) => status,
            WaitOutcome::Cancelled => {
                info!(pid = ?pid, "FFmpeg run cancelled");
                return Err(MediaError::Cancelled);
            }
        };

        if !status.success() {
            warn!(exit_code = ?status.code(), "FFmpeg exited with failure");
            return Err(MediaError::encode_failed(stderr_tail, status.code()));
        }

        let guard = tracker.lock().unwrap_or_else(|e| e.into_inner());
        Ok(EncodeOutcome {
            progress: guard.state().clone(),
            duration: guard.duration(),
        })
    }

    /// Wait for exit, watching for cancellation.
    async fn supervise(&self, child: &mut Child, pid: Option<u32>) -> MediaResult<WaitOutcome> {
        let mut cancel_rx = match self.cancel_rx.clone() {
            None => return Ok(WaitOutcome::Exited(child.wait().await?)),
            Some(rx) => rx,
        };

        loop {
            if *cancel_rx.borrow_and_update() {
                self.shutdown(child, pid).await;
                return Ok(WaitOutcome::Cancelled);
            }

            tokio::select! {
                status = child.wait() => return Ok(WaitOutcome::Exited(status?)),
                changed = cancel_rx.changed() => {
                    if changed.is_err() {
                        // Cancel side dropped; nothing can signal us anymore.
                        return Ok(WaitOutcome::Exited(child.wait().await?));
                    }
                }
            }
        }
    }

    /// Graceful stop: SIGTERM, bounded grace, then SIGKILL.
    async fn shutdown(&self, child: &mut Child, pid: Option<u32>) {
        info!(pid = ?pid, "stopping FFmpeg process");

        let mut signalled = false;
        if let Some(pid) = pid {
            signalled = send_term_signal(pid);
        }
        if !signalled {
            // No pid or the signal failed to deliver; fall back to the
            // runtime's kill.
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "start_kill failed (process likely already gone)");
            }
        }

        match tokio::time::timeout(self.term_grace, child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                warn!(
                    pid = ?pid,
                    grace_secs = self.term_grace.as_secs(),
                    "FFmpeg ignored termination signal, killing"
                );
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill FFmpeg process");
                }
            }
        }
    }
}

enum WaitOutcome {
    Exited(ExitStatus),
    Cancelled,
}

/// Mutate the tracker and publish the resulting snapshot, unthrottled.
fn publish(
    progress_tx: &Option<Arc<watch::Sender<ProgressState>>>,
    tracker: &Arc<Mutex<ProgressTracker>>,
    mutate: impl FnOnce(&mut ProgressTracker),
) {
    let snapshot = {
        let mut guard = tracker.lock().unwrap_or_else(|e| e.into_inner());
        mutate(&mut guard);
        guard.state().clone()
    };
    if let Some(tx) = progress_tx {
        tx.send_replace(snapshot);
    }
}

/// Consume stderr line-by-line, feeding the tracker and retaining a bounded
/// tail for diagnostics. Snapshots are forwarded at most once per
/// `report_interval`; `send_replace` never blocks the read loop.
fn spawn_stderr_reader(
    stderr: Option<ChildStderr>,
    tracker: Arc<Mutex<ProgressTracker>>,
    progress_tx: Option<Arc<watch::Sender<ProgressState>>>,
    report_interval: Duration,
    started: Instant,
) -> JoinHandle<String> {
    tokio::spawn(async move {
        let Some(stderr) = stderr else {
            return String::new();
        };

        let mut lines = BufReader::new(stderr).lines();
        let mut tail: VecDeque<String> = VecDeque::new();
        let mut last_report = started;

        while let Ok(Some(line)) = lines.next_line().await {
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line.clone());

            let snapshot = {
                let mut guard = tracker.lock().unwrap_or_else(|e| e.into_inner());
                if guard.observe_line(&line) {
                    Some(guard.state().clone())
                } else {
                    None
                }
            };

            if let (Some(snapshot), Some(tx)) = (snapshot, progress_tx.as_ref()) {
                if last_report.elapsed() >= report_interval {
                    tx.send_replace(snapshot);
                    last_report = Instant::now();
                }
            }
        }

        Vec::from(tail).join("\n")
    })
}

/// Timed poll over a `-progress` key=value file.
///
/// The whole append-only file is re-parsed each tick; the tracker's
/// monotonic fold makes replays idempotent. The task ends when aborted or
/// when the tracker is gone (the run future was dropped).
fn spawn_file_poller(
    path: PathBuf,
    interval: Duration,
    tracker: std::sync::Weak<Mutex<ProgressTracker>>,
    progress_tx: Option<Arc<watch::Sender<ProgressState>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let Some(tracker) = tracker.upgrade() else {
                return;
            };
            let Ok(contents) = tokio::fs::read_to_string(&path).await else {
                continue;
            };

            let mut parser = KvProgressParser::new();
            let mut latest = None;
            for line in contents.lines() {
                if let Some(update) = parser.feed(line) {
                    latest = Some(update);
                }
            }

            if let Some(update) = latest {
                let snapshot = {
                    let mut guard = tracker.lock().unwrap_or_else(|e| e.into_inner());
                    guard.observe_update(update);
                    guard.state().clone()
                };
                if let Some(tx) = progress_tx.as_ref() {
                    tx.send_replace(snapshot);
                }
            }
        }
    })
}

/// Check the configured FFmpeg binary is present and executable.
pub fn check_ffmpeg(program: &str) -> MediaResult<PathBuf> {
    which::which(program).map_err(|_| MediaError::FfmpegNotFound(program.to_string()))
}

/// Send SIGTERM to a pid. Returns false when the signal could not be
/// delivered (process already gone, permissions, non-unix platform).
#[cfg(unix)]
pub fn send_term_signal(pid: u32) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
}

#[cfg(not(unix))]
pub fn send_term_signal(_pid: u32) -> bool {
    false
}
