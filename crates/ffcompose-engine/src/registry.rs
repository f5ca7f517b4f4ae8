//! In-memory job registry.
//!
//! Tracks every job the orchestrator has accepted. Active entries hold the
//! cancel signal and a live progress receiver; terminal entries retain the
//! final result for later status queries.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use ffcompose_media::send_term_signal;
use ffcompose_models::{
    CancelAck, JobId, JobResult, JobState, JobStatusReport, ProgressState, ProgressStatus,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Shared job table. Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<JobId, JobEntry>>>,
}

#[derive(Debug)]
enum JobEntry {
    Active {
        cancel_tx: watch::Sender<bool>,
        progress_rx: watch::Receiver<ProgressState>,
    },
    Terminal {
        state: JobState,
        result: JobResult,
        message: Option<String>,
    },
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a job into the table. Returns false when the id is already
    /// registered, leaving the existing entry untouched.
    pub fn begin(
        &self,
        job_id: JobId,
        cancel_tx: watch::Sender<bool>,
        progress_rx: watch::Receiver<ProgressState>,
    ) -> bool {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        match jobs.entry(job_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(JobEntry::Active {
                    cancel_tx,
                    progress_rx,
                });
                true
            }
        }
    }

    /// Replace a job's entry with its terminal state.
    pub fn finish(
        &self,
        job_id: &JobId,
        state: JobState,
        result: JobResult,
        message: Option<String>,
    ) {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        jobs.insert(
            job_id.clone(),
            JobEntry::Terminal {
                state,
                result,
                message,
            },
        );
    }

    /// Drop a job's terminal entry, so later queries report it as unknown.
    ///
    /// Retained results otherwise live for the registry's lifetime; the
    /// embedding worker calls this to apply its result-expiry policy.
    /// Active jobs are kept (cancel them first). Returns whether an entry
    /// was removed.
    pub fn forget(&self, job_id: &JobId) -> bool {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        if matches!(jobs.get(job_id), Some(JobEntry::Terminal { .. })) {
            jobs.remove(job_id);
            debug!(job_id = %job_id, "terminal entry dropped");
            true
        } else {
            false
        }
    }

    /// Report the current state of a job, if known.
    ///
    /// Active jobs expose the latest progress snapshot; the state is PENDING
    /// until the first snapshot with a spawned process arrives. Terminal
    /// jobs expose the retained result.
    pub fn status(&self, job_id: &JobId) -> Option<JobStatusReport> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        match jobs.get(job_id)? {
            JobEntry::Active { progress_rx, .. } => {
                let progress = progress_rx.borrow().clone();
                let state = match progress.status {
                    ProgressStatus::Pending => JobState::Pending,
                    _ => JobState::Processing,
                };
                Some(JobStatusReport::active(job_id.clone(), state, progress))
            }
            JobEntry::Terminal {
                state,
                result,
                message,
            } => Some(JobStatusReport::terminal(
                job_id.clone(),
                *state,
                result.clone(),
                message.clone(),
            )),
        }
    }

    /// Request cancellation of a job.
    ///
    /// Signals the job's cancel watch and, when the latest snapshot carries
    /// a pid, sends SIGTERM to it directly as well. Jobs already in a
    /// terminal state are acknowledged without signalling anything.
    pub fn cancel(&self, job_id: &JobId) -> CancelAck {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        match jobs.get(job_id) {
            None => CancelAck::NotFound,
            Some(JobEntry::Active {
                cancel_tx,
                progress_rx,
            }) => {
                let _ = cancel_tx.send(true);
                if let Some(pid) = progress_rx.borrow().pid {
                    if send_term_signal(pid) {
                        info!(job_id = %job_id, pid, "termination signal sent");
                    }
                }
                info!(job_id = %job_id, "cancellation requested");
                CancelAck::Revoking {
                    message: format!("Task {job_id} has been revoked"),
                }
            }
            Some(JobEntry::Terminal { state, .. }) => {
                warn!(job_id = %job_id, state = %state, "cancel requested for finished job");
                CancelAck::AlreadyCompleted {
                    state: *state,
                    message: "Task already completed, cannot be stopped".to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels() -> (watch::Sender<bool>, watch::Receiver<ProgressState>) {
        let (cancel_tx, _cancel_rx) = watch::channel(false);
        let (_progress_tx, progress_rx) = watch::channel(ProgressState::default());
        (cancel_tx, progress_rx)
    }

    #[test]
    fn test_begin_rejects_duplicate_ids() {
        let registry = JobRegistry::new();
        let id = JobId::from("job-1");
        let (tx1, rx1) = channels();
        let (tx2, rx2) = channels();

        assert!(registry.begin(id.clone(), tx1, rx1));
        assert!(!registry.begin(id, tx2, rx2));
    }

    #[test]
    fn test_status_tracks_progress_snapshots() {
        let registry = JobRegistry::new();
        let id = JobId::from("job-2");
        let (cancel_tx, _cancel_rx) = watch::channel(false);
        let (progress_tx, progress_rx) = watch::channel(ProgressState::default());
        registry.begin(id.clone(), cancel_tx, progress_rx);

        let report = registry.status(&id).unwrap();
        assert_eq!(report.status, JobState::Pending);

        progress_tx.send_replace(ProgressState::default().processing(Some(42)));
        let report = registry.status(&id).unwrap();
        assert_eq!(report.status, JobState::Processing);
        assert_eq!(report.progress.unwrap().pid, Some(42));
    }

    #[test]
    fn test_finish_retains_result_for_status() {
        let registry = JobRegistry::new();
        let id = JobId::from("job-3");
        let (cancel_tx, rx) = channels();
        registry.begin(id.clone(), cancel_tx, rx);

        let result = JobResult::completed(
            "http://media.local/out.mp4",
            "ffmpeg -i in.mp4 out.mp4",
            ProgressState::default().completed(),
        );
        registry.finish(&id, JobState::Success, result, None);

        let report = registry.status(&id).unwrap();
        assert_eq!(report.status, JobState::Success);
        assert!(report.result.unwrap().success);
    }

    #[test]
    fn test_cancel_signals_active_job() {
        let registry = JobRegistry::new();
        let id = JobId::from("job-4");
        let (cancel_tx, progress_rx) = channels();
        let mut cancel_rx = cancel_tx.subscribe();
        registry.begin(id.clone(), cancel_tx, progress_rx);

        let ack = registry.cancel(&id);
        assert!(ack.is_revoking());
        assert!(*cancel_rx.borrow_and_update());
    }

    #[test]
    fn test_cancel_after_terminal_acknowledges_without_signal() {
        let registry = JobRegistry::new();
        let id = JobId::from("job-5");
        let (cancel_tx, rx) = channels();
        registry.begin(id.clone(), cancel_tx, rx);
        let result = JobResult::failed(
            "boom",
            "ffmpeg -i in.mp4 out.mp4",
            ProgressState::default().failed(),
        );
        registry.finish(&id, JobState::Failure, result, None);

        match registry.cancel(&id) {
            CancelAck::AlreadyCompleted { state, message } => {
                assert_eq!(state, JobState::Failure);
                assert_eq!(message, "Task already completed, cannot be stopped");
            }
            other => panic!("unexpected ack: {other:?}"),
        }
    }

    #[test]
    fn test_cancel_unknown_job() {
        let registry = JobRegistry::new();
        assert!(matches!(
            registry.cancel(&JobId::from("ghost")),
            CancelAck::NotFound
        ));
    }

    #[test]
    fn test_forget_drops_terminal_entries() {
        let registry = JobRegistry::new();
        let id = JobId::from("job-6");
        let (cancel_tx, rx) = channels();
        registry.begin(id.clone(), cancel_tx, rx);
        let result = JobResult::completed(
            "http://media.local/out.mp4",
            "ffmpeg -i in.mp4 out.mp4",
            ProgressState::default().completed(),
        );
        registry.finish(&id, JobState::Success, result, None);

        assert!(registry.forget(&id));
        assert!(registry.status(&id).is_none());
        assert!(matches!(registry.cancel(&id), CancelAck::NotFound));
        // A second forget finds nothing.
        assert!(!registry.forget(&id));
    }

    #[test]
    fn test_forget_leaves_active_jobs_alone() {
        let registry = JobRegistry::new();
        let id = JobId::from("job-7");
        let (cancel_tx, rx) = channels();
        registry.begin(id.clone(), cancel_tx, rx);

        assert!(!registry.forget(&id));
        assert_eq!(registry.status(&id).unwrap().status, JobState::Pending);
    }
}
