//! Job orchestration.
//!
//! [`JobOrchestrator`] drives one job through its full lifecycle: build the
//! FFmpeg argument vector, supervise the process, upload the artifact,
//! record the terminal result, and dispatch the completion webhook. Every
//! exit path produces exactly one [`JobResult`].

use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use ffcompose_media::{
    build_ffmpeg_args, check_ffmpeg, render_command, EncodeOutcome, FfmpegRunner, MediaError,
};
use ffcompose_models::{
    CancelAck, JobId, JobResult, JobSpec, JobState, JobStatusReport, ProgressState, WebhookPayload,
};

use crate::config::EngineConfig;
use crate::notify::WebhookNotifier;
use crate::registry::JobRegistry;
use crate::storage::ArtifactStore;

/// Orchestrator for transcoding jobs.
///
/// The artifact store is injected at construction; the orchestrator owns
/// the registry that serves [`status`](Self::status) and
/// [`cancel`](Self::cancel). Cloning is cheap and shares all state.
#[derive(Clone)]
pub struct JobOrchestrator {
    config: EngineConfig,
    store: Arc<dyn ArtifactStore>,
    notifier: WebhookNotifier,
    registry: JobRegistry,
}

impl JobOrchestrator {
    pub fn new(config: EngineConfig, store: Arc<dyn ArtifactStore>) -> Self {
        if let Err(e) = check_ffmpeg(&config.ffmpeg_bin) {
            warn!(
                error = %e,
                "FFmpeg unavailable at startup, jobs will fail until it is installed"
            );
        }
        let notifier = WebhookNotifier::new(
            config.webhook_max_retries,
            config.webhook_base_delay,
            config.webhook_timeout,
        );
        Self {
            config,
            store,
            notifier,
            registry: JobRegistry::new(),
        }
    }

    /// Execute a job to its terminal state and return the result.
    ///
    /// Occupies the calling task for the lifetime of the job; use
    /// [`spawn`](Self::spawn) to run it in the background.
    pub async fn execute(&self, job_id: JobId, spec: JobSpec) -> JobResult {
        info!(
            job_id = %job_id,
            inputs = spec.input_files.len(),
            output = %spec.output_file,
            "job accepted"
        );

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (progress_tx, progress_rx) = watch::channel(ProgressState::default());

        if !self.registry.begin(job_id.clone(), cancel_tx, progress_rx.clone()) {
            warn!(job_id = %job_id, "duplicate job id rejected");
            return JobResult::build_failed(
                format!("job {job_id} is already registered"),
                ProgressState::default().failed(),
            );
        }

        let (state, result, message) = self
            .run_to_completion(&job_id, &spec, cancel_rx, progress_tx, progress_rx)
            .await;
        self.registry
            .finish(&job_id, state, result.clone(), message);
        info!(job_id = %job_id, state = %state, success = result.success, "job finished");

        if let Some(endpoint) = spec.webhook_url.as_deref() {
            let payload = WebhookPayload::terminal(job_id.clone(), state, &result);
            self.notifier.dispatch(endpoint, &payload).await;
        }

        result
    }

    /// Run a job on a fresh task, returning a handle to its result.
    pub fn spawn(&self, job_id: JobId, spec: JobSpec) -> JoinHandle<JobResult> {
        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.execute(job_id, spec).await })
    }

    /// Current status of a job, if known.
    pub fn status(&self, job_id: &JobId) -> Option<JobStatusReport> {
        self.registry.status(job_id)
    }

    /// Request cancellation of a job.
    pub fn cancel(&self, job_id: &JobId) -> CancelAck {
        self.registry.cancel(job_id)
    }

    /// Drop a finished job from the registry, after which its status reads
    /// as unknown. Returns false while the job is still running.
    pub fn forget(&self, job_id: &JobId) -> bool {
        self.registry.forget(job_id)
    }

    async fn run_to_completion(
        &self,
        job_id: &JobId,
        spec: &JobSpec,
        cancel_rx: watch::Receiver<bool>,
        progress_tx: watch::Sender<ProgressState>,
        progress_rx: watch::Receiver<ProgressState>,
    ) -> (JobState, JobResult, Option<String>) {
        let args = match build_ffmpeg_args(spec) {
            Ok(args) => args,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "argument build failed");
                return (
                    JobState::Failure,
                    JobResult::build_failed(e.to_string(), ProgressState::default().failed()),
                    None,
                );
            }
        };
        let command = render_command(&self.config.ffmpeg_bin, &args);
        info!(job_id = %job_id, command = %command, "executing FFmpeg");

        if let Err(e) = ensure_parent_dir(&spec.output_file).await {
            error!(job_id = %job_id, error = %e, "output directory unavailable");
            return (
                JobState::Failure,
                JobResult::failed(
                    format!("failed to create output directory: {e}"),
                    command,
                    ProgressState::default().failed(),
                ),
                None,
            );
        }

        let runner = FfmpegRunner::new(&self.config.ffmpeg_bin)
            .with_cancel(cancel_rx)
            .with_progress(progress_tx)
            .report_interval(self.config.report_interval)
            .termination_grace(self.config.termination_grace);

        match runner.run(&args).await {
            Ok(outcome) => self.finalize_upload(job_id, spec, command, outcome).await,
            Err(MediaError::Cancelled) => {
                info!(job_id = %job_id, "job revoked");
                let progress = progress_rx.borrow().clone();
                (
                    JobState::Revoked,
                    JobResult::revoked(command, progress),
                    Some(format!("Task {job_id} has been revoked")),
                )
            }
            Err(MediaError::EncodeFailed { stderr, exit_code }) => {
                error!(job_id = %job_id, exit_code = ?exit_code, "FFmpeg failed");
                let progress = progress_rx.borrow().clone().failed();
                (
                    JobState::Failure,
                    JobResult::encode_failed(stderr, exit_code, command, progress),
                    None,
                )
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "FFmpeg could not run");
                let progress = progress_rx.borrow().clone().failed();
                (
                    JobState::Failure,
                    JobResult::failed(e.to_string(), command, progress),
                    None,
                )
            }
        }
    }

    async fn finalize_upload(
        &self,
        job_id: &JobId,
        spec: &JobSpec,
        command: String,
        outcome: EncodeOutcome,
    ) -> (JobState, JobResult, Option<String>) {
        let output = Path::new(&spec.output_file);
        match self.store.upload(output).await {
            Ok(url) => {
                if let Err(e) = tokio::fs::remove_file(output).await {
                    warn!(
                        job_id = %job_id,
                        error = %e,
                        "could not remove local artifact after upload"
                    );
                }
                info!(job_id = %job_id, url = %url, "artifact uploaded");
                (
                    JobState::Success,
                    JobResult::completed(url, command, outcome.progress.completed()),
                    None,
                )
            }
            Err(e) => {
                // The local file stays on disk for manual recovery.
                error!(job_id = %job_id, error = %e, "artifact upload failed");
                (
                    JobState::Failure,
                    JobResult::upload_failed(e, command, outcome.progress.upload_failed()),
                    None,
                )
            }
        }
    }
}

async fn ensure_parent_dir(output_file: &str) -> std::io::Result<()> {
    if let Some(parent) = Path::new(output_file).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}
