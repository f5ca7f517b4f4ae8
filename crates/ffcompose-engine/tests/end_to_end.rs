//! End-to-end job lifecycle tests against fake encoder scripts.

#![cfg(unix)]

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ffcompose_engine::{
    ArtifactStore, EngineConfig, JobOrchestrator, LocalArtifactStore, StorageError,
};
use ffcompose_models::{CancelAck, JobId, JobSpec, JobState};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let script = dir.join(name);
    let mut file = std::fs::File::create(&script).unwrap();
    writeln!(file, "#!/bin/sh").unwrap();
    writeln!(file, "{body}").unwrap();
    let mut perms = file.metadata().unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script, perms).unwrap();
    script
}

/// Fake encoder: FFmpeg-shaped stderr, then creates the output file named
/// by its final argument.
fn fake_encoder(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "fake-ffmpeg",
        concat!(
            "echo '  Duration: 00:00:10.00, start: 0.000000, bitrate: 128 kb/s' >&2\n",
            "echo 'frame=  100 fps=50 q=28.0 size=256kB time=00:00:05.00 bitrate=419.4kbits/s speed=2.0x' >&2\n",
            "for last in \"$@\"; do :; done\n",
            ": > \"$last\"",
        ),
    )
}

fn config_for(encoder: &Path) -> EngineConfig {
    EngineConfig {
        ffmpeg_bin: encoder.to_string_lossy().into_owned(),
        report_interval: Duration::from_millis(20),
        termination_grace: Duration::from_secs(2),
        ..EngineConfig::default()
    }
}

/// Store that rejects every upload and counts the attempts.
#[derive(Default)]
struct RejectingStore {
    calls: AtomicUsize,
}

#[async_trait]
impl ArtifactStore for RejectingStore {
    async fn upload(&self, _local_path: &Path) -> Result<String, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::upload_failed("service unavailable"))
    }
}

#[tokio::test]
async fn test_full_lifecycle_success_with_webhook() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let publish = tempfile::tempdir().unwrap();
    let encoder = fake_encoder(dir.path());
    let input = dir.path().join("in.mp4");
    std::fs::write(&input, b"source").unwrap();
    let output = dir.path().join("out.mp4");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/jobs"))
        .and(body_partial_json(serde_json::json!({
            "task_id": "e2e-ok",
            "status": "SUCCESS",
            "result": { "output_url": "http://media.local/files/out.mp4" },
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = LocalArtifactStore::new(publish.path(), "http://media.local/files");
    let orchestrator = JobOrchestrator::new(config_for(&encoder), Arc::new(store));

    let spec = JobSpec::new(output.to_string_lossy())
        .with_input(input.to_string_lossy())
        .with_option("y", true)
        .with_webhook(format!("{}/hooks/jobs", server.uri()));

    let result = orchestrator.execute(JobId::from("e2e-ok"), spec).await;

    assert!(result.success, "job failed: {:?}", result.error);
    assert_eq!(
        result.output_url.as_deref(),
        Some("http://media.local/files/out.mp4")
    );
    assert_eq!(
        result.message.as_deref(),
        Some("FFmpeg processing and upload completed successfully")
    );
    assert!(publish.path().join("out.mp4").exists());
    assert!(!output.exists());

    let report = orchestrator.status(&JobId::from("e2e-ok")).unwrap();
    assert_eq!(report.status, JobState::Success);
    assert!(report.result.unwrap().success);
}

#[tokio::test]
async fn test_cancellation_mid_run() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let encoder = write_script(dir.path(), "slow-ffmpeg", "exec sleep 30");
    let output = dir.path().join("out.mp4");

    let store = Arc::new(RejectingStore::default());
    let orchestrator = JobOrchestrator::new(config_for(&encoder), store.clone());
    let spec = JobSpec::new(output.to_string_lossy()).with_input("in.mp4");

    let id = JobId::from("e2e-cancel");
    let handle = orchestrator.spawn(id.clone(), spec);

    // Wait until the process is actually running and its pid is visible.
    let mut running = false;
    for _ in 0..500 {
        if let Some(report) = orchestrator.status(&id) {
            if report.status == JobState::Processing {
                if report.progress.as_ref().and_then(|p| p.pid).is_some() {
                    running = true;
                    break;
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(running, "job never reached PROCESSING with a pid");

    let ack = orchestrator.cancel(&id);
    match &ack {
        CancelAck::Revoking { message } => {
            assert_eq!(message, "Task e2e-cancel has been revoked");
        }
        other => panic!("unexpected ack: {other:?}"),
    }

    let result = handle.await.unwrap();
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("revoked by user"));

    let report = orchestrator.status(&id).unwrap();
    assert_eq!(report.status, JobState::Revoked);
    assert_eq!(report.message.as_deref(), Some("Task e2e-cancel has been revoked"));

    // A second cancel finds the job already finished.
    match orchestrator.cancel(&id) {
        CancelAck::AlreadyCompleted { state, message } => {
            assert_eq!(state, JobState::Revoked);
            assert_eq!(message, "Task already completed, cannot be stopped");
        }
        other => panic!("unexpected ack: {other:?}"),
    }

    // Storage was never consulted for a revoked job.
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_upload_failure_reports_failure_webhook_and_keeps_artifact() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let encoder = fake_encoder(dir.path());
    let output = dir.path().join("out.mp4");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/jobs"))
        .and(body_partial_json(serde_json::json!({
            "task_id": "e2e-upload",
            "status": "FAILURE",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(RejectingStore::default());
    let orchestrator = JobOrchestrator::new(config_for(&encoder), store.clone());
    let spec = JobSpec::new(output.to_string_lossy())
        .with_input("in.mp4")
        .with_webhook(format!("{}/hooks/jobs", server.uri()));

    let result = orchestrator.execute(JobId::from("e2e-upload"), spec).await;

    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Failed to upload file: upload failed: service unavailable")
    );
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    // The finished encode stays on disk when the upload fails.
    assert!(output.exists());
}

#[tokio::test]
async fn test_status_of_unknown_job_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = fake_encoder(dir.path());
    let orchestrator = JobOrchestrator::new(
        config_for(&encoder),
        Arc::new(RejectingStore::default()),
    );
    assert!(orchestrator.status(&JobId::from("nobody")).is_none());
}
