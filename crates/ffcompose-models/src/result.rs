//! Terminal job results and status reports.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{JobId, JobState};
use crate::progress::ProgressState;

/// Terminal outcome of a job, produced exactly once on every exit path.
///
/// `command` is the human-readable rendered command line, carried for logs
/// and debugging only; it is never re-parsed.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobResult {
    /// True only when the encode ran and the artifact was uploaded
    pub success: bool,

    /// Durable artifact URL, on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,

    /// Failure detail (captured stderr, upload error, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Rendered command line, or `command not built` when the builder failed
    pub command: String,

    /// FFmpeg exit code, when the process ran to an exit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_code: Option<i32>,

    /// Human-readable completion note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Final progress snapshot
    pub progress: ProgressState,
}

impl JobResult {
    /// Encode and upload both succeeded.
    pub fn completed(
        output_url: impl Into<String>,
        command: impl Into<String>,
        progress: ProgressState,
    ) -> Self {
        Self {
            success: true,
            output_url: Some(output_url.into()),
            error: None,
            command: command.into(),
            return_code: Some(0),
            message: Some("FFmpeg processing and upload completed successfully".to_string()),
            progress,
        }
    }

    /// FFmpeg exited non-zero (or died to a signal).
    pub fn encode_failed(
        error: impl Into<String>,
        return_code: Option<i32>,
        command: impl Into<String>,
        progress: ProgressState,
    ) -> Self {
        Self {
            success: false,
            output_url: None,
            error: Some(error.into()),
            command: command.into(),
            return_code,
            message: None,
            progress,
        }
    }

    /// Encode succeeded but the artifact never reached storage.
    pub fn upload_failed(
        cause: impl std::fmt::Display,
        command: impl Into<String>,
        progress: ProgressState,
    ) -> Self {
        Self {
            success: false,
            output_url: None,
            error: Some(format!("Failed to upload file: {cause}")),
            command: command.into(),
            return_code: Some(0),
            message: None,
            progress,
        }
    }

    /// The argument vector could not be built; nothing was spawned.
    pub fn build_failed(error: impl Into<String>, progress: ProgressState) -> Self {
        Self {
            success: false,
            output_url: None,
            error: Some(error.into()),
            command: "command not built".to_string(),
            return_code: None,
            message: None,
            progress,
        }
    }

    /// Cancelled by user request.
    pub fn revoked(command: impl Into<String>, progress: ProgressState) -> Self {
        Self {
            success: false,
            output_url: None,
            error: Some("revoked by user".to_string()),
            command: command.into(),
            return_code: None,
            message: None,
            progress,
        }
    }

    /// Generic failure with no exit code (spawn error, IO error, ...).
    pub fn failed(
        error: impl Into<String>,
        command: impl Into<String>,
        progress: ProgressState,
    ) -> Self {
        Self {
            success: false,
            output_url: None,
            error: Some(error.into()),
            command: command.into(),
            return_code: None,
            message: None,
            progress,
        }
    }
}

/// Answer to a status query.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobStatusReport {
    pub task_id: JobId,
    pub status: JobState,

    /// Live (or final) progress snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressState>,

    /// Terminal result, once the job has finished
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,

    /// Revoke acknowledgment, for revoked jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl JobStatusReport {
    /// Report for a job that is still pending or running.
    pub fn active(task_id: JobId, status: JobState, progress: ProgressState) -> Self {
        Self {
            task_id,
            status,
            progress: Some(progress),
            result: None,
            message: None,
        }
    }

    /// Report for a finished job.
    pub fn terminal(
        task_id: JobId,
        status: JobState,
        result: JobResult,
        message: Option<String>,
    ) -> Self {
        Self {
            task_id,
            status,
            progress: Some(result.progress.clone()),
            result: Some(result),
            message,
        }
    }
}

/// Outcome of a cancellation request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CancelAck {
    /// Signal delivered; the job will finish as REVOKED
    Revoking { message: String },
    /// The job already finished; nothing was signalled
    AlreadyCompleted { state: JobState, message: String },
    /// No job with this id
    NotFound,
}

impl CancelAck {
    pub fn is_revoking(&self) -> bool {
        matches!(self, CancelAck::Revoking { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_result_shape() {
        let result = JobResult::completed(
            "http://store.local/media/out.mp4",
            "ffmpeg -i in.mp4 out.mp4",
            ProgressState::default().completed(),
        );

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["output_url"], "http://store.local/media/out.mp4");
        assert_eq!(json["return_code"], 0);
        assert!(json.get("error").is_none());
        assert_eq!(json["progress"]["status"], "completed");
    }

    #[test]
    fn test_encode_failed_carries_stderr_and_code() {
        let result = JobResult::encode_failed(
            "Unknown encoder 'libx999'",
            Some(1),
            "ffmpeg -i in.mp4 out.mp4",
            ProgressState::default().failed(),
        );
        assert!(!result.success);
        assert_eq!(result.return_code, Some(1));
        assert!(result.error.unwrap().contains("libx999"));
        assert!(result.output_url.is_none());
    }

    #[test]
    fn test_upload_failed_wording() {
        let result = JobResult::upload_failed(
            "connection refused",
            "ffmpeg -i in.mp4 out.mp4",
            ProgressState::default().upload_failed(),
        );
        assert_eq!(
            result.error.as_deref(),
            Some("Failed to upload file: connection refused")
        );
        // The encode itself finished cleanly.
        assert_eq!(result.return_code, Some(0));
    }

    #[test]
    fn test_build_failed_has_no_command() {
        let result = JobResult::build_failed(
            "nested list for option 'map'",
            ProgressState::default().failed(),
        );
        assert_eq!(result.command, "command not built");
        assert!(result.return_code.is_none());
    }

    #[test]
    fn test_status_report_for_terminal_job() {
        let result = JobResult::revoked("ffmpeg -i in.mp4 out.mp4", ProgressState::default());
        let report = JobStatusReport::terminal(
            JobId::from("t1"),
            JobState::Revoked,
            result,
            Some("Task t1 has been revoked".to_string()),
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "REVOKED");
        assert_eq!(json["task_id"], "t1");
        assert!(json["result"]["error"].as_str().unwrap().contains("revoked"));
    }

    #[test]
    fn test_cancel_ack_tagging() {
        let ack = CancelAck::AlreadyCompleted {
            state: JobState::Success,
            message: "Task already completed, cannot be stopped".to_string(),
        };
        assert!(!ack.is_revoking());

        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json["outcome"], "already_completed");
        assert_eq!(json["state"], "SUCCESS");
    }
}
