//! Live progress snapshots published while a job runs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Fine-grained status tag carried in progress metadata.
///
/// Distinct from [`crate::JobState`]: these tags describe what the encode
/// pipeline itself is doing, including the `upload_failed` outcome where the
/// encode succeeded but the artifact never reached storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// Not yet spawned
    #[default]
    Pending,
    /// FFmpeg is running
    Processing,
    /// Encode and upload finished
    Completed,
    /// Encode failed or never started
    Failed,
    /// Encode succeeded, upload did not
    UploadFailed,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::Pending => "pending",
            ProgressStatus::Processing => "processing",
            ProgressStatus::Completed => "completed",
            ProgressStatus::Failed => "failed",
            ProgressStatus::UploadFailed => "upload_failed",
        }
    }
}

/// Snapshot of a running job's progress.
///
/// Written only by the process supervisor and read through a watch channel,
/// so observers never synchronize with the stderr read loop. While a job is
/// processing, `progress_percent` is monotonically non-decreasing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ProgressState {
    /// Pipeline status tag
    #[serde(default)]
    pub status: ProgressStatus,

    /// OS process id of the running FFmpeg, once spawned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    /// Elapsed media time in seconds
    #[serde(default)]
    pub time: f64,

    /// Last seen frame count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<u64>,

    /// Last seen encode speed token, e.g. `1.02x`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,

    /// Total media duration in seconds, once discovered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    /// Completion estimate in [0, 100]
    #[serde(default)]
    pub progress_percent: f64,
}

impl ProgressState {
    /// Transition to `processing` with the spawned pid.
    pub fn processing(mut self, pid: Option<u32>) -> Self {
        self.status = ProgressStatus::Processing;
        self.pid = pid;
        self
    }

    /// Transition to `completed` at 100 percent.
    pub fn completed(mut self) -> Self {
        self.status = ProgressStatus::Completed;
        self.progress_percent = 100.0;
        self
    }

    /// Transition to `failed`.
    pub fn failed(mut self) -> Self {
        self.status = ProgressStatus::Failed;
        self
    }

    /// Transition to `upload_failed`, keeping the encode's final numbers.
    pub fn upload_failed(mut self) -> Self {
        self.status = ProgressStatus::UploadFailed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_strings() {
        let json = serde_json::to_string(&ProgressStatus::UploadFailed).unwrap();
        assert_eq!(json, "\"upload_failed\"");
        assert_eq!(ProgressStatus::UploadFailed.as_str(), "upload_failed");
    }

    #[test]
    fn test_default_snapshot() {
        let state = ProgressState::default();
        assert_eq!(state.status, ProgressStatus::Pending);
        assert_eq!(state.progress_percent, 0.0);
        assert!(state.pid.is_none());
    }

    #[test]
    fn test_transitions() {
        let state = ProgressState::default().processing(Some(4242));
        assert_eq!(state.status, ProgressStatus::Processing);
        assert_eq!(state.pid, Some(4242));

        let done = state.clone().completed();
        assert_eq!(done.status, ProgressStatus::Completed);
        assert_eq!(done.progress_percent, 100.0);

        let stranded = state.upload_failed();
        assert_eq!(stranded.status, ProgressStatus::UploadFailed);
    }

    #[test]
    fn test_sparse_serialization() {
        let state = ProgressState::default();
        let json = serde_json::to_value(&state).unwrap();
        // Unset optional fields stay off the wire.
        assert!(json.get("pid").is_none());
        assert!(json.get("frame").is_none());
        assert!(json.get("speed").is_none());
        assert!(json.get("duration").is_none());
        assert_eq!(json["status"], "pending");
    }
}
