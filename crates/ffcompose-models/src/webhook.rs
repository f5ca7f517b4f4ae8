//! Webhook notification payloads.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{JobId, JobState};
use crate::progress::ProgressState;
use crate::result::JobResult;

/// Completion callback body POSTed to a job's webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WebhookPayload {
    pub task_id: JobId,
    pub status: JobState,

    /// Final progress snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressState>,

    /// Terminal result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,

    /// When the terminal state was recorded
    pub timestamp: DateTime<Utc>,
}

impl WebhookPayload {
    /// Payload for a job that reached a terminal state.
    pub fn terminal(task_id: JobId, status: JobState, result: &JobResult) -> Self {
        Self {
            task_id,
            status,
            progress: Some(result.progress.clone()),
            result: Some(result.clone()),
            timestamp: Utc::now(),
        }
    }
}
