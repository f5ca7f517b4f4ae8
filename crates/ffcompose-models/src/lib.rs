//! Shared data models for the FFCompose job engine.
//!
//! This crate provides Serde-serializable types for:
//! - Declarative FFmpeg job requests (`JobSpec` and option values)
//! - Job identity and lifecycle states
//! - Live progress snapshots published while a job runs
//! - Terminal job results and status reports
//! - Webhook notification payloads

pub mod job;
pub mod progress;
pub mod result;
pub mod spec;
pub mod webhook;

// Re-export common types
pub use job::{JobId, JobState};
pub use progress::{ProgressState, ProgressStatus};
pub use result::{CancelAck, JobResult, JobStatusReport};
pub use spec::{InputSource, JobSpec, OptionValue};
pub use webhook::WebhookPayload;
