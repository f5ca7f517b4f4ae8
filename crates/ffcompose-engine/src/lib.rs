//! Job orchestration for FFCompose.
//!
//! This crate drives transcoding jobs through their full lifecycle. The
//! [`JobOrchestrator`] accepts a job spec, runs FFmpeg under supervision,
//! uploads the finished artifact through an [`ArtifactStore`], records the
//! terminal result in the [`JobRegistry`], and dispatches a completion
//! webhook. Status queries and cancellation requests are served from the
//! registry at any point in the lifecycle.

pub mod config;
pub mod error;
pub mod notify;
pub mod orchestrator;
pub mod registry;
pub mod storage;

pub use config::EngineConfig;
pub use error::{NotifyError, StorageError};
pub use notify::WebhookNotifier;
pub use orchestrator::JobOrchestrator;
pub use registry::JobRegistry;
pub use storage::{ArtifactStore, LocalArtifactStore};
