//! FFmpeg command building, progress parsing, and process supervision.
//!
//! This crate turns a declarative [`ffcompose_models::JobSpec`] into an
//! argument vector, runs the external `ffmpeg` binary under a supervisor
//! with cooperative cancellation, and extracts live progress from the
//! process's diagnostic output.

pub mod command;
pub mod error;
pub mod progress;
pub mod supervisor;

pub use command::{build_ffmpeg_args, render_command, split_command_tokens};
pub use error::{MediaError, MediaResult};
pub use progress::{KvProgressParser, ProgressTracker, ProgressUpdate, FALLBACK_DURATION_SECS};
pub use supervisor::{check_ffmpeg, send_term_signal, EncodeOutcome, FfmpegRunner};
