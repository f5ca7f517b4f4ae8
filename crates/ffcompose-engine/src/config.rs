//! Engine configuration.

use std::time::Duration;

/// Configuration for the job engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// FFmpeg binary name or path.
    pub ffmpeg_bin: String,
    /// Minimum interval between published progress snapshots.
    pub report_interval: Duration,
    /// Grace period between SIGTERM and SIGKILL when cancelling.
    pub termination_grace: Duration,
    /// Webhook retry count, not counting the initial attempt.
    pub webhook_max_retries: u32,
    /// Base delay for webhook retry backoff. Doubles per attempt.
    pub webhook_base_delay: Duration,
    /// Per-request webhook timeout.
    pub webhook_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            report_interval: Duration::from_secs(1),
            termination_grace: Duration::from_secs(5),
            webhook_max_retries: 2,
            webhook_base_delay: Duration::from_millis(500),
            webhook_timeout: Duration::from_secs(10),
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self {
            ffmpeg_bin: std::env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string()),
            report_interval: Duration::from_millis(
                std::env::var("ENGINE_REPORT_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            termination_grace: Duration::from_secs(
                std::env::var("ENGINE_TERM_GRACE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            webhook_max_retries: std::env::var("WEBHOOK_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            webhook_base_delay: Duration::from_millis(
                std::env::var("WEBHOOK_BASE_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(500),
            ),
            webhook_timeout: Duration::from_secs(
                std::env::var("WEBHOOK_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }
}
