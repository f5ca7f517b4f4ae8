//! FFmpeg progress extraction.
//!
//! Two ingestion modes feed the same [`ProgressTracker`]: the human-readable
//! stderr chatter (`Duration: ...` headers and `time=... frame=... speed=...`
//! status lines) and the machine-readable `-progress` key=value stream. Both
//! normalize to a [`ProgressUpdate`]; the tracker folds updates into a
//! [`ProgressState`] and owns the monotonic-percent invariant.

use ffcompose_models::ProgressState;

/// Assumed media duration when none has been discovered, so the percent
/// still moves on inputs whose header never reaches stderr.
pub const FALLBACK_DURATION_SECS: f64 = 300.0;

/// Floor applied once any elapsed time or frame has been seen, so callers
/// never watch a job stuck at zero.
const MIN_VISIBLE_PERCENT: f64 = 0.1;

/// One normalized observation from either ingestion mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressUpdate {
    /// Elapsed media time in seconds
    pub time: f64,
    /// Frame counter, when present and parseable
    pub frame: Option<u64>,
    /// Opaque speed token, e.g. `1.02x`
    pub speed: Option<String>,
}

/// Outcome of feeding one stderr line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineOutcome {
    /// Progress observed on this line
    pub update: Option<ProgressUpdate>,
    /// Total duration discovered on this line
    pub duration: Option<f64>,
}

/// Parse `HH:MM:SS[.frac]` into seconds. Rejects negative components, which
/// FFmpeg emits for unknown positions.
pub fn parse_timestamp(value: &str) -> Option<f64> {
    let mut parts = value.split(':');
    let hours: f64 = parts.next()?.trim().parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    if hours < 0.0 || minutes < 0.0 || seconds < 0.0 {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Extract the total duration from a `Duration: HH:MM:SS.cc, ...` header
/// line. `Duration: N/A` yields nothing.
pub fn parse_duration_line(line: &str) -> Option<f64> {
    let rest = line.split("Duration:").nth(1)?;
    let token = rest.trim_start().split(',').next()?.trim();
    parse_timestamp(token)
}

/// Extract a progress update from a stderr status line containing `time=`.
pub fn parse_status_line(line: &str) -> Option<ProgressUpdate> {
    let time = parse_timestamp(token_after(line, "time=")?)?;
    let frame = token_after(line, "frame=").and_then(|t| t.parse().ok());
    let speed = token_after(line, "speed=")
        .filter(|t| *t != "N/A")
        .map(str::to_string);
    Some(ProgressUpdate { time, frame, speed })
}

/// First whitespace-delimited token after `marker`, tolerating the column
/// padding FFmpeg inserts after `frame=`.
fn token_after<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.split(marker).nth(1)?.split_whitespace().next()
}

/// Parse one diagnostic line, discovering the duration at most once.
///
/// A `Duration:` header yields only the discovered total (and only while
/// `known_duration` is unset); a `time=` status line yields an update. Every
/// other line yields nothing.
pub fn feed_line(line: &str, known_duration: Option<f64>) -> LineOutcome {
    if line.contains("Duration:") {
        if known_duration.is_none() {
            return LineOutcome {
                update: None,
                duration: parse_duration_line(line),
            };
        }
        return LineOutcome::default();
    }

    if line.contains("time=") {
        return LineOutcome {
            update: parse_status_line(line),
            duration: None,
        };
    }

    LineOutcome::default()
}

/// Accumulator for the `-progress` key=value stream.
///
/// Fields arrive one per line; a complete update is flushed when the
/// `progress=` terminator line arrives. `N/A` fields are skipped, and a
/// block that never carried a position or frame flushes nothing.
#[derive(Debug, Clone, Default)]
pub struct KvProgressParser {
    pending: ProgressUpdate,
    has_position: bool,
}

impl KvProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one `key=value` line; returns an update on `progress=` lines.
    pub fn feed(&mut self, line: &str) -> Option<ProgressUpdate> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            "out_time_us" => {
                if let Ok(us) = value.parse::<i64>() {
                    if us >= 0 {
                        self.pending.time = us as f64 / 1_000_000.0;
                        self.has_position = true;
                    }
                }
            }
            "out_time_ms" => {
                if let Ok(ms) = value.parse::<i64>() {
                    if ms >= 0 {
                        self.pending.time = ms as f64 / 1_000.0;
                        self.has_position = true;
                    }
                }
            }
            "out_time" => {
                if let Some(secs) = parse_timestamp(value) {
                    self.pending.time = secs;
                    self.has_position = true;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.pending.frame = Some(frame);
                }
            }
            "speed" => {
                if value != "N/A" {
                    self.pending.speed = Some(value.to_string());
                }
            }
            // "continue" or "end"; either way the block is complete.
            "progress" => {
                if self.has_position || self.pending.frame.is_some() {
                    return Some(self.pending.clone());
                }
            }
            _ => {}
        }
        None
    }
}

/// Stateful wrapper folding parsed updates into a [`ProgressState`].
///
/// The published percent never decreases while a job runs: a late duration
/// discovery can shrink the raw estimate, but observers only ever see the
/// running maximum.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    state: ProgressState,
    duration: Option<f64>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the spawned pid and move to `processing`.
    pub fn mark_processing(&mut self, pid: Option<u32>) {
        self.state = self.state.clone().processing(pid);
    }

    /// Current snapshot.
    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Total duration in seconds, once discovered.
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Feed one stderr line. Returns true when the snapshot changed.
    pub fn observe_line(&mut self, line: &str) -> bool {
        let outcome = feed_line(line, self.duration);
        let mut changed = false;

        if let Some(duration) = outcome.duration {
            self.duration = Some(duration);
            self.state.duration = Some(duration);
            changed = true;
        }
        if let Some(update) = outcome.update {
            self.apply(update);
            changed = true;
        }

        changed
    }

    /// Feed one already-parsed update (key=value poll path).
    pub fn observe_update(&mut self, update: ProgressUpdate) {
        self.apply(update);
    }

    fn apply(&mut self, update: ProgressUpdate) {
        let total = self.duration.unwrap_or(FALLBACK_DURATION_SECS);
        let mut percent = if total > 0.0 {
            (update.time / total * 100.0).min(100.0)
        } else {
            0.0
        };
        if update.time > 0.0 || update.frame.is_some_and(|f| f > 0) {
            percent = percent.max(MIN_VISIBLE_PERCENT);
        }

        self.state.progress_percent = self.state.progress_percent.max(percent);
        self.state.time = self.state.time.max(update.time);
        if update.frame.is_some() {
            self.state.frame = update.frame;
        }
        if update.speed.is_some() {
            self.state.speed = update.speed;
        }
    }
}
