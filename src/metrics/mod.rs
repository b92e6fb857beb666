//! Injected telemetry capability.
//!
//! The reasoning arrows and the tool runner report to a [`MetricsSink`]
//! passed in explicitly; there is no process-wide state. [`NoopMetrics`]
//! is the default; [`RecordingMetrics`] keeps counts in memory for tests
//! and local inspection.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::branch::StateKind;

/// Telemetry sink consumed by the reasoning arrows and tool runner.
///
/// All methods default to no-ops so sinks implement only what they need.
pub trait MetricsSink: Send + Sync {
    /// One model generation completed.
    fn generation_completed(&self, latency: Duration) {
        let _ = latency;
    }

    /// One reasoning stage appended its event.
    fn stage_completed(&self, kind: StateKind, latency: Duration) {
        let _ = (kind, latency);
    }

    /// One tool call was executed.
    fn tool_invoked(&self, name: &str) {
        let _ = name;
    }

    /// Candidate tool-call lines were dropped by the best-effort parser.
    fn parse_skipped(&self, count: usize) {
        let _ = count;
    }
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}

/// In-memory sink recording counts, for tests and local inspection.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    inner: Mutex<Recorded>,
}

#[derive(Debug, Default, Clone)]
struct Recorded {
    generations: usize,
    stages: Vec<StateKind>,
    tool_counts: HashMap<String, usize>,
    skipped_lines: usize,
}

impl RecordingMetrics {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed generations.
    pub fn generations(&self) -> usize {
        self.inner.lock().unwrap().generations
    }

    /// Completed stages, in order.
    pub fn stages(&self) -> Vec<StateKind> {
        self.inner.lock().unwrap().stages.clone()
    }

    /// Invocation count for one tool name.
    pub fn tool_count(&self, name: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .tool_counts
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Total dropped tool-call lines.
    pub fn skipped_lines(&self) -> usize {
        self.inner.lock().unwrap().skipped_lines
    }
}

impl MetricsSink for RecordingMetrics {
    fn generation_completed(&self, _latency: Duration) {
        self.inner.lock().unwrap().generations += 1;
    }

    fn stage_completed(&self, kind: StateKind, _latency: Duration) {
        self.inner.lock().unwrap().stages.push(kind);
    }

    fn tool_invoked(&self, name: &str) {
        *self
            .inner
            .lock()
            .unwrap()
            .tool_counts
            .entry(name.to_string())
            .or_insert(0) += 1;
    }

    fn parse_skipped(&self, count: usize) {
        self.inner.lock().unwrap().skipped_lines += count;
    }
}
