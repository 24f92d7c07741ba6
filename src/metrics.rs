use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing workflow activity since startup.
#[derive(Default)]
pub struct WorkflowMetrics {
    workflows_started: AtomicU64,
    workflows_succeeded: AtomicU64,
    workflows_failed: AtomicU64,
    triggers_ignored: AtomicU64,
    terms_persisted: AtomicU64,
}

impl WorkflowMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a workflow instance entered its initial state.
    pub fn record_started(&self) {
        self.workflows_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a workflow that reached `Succeed` and the number of terms it persisted.
    pub fn record_succeeded(&self, term_count: u64) {
        self.workflows_succeeded.fetch_add(1, Ordering::Relaxed);
        self.terms_persisted
            .fetch_add(term_count, Ordering::Relaxed);
    }

    /// Record a workflow that reached a terminal failure.
    pub fn record_failed(&self) {
        self.workflows_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a notification rejected before any workflow started.
    pub fn record_ignored(&self) {
        self.triggers_ignored.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            workflows_started: self.workflows_started.load(Ordering::Relaxed),
            workflows_succeeded: self.workflows_succeeded.load(Ordering::Relaxed),
            workflows_failed: self.workflows_failed.load(Ordering::Relaxed),
            triggers_ignored: self.triggers_ignored.load(Ordering::Relaxed),
            terms_persisted: self.terms_persisted.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of workflow counters used for reporting.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Workflow instances started.
    pub workflows_started: u64,
    /// Workflow instances that persisted and announced a result.
    pub workflows_succeeded: u64,
    /// Workflow instances that ended in a terminal failure.
    pub workflows_failed: u64,
    /// Notifications outside the raw prefix.
    pub triggers_ignored: u64,
    /// Total deduplicated terms persisted across successful workflows.
    pub terms_persisted: u64,
}
