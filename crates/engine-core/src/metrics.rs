use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

#[derive(Debug, Default)]
struct InnerMetrics {
    pieces_completed: AtomicU64,
    pieces_dispatched: AtomicU64,
    tool_changes: AtomicU64,
    watchdog_restarts: AtomicU64,
    fatal_errors: AtomicU64,
    transient_errors: AtomicU64,
    ticks_processed: AtomicU64,
}

/// Process-wide coordination counters, cheaply cloned and shared across
/// every actor in the runtime.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub pieces_completed: u64,
    pub pieces_dispatched: u64,
    pub tool_changes: u64,
    pub watchdog_restarts: u64,
    pub fatal_errors: u64,
    pub transient_errors: u64,
    pub ticks_processed: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn record_piece_completed(&self) {
        self.inner.pieces_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_piece_dispatched(&self) {
        self.inner.pieces_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tool_change(&self) {
        self.inner.tool_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_watchdog_restart(&self) {
        self.inner.watchdog_restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fatal_error(&self) {
        self.inner.fatal_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transient_error(&self) {
        self.inner.transient_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick(&self) {
        self.inner.ticks_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pieces_completed: self.inner.pieces_completed.load(Ordering::Relaxed),
            pieces_dispatched: self.inner.pieces_dispatched.load(Ordering::Relaxed),
            tool_changes: self.inner.tool_changes.load(Ordering::Relaxed),
            watchdog_restarts: self.inner.watchdog_restarts.load(Ordering::Relaxed),
            fatal_errors: self.inner.fatal_errors.load(Ordering::Relaxed),
            transient_errors: self.inner.transient_errors.load(Ordering::Relaxed),
            ticks_processed: self.inner.ticks_processed.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let metrics = Metrics::new();
        metrics.record_piece_completed();
        metrics.record_piece_completed();
        metrics.record_tool_change();

        let snap = metrics.snapshot();
        assert_eq!(snap.pieces_completed, 2);
        assert_eq!(snap.tool_changes, 1);
        assert_eq!(snap.watchdog_restarts, 0);
    }
}
