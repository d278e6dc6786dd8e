use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between the sink facade and its flush worker.
#[derive(Debug, Default)]
pub struct SinkStats {
    /// Records accepted by `handle`.
    pub handled: AtomicU64,
    /// Records dropped because normalization failed.
    pub dropped: AtomicU64,
    pub batches_sent: AtomicU64,
    pub batches_failed: AtomicU64,
    pub records_sent: AtomicU64,
    /// Records lost with a failed batch.
    pub records_failed: AtomicU64,
}

/// Point-in-time copy of [`SinkStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub handled: u64,
    pub dropped: u64,
    pub batches_sent: u64,
    pub batches_failed: u64,
    pub records_sent: u64,
    pub records_failed: u64,
}

impl SinkStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            handled: self.handled.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            records_sent: self.records_sent.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}
