use crate::client::IngestionClient;
use crate::config::SinkConfig;
use crate::error::SinkError;
use crate::host::HostInfo;
use crate::queue::RecordQueue;
use crate::record::{LogRecord, RecordInput};
use crate::sender::BatchSender;
use crate::stats::{SinkStats, StatsSnapshot};
use crate::worker::{self, FlushWorker};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long `close` waits for the flush worker before draining anyway.
pub const CLOSE_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

const JOIN_POLL: Duration = Duration::from_millis(10);

/// Destination for records produced by a logging front-end.
///
/// This is what [`SlsLayer`](crate::layer::SlsLayer) and the
/// [`SinkRegistry`](crate::registry::SinkRegistry) deal in.
pub trait RecordSink: Send + Sync {
    /// Accept one record.
    ///
    /// Called on the application thread once per log event. Implementations
    /// must not block on I/O and must never panic or report errors back to
    /// the caller: a record that cannot be accepted is dropped.
    fn handle(&self, input: &RecordInput<'_>);

    /// Flush buffered records and stop background work.
    ///
    /// Blocks until buffered records have been handed to the backend (on a
    /// best-effort basis). Default implementation is a no-op.
    fn close(&self) {}
}

/// Lifecycle of an [`SlsSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Running,
    Closing,
    Closed,
}

impl SinkState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SinkState::Running,
            1 => SinkState::Closing,
            _ => SinkState::Closed,
        }
    }
}

/// Batching sink that forwards records to a log ingestion service.
///
/// `handle` normalizes a record and queues it; a dedicated worker thread
/// assembles batches of up to `batch_size` records, waiting at most
/// `flush_interval` for a partial batch, and submits them through the
/// [`IngestionClient`]. Submission failures drop the batch.
///
/// Call [`close`](Self::close) during shutdown: it is the only way to
/// guarantee that queued records are sent. Dropping an open sink stops the
/// worker without draining the queue. Calling `handle` after `close` is a
/// caller error; such records are queued but never sent.
pub struct SlsSink {
    config: Arc<SinkConfig>,
    queue: Arc<RecordQueue>,
    stop: Arc<AtomicBool>,
    sender: Arc<BatchSender>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<SinkStats>,
    state: AtomicU8,
}

impl SlsSink {
    /// Build a sink that talks to SLS over HTTP.
    #[cfg(feature = "http")]
    pub fn new(config: SinkConfig) -> Result<Self, SinkError> {
        config.validate()?;
        let client = crate::http::HttpIngestionClient::new(&config)?;
        Self::with_client(config, Arc::new(client))
    }

    /// Build a sink around an arbitrary [`IngestionClient`].
    ///
    /// **Returns**
    /// - `Err(SinkError::Config)` if the configuration is invalid; no
    ///   worker is started in that case.
    /// - `Err(SinkError::Runtime)` / `Err(SinkError::Spawn)` if the worker
    ///   could not be started.
    pub fn with_client(config: SinkConfig, client: Arc<dyn IngestionClient>) -> Result<Self, SinkError> {
        config.validate()?;
        let config = Arc::new(config);

        let host = HostInfo::detect(config.auto_detect_hostname, config.auto_detect_host_ip);
        let stats = Arc::new(SinkStats::default());
        let sender = Arc::new(BatchSender::new(
            client,
            Arc::clone(&config),
            host,
            Arc::clone(&stats),
        ));
        let queue = Arc::new(RecordQueue::new());
        let stop = Arc::new(AtomicBool::new(false));

        let runtime = worker::build_runtime().map_err(SinkError::Runtime)?;
        let handle = FlushWorker {
            queue: Arc::clone(&queue),
            stop: Arc::clone(&stop),
            sender: Arc::clone(&sender),
            batch_size: config.batch_size,
            flush_interval: config.flush_interval,
        }
        .spawn(runtime)
        .map_err(SinkError::Spawn)?;

        debug!(
            project = %config.project,
            logstore = %config.logstore,
            context_prefix = sender.pack_ids().context_prefix().unwrap_or_default(),
            "sls sink started"
        );

        Ok(Self {
            config,
            queue,
            stop,
            sender,
            worker: Mutex::new(Some(handle)),
            stats,
            state: AtomicU8::new(SinkState::Running as u8),
        })
    }

    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    pub fn state(&self) -> SinkState {
        SinkState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Records queued and not yet taken by the worker.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// PackId context prefix of this sink, `None` when PackIds are disabled.
    pub fn context_prefix(&self) -> Option<&str> {
        self.sender.pack_ids().context_prefix()
    }

    /// Whether the flush worker thread is still alive.
    pub fn worker_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Normalize and queue one record. Never blocks on I/O and never
    /// panics; malformed records are reported and dropped.
    pub fn handle(&self, input: &RecordInput<'_>) {
        let normalized = catch_unwind(AssertUnwindSafe(|| {
            LogRecord::from_input(input, &self.config.default_category, self.config.auto_detect_thread)
        }));

        match normalized {
            Ok(Ok(record)) => {
                self.queue.push(record);
                SinkStats::incr(&self.stats.handled, 1);
            }
            Ok(Err(e)) => {
                SinkStats::incr(&self.stats.dropped, 1);
                warn!(error = %e, module = input.module, "dropping malformed log record");
            }
            Err(_) => {
                SinkStats::incr(&self.stats.dropped, 1);
                warn!(module = input.module, "dropping log record whose message panicked while formatting");
            }
        }
    }

    /// Stop the worker and send everything still queued.
    ///
    /// Waits up to [`CLOSE_JOIN_TIMEOUT`] for the worker to exit, then drains
    /// the queue and sends the remainder in `batch_size` chunks before
    /// returning. Only the first call does any work.
    pub fn close(&self) {
        if self
            .state
            .compare_exchange(
                SinkState::Running as u8,
                SinkState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }

        self.stop.store(true, Ordering::Release);
        self.queue.wake();
        self.join_worker();

        let remaining = self.queue.drain();
        let count = remaining.len();
        let batches = chunk(remaining, self.config.batch_size);
        worker::send_detached(Arc::clone(&self.sender), batches);

        self.state.store(SinkState::Closed as u8, Ordering::Release);
        debug!(drained = count, "sls sink closed");
    }

    fn join_worker(&self) {
        let mut slot = self.worker.lock();
        let Some(handle) = slot.take() else {
            return;
        };

        let deadline = Instant::now() + CLOSE_JOIN_TIMEOUT;
        while !handle.is_finished() && Instant::now() < deadline {
            std::thread::sleep(JOIN_POLL);
        }

        if handle.is_finished() {
            if handle.join().is_err() {
                warn!("flush worker panicked");
            }
        } else {
            warn!(
                timeout_ms = CLOSE_JOIN_TIMEOUT.as_millis() as u64,
                "flush worker did not stop in time, draining anyway"
            );
            *slot = Some(handle);
        }
    }
}

fn chunk(records: Vec<LogRecord>, size: usize) -> Vec<Vec<LogRecord>> {
    let size = size.max(1);
    let mut batches = Vec::with_capacity(records.len().div_ceil(size));
    let mut iter = records.into_iter().peekable();
    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(size).collect());
    }
    batches
}

impl RecordSink for SlsSink {
    fn handle(&self, input: &RecordInput<'_>) {
        SlsSink::handle(self, input)
    }

    fn close(&self) {
        SlsSink::close(self)
    }
}

impl Drop for SlsSink {
    fn drop(&mut self) {
        // Never-closed sinks only stop the worker; queued records are lost.
        self.stop.store(true, Ordering::Release);
        self.queue.wake();
    }
}

impl std::fmt::Debug for SlsSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlsSink")
            .field("project", &self.config.project)
            .field("logstore", &self.config.logstore)
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noop::NoopClient;
    use chrono::Utc;

    fn config() -> SinkConfig {
        SinkConfig::builder("p", "l", "cn-hangzhou")
            .access_key_id("k")
            .access_key_secret("s")
            .flush_interval(Duration::from_millis(50))
            .auto_detect_hostname(false)
            .auto_detect_host_ip(false)
            .build()
            .unwrap()
    }

    fn input<'a>(message: &'a dyn std::fmt::Display) -> RecordInput<'a> {
        RecordInput {
            time: Utc::now(),
            level: "INFO",
            message,
            module: "tests",
            function: "input",
            line: 1,
            extra: &[],
        }
    }

    #[test]
    fn chunks_respect_size() {
        let records: Vec<_> = (0..7).map(|i| crate::record::tests::record(&i.to_string())).collect();
        let sizes: Vec<_> = chunk(records, 3).iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert!(chunk(Vec::new(), 3).is_empty());
    }

    #[test]
    fn lifecycle_transitions() {
        let sink = SlsSink::with_client(config(), Arc::new(NoopClient)).unwrap();
        assert_eq!(sink.state(), SinkState::Running);
        assert!(sink.worker_running());

        sink.close();
        assert_eq!(sink.state(), SinkState::Closed);
        assert!(!sink.worker_running());

        sink.close();
        assert_eq!(sink.state(), SinkState::Closed);
    }

    #[test]
    fn invalid_config_starts_nothing() {
        let mut cfg = config();
        cfg.batch_size = 0;
        let err = SlsSink::with_client(cfg, Arc::new(NoopClient)).unwrap_err();
        assert!(matches!(err, SinkError::Config(_)));
    }

    #[test]
    fn panicking_display_is_dropped() {
        struct Exploding;
        impl std::fmt::Display for Exploding {
            fn fmt(&self, _: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                panic!("display exploded")
            }
        }

        let sink = SlsSink::with_client(config(), Arc::new(NoopClient)).unwrap();
        sink.handle(&input(&Exploding));
        sink.handle(&input(&"fine"));
        let stats = sink.stats();
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.handled, 1);
        sink.close();
    }

    #[test]
    fn context_prefix_is_exposed() {
        let sink = SlsSink::with_client(config(), Arc::new(NoopClient)).unwrap();
        assert_eq!(sink.context_prefix().map(str::len), Some(8));
        sink.close();
    }
}
