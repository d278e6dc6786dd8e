use crate::queue::RecordQueue;
use crate::record::LogRecord;
use crate::sender::BatchSender;
use std::any::Any;
use std::cell::Cell;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, error};

pub const WORKER_THREAD_NAME: &str = "sls-flush-worker";
const DRAIN_THREAD_NAME: &str = "sls-drain";

/// Pause after a failed cycle so a persistent fault cannot spin the loop.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(1);

thread_local! {
    static SINK_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is owned by a sink (flush worker or
/// close-time drain). Events raised there are not fed back into a sink.
pub fn on_sink_thread() -> bool {
    SINK_THREAD.with(Cell::get)
}

fn mark_sink_thread() {
    SINK_THREAD.with(|flag| flag.set(true));
}

pub(crate) fn build_runtime() -> io::Result<Runtime> {
    Builder::new_current_thread().enable_all().build()
}

/// Background loop that drains the queue into size/time-bounded batches
/// and hands each batch to the [`BatchSender`].
pub(crate) struct FlushWorker {
    pub(crate) queue: Arc<RecordQueue>,
    pub(crate) stop: Arc<AtomicBool>,
    pub(crate) sender: Arc<BatchSender>,
    pub(crate) batch_size: usize,
    pub(crate) flush_interval: Duration,
}

impl FlushWorker {
    /// Start the worker on a dedicated thread driving `runtime`.
    pub(crate) fn spawn(self, runtime: Runtime) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || self.run(runtime))
    }

    fn run(self, runtime: Runtime) {
        mark_sink_thread();
        debug!(
            batch_size = self.batch_size,
            flush_interval_ms = self.flush_interval.as_millis() as u64,
            "flush worker started"
        );

        while !self.stop.load(Ordering::Acquire) {
            let cycle = catch_unwind(AssertUnwindSafe(|| self.run_cycle(&runtime)));
            if let Err(panic) = cycle {
                error!(panic = %panic_message(&*panic), "flush worker cycle failed");
                thread::sleep(ERROR_BACKOFF);
            }
        }

        debug!(pending = self.queue.len(), "flush worker stopped");
    }

    fn run_cycle(&self, runtime: &Runtime) {
        if let Some(batch) = assemble_batch(&self.queue, self.batch_size, self.flush_interval, &self.stop) {
            runtime.block_on(self.sender.send(batch));
        }
    }
}

/// Wait up to `wait` for a first record, then keep taking records without
/// blocking until `batch_size` is reached or the queue is empty.
///
/// Returns `None` when nothing arrived or `stop` was set while the queue
/// was empty; a returned batch is never empty.
pub(crate) fn assemble_batch(
    queue: &RecordQueue,
    batch_size: usize,
    wait: Duration,
    stop: &AtomicBool,
) -> Option<Vec<LogRecord>> {
    let first = queue.pop_blocking(wait, stop)?;
    let mut batch = Vec::with_capacity(batch_size.min(1024));
    batch.push(first);
    while batch.len() < batch_size {
        match queue.pop_nonblocking() {
            Some(record) => batch.push(record),
            None => break,
        }
    }
    Some(batch)
}

/// Send `batches` in order, each to completion, from any calling context.
///
/// Runs on a short-lived thread with its own runtime, so it is safe to call
/// from inside an async runtime as well as from plain threads.
pub(crate) fn send_detached(sender: Arc<BatchSender>, batches: Vec<Vec<LogRecord>>) {
    let count: usize = batches.iter().map(Vec::len).sum();
    if count == 0 {
        return;
    }
    let spawned = thread::Builder::new()
        .name(DRAIN_THREAD_NAME.to_string())
        .spawn(move || {
            mark_sink_thread();
            match build_runtime() {
                Ok(runtime) => runtime.block_on(async {
                    for batch in batches {
                        sender.send(batch).await;
                    }
                }),
                Err(e) => error!(error = %e, records = count, "failed to build drain runtime, dropping records"),
            }
        });

    match spawned {
        Ok(handle) => {
            if handle.join().is_err() {
                error!(records = count, "drain thread panicked");
            }
        }
        Err(e) => error!(error = %e, records = count, "failed to spawn drain thread, dropping records"),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
