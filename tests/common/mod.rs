#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_sls_sink::client::{IngestionClient, PutLogsRequest};
use tracing_sls_sink::error::IngestError;
use tracing_sls_sink::{RecordInput, RecordSink, SinkConfig};

/// Blocks the first send until opened, so tests can pile up records
/// behind a busy worker.
#[derive(Default)]
pub struct Gate {
    state: Mutex<(bool, bool)>,
    cond: Condvar,
}

impl Gate {
    fn pass(&self) {
        let mut state = self.state.lock();
        state.0 = true;
        self.cond.notify_all();
        while !state.1 {
            self.cond.wait(&mut state);
        }
    }

    pub fn wait_entered(&self) {
        let mut state = self.state.lock();
        while !state.0 {
            self.cond.wait(&mut state);
        }
    }

    pub fn open(&self) {
        self.state.lock().1 = true;
        self.cond.notify_all();
    }
}

/// Ingestion client that captures every request it is given.
#[derive(Default)]
pub struct RecordingClient {
    requests: Mutex<Vec<(PutLogsRequest, bool)>>,
    started: AtomicUsize,
    completed: AtomicUsize,
    fail_first: usize,
    gate: Option<Arc<Gate>>,
}

impl RecordingClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the first `n` submissions with a transport error.
    pub fn failing_first(n: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_first: n,
            ..Self::default()
        })
    }

    pub fn gated(gate: Arc<Gate>) -> Arc<Self> {
        Arc::new(Self {
            gate: Some(gate),
            ..Self::default()
        })
    }

    /// Submissions that have returned.
    pub fn calls(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Requests that were acknowledged.
    pub fn delivered(&self) -> Vec<PutLogsRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|(_, ok)| *ok)
            .map(|(r, _)| r.clone())
            .collect()
    }

    pub fn delivered_messages(&self) -> Vec<String> {
        self.delivered()
            .iter()
            .flat_map(|r| r.items.iter())
            .filter_map(|item| item.get("message").map(str::to_string))
            .collect()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.delivered().iter().map(|r| r.items.len()).collect()
    }

    /// Poll until `calls() >= n` or `timeout` passes.
    pub fn wait_for_calls(&self, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.calls() < n {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        true
    }
}

#[async_trait]
impl IngestionClient for RecordingClient {
    async fn put_logs(&self, request: &PutLogsRequest) -> Result<(), IngestError> {
        let call = self.started.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            if let Some(gate) = &self.gate {
                gate.pass();
            }
        }
        let ok = call >= self.fail_first;
        self.requests.lock().push((request.clone(), ok));
        self.completed.fetch_add(1, Ordering::SeqCst);
        if ok {
            Ok(())
        } else {
            Err(IngestError::Transport("connection reset by peer".to_string()))
        }
    }
}

pub fn config(batch_size: usize, flush_interval: Duration) -> SinkConfig {
    SinkConfig::builder("test-project", "test-logstore", "cn-hangzhou")
        .access_key_id("test-key")
        .access_key_secret("test-secret")
        .batch_size(batch_size)
        .flush_interval(flush_interval)
        .auto_detect_hostname(false)
        .auto_detect_host_ip(false)
        .build()
        .expect("valid test config")
}

pub fn log(sink: &dyn RecordSink, message: &str) {
    sink.handle(&RecordInput {
        time: Utc::now(),
        level: "INFO",
        message: &message,
        module: "tests::common",
        function: "log",
        line: 1,
        extra: &[],
    });
}
