use crate::record::LogRecord;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Unbounded FIFO shared between caller threads and the flush worker.
///
/// `push` never blocks beyond the short critical section and never fails.
/// Records come out in admission order.
#[derive(Debug, Default)]
pub struct RecordQueue {
    records: Mutex<VecDeque<LogRecord>>,
    available: Condvar,
}

impl RecordQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: LogRecord) {
        self.records.lock().push_back(record);
        self.available.notify_one();
    }

    /// Wait up to `timeout` for a record.
    ///
    /// `stop` is checked under the queue lock before waiting; a set flag
    /// skips the wait. Returns `None` when the wait timed out, when `stop`
    /// was set, or when [`wake`](Self::wake) interrupted the wait while the
    /// queue was still empty. A timeout too large to represent as a deadline
    /// waits until woken.
    pub fn pop_blocking(&self, timeout: Duration, stop: &AtomicBool) -> Option<LogRecord> {
        let deadline = Instant::now().checked_add(timeout);
        let mut records = self.records.lock();
        if records.is_empty() && !stop.load(Ordering::Acquire) {
            match deadline {
                Some(deadline) => {
                    self.available.wait_until(&mut records, deadline);
                }
                None => self.available.wait(&mut records),
            }
        }
        records.pop_front()
    }

    pub fn pop_nonblocking(&self) -> Option<LogRecord> {
        self.records.lock().pop_front()
    }

    /// Take everything currently queued, in order.
    pub fn drain(&self) -> Vec<LogRecord> {
        self.records.lock().drain(..).collect()
    }

    /// Interrupt any blocked [`pop_blocking`](Self::pop_blocking) call.
    ///
    /// Takes the queue lock first, so a waiter that has not yet blocked
    /// observes any flag stored before this call.
    pub fn wake(&self) {
        let _records = self.records.lock();
        self.available.notify_all();
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::record;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn pops_in_push_order() {
        let queue = RecordQueue::new();
        for i in 0..5 {
            queue.push(record(&format!("m{i}")));
        }
        assert_eq!(queue.len(), 5);
        let popped: Vec<_> = std::iter::from_fn(|| queue.pop_nonblocking())
            .map(|r| r.message)
            .collect();
        assert_eq!(popped, vec!["m0", "m1", "m2", "m3", "m4"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn blocking_pop_times_out_when_empty() {
        let queue = RecordQueue::new();
        let start = Instant::now();
        assert!(queue.pop_blocking(Duration::from_millis(50), &AtomicBool::new(false)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn stop_flag_skips_the_wait() {
        let queue = RecordQueue::new();
        let stop = AtomicBool::new(true);
        let start = Instant::now();
        assert!(queue.pop_blocking(Duration::from_secs(30), &stop).is_none());
        assert!(start.elapsed() < Duration::from_secs(1));

        queue.push(record("queued"));
        let popped = queue.pop_blocking(Duration::from_secs(30), &stop);
        assert_eq!(popped.map(|r| r.message).as_deref(), Some("queued"));
    }

    #[test]
    fn stop_stored_before_wake_is_never_missed() {
        // Each round stores the flag and wakes while the waiter may be
        // anywhere between its own flag check and blocking.
        for _ in 0..200 {
            let queue = Arc::new(RecordQueue::new());
            let stop = Arc::new(AtomicBool::new(false));
            let waiter = {
                let queue = Arc::clone(&queue);
                let stop = Arc::clone(&stop);
                std::thread::spawn(move || {
                    let start = Instant::now();
                    while !stop.load(Ordering::Acquire) {
                        queue.pop_blocking(Duration::from_secs(30), &stop);
                    }
                    start.elapsed()
                })
            };
            stop.store(true, Ordering::Release);
            queue.wake();
            assert!(waiter.join().unwrap() < Duration::from_secs(5));
        }
    }

    #[test]
    fn unrepresentable_timeout_waits_for_a_record() {
        let queue = Arc::new(RecordQueue::new());
        let producer = Arc::clone(&queue);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.push(record("eventually"));
        });
        let popped = queue.pop_blocking(Duration::MAX, &AtomicBool::new(false));
        handle.join().unwrap();
        assert_eq!(popped.map(|r| r.message).as_deref(), Some("eventually"));
    }

    #[test]
    fn blocking_pop_returns_record_pushed_by_other_thread() {
        let queue = Arc::new(RecordQueue::new());
        let producer = Arc::clone(&queue);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.push(record("late"));
        });
        let popped = queue.pop_blocking(Duration::from_secs(5), &AtomicBool::new(false));
        handle.join().unwrap();
        assert_eq!(popped.map(|r| r.message).as_deref(), Some("late"));
    }

    #[test]
    fn wake_interrupts_blocked_pop() {
        let queue = Arc::new(RecordQueue::new());
        let done = Arc::new(AtomicBool::new(false));
        let waker = Arc::clone(&queue);
        let waker_done = Arc::clone(&done);
        let handle = std::thread::spawn(move || {
            while !waker_done.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(10));
                waker.wake();
            }
        });
        let start = Instant::now();
        assert!(queue.pop_blocking(Duration::from_secs(10), &AtomicBool::new(false)).is_none());
        assert!(start.elapsed() < Duration::from_secs(5));
        done.store(true, Ordering::Release);
        handle.join().unwrap();
    }

    #[test]
    fn drain_empties_queue() {
        let queue = RecordQueue::new();
        queue.push(record("a"));
        queue.push(record("b"));
        let drained: Vec<_> = queue.drain().into_iter().map(|r| r.message).collect();
        assert_eq!(drained, vec!["a", "b"]);
        assert!(queue.pop_nonblocking().is_none());
    }
}
