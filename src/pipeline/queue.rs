//! Batch work queue — strict FIFO, many producers, single consumer.
//!
//! A batch counts toward `size()` from the moment it is enqueued until
//! the worker calls `mark_complete()` after its last delivery, so
//! health reporting reflects outstanding work rather than mere queue
//! membership. The consumer waits on a condvar, never busy-polls.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use super::types::{Batch, QueueEntry};

pub struct BatchQueue {
    inner: Mutex<QueueInner>,
    available: Condvar,
}

struct QueueInner {
    entries: VecDeque<QueueEntry>,
    /// True while the worker holds a dequeued batch that has not yet
    /// been fully dispatched.
    in_flight: bool,
    /// Monotonic enqueue counter (1-based positions).
    next_position: u64,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                entries: VecDeque::new(),
                in_flight: false,
                next_position: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Add a batch at the tail. Never blocks the caller and is safe
    /// from concurrent producers. Returns the batch's 1-based queue
    /// position at enqueue time, counting the in-flight batch.
    pub fn enqueue(&self, batch: Batch) -> usize {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.next_position += 1;
        let position = inner.next_position;
        inner.entries.push_back(QueueEntry {
            batch,
            position,
            enqueued_at: chrono::Utc::now().naive_utc(),
        });
        let queue_position = inner.entries.len() + usize::from(inner.in_flight);
        drop(inner);
        self.available.notify_one();
        queue_position
    }

    /// Current depth: queued batches plus the in-flight one.
    pub fn size(&self) -> usize {
        let inner = self.inner.lock().expect("queue lock poisoned");
        inner.entries.len() + usize::from(inner.in_flight)
    }

    /// Wait up to `timeout` for the next batch. On success the entry is
    /// marked in flight and keeps counting toward `size()` until
    /// `mark_complete()` is called.
    pub fn take_next(&self, timeout: Duration) -> Option<QueueEntry> {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        if inner.entries.is_empty() {
            let (guard, _) = self
                .available
                .wait_timeout(inner, timeout)
                .expect("queue lock poisoned");
            inner = guard;
        }
        let entry = inner.entries.pop_front()?;
        inner.in_flight = true;
        Some(entry)
    }

    /// Mark the in-flight batch fully processed and dispatched.
    pub fn mark_complete(&self) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.in_flight = false;
    }
}

impl Default for BatchQueue {
    fn default() -> Self {
        Self::new()
    }
}
