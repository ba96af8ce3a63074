//! Background worker — the queue's single consumer.
//!
//! One dedicated thread drains the batch queue for the lifetime of the
//! process: dequeue, run the pipeline, dispatch the results, pause,
//! repeat. Exactly one batch is in flight at any time. The worker
//! survives anything a batch can throw at it; only a shutdown signal
//! stops the loop.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::dispatch::dispatch_batch;
use super::queue::BatchQueue;
use super::runner::BatchRunner;
use super::traits::DeliverySink;

/// How long the worker blocks on an empty queue before rechecking the
/// shutdown flag.
const POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Granularity of interruptible pauses.
const SLEEP_STEP: Duration = Duration::from_millis(100);

/// Pacing knobs for the worker loop.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    /// Pause after each fully dispatched batch.
    pub batch_pause: Duration,
    /// Pause between consecutive result deliveries within a batch.
    pub delivery_pause: Duration,
}

/// Owns the worker thread. Dropping the handle signals shutdown and
/// joins the thread, so the process never exits mid-batch silently.
pub struct WorkerHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::error!("Outreach worker thread panicked during shutdown");
            }
        }
    }
}

/// Spawn the single consumer thread.
pub fn start_worker(
    queue: Arc<BatchQueue>,
    runner: Arc<BatchRunner>,
    sink: Arc<dyn DeliverySink>,
    settings: WorkerSettings,
) -> WorkerHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();

    let thread = std::thread::Builder::new()
        .name("outreach-worker".to_string())
        .spawn(move || worker_loop(queue, runner, sink, settings, flag))
        .expect("worker thread spawn cannot fail with a valid name");

    WorkerHandle {
        shutdown,
        thread: Some(thread),
    }
}

fn worker_loop(
    queue: Arc<BatchQueue>,
    runner: Arc<BatchRunner>,
    sink: Arc<dyn DeliverySink>,
    settings: WorkerSettings,
    shutdown: Arc<AtomicBool>,
) {
    tracing::info!("Outreach worker started");

    while !shutdown.load(Ordering::Relaxed) {
        let Some(entry) = queue.take_next(POLL_TIMEOUT) else {
            continue;
        };

        tracing::info!(
            batch_id = %entry.batch.id,
            company = %entry.batch.company,
            position = entry.position,
            prospects = entry.batch.prospects.len(),
            "Batch dequeued"
        );

        // A misbehaving batch must not take the worker down with it.
        match catch_unwind(AssertUnwindSafe(|| runner.process(&entry.batch))) {
            Ok(results) => {
                dispatch_batch(sink.as_ref(), &entry.batch, &results, settings.delivery_pause);
            }
            Err(_) => {
                tracing::error!(
                    batch_id = %entry.batch.id,
                    company = %entry.batch.company,
                    "Batch processing panicked, batch dropped without delivery"
                );
            }
        }

        queue.mark_complete();
        sleep_interruptible(settings.batch_pause, &shutdown);
    }

    tracing::info!("Outreach worker stopped");
}

/// Sleep in short steps so shutdown never waits out a long pause.
fn sleep_interruptible(total: Duration, shutdown: &AtomicBool) {
    let mut remaining = total;
    while !remaining.is_zero() && !shutdown.load(Ordering::Relaxed) {
        let step = remaining.min(SLEEP_STEP);
        std::thread::sleep(step);
        remaining -= step;
    }
}
