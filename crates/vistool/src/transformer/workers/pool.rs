//! Worker pool implementation for parallel sample transformation.
//!
//! Provides a fixed-size thread pool that manages worker lifecycle, task
//! distribution and result collection for the transformer.
//!
//! # Key features
//! - Bounded channels on both sides provide backpressure
//! - Shutdown is a dedicated zero-capacity channel whose sender is dropped,
//!   so every blocked party (workers, producers) wakes up at once
//! - Thread-local worker IDs for log context
//! - Generic over task and output types
//!
//! # Channels
//!
//! ```text
//!   put ──► [task queue] ──► worker 0..N ──► [output queue] ──► get
//!                               ▲
//!   stop ── drop(shutdown_tx) ──┘
//! ```

use crate::error::{Error, ErrorCode, Result};
use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError, TrySendError};
use std::io;
use std::sync::{Mutex, PoisonError};
use std::thread;

use crate::transformer::common::thread::WORKER_ID;

/// Closure run on a freshly spawned worker thread.
type WorkerBody = Box<dyn FnOnce() + Send + 'static>;

/// Why a task could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubmitError {
    /// The task queue is at capacity (non-blocking submit only)
    Full,
    /// The pool has been shut down
    Stopped,
}

/// Thread pool for parallel sample processing.
///
/// Manages worker lifecycle and communication through bounded channels:
/// - Task channel: producers -> workers (work distribution)
/// - Output channel: workers -> consumers (result collection)
/// - Shutdown channel: never carries a message, disconnects on shutdown
///
/// # Type Parameters
/// - `Task`: Work items sent to workers
/// - `Output`: Results returned from workers
pub(crate) struct WorkerPool<Task, Output> {
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    task_tx: Sender<Task>,
    // Kept to collect the tasks discarded at shutdown.
    task_rx: Receiver<Task>,
    output_rx: Receiver<Output>,
    shutdown_tx: Mutex<Option<Sender<()>>>,
    shutdown_rx: Receiver<()>,
}

impl<Task, Output> WorkerPool<Task, Output>
where
    Task: Send + 'static,
    Output: Send + 'static,
{
    /// Creates a new worker pool; all workers pull from one shared task queue.
    ///
    /// If any thread fails to spawn, the workers already running are shut
    /// down and joined before the error is returned.
    pub(crate) fn new<F>(
        num_workers: usize,
        task_capacity: usize,
        output_capacity: usize,
        worker_fn: F,
    ) -> Result<Self>
    where
        F: Fn(Receiver<Task>, Sender<Output>, Receiver<()>) + Send + Sync + 'static,
    {
        Self::with_spawner(
            num_workers,
            task_capacity,
            output_capacity,
            worker_fn,
            |name, body| thread::Builder::new().name(name).spawn(body),
        )
    }

    /// Same as [`new`](Self::new), starting each worker through `spawn`.
    fn with_spawner<F, S>(
        num_workers: usize,
        task_capacity: usize,
        output_capacity: usize,
        worker_fn: F,
        mut spawn: S,
    ) -> Result<Self>
    where
        F: Fn(Receiver<Task>, Sender<Output>, Receiver<()>) + Send + Sync + 'static,
        S: FnMut(String, WorkerBody) -> io::Result<thread::JoinHandle<()>>,
    {
        // Validation
        if num_workers == 0 {
            return Err(Error::new(
                ErrorCode::InvalidConfig,
                "Cannot create WorkerPool with 0 workers",
            ));
        }
        if task_capacity == 0 || output_capacity == 0 {
            return Err(Error::new(
                ErrorCode::InvalidConfig,
                "Cannot create WorkerPool with a zero-capacity queue. \
                Capacity must be > 0 to prevent deadlocks.",
            ));
        }

        let (task_tx, task_rx) = bounded(task_capacity);
        let (output_tx, output_rx) = bounded(output_capacity);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let worker_fn = std::sync::Arc::new(worker_fn);
        let mut workers = Vec::with_capacity(num_workers);

        // Spawn workers
        for worker_id in 0..num_workers {
            let task_rx = task_rx.clone();
            let output_tx = output_tx.clone();
            let shutdown_rx = shutdown_rx.clone();
            let worker_fn = worker_fn.clone();

            let spawned = spawn(
                format!("vistool-worker-{}", worker_id),
                Box::new(move || {
                    WORKER_ID.with(|id| *id.borrow_mut() = worker_id);
                    worker_fn(task_rx, output_tx, shutdown_rx);
                }),
            );

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    drop(shutdown_tx);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(Error::new(
                        ErrorCode::SpawnFailed,
                        format!("Failed to spawn worker thread {}: {}", worker_id, e),
                    ));
                }
            }
        }

        Ok(Self {
            workers: Mutex::new(workers),
            task_tx,
            task_rx,
            output_rx,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            shutdown_rx,
        })
    }

    pub(crate) fn num_workers(&self) -> usize {
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        is_shutdown(&self.shutdown_rx)
    }

    /// Queues a task, blocking while the task queue is full.
    ///
    /// A producer blocked here is released by [`shutdown`](Self::shutdown).
    pub(crate) fn submit(&self, task: Task) -> std::result::Result<(), SubmitError> {
        if self.is_shutdown() {
            return Err(SubmitError::Stopped);
        }
        select! {
            send(self.task_tx, task) -> res => res.map_err(|_| SubmitError::Stopped),
            recv(self.shutdown_rx) -> _ => Err(SubmitError::Stopped),
        }
    }

    /// Queues a task without blocking.
    pub(crate) fn try_submit(&self, task: Task) -> std::result::Result<(), SubmitError> {
        if self.is_shutdown() {
            return Err(SubmitError::Stopped);
        }
        self.task_tx.try_send(task).map_err(|e| match e {
            TrySendError::Full(_) => SubmitError::Full,
            TrySendError::Disconnected(_) => SubmitError::Stopped,
        })
    }

    /// Blocks until an output is available.
    ///
    /// Returns `None` once every worker has exited and the output queue is empty.
    pub(crate) fn recv(&self) -> Option<Output> {
        self.output_rx.recv().ok()
    }

    /// Signals every worker to exit after its current task.
    ///
    /// Returns `false` if the pool was already shut down.
    pub(crate) fn shutdown(&self) -> bool {
        self.shutdown_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    /// Waits for all workers to exit, handing every output still queued (or
    /// produced while exiting) to `sink`.
    ///
    /// Draining while joining guarantees a worker blocked on a full output
    /// queue can finish. Must be called after [`shutdown`](Self::shutdown).
    pub(crate) fn join(&self, mut sink: impl FnMut(Output)) {
        debug_assert!(self.is_shutdown());

        // Ends once every worker dropped its output sender.
        for output in self.output_rx.iter() {
            sink(output);
        }

        let workers: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for (worker_id, handle) in workers.into_iter().enumerate() {
            if handle.join().is_err() {
                tracing::warn!(worker_id, "Worker thread panicked");
            }
        }
    }

    /// Removes and returns the tasks no worker picked up.
    pub(crate) fn drain_pending(&self) -> Vec<Task> {
        self.task_rx.try_iter().collect()
    }
}

impl<Task, Output> Drop for WorkerPool<Task, Output> {
    fn drop(&mut self) {
        // Signal shutdown to all workers
        self.shutdown_tx
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        // Drain outputs so no worker stays blocked, then wait for them to finish
        let workers = std::mem::take(
            self.workers
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if workers.is_empty() {
            return;
        }
        for _ in self.output_rx.iter() {}
        for worker in workers {
            let _ = worker.join();
        }
    }
}

/// True once the shutdown sender has been dropped.
pub(crate) fn is_shutdown(shutdown_rx: &Receiver<()>) -> bool {
    matches!(shutdown_rx.try_recv(), Err(TryRecvError::Disconnected))
}
