//! src/transformer/threaded.rs
//!
//! Thread-pool backed transformer.
//!
//! Callers feed samples with `put`, a fixed pool of workers runs each one
//! through the frozen operation chain, and results are fetched with `get`.
//! All methods take `&self`, so one transformer can be shared across
//! producer and consumer threads behind an `Arc`.

use crate::error::{Error, ErrorCode, Result};
use crate::ops::{KvConf, OpChain, OpRegistry};
use crate::sample::{Output, Sample};
use crate::transformer::common::thread::{seed_sample_rng, WORKER_ID};
use crate::transformer::config::TransformerConfig;
use crate::transformer::state::State;
use crate::transformer::workers::{is_shutdown, SubmitError, WorkerPool};
use crate::transformer::Transformer;
use crossbeam_channel::{select, Receiver, Sender};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

/// Lifecycle data guarded by a single lock.
struct Lifecycle {
    state: State,
    config: Option<TransformerConfig>,
    /// Uniquely owned until `start`; shared read-only with workers afterwards.
    chain: Arc<OpChain>,
}

/// Transformer running the operation chain on a pool of OS threads.
///
/// # Example
/// ```ignore
/// let transformer = ThreadedTransformer::new();
/// transformer.init(&kv_conf([("worker_count", "2")]))?;
/// transformer.add_op("resize", &kv_conf([("width", "100"), ("height", "100")]))?;
/// transformer.start()?;
/// transformer.put(Sample::new(1, png_bytes).with_label("cat"))?;
/// let output = transformer.get()?;
/// transformer.stop()?;
/// ```
pub struct ThreadedTransformer {
    registry: OpRegistry,
    lifecycle: Mutex<Lifecycle>,
    /// Set once by a successful `start`, kept after `stop` for draining.
    pool: OnceLock<WorkerPool<Sample, Output>>,
    /// Outputs moved out of the output queue while `stop` joins the workers.
    overflow: Mutex<VecDeque<Output>>,
    in_flight: Mutex<HashSet<u32>>,
}

impl ThreadedTransformer {
    /// Creates a transformer that resolves operations against the built-in registry.
    pub fn new() -> Self {
        Self::with_registry(OpRegistry::builtin())
    }

    /// Creates a transformer over a custom operation registry.
    pub fn with_registry(registry: OpRegistry) -> Self {
        Self {
            registry,
            lifecycle: Mutex::new(Lifecycle {
                state: State::Unconfigured,
                config: None,
                chain: Arc::new(OpChain::new()),
            }),
            pool: OnceLock::new(),
            overflow: Mutex::new(VecDeque::new()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Typed counterpart of `init`.
    pub fn configure(&self, config: TransformerConfig) -> Result<()> {
        config.validate()?;

        let mut lifecycle = lock(&self.lifecycle);
        match lifecycle.state {
            State::Unconfigured | State::Configured => {}
            state => {
                return Err(Error::invalid_state(format!(
                    "cannot init a {} transformer",
                    state
                )))
            }
        }

        tracing::info!(
            worker_count = config.worker_count,
            queue_capacity = config.queue_capacity,
            output_queue_capacity = config.output_capacity(),
            seed = ?config.seed,
            "Transformer configured"
        );
        lifecycle.config = Some(config);
        lifecycle.state = State::Configured;
        Ok(())
    }

    /// The validated configuration, once `init` succeeded.
    pub fn config(&self) -> Option<TransformerConfig> {
        lock(&self.lifecycle).config.clone()
    }

    /// Names of the chained operations, in application order.
    pub fn op_names(&self) -> Vec<String> {
        lock(&self.lifecycle)
            .chain
            .names()
            .map(str::to_owned)
            .collect()
    }

    fn pool_for(&self, action: &str) -> Result<&WorkerPool<Sample, Output>> {
        match self.pool.get() {
            Some(pool) => Ok(pool),
            None => match lock(&self.lifecycle).state {
                State::Stopped => Err(Error::stopped()),
                state => Err(Error::invalid_state(format!(
                    "cannot {} on a {} transformer",
                    action, state
                ))),
            },
        }
    }

    /// Queues `sample` with either the blocking or the non-blocking submit.
    fn enqueue(&self, sample: Sample, blocking: bool) -> Result<()> {
        let pool = self.pool_for("put")?;
        if pool.is_shutdown() {
            return Err(Error::stopped());
        }

        let id = sample.id;
        if !lock(&self.in_flight).insert(id) {
            return Err(Error::new(
                ErrorCode::DuplicateId,
                format!("sample {} is already in flight", id),
            ));
        }

        let submitted = if blocking {
            pool.submit(sample)
        } else {
            pool.try_submit(sample)
        };
        submitted.map_err(|e| {
            lock(&self.in_flight).remove(&id);
            match e {
                SubmitError::Stopped => Error::stopped(),
                SubmitError::Full => Error::new(
                    ErrorCode::QueueFull,
                    format!("input queue is full, sample {} not queued", id),
                ),
            }
        })
    }

    fn pop_overflow(&self) -> Option<Output> {
        lock(&self.overflow).pop_front()
    }

    fn deliver(&self, output: Output) -> Output {
        lock(&self.in_flight).remove(&output.id);
        output
    }
}

impl Default for ThreadedTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ThreadedTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadedTransformer")
            .field("state", &self.state())
            .field("ops", &self.op_names())
            .finish_non_exhaustive()
    }
}

impl Transformer for ThreadedTransformer {
    fn init(&self, conf: &KvConf) -> Result<()> {
        self.configure(TransformerConfig::from_conf(conf)?)
    }

    fn add_op(&self, name: &str, conf: &KvConf) -> Result<()> {
        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.state != State::Configured {
            return Err(Error::invalid_state(format!(
                "cannot add operation '{}' to a {} transformer",
                name, lifecycle.state
            )));
        }

        let op = self.registry.create(name, conf)?;
        let chain = Arc::get_mut(&mut lifecycle.chain).ok_or_else(|| {
            Error::new(ErrorCode::LogicError, "operation chain is shared with workers")
        })?;
        chain.push(op);
        tracing::debug!(op = name, position = chain.len() - 1, "Added operation");
        Ok(())
    }

    fn start(&self) -> Result<()> {
        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.state != State::Configured {
            return Err(Error::invalid_state(format!(
                "cannot start a {} transformer",
                lifecycle.state
            )));
        }
        let config = lifecycle
            .config
            .clone()
            .ok_or_else(|| Error::new(ErrorCode::LogicError, "configured without a config"))?;

        let chain = Arc::clone(&lifecycle.chain);
        if chain.is_empty() {
            tracing::warn!("Starting with an empty chain, every output will be NO_OUTPUT");
        }
        let seed = config.seed;
        // On a spawn failure the state stays Configured, so start may be retried.
        let pool = WorkerPool::new(
            config.worker_count,
            config.queue_capacity,
            config.output_capacity(),
            move |task_rx, output_tx, shutdown_rx| {
                worker_loop(&chain, seed, task_rx, output_tx, shutdown_rx)
            },
        )?;

        let worker_count = pool.num_workers();
        self.pool
            .set(pool)
            .map_err(|_| Error::new(ErrorCode::LogicError, "worker pool already started"))?;
        lifecycle.state = State::Running;

        tracing::info!(
            worker_count,
            ops = ?lifecycle.chain.names().collect::<Vec<_>>(),
            "Transformer started"
        );
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let pool = {
            let mut lifecycle = lock(&self.lifecycle);
            match (lifecycle.state, self.pool.get()) {
                (State::Stopped, _) => return Ok(()),
                (State::Running, Some(pool)) => pool,
                (previous, _) => {
                    tracing::info!(%previous, "Transformer stopped before start");
                    lifecycle.state = State::Stopped;
                    return Ok(());
                }
            }
        };

        // The lifecycle lock is released here: observers such as `state` and
        // `is_stopped` must not wait for in-flight samples. New puts already
        // fail once the shutdown signal is sent.
        let first = pool.shutdown();
        {
            // Held for the whole drain so `get` never misses an output in transit.
            // A concurrent `stop` waits here until the workers are joined.
            let mut overflow = lock(&self.overflow);
            pool.join(|output| overflow.push_back(output));
            let discarded = pool.drain_pending();

            let awaiting: HashSet<u32> = overflow.iter().map(|output| output.id).collect();
            lock(&self.in_flight).retain(|id| awaiting.contains(id));

            if first {
                tracing::info!(
                    discarded = discarded.len(),
                    pending_outputs = overflow.len(),
                    "Transformer stopped"
                );
            }
        }

        lock(&self.lifecycle).state = State::Stopped;
        Ok(())
    }

    fn is_stopped(&self) -> bool {
        self.state() == State::Stopped
    }

    fn state(&self) -> State {
        lock(&self.lifecycle).state
    }

    fn put(&self, sample: Sample) -> Result<()> {
        self.enqueue(sample, true)
    }

    fn try_put(&self, sample: Sample) -> Result<()> {
        self.enqueue(sample, false)
    }

    fn get(&self) -> Result<Output> {
        let pool = match self.pool_for("get") {
            Ok(pool) => pool,
            Err(e) if e.code() == ErrorCode::Stopped => {
                return Err(Error::new(ErrorCode::NoOutput, "transformer stopped before start"))
            }
            Err(e) => return Err(e),
        };

        if let Some(output) = self.pop_overflow() {
            return Ok(self.deliver(output));
        }
        if let Some(output) = pool.recv() {
            return Ok(self.deliver(output));
        }
        // Every worker has exited; `stop` may still be moving outputs aside.
        self.pop_overflow()
            .map(|output| self.deliver(output))
            .ok_or_else(|| {
                Error::new(
                    ErrorCode::NoOutput,
                    "transformer stopped and every output was retrieved",
                )
            })
    }
}

impl Drop for ThreadedTransformer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Body of every worker thread.
///
/// Runs until shutdown is signalled. A sample dequeued in the same instant as
/// shutdown is dropped rather than processed.
fn worker_loop(
    chain: &OpChain,
    seed: Option<u64>,
    task_rx: Receiver<Sample>,
    output_tx: Sender<Output>,
    shutdown_rx: Receiver<()>,
) {
    let worker_id = WORKER_ID.with(|id| *id.borrow());
    tracing::debug!(worker_id, "Worker started");

    loop {
        let sample = select! {
            recv(shutdown_rx) -> _ => break,
            recv(task_rx) -> msg => match msg {
                Ok(sample) => sample,
                Err(_) => break,
            },
        };
        if is_shutdown(&shutdown_rx) {
            tracing::debug!(worker_id, sample_id = sample.id, "Dropping sample dequeued during stop");
            break;
        }

        let sample_id = sample.id;
        seed_sample_rng(seed, sample_id);
        let output = chain.run(sample);
        tracing::debug!(worker_id, sample_id, error_code = output.error_code, "Processed sample");

        if output_tx.send(output).is_err() {
            break;
        }
    }

    tracing::debug!(worker_id, "Worker exiting");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
