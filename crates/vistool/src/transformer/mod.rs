//! src/transformer/mod.rs
//!
//! The transformation engine.
//!
//! A transformer owns an operation chain, two bounded sample queues and a
//! pool of worker threads, and exposes the configure / launch / feed / fetch /
//! stop lifecycle. It is the only component callers interact with.
//!
//! # Architecture
//!
//! ```text
//!   caller threads                 worker pool                  caller threads
//!  ───────────────┐                ┌──────────┐                ┌───────────────
//!   put(sample) ──┼─► input queue ─► worker 0 ├─► output queue ─┼─► get()
//!   put_raw(..)   │   (bounded)    │ worker 1 │   (bounded)     │
//!   try_put(..)   │                │   ...    │                 │
//!                 │                └────┬─────┘                 │
//!                 │                     │ chain.run(sample)     │
//!                 │          decode ─► resize ─► ... ─► transpose
//! ```
//!
//! Samples are correlated with their outputs by `id` only: outputs arrive in
//! completion order, not submission order.
//!
//! # Lifecycle
//! 1. `init(conf)` validates the global configuration
//! 2. `add_op(name, conf)` appends operations, failing fast on bad names or parameters
//! 3. `start()` freezes the chain and spawns the workers
//! 4. `put` / `get` feed and fetch samples, possibly from many threads
//! 5. `stop()` lets workers finish their current sample and joins them;
//!    queued samples are discarded, produced outputs stay retrievable
//!
//! # Example
//! ```ignore
//! use vistool::{create, kv_conf, Sample};
//!
//! let transformer = create("threaded").expect("built-in kind");
//! transformer.init(&kv_conf([("worker_count", "4")]))?;
//! transformer.add_op("decode", &kv_conf([("mode", "rgb")]))?;
//! transformer.add_op("resize", &kv_conf([("width", "224"), ("height", "224")]))?;
//! transformer.add_op("transpose", &kv_conf([("order", "2,0,1")]))?;
//! transformer.start()?;
//!
//! transformer.put(Sample::new(0, jpeg_bytes).with_label("dog"))?;
//! let output = transformer.get()?;
//! assert_eq!(output.shape, vec![3, 224, 224]);
//! transformer.stop()?;
//! ```

pub mod common;
pub mod config;
pub mod state;
pub mod threaded;
pub(crate) mod workers;

pub use common::thread::{seed_sample_rng, worker_gen_bool, worker_gen_range, WORKER_ID, WORKER_RNG};
pub use config::{TransformerConfig, TransformerConfigBuilder};
pub use state::State;
pub use threaded::ThreadedTransformer;

use crate::error::Result;
use crate::ops::KvConf;
use crate::sample::{Output, Sample};

/// Type tags accepted by [`create`].
pub const KINDS: &[&str] = &["threaded"];

/// Common interface of every transformer implementation.
///
/// Methods take `&self` so a transformer can be shared between producer and
/// consumer threads. Calls made in the wrong lifecycle state fail with
/// `INVALID_STATE`, except `stop`, which is accepted in every state.
pub trait Transformer: Send + Sync {
    /// Validates and stores the global configuration.
    ///
    /// Allowed while unconfigured or configured; on error the state is unchanged.
    fn init(&self, conf: &KvConf) -> Result<()>;

    /// Appends an operation to the chain. Only allowed before `start`.
    ///
    /// Fails with `INVALID_OP_NAME` for an unknown name, or with the
    /// operation's invalid-parameter code. The chain is unchanged on error.
    fn add_op(&self, name: &str, conf: &KvConf) -> Result<()>;

    /// Freezes the chain and spawns the workers.
    fn start(&self) -> Result<()>;

    /// Stops the workers after their current sample and joins them. Idempotent.
    fn stop(&self) -> Result<()>;

    fn is_stopped(&self) -> bool;

    fn state(&self) -> State;

    /// Queues a sample, blocking while the input queue is full.
    ///
    /// Fails with `STOPPED` once the transformer is stopped, including when
    /// the call was blocked at that moment.
    fn put(&self, sample: Sample) -> Result<()>;

    /// Non-blocking `put`, failing with `QUEUE_FULL` instead of waiting.
    fn try_put(&self, sample: Sample) -> Result<()>;

    /// Copies a borrowed buffer into an owned sample and queues it.
    fn put_raw(&self, id: u32, data: &[u8], label: &str) -> Result<()> {
        self.put(Sample::from_raw(id, data, label))
    }

    /// Blocks until an output is available.
    ///
    /// Once stopped, returns the remaining outputs, then `NO_OUTPUT`.
    fn get(&self) -> Result<Output>;
}

/// Creates a transformer by type tag; unknown tags yield `None`.
pub fn create(kind: &str) -> Option<Box<dyn Transformer>> {
    match kind {
        "threaded" => Some(Box::new(ThreadedTransformer::new())),
        _ => {
            tracing::debug!(kind, "Unknown transformer kind");
            None
        }
    }
}

/// Stops a transformer and releases its resources.
pub fn destroy(transformer: Box<dyn Transformer>) {
    if let Err(e) = transformer.stop() {
        tracing::warn!(error = %e, "Failed to stop transformer");
    }
}
