//! src/transformer/config.rs
//!
//! Configuration for Transformer behaviour
//!
//! The `TransformerConfig` struct stores the global parameters validated by
//! `init`: how many workers run and how deep the two sample queues are.
//!
//! Example:
//! ```ignore
//! let config = TransformerConfig::builder()
//!     .worker_count(4)
//!     .queue_capacity(128)
//!     .seed(42)
//!     .build();
//! ```
//!
//! The same settings can come from the flat string map handed to `init`:
//! `worker_count`, `queue_capacity`, `output_queue_capacity` and `seed`.
//!
//! # Performance considerations:
//! - `worker_count`: More workers improve throughput on CPU-bound chains but
//!   each keeps one decoded sample in memory
//! - `queue_capacity`: Deeper queues absorb bursty producers at the cost of
//!   holding more raw samples in memory

use crate::error::{Error, ErrorCode, Result};
use crate::ops::KvConf;
use std::num::NonZeroUsize;
use std::thread;

const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Configuration for a Transformer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformerConfig {
    /// Number of parallel worker threads (must be > 0)
    pub worker_count: usize,
    /// Capacity of the input queue; `put` blocks while it is full (must be > 0)
    pub queue_capacity: usize,
    /// Capacity of the output queue, defaults to `queue_capacity`
    pub output_queue_capacity: Option<usize>,
    /// Base seed for random operations. Without it they draw from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            worker_count: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            output_queue_capacity: None,
            seed: None,
        }
    }
}

impl TransformerConfig {
    pub fn builder() -> TransformerConfigBuilder {
        TransformerConfigBuilder::default()
    }

    /// Parses the flat configuration accepted by `init`.
    ///
    /// Unrecognized keys are ignored with a warning; malformed values fail
    /// with `INVALID_CONFIG`.
    pub fn from_conf(conf: &KvConf) -> Result<Self> {
        let mut config = Self::default();

        for (key, value) in conf {
            let value = value.trim();
            match key.as_str() {
                "worker_count" | "worker_num" | "thread_num" => {
                    config.worker_count = parse_value(key, value)?;
                }
                "queue_capacity" | "buffer_size" => {
                    config.queue_capacity = parse_value(key, value)?;
                }
                "output_queue_capacity" => {
                    config.output_queue_capacity = Some(parse_value(key, value)?);
                }
                "seed" => {
                    config.seed = Some(parse_value(key, value)?);
                }
                _ => tracing::warn!(key = %key, "Ignoring unknown transformer configuration key"),
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the worker pool relies on.
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(Error::new(
                ErrorCode::InvalidConfig,
                "worker_count must be > 0",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(Error::new(
                ErrorCode::InvalidConfig,
                "queue_capacity must be > 0 to prevent deadlocks",
            ));
        }
        if self.output_queue_capacity == Some(0) {
            return Err(Error::new(
                ErrorCode::InvalidConfig,
                "output_queue_capacity must be > 0 to prevent deadlocks",
            ));
        }
        Ok(())
    }

    pub(crate) fn output_capacity(&self) -> usize {
        self.output_queue_capacity.unwrap_or(self.queue_capacity)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        Error::new(
            ErrorCode::InvalidConfig,
            format!("invalid value {:?} for '{}'", value, key),
        )
    })
}

/// Builder for TransformerConfig with method chaining
#[derive(Default)]
pub struct TransformerConfigBuilder {
    config: TransformerConfig,
}

impl TransformerConfigBuilder {
    /// Set the number of workers
    pub fn worker_count(mut self, workers: usize) -> Self {
        self.config.worker_count = workers;
        self
    }

    /// Set the input queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Set the output queue capacity
    pub fn output_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.output_queue_capacity = Some(capacity);
        self
    }

    /// Set the random seed for reproducible random operations.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> TransformerConfig {
        self.config
    }
}
