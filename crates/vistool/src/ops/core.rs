use crate::error::{Error, ErrorCode, Result};
use crate::ops::params::KvConf;
use crate::ops::registry::OpRegistry;
use crate::sample::{Frame, Output, Sample};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Defines the core `Operation` trait every transformation step implements.
///
/// An `Operation` is a stateless step converting one [`Frame`] into another.
/// Parameters are validated when the operation is constructed, so `apply`
/// only fails when the sample itself is unsuitable (e.g. a crop region
/// outside the image), using the operation's own error code.
///
/// Implementations must not keep cross-call state: the same instance is
/// shared read-only by every worker thread.
pub trait Operation: Send + Sync + fmt::Debug {
    /// Registry name of this operation.
    fn name(&self) -> &str;

    /// Applies the operation to one frame.
    fn apply(&self, frame: Frame) -> Result<Frame>;
}

/// An ordered sequence of operations applied left-to-right to each sample.
///
/// The chain short-circuits: once an operation fails, the remaining ones are
/// never run and the failure code and message are copied unchanged into the
/// sample's [`Output`].
#[derive(Debug, Default)]
pub struct OpChain {
    ops: Vec<Box<dyn Operation>>,
}

impl OpChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves every `(name, config)` pair against `registry`.
    ///
    /// Fails with `INVALID_OP_NAME` for an unknown name, or with the
    /// operation's invalid-parameter code when its configuration is rejected.
    pub fn build<S: AsRef<str>>(registry: &OpRegistry, specs: &[(S, KvConf)]) -> Result<Self> {
        let mut chain = Self::new();
        for (name, conf) in specs {
            chain.push(registry.create(name.as_ref(), conf)?);
        }
        Ok(chain)
    }

    pub fn push(&mut self, op: Box<dyn Operation>) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().map(|op| op.name())
    }

    /// Runs one sample through the chain and always produces an [`Output`]
    /// carrying the sample's id.
    ///
    /// A panicking operation is contained here and reported as `LOGIC_ERROR`
    /// so the worker thread survives and the id is not lost.
    pub fn run(&self, sample: Sample) -> Output {
        let id = sample.id;
        let label = sample.label.clone();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.apply_all(sample.into()).map(Frame::into_output)
        }));
        match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(error)) => Output::failure(id, label, &error),
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::warn!(sample_id = id, %reason, "Operation panicked");
                let error = Error::new(
                    ErrorCode::LogicError,
                    format!("operation panicked: {}", reason),
                );
                Output::failure(id, label, &error)
            }
        }
    }

    fn apply_all(&self, mut frame: Frame) -> Result<Frame> {
        for op in &self.ops {
            tracing::trace!(sample_id = frame.id, op = op.name(), "Applying operation");
            frame = op.apply(frame)?;
        }
        Ok(frame)
    }
}
