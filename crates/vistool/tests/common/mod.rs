#![allow(dead_code)]

use vistool::{
    kv_conf, Error, ErrorCode, Frame, KvConf, OpRegistry, Operation, Payload, ThreadedTransformer,
    Transformer,
};

use anyhow::Result;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Encodes a `width` x `height` RGB gradient as PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| image::Rgb([x as u8, y as u8, 128]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buffer, ImageFormat::Png)
        .expect("encoding a test image must succeed");
    buffer.into_inner()
}

/// Turns the payload into a 1-D tensor of its bytes, counting invocations.
///
/// Accepts `delay_ms` to simulate an expensive operation.
#[derive(Debug)]
pub struct StampOp {
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl Operation for StampOp {
    fn name(&self) -> &str {
        "stamp"
    }

    fn apply(&self, frame: Frame) -> vistool::Result<Frame> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let data = match &frame.payload {
            Payload::Encoded(bytes) => bytes.clone(),
            Payload::Tensor { data, .. } => data.clone(),
            Payload::Image(img) => img.as_bytes().to_vec(),
        };
        Ok(frame.with_payload(Payload::Tensor {
            shape: vec![data.len()],
            data,
        }))
    }
}

/// Always fails with `CROP_INVALID_PARAM`.
#[derive(Debug)]
pub struct FailOp;

impl Operation for FailOp {
    fn name(&self) -> &str {
        "fail"
    }

    fn apply(&self, frame: Frame) -> vistool::Result<Frame> {
        Err(Error::new(
            ErrorCode::CropInvalidParam,
            format!("sample {} rejected on purpose", frame.id),
        ))
    }
}

/// Panics on odd sample ids, passes even ones through.
#[derive(Debug)]
pub struct PanicOp;

impl Operation for PanicOp {
    fn name(&self) -> &str {
        "panic"
    }

    fn apply(&self, frame: Frame) -> vistool::Result<Frame> {
        if frame.id % 2 == 1 {
            panic!("sample {} is odd", frame.id);
        }
        Ok(frame)
    }
}

/// Emits a tensor whose shape claims more elements than it holds.
#[derive(Debug)]
pub struct MisshapenOp;

impl Operation for MisshapenOp {
    fn name(&self) -> &str {
        "misshapen"
    }

    fn apply(&self, frame: Frame) -> vistool::Result<Frame> {
        Ok(frame.with_payload(Payload::Tensor {
            shape: vec![4],
            data: vec![1],
        }))
    }
}

/// Built-in registry plus `stamp` (counted by `calls`), `fail`, `panic` and `misshapen`.
pub fn test_registry(calls: Arc<AtomicUsize>) -> OpRegistry {
    let mut registry = OpRegistry::builtin();
    registry
        .register("stamp", move |conf: &KvConf| {
            let delay_ms = conf
                .get("delay_ms")
                .map(|v| v.parse::<u64>())
                .transpose()
                .map_err(|e| Error::new(ErrorCode::InvalidConfig, e.to_string()))?
                .unwrap_or(0);
            Ok(Box::new(StampOp {
                calls: calls.clone(),
                delay: Duration::from_millis(delay_ms),
            }) as Box<dyn Operation>)
        })
        .register("fail", |_: &KvConf| Ok(Box::new(FailOp) as Box<dyn Operation>))
        .register("panic", |_: &KvConf| Ok(Box::new(PanicOp) as Box<dyn Operation>))
        .register("misshapen", |_: &KvConf| {
            Ok(Box::new(MisshapenOp) as Box<dyn Operation>)
        });
    registry
}

/// Builds and starts a transformer running `ops` in order.
pub fn started_transformer(
    registry: OpRegistry,
    worker_count: usize,
    queue_capacity: usize,
    ops: &[(&str, KvConf)],
) -> Result<ThreadedTransformer> {
    let transformer = ThreadedTransformer::with_registry(registry);
    transformer.init(&kv_conf([
        ("worker_count", worker_count.to_string()),
        ("queue_capacity", queue_capacity.to_string()),
    ]))?;
    for (name, conf) in ops {
        transformer.add_op(name, conf)?;
    }
    transformer.start()?;
    Ok(transformer)
}
