//! src/ops/vision/mod.rs
//!
//! Vision operations for image preprocessing and augmentation.
//!
//! # Module Organization
//!
//! ```text
//! ops/vision/
//! ├── decode.rs        → Decoding submitted bytes into 8-bit pixels
//! ├── geometric.rs     → Spatial transformations (resize, crop, random crop, rotate)
//! ├── augmentation.rs  → Flips (deterministic or random)
//! └── conversion.rs    → Layout conversion (HWC → CHW transpose)
//! ```
//!
//! Image operations decode an encoded payload on first use, so a chain does
//! not need an explicit `decode` step unless a colour mode is required.
//!
//! # Quick Start
//!
//! ```ignore
//! transformer.add_op("decode", &kv_conf([("mode", "rgb")]))?;
//! transformer.add_op("resize", &kv_conf([("width", "256"), ("height", "256")]))?;
//! transformer.add_op("random_crop", &kv_conf([("width", "224"), ("height", "224")]))?;
//! transformer.add_op("flip", &kv_conf([("probability", "0.5")]))?;
//! transformer.add_op("transpose", &KvConf::new())?;
//! ```

pub mod augmentation;
pub mod conversion;
pub mod decode;
pub mod geometric;

pub use augmentation::{Flip, FlipAxis};
pub use conversion::Transpose;
pub use decode::{ColorMode, Decode};
pub use geometric::{Crop, RandomCrop, Resize, Rotate};

use crate::error::{Error, ErrorCode, Result};
use crate::sample::{Frame, Payload};
use image::DynamicImage;

/// Error codes an operation reports for a missing payload and for a
/// parameter that does not fit the sample.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OpCodes {
    pub(crate) no_input: ErrorCode,
    pub(crate) invalid_param: ErrorCode,
}

/// Takes the pixels out of `frame`, decoding encoded bytes when needed.
///
/// The frame's payload is left empty; callers put the transformed image back.
pub(crate) fn take_image(frame: &mut Frame, op: &str, codes: OpCodes) -> Result<DynamicImage> {
    match std::mem::replace(&mut frame.payload, Payload::Encoded(Vec::new())) {
        Payload::Image(img) => {
            ensure_not_empty(&img, op, codes)?;
            Ok(img)
        }
        Payload::Encoded(bytes) => {
            let img = decode::decode_bytes(&bytes, op, codes.no_input)?;
            ensure_not_empty(&img, op, codes)?;
            Ok(img)
        }
        Payload::Tensor { shape, .. } => Err(Error::new(
            codes.invalid_param,
            format!(
                "{}: expects an HWC image but got a tensor of shape {:?}",
                op, shape
            ),
        )),
    }
}

fn ensure_not_empty(img: &DynamicImage, op: &str, codes: OpCodes) -> Result<()> {
    if img.width() == 0 || img.height() == 0 {
        return Err(Error::new(
            codes.no_input,
            format!("{}: image has no pixels", op),
        ));
    }
    Ok(())
}
