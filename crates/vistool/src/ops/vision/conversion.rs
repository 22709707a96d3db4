use super::OpCodes;
use crate::error::{ensure_code, Error, ErrorCode, Result};
use crate::ops::core::Operation;
use crate::ops::params::{KvConf, Params};
use crate::sample::{Frame, Payload};
use image::GenericImageView;

// ============================================================================
// Transpose
// ============================================================================

/// Permutes the axes of a 3-D sample, by default HWC → CHW.
///
/// Image payloads are read as `[height, width, channels]`; tensor payloads
/// must already be 3-D. The result is always a tensor payload, so image
/// operations cannot follow a transpose.
///
/// Layout Handling
/// | order   | Input        | Output       |
/// |---------|--------------|--------------|
/// | `2,0,1` | `[H, W, C]`  | `[C, H, W]`  |
/// | `1,0,2` | `[H, W, C]`  | `[W, H, C]`  |
/// | `0,1,2` | `[H, W, C]`  | `[H, W, C]`  |
#[derive(Debug)]
pub struct Transpose {
    order: [usize; 3],
}

impl Transpose {
    pub const NAME: &'static str = "transpose";
    const CODES: OpCodes = OpCodes {
        no_input: ErrorCode::TransposeNoInput,
        invalid_param: ErrorCode::TransposeInvalidParam,
    };

    pub fn new(order: [usize; 3]) -> Result<Self> {
        let mut seen = [false; 3];
        for &axis in &order {
            ensure_code!(
                axis < 3 && !seen[axis],
                Self::CODES.invalid_param,
                "Transpose order must be a permutation of 0,1,2 (got {:?})",
                order
            );
            seen[axis] = true;
        }
        Ok(Self { order })
    }

    pub fn from_conf(conf: &KvConf) -> Result<Self> {
        let params = Params::new(Self::NAME, conf, Self::CODES.invalid_param);
        let Some(raw) = params.str("order") else {
            return Self::new([2, 0, 1]);
        };
        let axes = raw
            .split(',')
            .map(|s| s.trim().parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| params.error(format!("invalid axis order {:?}", raw)))?;
        let order: [usize; 3] = axes
            .try_into()
            .map_err(|_| params.error(format!("axis order needs 3 entries (got {:?})", raw)))?;
        Self::new(order)
    }

    fn permute(&self, shape: [usize; 3], data: &[u8]) -> (Vec<usize>, Vec<u8>) {
        let order = self.order;
        let out_shape = [shape[order[0]], shape[order[1]], shape[order[2]]];
        let strides = [shape[1] * shape[2], shape[2], 1];

        let mut out = Vec::with_capacity(data.len());
        let mut index = [0usize; 3];
        for i in 0..out_shape[0] {
            index[order[0]] = i;
            for j in 0..out_shape[1] {
                index[order[1]] = j;
                for k in 0..out_shape[2] {
                    index[order[2]] = k;
                    out.push(data[index[0] * strides[0] + index[1] * strides[1] + index[2]]);
                }
            }
        }
        (out_shape.to_vec(), out)
    }
}

impl Operation for Transpose {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn apply(&self, mut frame: Frame) -> Result<Frame> {
        let payload = std::mem::replace(&mut frame.payload, Payload::Encoded(Vec::new()));
        let (shape, data) = match payload {
            Payload::Tensor { shape, data } => {
                ensure_code!(
                    !data.is_empty(),
                    Self::CODES.no_input,
                    "transpose: tensor payload is empty"
                );
                let dims: [usize; 3] = shape.as_slice().try_into().map_err(|_| {
                    Error::new(
                        Self::CODES.invalid_param,
                        format!("transpose: expects a 3-D tensor (got shape {:?})", shape),
                    )
                })?;
                (dims, data)
            }
            payload => {
                frame.payload = payload;
                let img = super::take_image(&mut frame, Self::NAME, Self::CODES)?;
                let (width, height) = img.dimensions();
                let channels = img.color().channel_count() as usize;
                (
                    [height as usize, width as usize, channels],
                    img.into_bytes(),
                )
            }
        };

        let (out_shape, out) = self.permute(shape, &data);
        frame.payload = Payload::Tensor {
            shape: out_shape,
            data: out,
        };
        Ok(frame)
    }
}
