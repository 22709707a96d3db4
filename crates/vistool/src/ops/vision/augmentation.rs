use super::OpCodes;
use crate::error::{ensure_code, ErrorCode, Result};
use crate::ops::core::Operation;
use crate::ops::params::{KvConf, Params};
use crate::sample::{Frame, Payload};
use crate::transformer::worker_gen_bool;
use image::{DynamicImage, ImageBuffer, RgbImage};

// ============================================================================
// Flip
// ============================================================================

/// Axis a [`Flip`] mirrors across.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipAxis {
    /// Left/right mirror
    Horizontal,
    /// Top/bottom mirror
    Vertical,
    /// Both, equivalent to a 180° rotation
    Both,
}

impl FlipAxis {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "horizontal" | "h" | "x" | "1" => Some(Self::Horizontal),
            "vertical" | "v" | "y" | "0" => Some(Self::Vertical),
            "both" | "hv" | "-1" => Some(Self::Both),
            _ => None,
        }
    }
}

/// Mirrors images, always or with probability `p`.
///
/// # Configuration
/// - `axis`: `horizontal` (default), `vertical` or `both`
/// - `probability`: chance of flipping, in `[0.0, 1.0]`, default `1.0`
///
/// # Example
/// ```ignore
/// let flip = Flip::new(FlipAxis::Horizontal, 0.5)?; // 50% flip chance
/// let augmented = flip.apply(frame)?;
/// ```
#[derive(Debug)]
pub struct Flip {
    axis: FlipAxis,
    p: f64,
}

impl Flip {
    pub const NAME: &'static str = "flip";
    const CODES: OpCodes = OpCodes {
        no_input: ErrorCode::FlipNoInput,
        invalid_param: ErrorCode::FlipInvalidParam,
    };

    pub fn new(axis: FlipAxis, p: f64) -> Result<Self> {
        ensure_code!(
            (0.0..=1.0).contains(&p),
            Self::CODES.invalid_param,
            "Probability must be in [0.0, 1.0] range (got {})",
            p
        );
        Ok(Self { axis, p })
    }

    pub fn from_conf(conf: &KvConf) -> Result<Self> {
        let params = Params::new(Self::NAME, conf, Self::CODES.invalid_param);
        let axis = match params.str("axis") {
            None => FlipAxis::Horizontal,
            Some(raw) => FlipAxis::parse(raw)
                .ok_or_else(|| params.error(format!("unknown axis {:?}", raw)))?,
        };
        let p = params.float("probability")?.unwrap_or(1.0);
        Self::new(axis, p)
    }

    /// Flips an RGB8 image horizontally row by row
    fn flip_rgb8(img: RgbImage) -> RgbImage {
        let (width, height) = img.dimensions();
        let row_len = width as usize * 3;
        let mut pixels = img.into_raw();

        for row in pixels.chunks_exact_mut(row_len) {
            row.reverse();
            // Reversing the row also reversed each RGB triplet; restore channel order.
            for pixel in row.chunks_exact_mut(3) {
                pixel.swap(0, 2);
            }
        }

        ImageBuffer::from_raw(width, height, pixels)
            .unwrap_or_else(|| unreachable!("row-wise flip keeps the buffer length"))
    }

    fn flip(&self, img: DynamicImage) -> DynamicImage {
        match (self.axis, img) {
            (FlipAxis::Horizontal, DynamicImage::ImageRgb8(rgb)) => {
                DynamicImage::ImageRgb8(Self::flip_rgb8(rgb))
            }
            (FlipAxis::Horizontal, img) => img.fliph(),
            (FlipAxis::Vertical, img) => img.flipv(),
            (FlipAxis::Both, img) => img.rotate180(),
        }
    }
}

impl Operation for Flip {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn apply(&self, mut frame: Frame) -> Result<Frame> {
        let img = super::take_image(&mut frame, Self::NAME, Self::CODES)?;
        let flipped = match self.p {
            // Fast path: never flip
            p if p <= 0.0 => img,
            // Fast path: always flip
            p if p >= 1.0 => self.flip(img),
            p => {
                if worker_gen_bool(p) {
                    self.flip(img)
                } else {
                    img
                }
            }
        };
        frame.payload = Payload::Image(flipped);
        Ok(frame)
    }
}
