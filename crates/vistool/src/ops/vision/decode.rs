use super::OpCodes;
use crate::error::{Error, ErrorCode, Result};
use crate::ops::core::Operation;
use crate::ops::params::{KvConf, Params};
use crate::sample::{Frame, Payload};
use image::DynamicImage;

// ============================================================================
// Byte decoding
// ============================================================================

/// Decodes an encoded image container and normalizes it to 8 bits per channel.
///
/// Empty input fails with `no_input`; bytes the codecs cannot read fail with
/// `DECODE_FAILED`.
pub(crate) fn decode_bytes(bytes: &[u8], op: &str, no_input: ErrorCode) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(Error::new(
            no_input,
            format!("{}: sample payload is empty", op),
        ));
    }
    let img = image::load_from_memory(bytes).map_err(|e| {
        Error::new(
            ErrorCode::DecodeFailed,
            format!("{}: failed to decode {} bytes: {}", op, bytes.len(), e),
        )
    })?;
    Ok(to_8bit(img))
}

/// Output is always `u8`, so wider sample types are narrowed here.
pub(crate) fn to_8bit(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_) => img,
        DynamicImage::ImageLuma16(_) => DynamicImage::ImageLuma8(img.to_luma8()),
        DynamicImage::ImageLumaA16(_) => DynamicImage::ImageLumaA8(img.to_luma_alpha8()),
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

// ============================================================================
// Decode
// ============================================================================

/// Target colour layout of [`Decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// 3 channels
    Rgb,
    /// 4 channels
    Rgba,
    /// 1 channel
    Gray,
    /// Whatever the container holds, narrowed to 8 bits
    Unchanged,
}

impl ColorMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "rgb" | "color" => Some(Self::Rgb),
            "rgba" => Some(Self::Rgba),
            "gray" | "grey" | "grayscale" => Some(Self::Gray),
            "unchanged" => Some(Self::Unchanged),
            _ => None,
        }
    }

    fn convert(self, img: DynamicImage) -> DynamicImage {
        match (self, img) {
            (Self::Unchanged, img) => img,
            (Self::Rgb, img @ DynamicImage::ImageRgb8(_)) => img,
            (Self::Rgb, img) => DynamicImage::ImageRgb8(img.to_rgb8()),
            (Self::Rgba, img @ DynamicImage::ImageRgba8(_)) => img,
            (Self::Rgba, img) => DynamicImage::ImageRgba8(img.to_rgba8()),
            (Self::Gray, img @ DynamicImage::ImageLuma8(_)) => img,
            (Self::Gray, img) => DynamicImage::ImageLuma8(img.to_luma8()),
        }
    }
}

/// Decodes the submitted bytes into pixels of a fixed colour layout.
///
/// # Configuration
/// - `mode`: `rgb` (default), `rgba`, `gray` or `unchanged`
///
/// An already decoded frame is only converted to the requested layout.
#[derive(Debug, Clone)]
pub struct Decode {
    mode: ColorMode,
}

impl Decode {
    pub const NAME: &'static str = "decode";
    const CODES: OpCodes = OpCodes {
        no_input: ErrorCode::DecodeNoInput,
        invalid_param: ErrorCode::DecodeInvalidParam,
    };

    pub fn new(mode: ColorMode) -> Self {
        Self { mode }
    }

    pub fn from_conf(conf: &KvConf) -> Result<Self> {
        let params = Params::new(Self::NAME, conf, Self::CODES.invalid_param);
        let mode = match params.str("mode") {
            None => ColorMode::Rgb,
            Some(raw) => ColorMode::parse(raw)
                .ok_or_else(|| params.error(format!("unknown colour mode {:?}", raw)))?,
        };
        Ok(Self::new(mode))
    }
}

impl Operation for Decode {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn apply(&self, mut frame: Frame) -> Result<Frame> {
        let img = super::take_image(&mut frame, Self::NAME, Self::CODES)?;
        frame.payload = Payload::Image(self.mode.convert(img));
        Ok(frame)
    }
}
