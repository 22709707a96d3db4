use super::OpCodes;
use crate::error::{ensure_code, ErrorCode, Result};
use crate::ops::core::Operation;
use crate::ops::params::{KvConf, Params};
use crate::sample::{Frame, Payload};
use crate::transformer::worker_gen_range;
use image::{imageops::FilterType, DynamicImage, Luma, LumaA, Rgb, Rgba};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

// ============================================================================
// Resize
// ============================================================================

/// Resizes an image to the configured dimension.
///
/// # Configuration
/// - `width`, `height`: target size, both required and positive
/// - `interpolation`: `nearest`, `linear` (default), `cubic`, `gaussian`, `lanczos`
/// - `keep_ratio`: when true the image is scaled to fit inside the target box
///   preserving its aspect ratio; otherwise it is stretched to the exact size
///
/// # Filter Types
/// - `Nearest`: Nearest neighbour, fastest
/// - `Triangle`: Bilinear filter, good all-round default
/// - `CatmullRom`: Bicubic sharpening
/// - `Gaussian`: Blurring/smoothing
/// - `Lanczos3`: Lanczos with window 3, highest quality re-sampling but slowest.
#[derive(Debug)]
pub struct Resize {
    width: u32,
    height: u32,
    filter: FilterType,
    keep_ratio: bool,
}

impl Resize {
    pub const NAME: &'static str = "resize";
    const CODES: OpCodes = OpCodes {
        no_input: ErrorCode::ResizeNoInput,
        invalid_param: ErrorCode::ResizeInvalidParam,
    };

    /// Creates a new Resize operation.
    pub fn new(width: u32, height: u32, filter: FilterType) -> Result<Self> {
        ensure_code!(
            width > 0 && height > 0,
            Self::CODES.invalid_param,
            "Image dimensions must be positive after resizing (got {}x{})",
            width,
            height
        );
        Ok(Self {
            width,
            height,
            filter,
            keep_ratio: false,
        })
    }

    pub fn keep_ratio(mut self, keep: bool) -> Self {
        self.keep_ratio = keep;
        self
    }

    pub fn from_conf(conf: &KvConf) -> Result<Self> {
        let params = Params::new(Self::NAME, conf, Self::CODES.invalid_param);
        let width = params.required_dimension("width")?;
        let height = params.required_dimension("height")?;
        let filter = match params.str("interpolation") {
            None => FilterType::Triangle,
            Some(raw) => parse_filter(raw)
                .ok_or_else(|| params.error(format!("unknown interpolation {:?}", raw)))?,
        };
        let keep_ratio = params.flag("keep_ratio")?.unwrap_or(false);
        Ok(Self::new(width, height, filter)?.keep_ratio(keep_ratio))
    }
}

fn parse_filter(raw: &str) -> Option<FilterType> {
    match raw.to_ascii_lowercase().as_str() {
        "nearest" => Some(FilterType::Nearest),
        "linear" | "bilinear" | "triangle" => Some(FilterType::Triangle),
        "cubic" | "bicubic" | "catmullrom" => Some(FilterType::CatmullRom),
        "gaussian" => Some(FilterType::Gaussian),
        "lanczos" | "lanczos3" => Some(FilterType::Lanczos3),
        _ => None,
    }
}

impl Operation for Resize {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn apply(&self, mut frame: Frame) -> Result<Frame> {
        let img = super::take_image(&mut frame, Self::NAME, Self::CODES)?;
        let resized = if self.keep_ratio {
            img.resize(self.width, self.height, self.filter)
        } else {
            img.resize_exact(self.width, self.height, self.filter)
        };
        frame.payload = Payload::Image(resized);
        Ok(frame)
    }
}

// ============================================================================
// Crop
// ============================================================================

/// Cuts a fixed `width` x `height` region out of the image.
///
/// With `x` and `y` the region starts at that top-left corner; without them
/// it is centered. A region that does not fit the sample fails with
/// `CROP_INVALID_PARAM`.
#[derive(Debug)]
pub struct Crop {
    width: u32,
    height: u32,
    origin: Option<(u32, u32)>,
}

impl Crop {
    pub const NAME: &'static str = "crop";
    const CODES: OpCodes = OpCodes {
        no_input: ErrorCode::CropNoInput,
        invalid_param: ErrorCode::CropInvalidParam,
    };

    pub fn new(width: u32, height: u32, origin: Option<(u32, u32)>) -> Result<Self> {
        ensure_code!(
            width > 0 && height > 0,
            Self::CODES.invalid_param,
            "Crop size must be positive (got {}x{})",
            width,
            height
        );
        Ok(Self {
            width,
            height,
            origin,
        })
    }

    pub fn from_conf(conf: &KvConf) -> Result<Self> {
        let params = Params::new(Self::NAME, conf, Self::CODES.invalid_param);
        let width = params.required_dimension("width")?;
        let height = params.required_dimension("height")?;
        let origin = match (params.offset("x")?, params.offset("y")?) {
            (Some(x), Some(y)) => Some((x, y)),
            (None, None) => None,
            _ => return Err(params.error("'x' and 'y' must be given together")),
        };
        Self::new(width, height, origin)
    }
}

impl Operation for Crop {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn apply(&self, mut frame: Frame) -> Result<Frame> {
        let img = super::take_image(&mut frame, Self::NAME, Self::CODES)?;
        let (img_w, img_h) = (img.width(), img.height());
        ensure_code!(
            self.width <= img_w && self.height <= img_h,
            Self::CODES.invalid_param,
            "crop: region {}x{} larger than image {}x{}",
            self.width,
            self.height,
            img_w,
            img_h
        );

        let (x, y) = match self.origin {
            Some((x, y)) => {
                ensure_code!(
                    x as u64 + self.width as u64 <= img_w as u64
                        && y as u64 + self.height as u64 <= img_h as u64,
                    Self::CODES.invalid_param,
                    "crop: region {}x{} at ({}, {}) outside image {}x{}",
                    self.width,
                    self.height,
                    x,
                    y,
                    img_w,
                    img_h
                );
                (x, y)
            }
            None => ((img_w - self.width) / 2, (img_h - self.height) / 2),
        };

        frame.payload = Payload::Image(img.crop_imm(x, y, self.width, self.height));
        Ok(frame)
    }
}

// ============================================================================
// RandomCrop
// ============================================================================

/// Cuts a `width` x `height` region at a random position.
///
/// Positions are drawn from the worker RNG, so with a configured seed a given
/// sample id always lands on the same region.
#[derive(Debug)]
pub struct RandomCrop {
    width: u32,
    height: u32,
}

impl RandomCrop {
    pub const NAME: &'static str = "random_crop";
    const CODES: OpCodes = OpCodes {
        no_input: ErrorCode::RandCropNoInput,
        invalid_param: ErrorCode::RandCropInvalidParam,
    };

    pub fn new(width: u32, height: u32) -> Result<Self> {
        ensure_code!(
            width > 0 && height > 0,
            Self::CODES.invalid_param,
            "Random crop size must be positive (got {}x{})",
            width,
            height
        );
        Ok(Self { width, height })
    }

    pub fn from_conf(conf: &KvConf) -> Result<Self> {
        let params = Params::new(Self::NAME, conf, Self::CODES.invalid_param);
        Self::new(
            params.required_dimension("width")?,
            params.required_dimension("height")?,
        )
    }
}

impl Operation for RandomCrop {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn apply(&self, mut frame: Frame) -> Result<Frame> {
        let img = super::take_image(&mut frame, Self::NAME, Self::CODES)?;
        let (img_w, img_h) = (img.width(), img.height());
        ensure_code!(
            self.width <= img_w && self.height <= img_h,
            Self::CODES.invalid_param,
            "random_crop: region {}x{} larger than image {}x{}",
            self.width,
            self.height,
            img_w,
            img_h
        );

        let x = worker_gen_range(0..=img_w - self.width);
        let y = worker_gen_range(0..=img_h - self.height);
        frame.payload = Payload::Image(img.crop_imm(x, y, self.width, self.height));
        Ok(frame)
    }
}

// ============================================================================
// Rotate
// ============================================================================

/// Rotates the image clockwise by `angle` degrees.
///
/// Multiples of 90° are exact and swap width and height as needed. Other
/// angles rotate about the center with bilinear interpolation, keep the
/// original size and fill uncovered pixels with zero.
#[derive(Debug)]
pub struct Rotate {
    angle: f64,
}

impl Rotate {
    pub const NAME: &'static str = "rotate";
    const CODES: OpCodes = OpCodes {
        no_input: ErrorCode::RotateNoInput,
        invalid_param: ErrorCode::RotateInvalidParam,
    };

    pub fn new(angle: f64) -> Result<Self> {
        ensure_code!(
            angle.is_finite() && (-360.0..=360.0).contains(&angle),
            Self::CODES.invalid_param,
            "Rotation angle must be within [-360, 360] degrees (got {})",
            angle
        );
        Ok(Self { angle })
    }

    pub fn from_conf(conf: &KvConf) -> Result<Self> {
        let params = Params::new(Self::NAME, conf, Self::CODES.invalid_param);
        let angle = params
            .float("angle")?
            .ok_or_else(|| params.error("missing required key 'angle'"))?;
        Self::new(angle)
    }

    fn rotate_free(img: DynamicImage, theta: f32) -> DynamicImage {
        let bilinear = Interpolation::Bilinear;
        match img {
            DynamicImage::ImageLuma8(buf) => {
                DynamicImage::ImageLuma8(rotate_about_center(&buf, theta, bilinear, Luma([0])))
            }
            DynamicImage::ImageLumaA8(buf) => DynamicImage::ImageLumaA8(rotate_about_center(
                &buf,
                theta,
                bilinear,
                LumaA([0, 0]),
            )),
            DynamicImage::ImageRgba8(buf) => DynamicImage::ImageRgba8(rotate_about_center(
                &buf,
                theta,
                bilinear,
                Rgba([0, 0, 0, 0]),
            )),
            other => DynamicImage::ImageRgb8(rotate_about_center(
                &other.to_rgb8(),
                theta,
                bilinear,
                Rgb([0, 0, 0]),
            )),
        }
    }
}

impl Operation for Rotate {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn apply(&self, mut frame: Frame) -> Result<Frame> {
        let img = super::take_image(&mut frame, Self::NAME, Self::CODES)?;
        let degrees = self.angle.rem_euclid(360.0);

        let rotated = if degrees == 0.0 {
            img
        } else if degrees == 90.0 {
            img.rotate90()
        } else if degrees == 180.0 {
            img.rotate180()
        } else if degrees == 270.0 {
            img.rotate270()
        } else {
            Self::rotate_free(img, degrees.to_radians() as f32)
        };

        frame.payload = Payload::Image(rotated);
        Ok(frame)
    }
}
