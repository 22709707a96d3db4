use crate::error::{Error, ErrorCode, OK};
use image::{DynamicImage, GenericImageView};

/// The `Sample` struct is one unit of raw media submitted for transformation.
///
/// `id` is assigned by the caller and is the only correlation key between a
/// submitted sample and the [`Output`] eventually fetched for it, since workers
/// may finish out of order.
///
/// # Examples:
/// - An encoded PNG frame: `Sample::new(7, png_bytes).with_label("cat")`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sample {
    pub id: u32,
    pub data: Vec<u8>,
    pub label: String,
}

impl Sample {
    /// Creates a new unlabelled `Sample`.
    pub fn new(id: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            data: data.into(),
            label: String::new(),
        }
    }

    /// Creates a `Sample` by copying a borrowed buffer.
    ///
    /// This is the adapter used by `put_raw`: the engine never holds on to
    /// caller-owned memory.
    pub fn from_raw(id: u32, data: &[u8], label: &str) -> Self {
        Self {
            id,
            data: data.to_vec(),
            label: label.to_owned(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Processed (or failed) result for one submitted [`Sample`].
///
/// `error_code == 0` means success, in which case `shape` describes `data`
/// as a dense `u8` tensor (`shape.iter().product() == data.len()`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    pub id: u32,
    pub error_code: i32,
    pub error_message: String,
    pub label: String,
    pub shape: Vec<usize>,
    pub data: Vec<u8>,
}

impl Output {
    /// Builds a failed output, keeping the correlation id and label.
    pub fn failure(id: u32, label: String, error: &Error) -> Self {
        Self {
            id,
            error_code: error.code().as_i32(),
            error_message: error.message().to_owned(),
            label,
            shape: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error_code == OK
    }

    /// Symbolic kind of the failure, `None` on success.
    pub fn error_kind(&self) -> Option<ErrorCode> {
        ErrorCode::from_i32(self.error_code)
    }
}

/// Payload of a sample while it travels through the operation chain.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Bytes as submitted (an encoded image container).
    Encoded(Vec<u8>),
    /// Decoded 8-bit pixels, interleaved `[height, width, channels]`.
    Image(DynamicImage),
    /// Dense `u8` tensor with an explicit shape.
    Tensor { shape: Vec<usize>, data: Vec<u8> },
}

/// Intermediate value handed from one operation to the next.
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: u32,
    pub label: String,
    pub payload: Payload,
}

impl Frame {
    pub fn with_payload(self, payload: Payload) -> Self {
        Self { payload, ..self }
    }

    /// Converts the final frame into a successful [`Output`].
    ///
    /// A payload that never left the encoded form cannot be described by a
    /// shape, so it yields `NO_OUTPUT`. A tensor whose shape does not match
    /// its data length yields `LOGIC_ERROR`.
    pub fn into_output(self) -> Output {
        let (shape, data) = match self.payload {
            Payload::Encoded(_) => {
                let error = Error::new(
                    ErrorCode::NoOutput,
                    "no operation produced pixel output for this sample",
                );
                return Output::failure(self.id, self.label, &error);
            }
            Payload::Image(img) => {
                let (width, height) = img.dimensions();
                let channels = img.color().channel_count() as usize;
                (
                    vec![height as usize, width as usize, channels],
                    img.into_bytes(),
                )
            }
            Payload::Tensor { shape, data } => (shape, data),
        };
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            let error = Error::new(
                ErrorCode::LogicError,
                format!(
                    "shape {:?} describes {} elements but the payload holds {} bytes",
                    shape,
                    expected,
                    data.len()
                ),
            );
            return Output::failure(self.id, self.label, &error);
        }

        Output {
            id: self.id,
            error_code: OK,
            error_message: String::new(),
            label: self.label,
            shape,
            data,
        }
    }
}

impl From<Sample> for Frame {
    fn from(sample: Sample) -> Self {
        Self {
            id: sample.id,
            label: sample.label,
            payload: Payload::Encoded(sample.data),
        }
    }
}
