//! src/error.rs
//!
//! Error taxonomy shared by the transformer, the operation chain and every
//! operation.
//!
//! Each failure carries an [`ErrorCode`] with a stable integer value so it can
//! cross a process or language boundary unchanged, plus a human-readable
//! message. Configuration-time errors are returned as [`Error`]; per-sample
//! failures are folded into [`Output`](crate::sample::Output) by the chain
//! runner and never cross the queue boundary as `Err`.

use std::fmt;

/// Integer value reported for a successful sample.
pub const OK: i32 = 0;

/// Symbolic error kinds with their stable integer values.
///
/// Values `1000..=1010` are part of the established wire contract and must not
/// change. Engine-level codes live below 1000, operation codes above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    NoOutput = 1,
    LogicError = 2,
    InvalidConfig = 3,
    InvalidState = 4,
    QueueFull = 5,
    DuplicateId = 6,
    SpawnFailed = 7,

    Stopped = 1000,
    InvalidOpName = 1001,
    ResizeNoInput = 1002,
    ResizeInvalidParam = 1003,
    CropNoInput = 1004,
    CropInvalidParam = 1005,
    TransposeNoInput = 1006,
    RotateNoInput = 1007,
    RotateInvalidParam = 1008,
    RandCropInvalidParam = 1009,
    FlipInvalidParam = 1010,
    TransposeInvalidParam = 1011,
    RandCropNoInput = 1012,
    FlipNoInput = 1013,
    DecodeNoInput = 1014,
    DecodeInvalidParam = 1015,
    DecodeFailed = 1016,
}

impl ErrorCode {
    const ALL: [ErrorCode; 24] = [
        ErrorCode::NoOutput,
        ErrorCode::LogicError,
        ErrorCode::InvalidConfig,
        ErrorCode::InvalidState,
        ErrorCode::QueueFull,
        ErrorCode::DuplicateId,
        ErrorCode::SpawnFailed,
        ErrorCode::Stopped,
        ErrorCode::InvalidOpName,
        ErrorCode::ResizeNoInput,
        ErrorCode::ResizeInvalidParam,
        ErrorCode::CropNoInput,
        ErrorCode::CropInvalidParam,
        ErrorCode::TransposeNoInput,
        ErrorCode::RotateNoInput,
        ErrorCode::RotateInvalidParam,
        ErrorCode::RandCropInvalidParam,
        ErrorCode::FlipInvalidParam,
        ErrorCode::TransposeInvalidParam,
        ErrorCode::RandCropNoInput,
        ErrorCode::FlipNoInput,
        ErrorCode::DecodeNoInput,
        ErrorCode::DecodeInvalidParam,
        ErrorCode::DecodeFailed,
    ];

    /// Stable integer value of this code.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Maps an integer back to its symbolic kind. `0` is success and has no kind.
    pub fn from_i32(value: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|code| code.as_i32() == value)
    }

    /// Upper-case symbolic name, e.g. `"CROP_INVALID_PARAM"`.
    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::NoOutput => "NO_OUTPUT",
            ErrorCode::LogicError => "LOGIC_ERROR",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::InvalidState => "INVALID_STATE",
            ErrorCode::QueueFull => "QUEUE_FULL",
            ErrorCode::DuplicateId => "DUPLICATE_ID",
            ErrorCode::SpawnFailed => "SPAWN_FAILED",
            ErrorCode::Stopped => "STOPPED",
            ErrorCode::InvalidOpName => "INVALID_OP_NAME",
            ErrorCode::ResizeNoInput => "RESIZE_NO_INPUT",
            ErrorCode::ResizeInvalidParam => "RESIZE_INVALID_PARAM",
            ErrorCode::CropNoInput => "CROP_NO_INPUT",
            ErrorCode::CropInvalidParam => "CROP_INVALID_PARAM",
            ErrorCode::TransposeNoInput => "TRANSPOSE_NO_INPUT",
            ErrorCode::RotateNoInput => "ROTATE_NO_INPUT",
            ErrorCode::RotateInvalidParam => "ROTATE_INVALID_PARAM",
            ErrorCode::RandCropInvalidParam => "RAND_CROP_INVALID_PARAM",
            ErrorCode::FlipInvalidParam => "FLIP_INVALID_PARAM",
            ErrorCode::TransposeInvalidParam => "TRANSPOSE_INVALID_PARAM",
            ErrorCode::RandCropNoInput => "RAND_CROP_NO_INPUT",
            ErrorCode::FlipNoInput => "FLIP_NO_INPUT",
            ErrorCode::DecodeNoInput => "DECODE_NO_INPUT",
            ErrorCode::DecodeInvalidParam => "DECODE_INVALID_PARAM",
            ErrorCode::DecodeFailed => "DECODE_FAILED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.as_i32())
    }
}

/// Error returned by every fallible engine and operation call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct Error {
    code: ErrorCode,
    message: String,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, message)
    }

    pub(crate) fn stopped() -> Self {
        Self::new(ErrorCode::Stopped, "transformer has been stopped")
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Fails with `code` unless `cond` holds. Mirrors `anyhow::ensure!` for coded errors.
macro_rules! ensure_code {
    ($cond:expr, $code:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::Error::new($code, format!($($arg)+)));
        }
    };
}

pub(crate) use ensure_code;
