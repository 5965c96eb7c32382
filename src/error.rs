//! Result codes of the native codec and the errors the safe facade raises.
//!
//! The native layer reports failures as plain `i32` result codes (the CharLS
//! `jpegls_errc` values). [`classify`] folds every code into one of three
//! [`FailureKind`]s and [`CodecError`] carries the code, the kind and the
//! message from the native message table up to the caller.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

/// Native result codes, numbered as in the CharLS C API.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum JpegLsError {
    #[error("Success")]
    None = 0,
    #[error("Invalid argument")]
    InvalidArgument = 1,
    #[error("The parameter value is not supported")]
    ParameterValueNotSupported = 2,
    #[error("The destination buffer is too small to hold all the output")]
    DestinationBufferTooSmall = 3,
    #[error("The source buffer is too small, more input data was expected")]
    SourceBufferTooSmall = 4,
    #[error("Invalid encoded data")]
    InvalidEncodedData = 5,
    #[error("Too much encoded data: the decoding process is ready but the input buffer still contains encoded data")]
    TooMuchEncodedData = 6,
    #[error("The bit depth for the color transformation is not supported")]
    BitDepthForTransformNotSupported = 8,
    #[error("The color transformation is not supported")]
    ColorTransformNotSupported = 9,
    #[error("Encoded frame is not encoded with the JPEG-LS algorithm")]
    EncodingNotSupported = 10,
    #[error("Unknown JPEG marker found")]
    UnknownJpegMarkerFound = 11,
    #[error("JPEG marker start byte (0xFF) not found")]
    JpegMarkerStartByteNotFound = 12,
    #[error("Unexpected failure")]
    UnexpectedFailure = 14,
    #[error("Start of image (SOI) marker not found")]
    StartOfImageMarkerNotFound = 15,
    #[error("Start of frame (SOF) marker not found before the start of scan (SOS) marker")]
    StartOfFrameMarkerNotFound = 16,
    #[error("Invalid marker segment size")]
    InvalidMarkerSegmentSize = 17,
    #[error("Duplicate start of image (SOI) marker")]
    DuplicateStartOfImageMarker = 18,
    #[error("Duplicate start of frame (SOF) marker")]
    DuplicateStartOfFrameMarker = 19,
    #[error("Unexpected end of image (EOI) marker")]
    UnexpectedEndOfImageMarker = 20,
    #[error("Invalid JPEG-LS preset parameter type")]
    InvalidJpeglsPresetParameterType = 21,
    #[error("Unsupported JPEG-LS preset extended parameter type")]
    JpeglsPresetExtendedParameterTypeNotSupported = 22,

    // Caller supplied arguments
    #[error("The width argument is outside the range [1, 65535]")]
    InvalidArgumentWidth = 100,
    #[error("The height argument is outside the range [1, 65535]")]
    InvalidArgumentHeight = 101,
    #[error("The component count argument is outside the range [1, 255]")]
    InvalidArgumentComponentCount = 102,
    #[error("The bits per sample argument is outside the range [2, 16]")]
    InvalidArgumentBitsPerSample = 103,
    #[error("The interleave mode is invalid or not supported for the component count")]
    InvalidArgumentInterleaveMode = 104,
    #[error("The destination buffer is not set")]
    InvalidArgumentDestination = 105,
    #[error("The source buffer is not set or too small")]
    InvalidArgumentSource = 106,
    #[error("The thumbnail arguments and dimensions don't match")]
    InvalidArgumentThumbnail = 107,

    // Values read from the encoded stream
    #[error("The width parameter is defined more than once in an incompatible way")]
    InvalidParameterWidth = 200,
    #[error("The height parameter is defined more than once in an incompatible way")]
    InvalidParameterHeight = 201,
    #[error("The stream contains a component count outside the range [1, 255]")]
    InvalidParameterComponentCount = 202,
    #[error("The stream contains a bits per sample value outside the range [2, 16]")]
    InvalidParameterBitsPerSample = 203,
    #[error("The stream contains an interleave mode outside the range [0, 2]")]
    InvalidParameterInterleaveMode = 204,
}

impl JpegLsError {
    pub fn code(self) -> i32 {
        self.into()
    }

    /// Converts a native return value into a `Result`.
    pub fn check(code: i32) -> Result<(), i32> {
        if code == JpegLsError::None as i32 {
            Ok(())
        } else {
            Err(code)
        }
    }
}

/// The three failure categories a native result code can fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The compressed input is structurally invalid; retrying won't help.
    MalformedStream,
    /// A caller supplied argument or buffer violates a precondition.
    InvalidArgument,
    /// The native layer failed in a way it could not describe further.
    UnexpectedFailure,
}

/// Maps a native result code to its failure category.
///
/// Codes the table doesn't know are treated as [`FailureKind::UnexpectedFailure`]
/// and logged with their raw value. `None` (success) is not a failure and also
/// lands there, so callers must check for success before classifying.
pub fn classify(code: i32) -> FailureKind {
    let Ok(error) = JpegLsError::try_from(code) else {
        log::warn!("unrecognized native result code {code}");
        return FailureKind::UnexpectedFailure;
    };

    use JpegLsError::*;
    match error {
        TooMuchEncodedData
        | ParameterValueNotSupported
        | InvalidEncodedData
        | SourceBufferTooSmall
        | BitDepthForTransformNotSupported
        | ColorTransformNotSupported
        | EncodingNotSupported
        | UnknownJpegMarkerFound
        | JpegMarkerStartByteNotFound
        | StartOfImageMarkerNotFound
        | StartOfFrameMarkerNotFound
        | InvalidMarkerSegmentSize
        | DuplicateStartOfImageMarker
        | DuplicateStartOfFrameMarker
        | UnexpectedEndOfImageMarker
        | InvalidJpeglsPresetParameterType
        | JpeglsPresetExtendedParameterTypeNotSupported
        | InvalidParameterWidth
        | InvalidParameterHeight
        | InvalidParameterComponentCount
        | InvalidParameterBitsPerSample
        | InvalidParameterInterleaveMode => FailureKind::MalformedStream,

        InvalidArgument
        | DestinationBufferTooSmall
        | InvalidArgumentWidth
        | InvalidArgumentHeight
        | InvalidArgumentComponentCount
        | InvalidArgumentBitsPerSample
        | InvalidArgumentInterleaveMode
        | InvalidArgumentDestination
        | InvalidArgumentSource
        | InvalidArgumentThumbnail => FailureKind::InvalidArgument,

        UnexpectedFailure => FailureKind::UnexpectedFailure,

        JpegLsError::None => {
            log::warn!("success code passed to the failure classifier");
            FailureKind::UnexpectedFailure
        }
    }
}

/// Errors raised by the safe compress/decompress API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The metadata supplied by the caller breaks one of its invariants.
    #[error("invalid image metadata: {message}")]
    InvalidParameter { message: String },

    #[error("malformed JPEG-LS stream: {message} (code {code})")]
    MalformedStream { code: i32, message: String },

    #[error("invalid argument: {message} (code {code})")]
    InvalidArgument { code: i32, message: String },

    #[error("unexpected codec failure: {message} (code {code})")]
    UnexpectedFailure { code: i32, message: String },

    /// Both encode attempts ran out of room; `capacity` is the size of the
    /// larger, second buffer.
    #[error("compression failed: compressed output larger than {capacity} bytes")]
    CompressionOverflow { capacity: usize },

    #[error("destination buffer has {actual} bytes, the decoded image needs {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },
}

impl CodecError {
    /// Builds the error for a failed native call.
    pub fn from_native(code: i32, message: impl Into<String>) -> Self {
        let message = message.into();
        match classify(code) {
            FailureKind::MalformedStream => CodecError::MalformedStream { code, message },
            FailureKind::InvalidArgument => CodecError::InvalidArgument { code, message },
            FailureKind::UnexpectedFailure => {
                log::warn!("native codec failed with code {code}: {message}");
                CodecError::UnexpectedFailure { code, message }
            }
        }
    }

    /// Builds an argument error that originates in the adapter itself.
    pub(crate) fn argument(code: JpegLsError, message: impl Into<String>) -> Self {
        CodecError::InvalidArgument {
            code: code.code(),
            message: message.into(),
        }
    }

    pub(crate) fn parameter(message: impl Into<String>) -> Self {
        CodecError::InvalidParameter {
            message: message.into(),
        }
    }

    /// The native result code behind this error.
    ///
    /// Errors raised by the adapter before any native call report the native
    /// code that describes the same condition.
    pub fn code(&self) -> i32 {
        match self {
            CodecError::InvalidParameter { .. } => JpegLsError::InvalidArgument.code(),
            CodecError::MalformedStream { code, .. }
            | CodecError::InvalidArgument { code, .. }
            | CodecError::UnexpectedFailure { code, .. } => *code,
            CodecError::CompressionOverflow { .. } => JpegLsError::DestinationBufferTooSmall.code(),
            CodecError::BufferSizeMismatch { .. } => JpegLsError::InvalidArgumentDestination.code(),
        }
    }

    /// The failure category, for callers that branch on it.
    pub fn kind(&self) -> FailureKind {
        match self {
            CodecError::MalformedStream { .. } => FailureKind::MalformedStream,
            CodecError::UnexpectedFailure { .. } => FailureKind::UnexpectedFailure,
            CodecError::InvalidParameter { .. }
            | CodecError::InvalidArgument { .. }
            | CodecError::CompressionOverflow { .. }
            | CodecError::BufferSizeMismatch { .. } => FailureKind::InvalidArgument,
        }
    }

    /// The typed result code, when the raw code is a known one.
    pub fn native_error(&self) -> Option<JpegLsError> {
        JpegLsError::try_from(self.code()).ok()
    }
}
