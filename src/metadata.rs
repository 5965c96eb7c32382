//! The image description callers pass to `compress` and get back from
//! `get_metadata_info`.

use crate::constants::{MAXIMUM_BITS_PER_SAMPLE, MAXIMUM_HEIGHT, MAXIMUM_WIDTH, MINIMUM_BITS_PER_SAMPLE};
use crate::error::{CodecError, JpegLsError};
use crate::parameters::{InterleaveMode, JlsParameters};

/// Dimensions and layout of an uncompressed image.
///
/// `bytes_per_line` is a layout hint and takes no part in equality.
#[derive(Debug, Clone, Copy)]
pub struct MetadataInfo {
    pub width: i32,
    pub height: i32,
    pub bits_per_sample: i32,
    pub component_count: i32,
    /// 0 lets the codec compute the stride.
    pub bytes_per_line: i32,
    /// 0 is lossless.
    pub allowed_lossy_error: i32,
    pub interleave_mode: InterleaveMode,
    /// Swaps red and blue of 3 component pixel interleaved data.
    pub output_bgr: bool,
}

impl Default for MetadataInfo {
    fn default() -> Self {
        Self::new(1, 1, 2, 1)
    }
}

impl PartialEq for MetadataInfo {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.component_count == other.component_count
            && self.bits_per_sample == other.bits_per_sample
            && self.allowed_lossy_error == other.allowed_lossy_error
            && self.interleave_mode == other.interleave_mode
            && self.output_bgr == other.output_bgr
    }
}

impl Eq for MetadataInfo {}

impl MetadataInfo {
    pub fn new(width: i32, height: i32, bits_per_sample: i32, component_count: i32) -> Self {
        Self {
            width,
            height,
            bits_per_sample,
            component_count,
            bytes_per_line: 0,
            allowed_lossy_error: 0,
            interleave_mode: InterleaveMode::None,
            output_bgr: false,
        }
    }

    pub fn with_interleave_mode(mut self, interleave_mode: InterleaveMode) -> Self {
        self.interleave_mode = interleave_mode;
        self
    }

    pub fn with_allowed_lossy_error(mut self, allowed_lossy_error: i32) -> Self {
        self.allowed_lossy_error = allowed_lossy_error;
        self
    }

    pub fn with_bytes_per_line(mut self, bytes_per_line: i32) -> Self {
        self.bytes_per_line = bytes_per_line;
        self
    }

    pub fn with_output_bgr(mut self, output_bgr: bool) -> Self {
        self.output_bgr = output_bgr;
        self
    }

    /// Checks the ranges every image must satisfy before it reaches the codec.
    pub fn validate(&self) -> Result<(), CodecError> {
        if !(1..=MAXIMUM_WIDTH).contains(&self.width) {
            return Err(CodecError::parameter(format!(
                "width {} is outside [1, {MAXIMUM_WIDTH}]",
                self.width
            )));
        }
        if !(1..=MAXIMUM_HEIGHT).contains(&self.height) {
            return Err(CodecError::parameter(format!(
                "height {} is outside [1, {MAXIMUM_HEIGHT}]",
                self.height
            )));
        }
        if !(MINIMUM_BITS_PER_SAMPLE..=MAXIMUM_BITS_PER_SAMPLE).contains(&self.bits_per_sample) {
            return Err(CodecError::parameter(format!(
                "bits per sample {} is outside [{MINIMUM_BITS_PER_SAMPLE}, {MAXIMUM_BITS_PER_SAMPLE}]",
                self.bits_per_sample
            )));
        }
        if self.component_count < 1 {
            return Err(CodecError::parameter(format!(
                "component count {} must be at least 1",
                self.component_count
            )));
        }
        Ok(())
    }

    pub fn bytes_per_sample(&self) -> usize {
        ((self.bits_per_sample + 7) / 8) as usize
    }

    /// `width * height * component_count * bytes_per_sample`.
    pub fn uncompressed_size(&self) -> Result<usize, CodecError> {
        let overflow = || {
            CodecError::parameter(format!(
                "{}x{}x{} image with {} bits per sample has no valid buffer size",
                self.width, self.height, self.component_count, self.bits_per_sample
            ))
        };

        let width = usize::try_from(self.width).map_err(|_| overflow())?;
        let height = usize::try_from(self.height).map_err(|_| overflow())?;
        let component_count = usize::try_from(self.component_count).map_err(|_| overflow())?;
        let size = width
            .checked_mul(height)
            .and_then(|size| size.checked_mul(component_count))
            .and_then(|size| size.checked_mul(self.bytes_per_sample()))
            .filter(|&size| size > 0)
            .ok_or_else(overflow)?;
        Ok(size)
    }

    pub fn to_descriptor(&self) -> JlsParameters {
        let mut parameters = JlsParameters::default();
        self.copy_to(&mut parameters);
        parameters
    }

    /// Writes the metadata fields, leaving the JFIF and preset sub-records alone.
    pub fn copy_to(&self, parameters: &mut JlsParameters) {
        parameters.width = self.width;
        parameters.height = self.height;
        parameters.bits_per_sample = self.bits_per_sample;
        parameters.bytes_per_line = self.bytes_per_line;
        parameters.components = self.component_count;
        parameters.allowed_lossy_error = self.allowed_lossy_error;
        parameters.interleave_mode = self.interleave_mode.into();
        parameters.output_bgr = i32::from(self.output_bgr);
    }

    /// Builds the metadata from a descriptor filled in by the header reader.
    pub fn from_descriptor(parameters: &JlsParameters) -> Result<Self, CodecError> {
        let malformed = |message: String| CodecError::MalformedStream {
            code: JpegLsError::InvalidEncodedData.code(),
            message,
        };

        if parameters.width < 1 || parameters.height < 1 {
            return Err(malformed(format!(
                "header announces a {}x{} image",
                parameters.width, parameters.height
            )));
        }
        if parameters.bits_per_sample < MINIMUM_BITS_PER_SAMPLE {
            return Err(malformed(format!(
                "header announces {} bits per sample",
                parameters.bits_per_sample
            )));
        }
        if parameters.components < 1 {
            return Err(malformed(format!(
                "header announces {} components",
                parameters.components
            )));
        }
        let interleave_mode = InterleaveMode::try_from(parameters.interleave_mode)
            .map_err(|_| malformed(format!("unknown interleave mode {}", parameters.interleave_mode)))?;

        Ok(Self {
            width: parameters.width,
            height: parameters.height,
            bits_per_sample: parameters.bits_per_sample,
            component_count: parameters.components,
            bytes_per_line: parameters.bytes_per_line,
            allowed_lossy_error: parameters.allowed_lossy_error,
            interleave_mode,
            output_bgr: parameters.output_bgr(),
        })
    }
}
