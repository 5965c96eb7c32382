//! The flat parameter record exchanged with the native entry points.
//!
//! [`JlsParameters`] mirrors the CharLS `JlsParameters` C struct field for
//! field. It is only ever used at the native boundary; application code works
//! with [`MetadataInfo`](crate::metadata::MetadataInfo).

use std::ffi::c_void;
use std::ptr;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::JpegLsError;

/// Interleave mode for multi-component images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum InterleaveMode {
    /// Component planar: every component is stored (and encoded) separately.
    #[default]
    None = 0,
    /// Interleaved by line.
    Line = 1,
    /// Interleaved by sample.
    Sample = 2,
}

impl std::convert::TryFrom<u8> for InterleaveMode {
    type Error = JpegLsError;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        InterleaveMode::try_from(v as i32).map_err(|_| JpegLsError::InvalidParameterInterleaveMode)
    }
}

/// JPEG-LS preset coding parameters (ISO/IEC 14495-1, C.2.4.1.1).
///
/// All zero means "use the defaults for the bit depth and NEAR value".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct JpeglsPresetCodingParameters {
    pub maximum_sample_value: i32,
    pub threshold1: i32,
    pub threshold2: i32,
    pub threshold3: i32,
    pub reset_value: i32,
}

/// Optional JFIF APP0 header. A `version` of 0 means no header is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct JfifParameters {
    pub version: i32,
    pub units: i32,
    pub density_x: i32,
    pub density_y: i32,
    pub thumbnail_x: i32,
    pub thumbnail_y: i32,
    /// 24 bit RGB thumbnail of `thumbnail_x * thumbnail_y` pixels, or null.
    pub thumbnail: *mut c_void,
}

impl Default for JfifParameters {
    fn default() -> Self {
        Self {
            version: 0,
            units: 0,
            density_x: 0,
            density_y: 0,
            thumbnail_x: 0,
            thumbnail_y: 0,
            thumbnail: ptr::null_mut(),
        }
    }
}

impl JfifParameters {
    /// JFIF 1.02 without units and with a 1:1 pixel aspect ratio.
    pub fn version_1_02() -> Self {
        Self {
            version: (1 << 8) + 2,
            units: 0,
            density_x: 1,
            density_y: 1,
            ..Self::default()
        }
    }

    pub fn is_present(&self) -> bool {
        self.version != 0
    }
}

/// Image and codec parameters in the native struct layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct JlsParameters {
    pub width: i32,
    pub height: i32,
    pub bits_per_sample: i32,
    /// Stride of the uncompressed buffer; 0 lets the codec compute it.
    pub bytes_per_line: i32,
    pub components: i32,
    pub allowed_lossy_error: i32,
    pub interleave_mode: i32,
    pub color_transform: i32,
    /// Non-zero swaps red and blue of 3 component pixel-interleaved buffers.
    pub output_bgr: i32,
    pub custom: JpeglsPresetCodingParameters,
    pub jfif: JfifParameters,
}

impl JlsParameters {
    pub fn interleave_mode(&self) -> Result<InterleaveMode, JpegLsError> {
        InterleaveMode::try_from(self.interleave_mode)
            .map_err(|_| JpegLsError::InvalidArgumentInterleaveMode)
    }

    pub fn output_bgr(&self) -> bool {
        self.output_bgr != 0
    }

    /// Bytes needed to store one sample.
    pub fn bytes_per_sample(&self) -> usize {
        ((self.bits_per_sample + 7) / 8) as usize
    }

    /// The stride of one line of the uncompressed buffer.
    ///
    /// Planar (`InterleaveMode::None`) lines hold one component, interleaved
    /// lines hold all of them.
    pub fn stride(&self, interleave_mode: InterleaveMode) -> usize {
        if self.bytes_per_line > 0 {
            return self.bytes_per_line as usize;
        }

        let stride = self.width as usize * self.bytes_per_sample();
        if interleave_mode == InterleaveMode::None {
            stride
        } else {
            stride * self.components as usize
        }
    }
}
