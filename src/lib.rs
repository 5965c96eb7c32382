//! # jpegls-bridge
//!
//! A JPEG-LS (ISO/IEC 14495-1 / ITU-T T.87) codec with a CharLS compatible C
//! ABI and a safe, buffer oriented facade on top of it.
//!
//! ## Layers
//!
//! - [`codec`]: `compress`, `try_compress`, `get_metadata_info` and
//!   `decompress` over `&[u8]` / `Vec<u8>`, errors as [`CodecError`].
//! - [`native`]: the [`NativeCodec`] call surface, with the 32 and 64 bit
//!   flavours of the C entry points and the per-process dispatch.
//! - [`ffi`]: the `extern "C"` entry points (`jpegls_*_x86`, `jpegls_*_x64`,
//!   `charls_get_error_message`).
//! - [`jpegls`]: the encoder and decoder behind the entry points.
//!
//! ## Example
//!
//! ```
//! use jpegls_bridge::{InterleaveMode, MetadataInfo};
//!
//! let metadata = MetadataInfo::new(2, 2, 8, 3).with_interleave_mode(InterleaveMode::Sample);
//! let pixels = [255, 0, 0, 0, 255, 0, 0, 0, 255, 40, 40, 40];
//!
//! let compressed = jpegls_bridge::compress(&metadata, &pixels, false).unwrap();
//! assert_eq!(jpegls_bridge::get_metadata_info(&compressed).unwrap(), metadata);
//! assert_eq!(jpegls_bridge::decompress(&compressed).unwrap(), pixels);
//! ```

pub mod bitmap;
pub mod codec;
pub mod constants;
pub mod error;
pub mod ffi;
pub mod jpeg_marker_code;
pub mod jpeg_stream_reader;
pub mod jpeg_stream_writer;
pub mod jpegls;
pub mod metadata;
pub mod native;
pub mod parameters;

pub use bitmap::{Bitmap, PixelFormat};
pub use codec::{CompressionPolicy, JpegLsCodec, uncompressed_size};
pub use error::{CodecError, FailureKind, JpegLsError, classify};
pub use metadata::MetadataInfo;
pub use native::{NativeCodec, ProcessNative, X64Native, X86Native};
pub use parameters::{InterleaveMode, JfifParameters, JlsParameters, JpeglsPresetCodingParameters};

/// Compresses `pixels` with the default codec.
pub fn compress(metadata: &MetadataInfo, pixels: &[u8], jfif_header: bool) -> Result<Vec<u8>, CodecError> {
    JpegLsCodec::new().compress(metadata, pixels, jfif_header)
}

/// Compresses into `destination` with the default codec; `Ok((false, 0))`
/// when it is too small.
pub fn try_compress(
    metadata: &MetadataInfo,
    pixels: &[u8],
    pixel_count: usize,
    jfif_header: bool,
    destination: &mut [u8],
    destination_length: usize,
) -> Result<(bool, usize), CodecError> {
    JpegLsCodec::new().try_compress(
        metadata,
        pixels,
        pixel_count,
        jfif_header,
        destination,
        destination_length,
    )
}

/// Reads the image description of a JPEG-LS stream with the default codec.
pub fn get_metadata_info(source: &[u8]) -> Result<MetadataInfo, CodecError> {
    JpegLsCodec::new().get_metadata_info(source)
}

/// Decodes a JPEG-LS stream with the default codec.
pub fn decompress(source: &[u8]) -> Result<Vec<u8>, CodecError> {
    JpegLsCodec::new().decompress(source)
}
