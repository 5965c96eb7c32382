//! Safe compress/decompress facade over the native codec.
//!
//! Every operation validates its arguments, makes one native call (two for
//! `compress` when the first output buffer is too small, two for
//! `decompress` to learn the image size first) and turns any non-zero
//! result code into a [`CodecError`] carrying the native code and message.

use log::debug;

use crate::bitmap::Bitmap;
use crate::error::{CodecError, JpegLsError};
use crate::metadata::MetadataInfo;
use crate::native::{NativeCodec, ProcessNative};
use crate::parameters::{JfifParameters, JlsParameters};

/// Sizing of the output buffer `compress` hands to the encoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionPolicy {
    /// Bytes added to the input length for the marker segments.
    pub header_margin: usize,
    /// Growth applied to the input length for the single retry.
    pub growth_factor: f64,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self {
            header_margin: 100,
            growth_factor: 1.5,
        }
    }
}

impl CompressionPolicy {
    pub fn initial_capacity(&self, input_length: usize) -> usize {
        input_length + self.header_margin
    }

    pub fn retry_capacity(&self, input_length: usize) -> usize {
        (input_length as f64 * self.growth_factor).floor() as usize + self.header_margin
    }
}

/// The JPEG-LS codec facade.
#[derive(Debug, Clone, Default)]
pub struct JpegLsCodec<N: NativeCodec = ProcessNative> {
    native: N,
    policy: CompressionPolicy,
}

impl JpegLsCodec<ProcessNative> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<N: NativeCodec> JpegLsCodec<N> {
    pub fn with_native(native: N) -> Self {
        Self {
            native,
            policy: CompressionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CompressionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &CompressionPolicy {
        &self.policy
    }

    /// Compresses all of `pixels`.
    pub fn compress(&self, metadata: &MetadataInfo, pixels: &[u8], jfif_header: bool) -> Result<Vec<u8>, CodecError> {
        self.compress_with_count(metadata, pixels, pixels.len(), jfif_header)
    }

    /// Compresses the first `pixel_count` bytes of `pixels`.
    ///
    /// The output buffer is sized from the whole `pixels` slice: it starts at
    /// `pixels.len() + header_margin` bytes and is grown once when the encoder
    /// runs out of room.
    pub fn compress_with_count(
        &self,
        metadata: &MetadataInfo,
        pixels: &[u8],
        pixel_count: usize,
        jfif_header: bool,
    ) -> Result<Vec<u8>, CodecError> {
        metadata.validate()?;
        let source = pixel_slice(pixels, pixel_count)?;
        let parameters = descriptor(metadata, jfif_header);

        let capacity = self.policy.initial_capacity(pixels.len());
        if let Some(compressed) = self.encode_into_new_buffer(capacity, source, &parameters)? {
            return Ok(compressed);
        }

        let capacity = self.policy.retry_capacity(pixels.len());
        debug!("compressed output exceeded the first buffer, retrying with {capacity} bytes");
        self.encode_into_new_buffer(capacity, source, &parameters)?
            .ok_or(CodecError::CompressionOverflow { capacity })
    }

    /// Compresses into a caller supplied buffer.
    ///
    /// Returns `(false, 0)` when `destination_length` bytes are not enough,
    /// `(true, bytes_written)` otherwise.
    pub fn try_compress(
        &self,
        metadata: &MetadataInfo,
        pixels: &[u8],
        pixel_count: usize,
        jfif_header: bool,
        destination: &mut [u8],
        destination_length: usize,
    ) -> Result<(bool, usize), CodecError> {
        metadata.validate()?;
        let source = pixel_slice(pixels, pixel_count)?;
        if destination_length == 0 || destination_length > destination.len() {
            return Err(CodecError::argument(
                JpegLsError::InvalidArgumentDestination,
                format!(
                    "destination length {destination_length} is outside (0, {}]",
                    destination.len()
                ),
            ));
        }

        let parameters = descriptor(metadata, jfif_header);
        let (code, bytes_written) = self.native.encode(&mut destination[..destination_length], source, &parameters);
        if code == JpegLsError::DestinationBufferTooSmall.code() {
            return Ok((false, 0));
        }
        self.check(code)?;
        Ok((true, bytes_written))
    }

    /// Reads the image description from the stream header.
    pub fn get_metadata_info(&self, source: &[u8]) -> Result<MetadataInfo, CodecError> {
        self.get_metadata_info_with_count(source, source.len())
    }

    /// Reads the image description from the first `count` bytes of `source`.
    pub fn get_metadata_info_with_count(&self, source: &[u8], count: usize) -> Result<MetadataInfo, CodecError> {
        let source = source_slice(source, count)?;
        let (code, parameters) = self.native.read_header(source);
        self.check(code)?;

        let metadata = MetadataInfo::from_descriptor(&parameters)?;
        debug!("header: {metadata:?}");
        Ok(metadata)
    }

    pub fn decompress(&self, source: &[u8]) -> Result<Vec<u8>, CodecError> {
        self.decompress_with_count(source, source.len())
    }

    /// Decodes the first `count` bytes of `source` into a new buffer of
    /// exactly [`MetadataInfo::uncompressed_size`] bytes.
    pub fn decompress_with_count(&self, source: &[u8], count: usize) -> Result<Vec<u8>, CodecError> {
        let metadata = self.get_metadata_info_with_count(source, count)?;
        let mut destination = vec![0u8; metadata.uncompressed_size()?];
        self.decode(&mut destination, &source[..count])?;
        Ok(destination)
    }

    /// Decodes into `destination`, which must be exactly the uncompressed size.
    pub fn decompress_into(&self, source: &[u8], count: usize, destination: &mut [u8]) -> Result<(), CodecError> {
        let metadata = self.get_metadata_info_with_count(source, count)?;
        let expected = metadata.uncompressed_size()?;
        if destination.len() != expected {
            return Err(CodecError::BufferSizeMismatch {
                expected,
                actual: destination.len(),
            });
        }
        self.decode(destination, &source[..count])
    }

    /// Decodes `source` into a displayable bitmap.
    pub fn decode_bitmap(&self, source: &[u8]) -> Result<Bitmap, CodecError> {
        let metadata = self.get_metadata_info(source)?;
        let mut pixels = vec![0u8; metadata.uncompressed_size()?];
        self.decode(&mut pixels, source)?;
        Bitmap::from_decoded(&metadata, pixels)
    }

    fn decode(&self, destination: &mut [u8], source: &[u8]) -> Result<(), CodecError> {
        let code = self.native.decode(destination, source, None);
        self.check(code)
    }

    /// `None` when the native layer reports that `capacity` bytes are not enough.
    fn encode_into_new_buffer(
        &self,
        capacity: usize,
        source: &[u8],
        parameters: &JlsParameters,
    ) -> Result<Option<Vec<u8>>, CodecError> {
        let mut destination = vec![0u8; capacity];
        let (code, bytes_written) = self.native.encode(&mut destination, source, parameters);
        if code == JpegLsError::DestinationBufferTooSmall.code() {
            return Ok(None);
        }
        self.check(code)?;

        destination.truncate(bytes_written);
        debug!("compressed {} bytes into {bytes_written}", source.len());
        Ok(Some(destination))
    }

    fn check(&self, code: i32) -> Result<(), CodecError> {
        JpegLsError::check(code).map_err(|code| CodecError::from_native(code, self.native.error_message(code)))
    }
}

/// The byte size of the decoded image described by `metadata`.
pub fn uncompressed_size(metadata: &MetadataInfo) -> Result<usize, CodecError> {
    metadata.uncompressed_size()
}

fn descriptor(metadata: &MetadataInfo, jfif_header: bool) -> JlsParameters {
    let mut parameters = metadata.to_descriptor();
    if jfif_header {
        parameters.jfif = JfifParameters::version_1_02();
    }
    parameters
}

fn pixel_slice(pixels: &[u8], pixel_count: usize) -> Result<&[u8], CodecError> {
    if pixel_count == 0 || pixel_count > pixels.len() {
        return Err(CodecError::argument(
            JpegLsError::InvalidArgumentSource,
            format!("pixel count {pixel_count} is outside (0, {}]", pixels.len()),
        ));
    }
    Ok(&pixels[..pixel_count])
}

fn source_slice(source: &[u8], count: usize) -> Result<&[u8], CodecError> {
    source.get(..count).ok_or_else(|| {
        CodecError::argument(
            JpegLsError::InvalidArgumentSource,
            format!("count {count} exceeds the {} source bytes", source.len()),
        )
    })
}
