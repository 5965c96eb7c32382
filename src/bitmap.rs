//! Conversion of decoded pixel buffers into displayable bitmaps.

use crate::error::{CodecError, JpegLsError};
use crate::metadata::MetadataInfo;
use crate::parameters::InterleaveMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8 bit grayscale.
    Gray8,
    /// 8 bit red, green and blue, pixel interleaved.
    Rgb24,
    /// 16 bit little-endian grayscale.
    Gray16,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb24 => 3,
            PixelFormat::Gray16 => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: usize,
    pub height: usize,
    pub stride: usize,
    pub format: PixelFormat,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    /// Wraps a buffer produced by `decompress` for the image `metadata`
    /// describes. Planar RGB data is interleaved first.
    pub fn from_decoded(metadata: &MetadataInfo, pixels: Vec<u8>) -> Result<Self, CodecError> {
        let format = match (metadata.component_count, metadata.bits_per_sample) {
            (1, 2..=8) => PixelFormat::Gray8,
            (3, 2..=8) => PixelFormat::Rgb24,
            (1, 9..=16) => PixelFormat::Gray16,
            (components, bits) => {
                return Err(CodecError::argument(
                    JpegLsError::ParameterValueNotSupported,
                    format!("no bitmap format for {components} component(s) of {bits} bits"),
                ));
            }
        };

        let expected = metadata.uncompressed_size()?;
        if pixels.len() != expected {
            return Err(CodecError::BufferSizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }

        let width = metadata.width as usize;
        let height = metadata.height as usize;
        let pixels = if format == PixelFormat::Rgb24 && metadata.interleave_mode == InterleaveMode::None {
            interleave_planes(&pixels, width * height)
        } else {
            pixels
        };

        Ok(Self {
            width,
            height,
            stride: width * format.bytes_per_pixel(),
            format,
            pixels,
        })
    }

    /// The bitmap as a binary PGM (P5) or PPM (P6) image.
    pub fn to_pnm(&self) -> Vec<u8> {
        let (magic, maximum_value) = match self.format {
            PixelFormat::Gray8 => ("P5", 255),
            PixelFormat::Rgb24 => ("P6", 255),
            PixelFormat::Gray16 => ("P5", 65535),
        };

        let mut output = format!("{magic}\n{} {}\n{maximum_value}\n", self.width, self.height).into_bytes();
        match self.format {
            // PNM stores 16 bit samples most significant byte first.
            PixelFormat::Gray16 => {
                for sample in self.pixels.chunks_exact(2) {
                    output.extend_from_slice(&[sample[1], sample[0]]);
                }
            }
            _ => output.extend_from_slice(&self.pixels),
        }
        output
    }
}

fn interleave_planes(planes: &[u8], plane_size: usize) -> Vec<u8> {
    let (red, rest) = planes.split_at(plane_size);
    let (green, blue) = rest.split_at(plane_size);
    red.iter()
        .zip(green)
        .zip(blue)
        .flat_map(|((&r, &g), &b)| [r, g, b])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planar_rgb_is_interleaved() {
        let metadata = MetadataInfo::new(2, 1, 8, 3);
        let bitmap = Bitmap::from_decoded(&metadata, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(bitmap.format, PixelFormat::Rgb24);
        assert_eq!(bitmap.stride, 6);
        assert_eq!(bitmap.pixels, vec![1, 3, 5, 2, 4, 6]);
    }

    #[test]
    fn interleaved_rgb_is_kept() {
        let metadata = MetadataInfo::new(2, 1, 8, 3).with_interleave_mode(InterleaveMode::Line);
        let bitmap = Bitmap::from_decoded(&metadata, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(bitmap.pixels, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn formats() {
        let gray = Bitmap::from_decoded(&MetadataInfo::new(2, 2, 8, 1), vec![0; 4]).unwrap();
        assert_eq!(gray.format, PixelFormat::Gray8);

        let wide = Bitmap::from_decoded(&MetadataInfo::new(2, 2, 12, 1), vec![0; 8]).unwrap();
        assert_eq!((wide.format, wide.stride), (PixelFormat::Gray16, 4));

        let error = Bitmap::from_decoded(&MetadataInfo::new(2, 2, 8, 4), vec![0; 16]).unwrap_err();
        assert_eq!(error.code(), JpegLsError::ParameterValueNotSupported.code());

        let error = Bitmap::from_decoded(&MetadataInfo::new(2, 2, 8, 1), vec![0; 3]).unwrap_err();
        assert!(matches!(error, CodecError::BufferSizeMismatch { expected: 4, actual: 3 }));
    }

    #[test]
    fn pnm_output() {
        let bitmap = Bitmap::from_decoded(&MetadataInfo::new(1, 1, 16, 1), vec![0x34, 0x12]).unwrap();
        assert_eq!(bitmap.to_pnm(), b"P5\n1 1\n65535\n\x12\x34".to_vec());
    }
}
