use crate::error::JpegLsError;
use crate::jpegls::FrameInfo;
use crate::parameters::InterleaveMode;

/// The layout of an uncompressed pixel buffer.
///
/// Samples wider than 8 bits take two little-endian bytes. With
/// `InterleaveMode::None` every component is a plane of `stride * height`
/// bytes, otherwise each line holds whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleBuffer {
    width: usize,
    height: usize,
    component_count: usize,
    bytes_per_sample: usize,
    stride: usize,
    planar: bool,
    output_bgr: bool,
    mask: i32,
}

impl SampleBuffer {
    /// A `bytes_per_line` of 0 selects the tightly packed stride.
    pub fn new(
        frame_info: &FrameInfo,
        interleave_mode: InterleaveMode,
        bytes_per_line: i32,
        output_bgr: bool,
    ) -> Result<Self, JpegLsError> {
        let width = frame_info.width as usize;
        let component_count = frame_info.component_count as usize;
        let bytes_per_sample = ((frame_info.bits_per_sample + 7) / 8) as usize;
        let planar = interleave_mode == InterleaveMode::None;

        let minimum_stride = if planar {
            width * bytes_per_sample
        } else {
            width * bytes_per_sample * component_count
        };
        let stride = match bytes_per_line {
            0 => minimum_stride,
            value if value > 0 && value as usize >= minimum_stride => value as usize,
            _ => return Err(JpegLsError::InvalidArgument),
        };

        Ok(Self {
            width,
            height: frame_info.height as usize,
            component_count,
            bytes_per_sample,
            stride,
            planar,
            output_bgr: output_bgr && !planar && component_count == 3,
            mask: frame_info.maximum_sample_value(),
        })
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Bytes the buffer spans.
    pub fn size(&self) -> usize {
        if self.planar {
            self.stride * self.height * self.component_count
        } else {
            self.stride * self.height
        }
    }

    /// Reads line `y` of the given components into `row` as pixel
    /// interleaved samples.
    pub fn read_line(&self, source: &[u8], y: usize, components: &[usize], row: &mut [i32]) {
        for (x, pixel) in row.chunks_exact_mut(components.len()).enumerate() {
            for (&component, sample) in components.iter().zip(pixel) {
                let offset = self.offset(x, y, component);
                let value = if self.bytes_per_sample == 1 {
                    i32::from(source[offset])
                } else {
                    i32::from(u16::from_le_bytes([source[offset], source[offset + 1]]))
                };
                *sample = value & self.mask;
            }
        }
    }

    /// Writes `row`, pixel interleaved samples of the given components, as
    /// line `y`.
    pub fn write_line(&self, row: &[i32], y: usize, components: &[usize], destination: &mut [u8]) {
        for (x, pixel) in row.chunks_exact(components.len()).enumerate() {
            for (&component, &value) in components.iter().zip(pixel) {
                let offset = self.offset(x, y, component);
                if self.bytes_per_sample == 1 {
                    destination[offset] = value as u8;
                } else {
                    destination[offset..offset + 2].copy_from_slice(&(value as u16).to_le_bytes());
                }
            }
        }
    }

    fn offset(&self, x: usize, y: usize, component: usize) -> usize {
        if self.planar {
            return component * self.stride * self.height + y * self.stride + x * self.bytes_per_sample;
        }

        let component = if self.output_bgr { 2 - component } else { component };
        y * self.stride + (x * self.component_count + component) * self.bytes_per_sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_info(bits_per_sample: i32, component_count: i32) -> FrameInfo {
        FrameInfo {
            width: 2,
            height: 2,
            bits_per_sample,
            component_count,
        }
    }

    fn read_lines(buffer: &SampleBuffer, source: &[u8], components: &[usize]) -> Vec<i32> {
        let mut samples = Vec::new();
        let mut row = vec![0; 2 * components.len()];
        for y in 0..2 {
            buffer.read_line(source, y, components, &mut row);
            samples.extend_from_slice(&row);
        }
        samples
    }

    #[test]
    fn planar_components_are_a_plane_apart() {
        let buffer = SampleBuffer::new(&frame_info(8, 3), InterleaveMode::None, 0, false).unwrap();
        assert_eq!(buffer.size(), 12);
        let source: Vec<u8> = (0..12).collect();
        assert_eq!(read_lines(&buffer, &source, &[1]), vec![4, 5, 6, 7]);
        assert_eq!(read_lines(&buffer, &source, &[0, 2]), vec![0, 8, 1, 9, 2, 10, 3, 11]);
    }

    #[test]
    fn wide_samples_are_little_endian_and_masked() {
        let buffer = SampleBuffer::new(&frame_info(12, 1), InterleaveMode::None, 0, false).unwrap();
        let source = [0x34, 0x12, 0xFF, 0xFF, 0, 0, 1, 0];
        assert_eq!(read_lines(&buffer, &source, &[0]), vec![0x234, 0xFFF, 0, 1]);

        let mut destination = [0u8; 8];
        buffer.write_line(&[0x234, 0xFFF], 0, &[0], &mut destination);
        buffer.write_line(&[0, 1], 1, &[0], &mut destination);
        assert_eq!(destination, [0x34, 0x02, 0xFF, 0x0F, 0, 0, 1, 0]);
    }

    #[test]
    fn bgr_swaps_red_and_blue() {
        let buffer = SampleBuffer::new(&frame_info(8, 3), InterleaveMode::Sample, 0, true).unwrap();
        let source = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        assert_eq!(&read_lines(&buffer, &source, &[0, 1, 2])[..3], &[3, 2, 1]);

        let mut destination = [0u8; 12];
        buffer.write_line(&[3, 2, 1, 6, 5, 4], 1, &[0, 1, 2], &mut destination);
        assert_eq!(&destination[6..], &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn padded_stride() {
        let buffer = SampleBuffer::new(&frame_info(8, 1), InterleaveMode::None, 4, false).unwrap();
        assert_eq!(buffer.size(), 8);
        let source = [1, 2, 0, 0, 3, 4, 0, 0];
        assert_eq!(read_lines(&buffer, &source, &[0]), vec![1, 2, 3, 4]);
        assert_eq!(
            SampleBuffer::new(&frame_info(8, 1), InterleaveMode::None, 1, false),
            Err(JpegLsError::InvalidArgument)
        );
    }
}
