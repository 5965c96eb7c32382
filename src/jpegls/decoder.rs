use log::debug;

use crate::error::JpegLsError;
use crate::jpeg_stream_reader::JpegStreamReader;
use crate::jpegls::sample_buffer::SampleBuffer;
use crate::jpegls::scan_decoder::ScanDecoder;
use crate::jpegls::{CodingParameters, FrameInfo};
use crate::parameters::{InterleaveMode, JlsParameters, JpeglsPresetCodingParameters};

/// Reads a JPEG-LS stream and decodes its scans into a pixel buffer.
pub struct JpeglsDecoder<'a> {
    reader: JpegStreamReader<'a>,
    header_read: bool,
}

impl<'a> JpeglsDecoder<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            reader: JpegStreamReader::new(source),
            header_read: false,
        }
    }

    /// Reads the header segments up to and including the first SOS.
    pub fn read_header(&mut self) -> Result<(), JpegLsError> {
        if !self.header_read {
            self.reader.read_header()?;
            self.header_read = true;
        }
        Ok(())
    }

    pub fn frame_info(&self) -> Result<FrameInfo, JpegLsError> {
        self.reader.frame_info()
    }

    /// The LSE values as read, all zero when the stream uses the defaults.
    pub fn preset_coding_parameters(&self) -> JpeglsPresetCodingParameters {
        self.reader.preset_coding_parameters()
    }

    pub fn near_lossless(&self) -> i32 {
        self.reader.scan_header().near_lossless
    }

    pub fn interleave_mode(&self) -> InterleaveMode {
        self.reader.scan_header().interleave_mode
    }

    /// The header as a parameter descriptor, `bytes_per_line` set to the
    /// packed stride.
    pub fn parameters(&self) -> Result<JlsParameters, JpegLsError> {
        let frame_info = self.frame_info()?;
        let interleave_mode = self.interleave_mode();
        let buffer = SampleBuffer::new(&frame_info, interleave_mode, 0, false)?;

        Ok(JlsParameters {
            width: frame_info.width as i32,
            height: frame_info.height as i32,
            bits_per_sample: frame_info.bits_per_sample,
            bytes_per_line: buffer.stride() as i32,
            components: frame_info.component_count,
            allowed_lossy_error: self.near_lossless(),
            interleave_mode: interleave_mode.into(),
            custom: self.preset_coding_parameters(),
            jfif: self.reader.jfif(),
            ..Default::default()
        })
    }

    /// Decodes all scans into `destination`. Only `bytes_per_line` and
    /// `output_bgr` of `parameters` are used.
    pub fn decode(&mut self, destination: &mut [u8], parameters: Option<&JlsParameters>) -> Result<(), JpegLsError> {
        self.read_header()?;

        let frame_info = self.frame_info()?;
        let (bytes_per_line, output_bgr) =
            parameters.map_or((0, false), |parameters| (parameters.bytes_per_line, parameters.output_bgr()));
        let buffer = SampleBuffer::new(&frame_info, self.interleave_mode(), bytes_per_line, output_bgr)?;
        if destination.len() < buffer.size() {
            return Err(JpegLsError::DestinationBufferTooSmall);
        }

        let mut decoded = vec![false; frame_info.component_count as usize];
        loop {
            let scan_header = self.reader.scan_header().clone();
            let components = &scan_header.components;
            if components.iter().any(|&component| decoded[component]) {
                return Err(JpegLsError::InvalidEncodedData);
            }

            let interleave_mode = if components.len() == 1 {
                InterleaveMode::None
            } else {
                scan_header.interleave_mode
            };
            let coding_parameters = CodingParameters {
                near_lossless: scan_header.near_lossless,
                restart_interval: self.reader.restart_interval(),
                interleave_mode,
            };

            let bytes_read = ScanDecoder::new(
                frame_info,
                components.len(),
                self.reader.validated_preset_coding_parameters()?,
                coding_parameters,
                self.reader.remaining_data(),
            )
            .decode_scan(|line, row| buffer.write_line(row, line, components, destination))?;
            self.reader.advance(bytes_read);
            debug!("decoded scan of components {components:?} from {bytes_read} bytes");

            for &component in components {
                decoded[component] = true;
            }

            if decoded.iter().all(|&done| done) {
                break;
            }
            self.reader.read_next_start_of_scan()?;
        }

        self.reader.read_end_of_image()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpegls::JpeglsEncoder;

    fn encode(source: &[u8], parameters: &JlsParameters) -> Vec<u8> {
        let mut destination = vec![0u8; source.len() * 2 + 256];
        let length = JpeglsEncoder::new(&mut destination).encode(source, parameters).unwrap();
        destination.truncate(length);
        destination
    }

    fn rgb(width: i32, height: i32, interleave_mode: InterleaveMode) -> JlsParameters {
        JlsParameters {
            width,
            height,
            bits_per_sample: 8,
            components: 3,
            interleave_mode: interleave_mode.into(),
            ..Default::default()
        }
    }

    #[test]
    fn header_as_parameters() {
        let encoded = encode(&[0; 48], &rgb(4, 4, InterleaveMode::Line));
        let mut decoder = JpeglsDecoder::new(&encoded);
        decoder.read_header().unwrap();
        let parameters = decoder.parameters().unwrap();
        assert_eq!((parameters.width, parameters.height, parameters.components), (4, 4, 3));
        assert_eq!(parameters.interleave_mode, 1);
        assert_eq!(parameters.bytes_per_line, 12);
        assert_eq!(parameters.custom, JpeglsPresetCodingParameters::default());
    }

    #[test]
    fn bgr_output() {
        let source = [10, 20, 30, 40, 50, 60];
        let encoded = encode(&source, &rgb(2, 1, InterleaveMode::Sample));
        let mut decoder = JpeglsDecoder::new(&encoded);
        let parameters = JlsParameters {
            output_bgr: 1,
            ..Default::default()
        };
        let mut decoded = [0u8; 6];
        decoder.decode(&mut decoded, Some(&parameters)).unwrap();
        assert_eq!(decoded, [30, 20, 10, 60, 50, 40]);
    }

    #[test]
    fn destination_too_small() {
        let encoded = encode(&[0; 48], &rgb(4, 4, InterleaveMode::None));
        let mut decoded = [0u8; 47];
        assert_eq!(
            JpeglsDecoder::new(&encoded).decode(&mut decoded, None),
            Err(JpegLsError::DestinationBufferTooSmall)
        );
    }

    #[test]
    fn truncated_scan_data() {
        let source: Vec<u8> = (0..64u8).map(|i| i.wrapping_mul(37)).collect();
        let parameters = JlsParameters {
            width: 8,
            height: 8,
            bits_per_sample: 8,
            components: 1,
            ..Default::default()
        };
        let encoded = encode(&source, &parameters);
        let mut decoded = [0u8; 64];
        let result = JpeglsDecoder::new(&encoded[..encoded.len() - 10]).decode(&mut decoded, None);
        assert!(result.is_err());
    }

    #[test]
    fn missing_end_of_image() {
        let parameters = JlsParameters {
            width: 2,
            height: 2,
            bits_per_sample: 8,
            components: 1,
            ..Default::default()
        };
        let encoded = encode(&[1, 2, 3, 4], &parameters);
        let mut decoded = [0u8; 4];
        assert_eq!(
            JpeglsDecoder::new(&encoded[..encoded.len() - 2]).decode(&mut decoded, None),
            Err(JpegLsError::SourceBufferTooSmall)
        );
    }

    #[test]
    fn lines_are_stored_while_the_scan_is_decoded() {
        let source: Vec<u8> = (0..32u8).map(|i| i.wrapping_mul(29)).collect();
        let parameters = JlsParameters {
            width: 8,
            height: 4,
            bits_per_sample: 8,
            components: 1,
            ..Default::default()
        };
        let mut encoded = encode(&source, &parameters);

        // Claim 64 lines in SOF55; the scan only holds four.
        let sof = encoded.windows(2).position(|marker| marker == [0xFF, 0xF7]).unwrap();
        encoded[sof + 5..sof + 7].copy_from_slice(&64u16.to_be_bytes());

        let mut decoded = vec![0u8; 8 * 64];
        let result = JpeglsDecoder::new(&encoded).decode(&mut decoded, None);
        assert!(result.is_err());
        assert_eq!(&decoded[..32], &source[..]);
    }
}
