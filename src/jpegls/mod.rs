//! JPEG-LS codec (ISO/IEC 14495-1 / ITU-T T.87)
//!
//! This is the codec the `ffi` entry points expose. It covers the baseline
//! JPEG-LS process as used by CharLS:
//!
//! | Image Type | Encoding | Decoding |
//! |------------|----------|----------|
//! | 2..=16 bit, 1..=255 components, planar | ✅ | ✅ |
//! | 3/4 components, line interleaved | ✅ | ✅ |
//! | 3/4 components, sample interleaved | ✅ | ✅ |
//! | Near-lossless (NEAR > 0) | ✅ | ✅ |
//! | Custom preset coding parameters (LSE type 1) | ✅ | ✅ |
//! | Restart intervals (DRI/RSTm) | ✅ | ✅ |
//!
//! Not supported: mapping tables (LSE types 2..4), JPEG-LS part 2 extensions
//! and the HP color transformations.
//!
//! ## Layout
//!
//! - `JpeglsEncoder` / `JpeglsDecoder` validate parameters, move samples
//!   between the caller's byte buffer and per-scan sample arrays and drive the
//!   marker segments through `JpegStreamWriter` / `JpegStreamReader`.
//! - `ScanEncoder` / `ScanDecoder` implement the context modeling, the
//!   regular and run mode and the bit level (de)stuffing for one scan.

pub mod coding_parameters;
pub mod decoder;
pub mod encoder;
pub mod golomb_lut;
pub mod regular_mode_context;
pub mod run_mode_context;
pub mod sample_buffer;
pub mod scan_decoder;
pub mod scan_encoder;
pub mod traits;

pub use coding_parameters::CodingParameters;
pub use decoder::JpeglsDecoder;
pub use encoder::JpeglsEncoder;

/// Image dimensions as stored in the SOF55 segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: i32,
    pub component_count: i32,
}

impl FrameInfo {
    pub fn maximum_sample_value(&self) -> i32 {
        (1 << self.bits_per_sample) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{InterleaveMode, JlsParameters, JpeglsPresetCodingParameters};

    fn parameters(
        width: i32,
        height: i32,
        bits_per_sample: i32,
        components: i32,
        interleave_mode: InterleaveMode,
    ) -> JlsParameters {
        JlsParameters {
            width,
            height,
            bits_per_sample,
            components,
            interleave_mode: interleave_mode as i32,
            ..Default::default()
        }
    }

    fn pseudo_random_samples(count: usize, bits_per_sample: i32, seed: u32) -> Vec<u8> {
        // Smooth gradient plus noise so both regular and run mode get exercised.
        let maximum = (1u32 << bits_per_sample) - 1;
        let mut state = seed;
        let mut samples = Vec::with_capacity(count * 2);
        for i in 0..count {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let noise = (state >> 16) % 5;
            let value = if (i / 7) % 3 == 0 { 0 } else { ((i as u32 / 3) + noise) & maximum };
            if bits_per_sample > 8 {
                samples.extend_from_slice(&(value as u16).to_le_bytes());
            } else {
                samples.push(value as u8);
            }
        }
        samples
    }

    fn round_trip(parameters: &JlsParameters, source: &[u8]) -> Vec<u8> {
        let mut encoded = vec![0u8; source.len() * 2 + 1024];
        let length = JpeglsEncoder::new(&mut encoded)
            .encode(source, parameters)
            .unwrap();

        let mut decoder = JpeglsDecoder::new(&encoded[..length]);
        decoder.read_header().unwrap();
        let mut decoded = vec![0u8; source.len()];
        decoder.decode(&mut decoded, None).unwrap();
        decoded
    }

    #[test]
    fn lossless_round_trip_for_every_bit_depth() {
        for bits_per_sample in 2..=16 {
            let parameters = parameters(37, 19, bits_per_sample, 1, InterleaveMode::None);
            let source = pseudo_random_samples(37 * 19, bits_per_sample, bits_per_sample as u32);
            assert_eq!(round_trip(&parameters, &source), source, "bits {bits_per_sample}");
        }
    }

    #[test]
    fn lossless_round_trip_for_every_interleave_mode() {
        for interleave_mode in [InterleaveMode::None, InterleaveMode::Line, InterleaveMode::Sample] {
            for components in [3, 4] {
                let parameters = parameters(31, 17, 8, components, interleave_mode);
                let source = pseudo_random_samples(31 * 17 * components as usize, 8, 7);
                assert_eq!(round_trip(&parameters, &source), source, "{interleave_mode:?}/{components}");
            }
        }
    }

    #[test]
    fn near_lossless_stays_within_bound() {
        for near in [1, 3, 10] {
            let mut parameters = parameters(40, 20, 8, 3, InterleaveMode::Sample);
            parameters.allowed_lossy_error = near;
            let source = pseudo_random_samples(40 * 20 * 3, 8, 99);
            let decoded = round_trip(&parameters, &source);
            for (a, b) in source.iter().zip(&decoded) {
                assert!((*a as i32 - *b as i32).abs() <= near);
            }
        }
    }

    #[test]
    fn custom_preset_and_restart_interval_round_trip() {
        let mut parameters = parameters(25, 30, 12, 1, InterleaveMode::None);
        parameters.custom = JpeglsPresetCodingParameters {
            maximum_sample_value: 4095,
            threshold1: 10,
            threshold2: 40,
            threshold3: 100,
            reset_value: 32,
        };
        let source = pseudo_random_samples(25 * 30, 12, 3);

        let mut encoded = vec![0u8; 4096];
        let mut encoder = JpeglsEncoder::new(&mut encoded);
        encoder.set_restart_interval(4);
        let length = encoder.encode(&source, &parameters).unwrap();

        let mut decoder = JpeglsDecoder::new(&encoded[..length]);
        decoder.read_header().unwrap();
        assert_eq!(decoder.preset_coding_parameters(), parameters.custom);
        let mut decoded = vec![0u8; source.len()];
        decoder.decode(&mut decoded, None).unwrap();
        assert_eq!(decoded, source);
    }
}
