use crate::constants::{J, REGULAR_MODE_CONTEXT_COUNT};
use crate::error::JpegLsError;
use crate::jpeg_marker_code::{JPEG_MARKER_START_BYTE, JPEG_RESTART_MARKER_BASE, JPEG_RESTART_MARKER_RANGE};
use crate::jpegls::coding_parameters::{CodingParameters, ScanLayout};
use crate::jpegls::regular_mode_context::RegularModeContext;
use crate::jpegls::run_mode_context::RunModeContext;
use crate::jpegls::traits::{
    Traits, apply_sign, bit_wise_sign, compute_context_id, compute_predicted_value, map_error_value,
    quantize_gradient, sign,
};
use crate::jpegls::FrameInfo;
use crate::parameters::JpeglsPresetCodingParameters;

/// Encodes the samples of one scan into entropy coded segment bytes.
pub struct ScanEncoder<'a> {
    layout: ScanLayout,
    traits: Traits,
    pc_parameters: JpeglsPresetCodingParameters,
    coding_parameters: CodingParameters,
    destination: &'a mut [u8],
    position: usize,
    bit_buffer: u32,
    free_bit_count: i32,
    is_ff_written: bool,

    regular_mode_contexts: Vec<RegularModeContext>,
    run_mode_contexts: [RunModeContext; 2],
    run_index: usize,
    restart_interval_counter: u8,
}

impl<'a> ScanEncoder<'a> {
    /// `pc_parameters` must be validated: no zero fields.
    pub fn new(
        frame_info: FrameInfo,
        component_count: usize,
        pc_parameters: JpeglsPresetCodingParameters,
        coding_parameters: CodingParameters,
        destination: &'a mut [u8],
    ) -> Self {
        let traits = Traits::new(
            pc_parameters.maximum_sample_value,
            coding_parameters.near_lossless,
            pc_parameters.reset_value,
        );

        Self {
            layout: ScanLayout::new(&frame_info, component_count, coding_parameters.interleave_mode),
            traits,
            pc_parameters,
            coding_parameters,
            destination,
            position: 0,
            bit_buffer: 0,
            free_bit_count: 32,
            is_ff_written: false,
            regular_mode_contexts: vec![RegularModeContext::new(traits.range); REGULAR_MODE_CONTEXT_COUNT],
            run_mode_contexts: [RunModeContext::new(0, traits.range), RunModeContext::new(1, traits.range)],
            run_index: 0,
            restart_interval_counter: 0,
        }
    }

    /// Encodes the scan and returns the number of bytes written.
    ///
    /// `load_line` fills the given row with line `n` of the image, as pixel
    /// interleaved samples of the scan components.
    pub fn encode_scan(&mut self, mut load_line: impl FnMut(usize, &mut [i32])) -> Result<usize, JpegLsError> {
        self.encode_lines(&mut load_line)?;
        self.end_scan()?;
        Ok(self.position)
    }

    fn reset_parameters(&mut self) {
        let range = self.traits.range;
        self.regular_mode_contexts.fill(RegularModeContext::new(range));
        self.run_mode_contexts = [RunModeContext::new(0, range), RunModeContext::new(1, range)];
        self.run_index = 0;
    }

    fn encode_lines(&mut self, load_line: &mut impl FnMut(usize, &mut [i32])) -> Result<(), JpegLsError> {
        let layout = self.layout;
        let row_length = layout.row_length();
        let line_length = layout.line_length();
        let restart_interval = self.coding_parameters.restart_interval as usize;

        let mut line_buffer = vec![0i32; row_length * 2];
        let mut row = vec![0i32; layout.samples_per_row()];
        let mut run_index = vec![0usize; layout.component_lines];

        for line in 0..layout.height {
            if restart_interval > 0 && line > 0 && line % restart_interval == 0 {
                self.end_scan()?;
                self.write_restart_marker()?;
                self.reset_parameters();
                line_buffer.fill(0);
                run_index.fill(0);
            }

            let (first, second) = line_buffer.split_at_mut(row_length);
            let (previous, current) = if (line & 1) == 1 {
                (second, first)
            } else {
                (first, second)
            };

            load_line(line, &mut row);
            layout.copy_to_line_buffer(&row, current);

            for (component, index) in run_index.iter_mut().enumerate() {
                let range = component * line_length..(component + 1) * line_length;
                let previous_line = &mut previous[range.clone()];
                let current_line = &mut current[range];
                layout.initialize_edges(previous_line, current_line);

                self.run_index = *index;
                if layout.pixel_size == 1 {
                    self.encode_line(previous_line, current_line)?;
                } else {
                    self.encode_pixel_line(previous_line, current_line)?;
                }
                *index = self.run_index;
            }
        }
        Ok(())
    }

    fn quantize_gradient(&self, di: i32) -> i32 {
        quantize_gradient(di, self.traits.near_lossless, &self.pc_parameters)
    }

    fn compute_context_id(&self, ra: i32, rb: i32, rc: i32, rd: i32) -> i32 {
        compute_context_id(
            self.quantize_gradient(rd - rb),
            self.quantize_gradient(rb - rc),
            self.quantize_gradient(rc - ra),
        )
    }

    // ISO/IEC 14495-1, A.3 to A.7 for a line of single samples.
    fn encode_line(&mut self, previous: &[i32], current: &mut [i32]) -> Result<(), JpegLsError> {
        let width = self.layout.width;
        let mut index = 1;
        let mut rb = previous[0];
        let mut rd = previous[1];

        while index <= width {
            let ra = current[index - 1];
            let rc = rb;
            rb = rd;
            rd = previous[index + 1];

            let qs = self.compute_context_id(ra, rb, rc, rd);
            if qs != 0 {
                current[index] = self.encode_regular(qs, current[index], compute_predicted_value(ra, rb, rc))?;
                index += 1;
            } else {
                index += self.encode_run_mode(index, previous, current)?;
                rb = previous[index - 1];
                rd = previous[index];
            }
        }
        Ok(())
    }

    // Sample interleaved lines: run mode is only entered when all components
    // of the pixel have a zero context.
    fn encode_pixel_line(&mut self, previous: &[i32], current: &mut [i32]) -> Result<(), JpegLsError> {
        let width = self.layout.width;
        let pixel_size = self.layout.pixel_size;
        let mut qs = [0i32; 4];
        let mut index = 1;

        while index <= width {
            let base = index * pixel_size;
            for (c, q) in qs.iter_mut().enumerate().take(pixel_size) {
                *q = self.compute_context_id(
                    current[base - pixel_size + c],
                    previous[base + c],
                    previous[base - pixel_size + c],
                    previous[base + pixel_size + c],
                );
            }

            if qs[..pixel_size].iter().all(|&q| q == 0) {
                index += self.encode_pixel_run_mode(index, previous, current)?;
            } else {
                for (c, &q) in qs.iter().enumerate().take(pixel_size) {
                    let ra = current[base - pixel_size + c];
                    let rb = previous[base + c];
                    let rc = previous[base - pixel_size + c];
                    current[base + c] = self.encode_regular(q, current[base + c], compute_predicted_value(ra, rb, rc))?;
                }
                index += 1;
            }
        }
        Ok(())
    }

    fn encode_regular(&mut self, qs: i32, x: i32, predicted: i32) -> Result<i32, JpegLsError> {
        let sign = bit_wise_sign(qs);
        let context_index = apply_sign(qs, sign) as usize;
        let context = self.regular_mode_contexts[context_index];
        let k = context.compute_golomb_coding_parameter()?;
        let predicted_value = self.traits.correct_prediction(predicted + apply_sign(context.c(), sign));
        let error_value = self.traits.compute_error_value(apply_sign(x - predicted_value, sign));

        self.encode_mapped_value(
            k,
            map_error_value(context.get_error_correction(k | self.traits.near_lossless) ^ error_value),
            self.traits.limit,
        )?;
        self.regular_mode_contexts[context_index].update_variables_and_bias(
            error_value,
            self.traits.near_lossless,
            self.traits.reset_threshold,
        )?;

        Ok(self
            .traits
            .compute_reconstructed_sample(predicted_value, apply_sign(error_value, sign)))
    }

    fn encode_run_mode(&mut self, start: usize, previous: &[i32], current: &mut [i32]) -> Result<usize, JpegLsError> {
        let remaining = self.layout.width + 1 - start;
        let ra = current[start - 1];

        let mut run_length = 0;
        while self.traits.is_near(current[start + run_length], ra) {
            current[start + run_length] = ra;
            run_length += 1;
            if run_length == remaining {
                break;
            }
        }

        self.encode_run_pixels(run_length, run_length == remaining)?;
        if run_length == remaining {
            return Ok(run_length);
        }

        let index = start + run_length;
        current[index] = self.encode_run_interruption_pixel(current[index], ra, previous[index])?;
        self.decrement_run_index();
        Ok(run_length + 1)
    }

    fn encode_pixel_run_mode(
        &mut self,
        start: usize,
        previous: &[i32],
        current: &mut [i32],
    ) -> Result<usize, JpegLsError> {
        let pixel_size = self.layout.pixel_size;
        let remaining = self.layout.width + 1 - start;
        let mut ra = [0i32; 4];
        ra[..pixel_size].copy_from_slice(&current[(start - 1) * pixel_size..start * pixel_size]);

        let mut run_length = 0;
        loop {
            let base = (start + run_length) * pixel_size;
            let pixel = &mut current[base..base + pixel_size];
            if !pixel.iter().zip(&ra).all(|(&x, &a)| self.traits.is_near(x, a)) {
                break;
            }
            pixel.copy_from_slice(&ra[..pixel_size]);
            run_length += 1;
            if run_length == remaining {
                break;
            }
        }

        self.encode_run_pixels(run_length, run_length == remaining)?;
        if run_length == remaining {
            return Ok(run_length);
        }

        let base = (start + run_length) * pixel_size;
        for c in 0..pixel_size {
            let rb = previous[base + c];
            let sign = sign(rb - ra[c]);
            let error_value = self.traits.compute_error_value(sign * (current[base + c] - rb));
            self.encode_run_interruption_error(0, error_value)?;
            current[base + c] = self.traits.compute_reconstructed_sample(rb, error_value * sign);
        }
        self.decrement_run_index();
        Ok(run_length + 1)
    }

    // Code segment A.14 to A.16
    fn encode_run_pixels(&mut self, mut run_length: usize, end_of_line: bool) -> Result<(), JpegLsError> {
        while run_length >= 1 << J[self.run_index] {
            self.append_to_bit_stream(1, 1)?;
            run_length -= 1 << J[self.run_index];
            self.increment_run_index();
        }

        if end_of_line {
            if run_length != 0 {
                self.append_to_bit_stream(1, 1)?;
            }
        } else {
            // Leading 0 followed by the remaining length.
            self.append_to_bit_stream(run_length as u32, J[self.run_index] + 1)?;
        }
        Ok(())
    }

    fn encode_run_interruption_pixel(&mut self, x: i32, ra: i32, rb: i32) -> Result<i32, JpegLsError> {
        if (ra - rb).abs() <= self.traits.near_lossless {
            let error_value = self.traits.compute_error_value(x - ra);
            self.encode_run_interruption_error(1, error_value)?;
            return Ok(self.traits.compute_reconstructed_sample(ra, error_value));
        }

        let error_value = self.traits.compute_error_value((x - rb) * sign(rb - ra));
        self.encode_run_interruption_error(0, error_value)?;
        Ok(self
            .traits
            .compute_reconstructed_sample(rb, error_value * sign(rb - ra)))
    }

    // Code segment A.19 to A.23
    fn encode_run_interruption_error(&mut self, context_index: usize, error_value: i32) -> Result<(), JpegLsError> {
        let context = self.run_mode_contexts[context_index];
        let k = context.compute_golomb_coding_parameter();
        let map = context.compute_map(error_value, k);
        let e_mapped_error_value = 2 * error_value.abs() - context.run_interruption_type() - map as i32;

        self.encode_mapped_value(k, e_mapped_error_value, self.traits.limit - J[self.run_index] - 1)?;
        self.run_mode_contexts[context_index].update_variables(
            error_value,
            e_mapped_error_value,
            self.traits.reset_threshold,
        );
        Ok(())
    }

    fn increment_run_index(&mut self) {
        self.run_index = (self.run_index + 1).min(31);
    }

    fn decrement_run_index(&mut self) {
        self.run_index = self.run_index.saturating_sub(1);
    }

    // Limited length Golomb code, ISO/IEC 14495-1, A.5.3.
    fn encode_mapped_value(&mut self, k: i32, mapped_error: i32, limit: i32) -> Result<(), JpegLsError> {
        let qbpp = self.traits.quantized_bits_per_sample;
        let mut high_bits = mapped_error >> k;

        if high_bits < limit - qbpp - 1 {
            if high_bits + 1 > 31 {
                self.append_to_bit_stream(0, high_bits / 2)?;
                high_bits -= high_bits / 2;
            }
            self.append_to_bit_stream(1, high_bits + 1)?;
            self.append_to_bit_stream((mapped_error & ((1 << k) - 1)) as u32, k)?;
            return Ok(());
        }

        if limit - qbpp > 31 {
            self.append_to_bit_stream(0, 31)?;
            self.append_to_bit_stream(1, limit - qbpp - 31)?;
        } else {
            self.append_to_bit_stream(1, limit - qbpp)?;
        }
        self.append_to_bit_stream(((mapped_error - 1) & ((1 << qbpp) - 1)) as u32, qbpp)
    }

    fn append_to_bit_stream(&mut self, bits: u32, bit_count: i32) -> Result<(), JpegLsError> {
        debug_assert!((0..=32).contains(&bit_count));
        if bit_count == 0 {
            return Ok(());
        }

        self.free_bit_count -= bit_count;
        if self.free_bit_count >= 0 {
            self.bit_buffer |= bits << self.free_bit_count;
            return Ok(());
        }

        // Add as many bits as fit and flush.
        self.bit_buffer |= bits >> -self.free_bit_count;
        self.flush()?;

        // A second flush is needed when the stuffed zero bits left too little room.
        if self.free_bit_count < 0 {
            self.bit_buffer |= bits >> -self.free_bit_count;
            self.flush()?;
        }

        self.bit_buffer |= bits << self.free_bit_count;
        Ok(())
    }

    // After a 0xFF byte only 7 bits go in the next byte, its high bit stays 0 (ISO/IEC 14495-1, A.1).
    fn flush(&mut self) -> Result<(), JpegLsError> {
        for _ in 0..4 {
            if self.free_bit_count >= 32 {
                break;
            }

            let value = if self.is_ff_written {
                let value = (self.bit_buffer >> 25) as u8;
                self.bit_buffer <<= 7;
                self.free_bit_count += 7;
                value
            } else {
                let value = (self.bit_buffer >> 24) as u8;
                self.bit_buffer <<= 8;
                self.free_bit_count += 8;
                value
            };

            self.write_byte(value)?;
            self.is_ff_written = value == JPEG_MARKER_START_BYTE;
        }

        // A partial last byte overshoots; the buffer is empty then.
        self.free_bit_count = self.free_bit_count.min(32);
        Ok(())
    }

    fn end_scan(&mut self) -> Result<(), JpegLsError> {
        self.flush()?;

        // A trailing 0xFF needs a following byte with its high bit cleared.
        if self.is_ff_written {
            self.append_to_bit_stream(0, (self.free_bit_count - 1) % 8)?;
        } else {
            self.append_to_bit_stream(0, self.free_bit_count % 8)?;
        }

        self.flush()?;
        debug_assert_eq!(self.free_bit_count, 32);

        self.bit_buffer = 0;
        self.is_ff_written = false;
        Ok(())
    }

    fn write_restart_marker(&mut self) -> Result<(), JpegLsError> {
        self.write_byte(JPEG_MARKER_START_BYTE)?;
        self.write_byte(JPEG_RESTART_MARKER_BASE + self.restart_interval_counter)?;
        self.restart_interval_counter = (self.restart_interval_counter + 1) % JPEG_RESTART_MARKER_RANGE;
        Ok(())
    }

    fn write_byte(&mut self, value: u8) -> Result<(), JpegLsError> {
        let Some(byte) = self.destination.get_mut(self.position) else {
            return Err(JpegLsError::DestinationBufferTooSmall);
        };
        *byte = value;
        self.position += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::InterleaveMode;
    use crate::jpegls::coding_parameters::compute_default;

    fn encoder(destination: &mut [u8]) -> ScanEncoder<'_> {
        let frame_info = FrameInfo {
            width: 4,
            height: 1,
            bits_per_sample: 8,
            component_count: 1,
        };
        let coding_parameters = CodingParameters {
            interleave_mode: InterleaveMode::None,
            ..Default::default()
        };
        ScanEncoder::new(frame_info, 1, compute_default(255, 0), coding_parameters, destination)
    }

    #[test]
    fn bits_are_packed_msb_first() {
        let mut destination = [0u8; 8];
        let mut encoder = encoder(&mut destination);
        encoder.append_to_bit_stream(0b101, 3).unwrap();
        encoder.append_to_bit_stream(0b1_1111, 5).unwrap();
        encoder.end_scan().unwrap();
        let length = encoder.position;
        assert_eq!(&destination[..length], &[0b1011_1111]);
    }

    #[test]
    fn a_zero_bit_is_stuffed_after_ff() {
        let mut destination = [0u8; 8];
        let mut encoder = encoder(&mut destination);
        encoder.append_to_bit_stream(0xFF, 8).unwrap();
        encoder.append_to_bit_stream(0x7F, 7).unwrap();
        encoder.end_scan().unwrap();
        let length = encoder.position;
        assert_eq!(&destination[..length], &[0xFF, 0x7F]);
    }

    #[test]
    fn trailing_ff_gets_a_zero_byte() {
        let mut destination = [0u8; 8];
        let mut encoder = encoder(&mut destination);
        encoder.append_to_bit_stream(0xFF, 8).unwrap();
        encoder.end_scan().unwrap();
        let length = encoder.position;
        assert_eq!(&destination[..length], &[0xFF, 0x00]);
    }

    #[test]
    fn full_destination_is_reported() {
        let mut destination = [0u8; 1];
        let mut encoder = encoder(&mut destination);
        encoder.append_to_bit_stream(0xABCD, 16).unwrap();
        assert_eq!(encoder.end_scan(), Err(JpegLsError::DestinationBufferTooSmall));
    }
}
