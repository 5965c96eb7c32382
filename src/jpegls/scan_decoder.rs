use crate::constants::{J, MAXIMUM_ERROR_VALUE, REGULAR_MODE_CONTEXT_COUNT};
use crate::error::JpegLsError;
use crate::jpeg_marker_code::{JPEG_MARKER_START_BYTE, JPEG_RESTART_MARKER_BASE, JPEG_RESTART_MARKER_RANGE};
use crate::jpegls::FrameInfo;
use crate::jpegls::coding_parameters::{CodingParameters, ScanLayout};
use crate::jpegls::golomb_lut::GOLOMB_LUT;
use crate::jpegls::regular_mode_context::RegularModeContext;
use crate::jpegls::run_mode_context::RunModeContext;
use crate::jpegls::traits::{
    Traits, apply_sign, bit_wise_sign, compute_context_id, compute_predicted_value, quantize_gradient, sign,
    unmap_error_value,
};
use crate::parameters::JpeglsPresetCodingParameters;

const CACHE_BIT_COUNT: i32 = u64::BITS as i32;
const MAX_READABLE_CACHE_BITS: i32 = CACHE_BIT_COUNT - 8;

/// Decodes the entropy coded segment of one scan.
pub struct ScanDecoder<'a> {
    layout: ScanLayout,
    traits: Traits,
    pc_parameters: JpeglsPresetCodingParameters,
    coding_parameters: CodingParameters,
    source: &'a [u8],
    position: usize,
    read_cache: u64,
    valid_bits: i32,
    after_ff: bool,

    regular_mode_contexts: Vec<RegularModeContext>,
    run_mode_contexts: [RunModeContext; 2],
    run_index: usize,
    restart_interval_counter: u8,
}

impl<'a> ScanDecoder<'a> {
    /// `pc_parameters` must be validated: no zero fields.
    pub fn new(
        frame_info: FrameInfo,
        component_count: usize,
        pc_parameters: JpeglsPresetCodingParameters,
        coding_parameters: CodingParameters,
        source: &'a [u8],
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
            source,
            position: 0,
            read_cache: 0,
            valid_bits: 0,
            after_ff: false,
            regular_mode_contexts: vec![RegularModeContext::new(traits.range); REGULAR_MODE_CONTEXT_COUNT],
            run_mode_contexts: [RunModeContext::new(0, traits.range), RunModeContext::new(1, traits.range)],
            run_index: 0,
            restart_interval_counter: 0,
        }
    }

    /// Decodes the scan and returns the number of source bytes consumed. The
    /// source position is then on the marker that follows the scan.
    ///
    /// Every decoded line is handed to `store_line` with its line number, as
    /// pixel interleaved samples of the scan components.
    pub fn decode_scan(&mut self, mut store_line: impl FnMut(usize, &[i32])) -> Result<usize, JpegLsError> {
        self.decode_lines(&mut store_line)?;
        self.end_scan()?;
        Ok(self.position)
    }

    fn reset_parameters(&mut self) {
        let range = self.traits.range;
        self.regular_mode_contexts.fill(RegularModeContext::new(range));
        self.run_mode_contexts = [RunModeContext::new(0, range), RunModeContext::new(1, range)];
        self.run_index = 0;
    }

    fn decode_lines(&mut self, store_line: &mut impl FnMut(usize, &[i32])) -> Result<(), JpegLsError> {
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
                self.read_restart_marker()?;
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

            for (component, index) in run_index.iter_mut().enumerate() {
                let range = component * line_length..(component + 1) * line_length;
                let previous_line = &mut previous[range.clone()];
                let current_line = &mut current[range];
                layout.initialize_edges(previous_line, current_line);

                self.run_index = *index;
                if layout.pixel_size == 1 {
                    self.decode_line(previous_line, current_line)?;
                } else {
                    self.decode_pixel_line(previous_line, current_line)?;
                }
                *index = self.run_index;
            }

            layout.copy_from_line_buffer(current, &mut row);
            store_line(line, &row);
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

    fn decode_line(&mut self, previous: &[i32], current: &mut [i32]) -> Result<(), JpegLsError> {
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
                current[index] = self.decode_regular(qs, compute_predicted_value(ra, rb, rc))?;
                index += 1;
            } else {
                index += self.decode_run_mode(index, previous, current)?;
                rb = previous[index - 1];
                rd = previous[index];
            }
        }
        Ok(())
    }

    fn decode_pixel_line(&mut self, previous: &[i32], current: &mut [i32]) -> Result<(), JpegLsError> {
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
                index += self.decode_pixel_run_mode(index, previous, current)?;
            } else {
                for (c, &q) in qs.iter().enumerate().take(pixel_size) {
                    let ra = current[base - pixel_size + c];
                    let rb = previous[base + c];
                    let rc = previous[base - pixel_size + c];
                    current[base + c] = self.decode_regular(q, compute_predicted_value(ra, rb, rc))?;
                }
                index += 1;
            }
        }
        Ok(())
    }

    fn decode_regular(&mut self, qs: i32, predicted: i32) -> Result<i32, JpegLsError> {
        let sign = bit_wise_sign(qs);
        let context_index = apply_sign(qs, sign) as usize;
        let context = self.regular_mode_contexts[context_index];
        let k = context.compute_golomb_coding_parameter()?;
        let predicted_value = self.traits.correct_prediction(predicted + apply_sign(context.c(), sign));

        let code = GOLOMB_LUT[k as usize][self.peek_byte() as usize];
        let mut error_value = if code.bit_count != 0 && i32::from(code.bit_count) <= self.valid_bits {
            self.skip(i32::from(code.bit_count));
            unmap_error_value(i32::from(code.mapped_error_value))
        } else {
            let error_value = unmap_error_value(self.decode_value(k, self.traits.limit)?);
            if error_value.abs() > MAXIMUM_ERROR_VALUE {
                return Err(JpegLsError::InvalidEncodedData);
            }
            error_value
        };

        if k == 0 {
            error_value ^= context.get_error_correction(self.traits.near_lossless);
        }

        self.regular_mode_contexts[context_index].update_variables_and_bias(
            error_value,
            self.traits.near_lossless,
            self.traits.reset_threshold,
        )?;

        Ok(self
            .traits
            .compute_reconstructed_sample(predicted_value, apply_sign(error_value, sign)))
    }

    fn decode_run_mode(&mut self, start: usize, previous: &[i32], current: &mut [i32]) -> Result<usize, JpegLsError> {
        let ra = current[start - 1];
        let run_length = self.decode_run_pixels(self.layout.width + 1 - start)?;
        current[start..start + run_length].fill(ra);

        let index = start + run_length;
        if index == self.layout.width + 1 {
            return Ok(run_length);
        }

        current[index] = self.decode_run_interruption_pixel(ra, previous[index])?;
        self.decrement_run_index();
        Ok(run_length + 1)
    }

    fn decode_pixel_run_mode(
        &mut self,
        start: usize,
        previous: &[i32],
        current: &mut [i32],
    ) -> Result<usize, JpegLsError> {
        let pixel_size = self.layout.pixel_size;
        let mut ra = [0i32; 4];
        ra[..pixel_size].copy_from_slice(&current[(start - 1) * pixel_size..start * pixel_size]);

        let run_length = self.decode_run_pixels(self.layout.width + 1 - start)?;
        for pixel in current[start * pixel_size..(start + run_length) * pixel_size].chunks_exact_mut(pixel_size) {
            pixel.copy_from_slice(&ra[..pixel_size]);
        }

        let index = start + run_length;
        if index == self.layout.width + 1 {
            return Ok(run_length);
        }

        let base = index * pixel_size;
        for c in 0..pixel_size {
            let rb = previous[base + c];
            let error_value = self.decode_run_interruption_error(0)?;
            current[base + c] = self
                .traits
                .compute_reconstructed_sample(rb, error_value * sign(rb - ra[c]));
        }
        self.decrement_run_index();
        Ok(run_length + 1)
    }

    // Code segment A.16 reversed.
    fn decode_run_pixels(&mut self, pixel_count: usize) -> Result<usize, JpegLsError> {
        let mut index = 0;
        while self.read_bit()? {
            let count = (1usize << J[self.run_index]).min(pixel_count - index);
            index += count;

            if count == 1 << J[self.run_index] {
                self.increment_run_index();
            }

            if index == pixel_count {
                break;
            }
        }

        if index != pixel_count && J[self.run_index] > 0 {
            // Incomplete run.
            index += self.read_value(J[self.run_index])? as usize;
        }

        if index > pixel_count {
            return Err(JpegLsError::InvalidEncodedData);
        }
        Ok(index)
    }

    fn decode_run_interruption_pixel(&mut self, ra: i32, rb: i32) -> Result<i32, JpegLsError> {
        if (ra - rb).abs() <= self.traits.near_lossless {
            let error_value = self.decode_run_interruption_error(1)?;
            return Ok(self.traits.compute_reconstructed_sample(ra, error_value));
        }

        let error_value = self.decode_run_interruption_error(0)?;
        Ok(self
            .traits
            .compute_reconstructed_sample(rb, error_value * sign(rb - ra)))
    }

    fn decode_run_interruption_error(&mut self, context_index: usize) -> Result<i32, JpegLsError> {
        let context = self.run_mode_contexts[context_index];
        let k = context.compute_golomb_coding_parameter();
        let e_mapped_error_value = self.decode_value(k, self.traits.limit - J[self.run_index] - 1)?;
        let error_value = context.compute_error_value(e_mapped_error_value + context.run_interruption_type(), k);

        self.run_mode_contexts[context_index].update_variables(
            error_value,
            e_mapped_error_value,
            self.traits.reset_threshold,
        );
        Ok(error_value)
    }

    fn increment_run_index(&mut self) {
        self.run_index = (self.run_index + 1).min(31);
    }

    fn decrement_run_index(&mut self) {
        self.run_index = self.run_index.saturating_sub(1);
    }

    fn decode_value(&mut self, k: i32, limit: i32) -> Result<i32, JpegLsError> {
        let qbpp = self.traits.quantized_bits_per_sample;
        let high_bits = self.read_high_bits()?;

        if high_bits >= limit - (qbpp + 1) {
            return Ok(self.read_value(qbpp)? + 1);
        }

        if k == 0 {
            return Ok(high_bits);
        }

        Ok((high_bits << k) + self.read_value(k)?)
    }

    // Fills the cache up to a marker; a 0xFF byte followed by a byte with the
    // high bit set (or by nothing) is a marker, not data.
    fn fill_read_cache(&mut self) {
        while self.valid_bits <= MAX_READABLE_CACHE_BITS {
            let Some(&value) = self.source.get(self.position) else {
                return;
            };

            if value == JPEG_MARKER_START_BYTE {
                match self.source.get(self.position + 1) {
                    Some(next) if next & 0x80 == 0 => {}
                    _ => return,
                }
            }

            if self.after_ff {
                self.read_cache |= u64::from(value & 0x7F) << (CACHE_BIT_COUNT - 7 - self.valid_bits);
                self.valid_bits += 7;
            } else {
                self.read_cache |= u64::from(value) << (CACHE_BIT_COUNT - 8 - self.valid_bits);
                self.valid_bits += 8;
            }
            self.after_ff = value == JPEG_MARKER_START_BYTE;
            self.position += 1;
        }
    }

    fn skip(&mut self, length: i32) {
        debug_assert!(length <= self.valid_bits);
        self.valid_bits -= length;
        self.read_cache <<= length;
    }

    fn peek_byte(&mut self) -> u8 {
        if self.valid_bits < 8 {
            self.fill_read_cache();
        }
        (self.read_cache >> (CACHE_BIT_COUNT - 8)) as u8
    }

    fn read_bit(&mut self) -> Result<bool, JpegLsError> {
        if self.valid_bits <= 0 {
            self.fill_read_cache();
            if self.valid_bits <= 0 {
                return Err(JpegLsError::InvalidEncodedData);
            }
        }

        let set = (self.read_cache >> (CACHE_BIT_COUNT - 1)) != 0;
        self.skip(1);
        Ok(set)
    }

    fn read_value(&mut self, length: i32) -> Result<i32, JpegLsError> {
        if length == 0 {
            return Ok(0);
        }

        if self.valid_bits < length {
            self.fill_read_cache();
            if self.valid_bits < length {
                return Err(JpegLsError::InvalidEncodedData);
            }
        }

        let value = (self.read_cache >> (CACHE_BIT_COUNT - length)) as i32;
        self.skip(length);
        Ok(value)
    }

    fn read_high_bits(&mut self) -> Result<i32, JpegLsError> {
        if self.valid_bits < 16 {
            self.fill_read_cache();
        }

        let count = self.read_cache.leading_zeros() as i32;
        if count < 16 && count < self.valid_bits {
            self.skip(count + 1);
            return Ok(count);
        }

        let mut count = 0;
        while !self.read_bit()? {
            count += 1;
        }
        Ok(count)
    }

    // The bits left before the next marker are the zero padding of the last byte.
    fn end_scan(&mut self) -> Result<(), JpegLsError> {
        self.fill_read_cache();

        let Some(&value) = self.source.get(self.position) else {
            return Err(JpegLsError::SourceBufferTooSmall);
        };

        if value != JPEG_MARKER_START_BYTE || self.valid_bits > 7 || self.read_cache != 0 {
            return Err(JpegLsError::TooMuchEncodedData);
        }
        Ok(())
    }

    fn read_restart_marker(&mut self) -> Result<(), JpegLsError> {
        // Fill bytes may precede the marker code.
        while self.source.get(self.position) == Some(&JPEG_MARKER_START_BYTE) {
            self.position += 1;
        }

        let expected = JPEG_RESTART_MARKER_BASE + self.restart_interval_counter;
        match self.source.get(self.position) {
            Some(&value) if value == expected => {}
            Some(_) => return Err(JpegLsError::InvalidEncodedData),
            None => return Err(JpegLsError::SourceBufferTooSmall),
        }
        self.position += 1;
        self.restart_interval_counter = (self.restart_interval_counter + 1) % JPEG_RESTART_MARKER_RANGE;

        self.read_cache = 0;
        self.valid_bits = 0;
        self.after_ff = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpegls::coding_parameters::compute_default;
    use crate::parameters::InterleaveMode;

    fn decoder(source: &[u8]) -> ScanDecoder<'_> {
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
        ScanDecoder::new(frame_info, 1, compute_default(255, 0), coding_parameters, source)
    }

    #[test]
    fn stuffed_bit_after_ff_is_skipped() {
        let source = [0xFF, 0x7F, 0xFF, 0xD9];
        let mut decoder = decoder(&source);
        assert_eq!(decoder.read_value(8), Ok(0xFF));
        assert_eq!(decoder.read_value(7), Ok(0x7F));
        assert_eq!(decoder.end_scan(), Ok(()));
        assert_eq!(decoder.position, 2);
    }

    #[test]
    fn reading_stops_at_a_marker() {
        let source = [0xA5, 0xFF, 0xD9];
        let mut decoder = decoder(&source);
        assert_eq!(decoder.read_value(8), Ok(0xA5));
        assert_eq!(decoder.read_bit(), Err(JpegLsError::InvalidEncodedData));
    }

    #[test]
    fn high_bits_count_leading_zeros() {
        let source = [0b0001_0000, 0b0000_0000, 0b0000_0000, 0b1000_0000, 0xFF, 0xD9];
        let mut decoder = decoder(&source);
        assert_eq!(decoder.read_high_bits(), Ok(3));
        assert_eq!(decoder.read_high_bits(), Ok(20));
    }

    #[test]
    fn leftover_data_is_too_much_encoded_data() {
        let source = [0x00, 0x01, 0xFF, 0xD9];
        let mut decoder = decoder(&source);
        assert_eq!(decoder.read_value(4), Ok(0));
        assert_eq!(decoder.end_scan(), Err(JpegLsError::TooMuchEncodedData));
    }

    #[test]
    fn missing_marker_is_source_buffer_too_small() {
        let source = [0x80];
        let mut decoder = decoder(&source);
        assert_eq!(decoder.read_bit(), Ok(true));
        assert_eq!(decoder.end_scan(), Err(JpegLsError::SourceBufferTooSmall));
    }
}
