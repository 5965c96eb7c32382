use log::debug;

use crate::constants::{
    MAXIMUM_BITS_PER_SAMPLE, MAXIMUM_COMPONENT_COUNT, MAXIMUM_HEIGHT, MAXIMUM_WIDTH, MINIMUM_BITS_PER_SAMPLE,
    MINIMUM_COMPONENT_COUNT, MINIMUM_HEIGHT, MINIMUM_WIDTH,
};
use crate::error::JpegLsError;
use crate::jpeg_stream_writer::JpegStreamWriter;
use crate::jpegls::coding_parameters::{compute_default, compute_maximum_near_lossless, is_default, is_valid};
use crate::jpegls::sample_buffer::SampleBuffer;
use crate::jpegls::scan_encoder::ScanEncoder;
use crate::jpegls::{CodingParameters, FrameInfo};
use crate::parameters::{InterleaveMode, JfifParameters, JlsParameters};

/// Writes a complete JPEG-LS stream for one image.
pub struct JpeglsEncoder<'a> {
    writer: JpegStreamWriter<'a>,
    restart_interval: u32,
    thumbnail: &'a [u8],
}

impl<'a> JpeglsEncoder<'a> {
    pub fn new(destination: &'a mut [u8]) -> Self {
        Self {
            writer: JpegStreamWriter::new(destination),
            restart_interval: 0,
            thumbnail: &[],
        }
    }

    /// Lines between restart markers; 0 disables them.
    pub fn set_restart_interval(&mut self, restart_interval: u32) {
        self.restart_interval = restart_interval;
    }

    /// RGB pixels of the JFIF thumbnail announced by `JlsParameters::jfif`.
    pub fn set_thumbnail(&mut self, thumbnail: &'a [u8]) {
        self.thumbnail = thumbnail;
    }

    /// Encodes `source` and returns the number of bytes written.
    pub fn encode(&mut self, source: &[u8], parameters: &JlsParameters) -> Result<usize, JpegLsError> {
        let frame_info = validate_frame_info(parameters)?;
        let interleave_mode = validate_interleave_mode(parameters)?;

        let maximum_sample_value = frame_info.maximum_sample_value();
        let near_lossless = parameters.allowed_lossy_error;
        if !(0..=compute_maximum_near_lossless(maximum_sample_value)).contains(&near_lossless) {
            return Err(JpegLsError::InvalidArgument);
        }
        if parameters.color_transform != 0 {
            return Err(JpegLsError::ColorTransformNotSupported);
        }
        let pc_parameters =
            is_valid(&parameters.custom, maximum_sample_value, near_lossless).ok_or(JpegLsError::InvalidArgument)?;

        let jfif = parameters.jfif;
        if jfif.is_present() {
            validate_jfif(&jfif, self.thumbnail)?;
        }

        let buffer = SampleBuffer::new(
            &frame_info,
            interleave_mode,
            parameters.bytes_per_line,
            parameters.output_bgr(),
        )?;
        if source.len() < buffer.size() {
            return Err(JpegLsError::InvalidArgumentSource);
        }

        self.writer.write_start_of_image()?;
        if jfif.is_present() {
            self.writer.write_jfif_segment(&jfif, self.thumbnail)?;
        }
        self.writer.write_start_of_frame_jpegls(&frame_info)?;

        // Decoders that predate the corrected defaults for more than 12 bits need them spelled out.
        let defaults = compute_default(maximum_sample_value, near_lossless);
        if !is_default(&parameters.custom, &defaults) || frame_info.bits_per_sample > 12 {
            self.writer.write_jpegls_preset_parameters_segment(&pc_parameters)?;
        }

        if self.restart_interval > 0 {
            let restart_interval = u16::try_from(self.restart_interval).map_err(|_| JpegLsError::InvalidArgument)?;
            self.writer.write_define_restart_interval(restart_interval)?;
        }

        let component_count = frame_info.component_count as usize;
        let scans: Vec<Vec<usize>> = if interleave_mode == InterleaveMode::None {
            (0..component_count).map(|component| vec![component]).collect()
        } else {
            vec![(0..component_count).collect()]
        };

        let coding_parameters = CodingParameters {
            near_lossless,
            restart_interval: self.restart_interval,
            interleave_mode,
        };

        for components in &scans {
            self.writer.write_start_of_scan_segment(
                components[0] as u8 + 1,
                components.len() as u8,
                near_lossless,
                interleave_mode,
            )?;

            let bytes_written = ScanEncoder::new(
                frame_info,
                components.len(),
                pc_parameters,
                coding_parameters,
                self.writer.remaining_slice(),
            )
            .encode_scan(|line, row| buffer.read_line(source, line, components, row))?;
            self.writer.advance(bytes_written);
        }

        self.writer.write_end_of_image()?;

        debug!(
            "encoded {}x{}x{} ({} bits, {:?}, NEAR {}) into {} bytes",
            frame_info.width,
            frame_info.height,
            component_count,
            frame_info.bits_per_sample,
            interleave_mode,
            near_lossless,
            self.writer.len()
        );
        Ok(self.writer.len())
    }
}

fn validate_frame_info(parameters: &JlsParameters) -> Result<FrameInfo, JpegLsError> {
    if !(MINIMUM_WIDTH..=MAXIMUM_WIDTH).contains(&parameters.width) {
        return Err(JpegLsError::InvalidArgumentWidth);
    }
    if !(MINIMUM_HEIGHT..=MAXIMUM_HEIGHT).contains(&parameters.height) {
        return Err(JpegLsError::InvalidArgumentHeight);
    }
    if !(MINIMUM_BITS_PER_SAMPLE..=MAXIMUM_BITS_PER_SAMPLE).contains(&parameters.bits_per_sample) {
        return Err(JpegLsError::InvalidArgumentBitsPerSample);
    }
    if !(MINIMUM_COMPONENT_COUNT..=MAXIMUM_COMPONENT_COUNT).contains(&parameters.components) {
        return Err(JpegLsError::InvalidArgumentComponentCount);
    }

    Ok(FrameInfo {
        width: parameters.width as u32,
        height: parameters.height as u32,
        bits_per_sample: parameters.bits_per_sample,
        component_count: parameters.components,
    })
}

fn validate_interleave_mode(parameters: &JlsParameters) -> Result<InterleaveMode, JpegLsError> {
    let interleave_mode = parameters.interleave_mode()?;
    if interleave_mode != InterleaveMode::None && !(3..=4).contains(&parameters.components) {
        return Err(JpegLsError::InvalidArgumentInterleaveMode);
    }
    Ok(interleave_mode)
}

fn validate_jfif(jfif: &JfifParameters, thumbnail: &[u8]) -> Result<(), JpegLsError> {
    let in_u16 = |value: i32| (0..=i32::from(u16::MAX)).contains(&value);
    if !in_u16(jfif.version) || !(0..=2).contains(&jfif.units) || !in_u16(jfif.density_x) || !in_u16(jfif.density_y) {
        return Err(JpegLsError::InvalidArgument);
    }

    let in_u8 = |value: i32| (0..=255).contains(&value);
    if !in_u8(jfif.thumbnail_x) || !in_u8(jfif.thumbnail_y) {
        return Err(JpegLsError::InvalidArgumentThumbnail);
    }
    if thumbnail.len() < 3 * jfif.thumbnail_x as usize * jfif.thumbnail_y as usize {
        return Err(JpegLsError::InvalidArgumentThumbnail);
    }
    Ok(())
}
