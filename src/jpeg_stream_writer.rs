//! JPEG-LS codestream writer.
//!
//! `JpegStreamWriter` emits the marker segments of an interchange format
//! JPEG-LS stream (SOI, APP0/JFIF, SOF55, LSE, DRI, SOS, EOI). The entropy
//! coded data in between is written by the scan encoder into
//! [`remaining_slice`](JpegStreamWriter::remaining_slice).

use crate::constants::{JFIF_IDENTIFIER, JFIF_SEGMENT_FIXED_SIZE, PRESET_CODING_PARAMETERS_SEGMENT_SIZE, SEGMENT_LENGTH_SIZE};
use crate::error::JpegLsError;
use crate::jpeg_marker_code::{JPEG_MARKER_START_BYTE, JpegMarkerCode};
use crate::jpegls::FrameInfo;
use crate::parameters::{InterleaveMode, JfifParameters, JpeglsPresetCodingParameters};

/// LSE identifier of the preset coding parameters segment.
const PRESET_CODING_PARAMETERS_TYPE: u8 = 1;

pub struct JpegStreamWriter<'a> {
    destination: &'a mut [u8],
    position: usize,
}

impl<'a> JpegStreamWriter<'a> {
    pub fn new(destination: &'a mut [u8]) -> Self {
        Self {
            destination,
            position: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.position
    }

    pub fn is_empty(&self) -> bool {
        self.position == 0
    }

    pub fn write_byte(&mut self, value: u8) -> Result<(), JpegLsError> {
        let Some(byte) = self.destination.get_mut(self.position) else {
            return Err(JpegLsError::DestinationBufferTooSmall);
        };
        *byte = value;
        self.position += 1;
        Ok(())
    }

    pub fn write_bytes(&mut self, values: &[u8]) -> Result<(), JpegLsError> {
        let end = self.position + values.len();
        let Some(target) = self.destination.get_mut(self.position..end) else {
            return Err(JpegLsError::DestinationBufferTooSmall);
        };
        target.copy_from_slice(values);
        self.position = end;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), JpegLsError> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_marker(&mut self, marker: JpegMarkerCode) -> Result<(), JpegLsError> {
        self.write_byte(JPEG_MARKER_START_BYTE)?;
        self.write_byte(marker as u8)
    }

    fn write_segment_header(&mut self, marker: JpegMarkerCode, data_size: usize) -> Result<(), JpegLsError> {
        let size = u16::try_from(data_size + SEGMENT_LENGTH_SIZE).map_err(|_| JpegLsError::InvalidArgument)?;
        self.write_marker(marker)?;
        self.write_u16(size)
    }

    pub fn write_start_of_image(&mut self) -> Result<(), JpegLsError> {
        self.write_marker(JpegMarkerCode::StartOfImage)
    }

    pub fn write_end_of_image(&mut self) -> Result<(), JpegLsError> {
        self.write_marker(JpegMarkerCode::EndOfImage)
    }

    /// Writes a JFIF APP0 segment. `thumbnail` holds the 24 bit RGB pixels
    /// announced by `thumbnail_x` and `thumbnail_y`.
    pub fn write_jfif_segment(&mut self, jfif: &JfifParameters, thumbnail: &[u8]) -> Result<(), JpegLsError> {
        let thumbnail_size = 3 * jfif.thumbnail_x as usize * jfif.thumbnail_y as usize;
        let thumbnail = thumbnail.get(..thumbnail_size).ok_or(JpegLsError::InvalidArgumentThumbnail)?;

        self.write_segment_header(
            JpegMarkerCode::ApplicationData0,
            JFIF_SEGMENT_FIXED_SIZE - SEGMENT_LENGTH_SIZE + thumbnail_size,
        )?;
        self.write_bytes(&JFIF_IDENTIFIER)?;
        self.write_u16(jfif.version as u16)?;
        self.write_byte(jfif.units as u8)?;
        self.write_u16(jfif.density_x as u16)?;
        self.write_u16(jfif.density_y as u16)?;
        self.write_byte(jfif.thumbnail_x as u8)?;
        self.write_byte(jfif.thumbnail_y as u8)?;
        self.write_bytes(thumbnail)
    }

    pub fn write_start_of_frame_jpegls(&mut self, frame_info: &FrameInfo) -> Result<(), JpegLsError> {
        self.write_segment_header(
            JpegMarkerCode::StartOfFrameJpegls,
            6 + frame_info.component_count as usize * 3,
        )?;

        self.write_byte(frame_info.bits_per_sample as u8)?;
        self.write_u16(frame_info.height as u16)?;
        self.write_u16(frame_info.width as u16)?;
        self.write_byte(frame_info.component_count as u8)?;

        for i in 0..frame_info.component_count {
            self.write_byte((i + 1) as u8)?; // Component ID
            self.write_byte(0x11)?; // H=1, V=1
            self.write_byte(0)?; // Tq, not used by JPEG-LS
        }
        Ok(())
    }

    pub fn write_jpegls_preset_parameters_segment(
        &mut self,
        pc: &JpeglsPresetCodingParameters,
    ) -> Result<(), JpegLsError> {
        self.write_segment_header(JpegMarkerCode::JpeglsPresetParameters, PRESET_CODING_PARAMETERS_SEGMENT_SIZE)?;
        self.write_byte(PRESET_CODING_PARAMETERS_TYPE)?;

        self.write_u16(pc.maximum_sample_value as u16)?;
        self.write_u16(pc.threshold1 as u16)?;
        self.write_u16(pc.threshold2 as u16)?;
        self.write_u16(pc.threshold3 as u16)?;
        self.write_u16(pc.reset_value as u16)
    }

    pub fn write_define_restart_interval(&mut self, restart_interval: u16) -> Result<(), JpegLsError> {
        self.write_segment_header(JpegMarkerCode::DefineRestartInterval, 2)?;
        self.write_u16(restart_interval)
    }

    /// Writes an SOS segment for `component_count` components starting at
    /// component id `first_component_id`.
    pub fn write_start_of_scan_segment(
        &mut self,
        first_component_id: u8,
        component_count: u8,
        near_lossless: i32,
        interleave_mode: InterleaveMode,
    ) -> Result<(), JpegLsError> {
        self.write_segment_header(JpegMarkerCode::StartOfScan, 1 + component_count as usize * 2 + 3)?;

        self.write_byte(component_count)?;
        for i in 0..component_count {
            self.write_byte(first_component_id + i)?; // Component selector
            self.write_byte(0)?; // Mapping table selector
        }

        self.write_byte(near_lossless as u8)?;
        self.write_byte(i32::from(interleave_mode) as u8)?;
        self.write_byte(0) // Ah, Al point transform
    }

    pub fn remaining_slice(&mut self) -> &mut [u8] {
        let position = self.position.min(self.destination.len());
        &mut self.destination[position..]
    }

    pub fn advance(&mut self, count: usize) {
        self.position += count;
    }
}
