//! JPEG-LS codestream reader.
//!
//! Walks the marker segments of an interchange format stream and collects the
//! frame, preset, restart and scan parameters the scan decoder needs. The
//! entropy coded data itself is handed out through
//! [`remaining_data`](JpegStreamReader::remaining_data).

use log::{debug, trace};

use crate::constants::{JFIF_IDENTIFIER, PRESET_CODING_PARAMETERS_SEGMENT_SIZE, SEGMENT_LENGTH_SIZE};
use crate::error::JpegLsError;
use crate::jpeg_marker_code::{JPEG_MARKER_START_BYTE, JpegMarkerCode, MarkerClass};
use crate::jpegls::FrameInfo;
use crate::jpegls::coding_parameters::{compute_maximum_near_lossless, is_valid};
use crate::parameters::{InterleaveMode, JfifParameters, JpeglsPresetCodingParameters};

/// Highest component count a sample interleaved scan can carry.
pub const MAXIMUM_SAMPLE_INTERLEAVED_COMPONENTS: usize = 4;

/// The parameters of the SOS segment most recently read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanHeader {
    /// Frame component indexes (not ids) coded in this scan.
    pub components: Vec<usize>,
    pub near_lossless: i32,
    pub interleave_mode: InterleaveMode,
}

pub struct JpegStreamReader<'a> {
    source: &'a [u8],
    position: usize,
    frame_info: Option<FrameInfo>,
    component_ids: Vec<u8>,
    preset_coding_parameters: JpeglsPresetCodingParameters,
    restart_interval: u32,
    jfif: JfifParameters,
    scan_header: ScanHeader,
}

impl<'a> JpegStreamReader<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            position: 0,
            frame_info: None,
            component_ids: Vec::new(),
            preset_coding_parameters: JpeglsPresetCodingParameters::default(),
            restart_interval: 0,
            jfif: JfifParameters::default(),
            scan_header: ScanHeader::default(),
        }
    }

    /// Reads SOI and the header segments up to and including the first SOS.
    pub fn read_header(&mut self) -> Result<(), JpegLsError> {
        let code = self.read_next_marker_code()?;
        if code != JpegMarkerCode::StartOfImage as u8 {
            return Err(JpegLsError::StartOfImageMarkerNotFound);
        }
        self.read_next_start_of_scan()
    }

    /// Reads the segments between two scans up to and including the next SOS.
    pub fn read_next_start_of_scan(&mut self) -> Result<(), JpegLsError> {
        loop {
            let code = self.read_next_marker_code()?;
            trace!("marker 0xFF{code:02X} at offset {}", self.position - 2);

            match MarkerClass::from_byte(code)? {
                MarkerClass::Known(JpegMarkerCode::StartOfImage) => {
                    return Err(JpegLsError::DuplicateStartOfImageMarker);
                }
                MarkerClass::Known(JpegMarkerCode::EndOfImage) => {
                    return Err(JpegLsError::UnexpectedEndOfImageMarker);
                }
                MarkerClass::Known(JpegMarkerCode::StartOfFrameJpegls) => {
                    if self.frame_info.is_some() {
                        return Err(JpegLsError::DuplicateStartOfFrameMarker);
                    }
                    self.read_start_of_frame_segment()?;
                }
                MarkerClass::Known(JpegMarkerCode::JpeglsPresetParameters) => {
                    self.read_preset_parameters_segment()?;
                }
                MarkerClass::Known(JpegMarkerCode::DefineRestartInterval) => {
                    self.read_define_restart_interval_segment()?;
                }
                MarkerClass::Known(JpegMarkerCode::ApplicationData0) => {
                    self.read_application_data0_segment()?;
                }
                MarkerClass::Known(JpegMarkerCode::ApplicationData8)
                | MarkerClass::Known(JpegMarkerCode::Comment)
                | MarkerClass::ApplicationData(_) => {
                    self.read_segment()?;
                }
                MarkerClass::Known(JpegMarkerCode::DefineNumberOfLines) => {
                    return Err(JpegLsError::ParameterValueNotSupported);
                }
                MarkerClass::Known(JpegMarkerCode::StartOfScan) => {
                    if self.frame_info.is_none() {
                        return Err(JpegLsError::StartOfFrameMarkerNotFound);
                    }
                    return self.read_start_of_scan_segment();
                }
                MarkerClass::Restart(_) => return Err(JpegLsError::UnknownJpegMarkerFound),
                MarkerClass::OtherStartOfFrame(_) => return Err(JpegLsError::EncodingNotSupported),
            }
        }
    }

    /// Expects the EOI marker after the last scan.
    pub fn read_end_of_image(&mut self) -> Result<(), JpegLsError> {
        let code = self.read_next_marker_code()?;
        if code != JpegMarkerCode::EndOfImage as u8 {
            return Err(JpegLsError::InvalidEncodedData);
        }
        Ok(())
    }

    pub fn frame_info(&self) -> Result<FrameInfo, JpegLsError> {
        self.frame_info.ok_or(JpegLsError::StartOfFrameMarkerNotFound)
    }

    pub fn scan_header(&self) -> &ScanHeader {
        &self.scan_header
    }

    /// The LSE type 1 values as stored in the stream, zero when absent.
    pub fn preset_coding_parameters(&self) -> JpeglsPresetCodingParameters {
        self.preset_coding_parameters
    }

    /// The preset coding parameters with the defaults filled in.
    pub fn validated_preset_coding_parameters(&self) -> Result<JpeglsPresetCodingParameters, JpegLsError> {
        let frame_info = self.frame_info()?;
        is_valid(
            &self.preset_coding_parameters,
            frame_info.maximum_sample_value(),
            self.scan_header.near_lossless,
        )
        .ok_or(JpegLsError::ParameterValueNotSupported)
    }

    pub fn restart_interval(&self) -> u32 {
        self.restart_interval
    }

    /// JFIF header values; the thumbnail pointer is always null.
    pub fn jfif(&self) -> JfifParameters {
        self.jfif
    }

    pub fn remaining_data(&self) -> &'a [u8] {
        &self.source[self.position.min(self.source.len())..]
    }

    pub fn advance(&mut self, count: usize) {
        self.position += count;
    }

    fn read_u8(&mut self) -> Result<u8, JpegLsError> {
        let value = *self.source.get(self.position).ok_or(JpegLsError::SourceBufferTooSmall)?;
        self.position += 1;
        Ok(value)
    }

    fn read_u16(&mut self) -> Result<u16, JpegLsError> {
        let high = self.read_u8()?;
        let low = self.read_u8()?;
        Ok(u16::from_be_bytes([high, low]))
    }

    fn read_next_marker_code(&mut self) -> Result<u8, JpegLsError> {
        if self.read_u8()? != JPEG_MARKER_START_BYTE {
            return Err(JpegLsError::JpegMarkerStartByteNotFound);
        }

        // Any number of fill bytes may precede the marker code.
        let mut code = self.read_u8()?;
        while code == JPEG_MARKER_START_BYTE {
            code = self.read_u8()?;
        }
        Ok(code)
    }

    /// Reads the length field and returns the segment data that follows it.
    fn read_segment(&mut self) -> Result<&'a [u8], JpegLsError> {
        let size = self.read_u16()? as usize;
        if size < SEGMENT_LENGTH_SIZE {
            return Err(JpegLsError::InvalidMarkerSegmentSize);
        }

        let end = self.position + size - SEGMENT_LENGTH_SIZE;
        let data = self
            .source
            .get(self.position..end)
            .ok_or(JpegLsError::SourceBufferTooSmall)?;
        self.position = end;
        Ok(data)
    }

    fn read_start_of_frame_segment(&mut self) -> Result<(), JpegLsError> {
        let data = self.read_segment()?;
        if data.len() < 6 {
            return Err(JpegLsError::InvalidMarkerSegmentSize);
        }

        let bits_per_sample = i32::from(data[0]);
        let height = be_u16(data, 1);
        let width = be_u16(data, 3);
        let component_count = data[5] as usize;

        if !(2..=16).contains(&bits_per_sample) {
            return Err(JpegLsError::InvalidParameterBitsPerSample);
        }
        // A zero height announces a DNL segment, which is not supported.
        if height == 0 || width == 0 {
            return Err(JpegLsError::ParameterValueNotSupported);
        }
        if component_count == 0 {
            return Err(JpegLsError::InvalidParameterComponentCount);
        }
        if data.len() != 6 + component_count * 3 {
            return Err(JpegLsError::InvalidMarkerSegmentSize);
        }

        self.component_ids = data[6..].chunks_exact(3).map(|component| component[0]).collect();
        self.frame_info = Some(FrameInfo {
            width: u32::from(width),
            height: u32::from(height),
            bits_per_sample,
            component_count: component_count as i32,
        });

        debug!(
            "SOF55: {width}x{height}, {bits_per_sample} bits, {component_count} component(s)"
        );
        Ok(())
    }

    fn read_preset_parameters_segment(&mut self) -> Result<(), JpegLsError> {
        let data = self.read_segment()?;
        let Some(&parameter_type) = data.first() else {
            return Err(JpegLsError::InvalidMarkerSegmentSize);
        };

        match parameter_type {
            1 => {
                if data.len() != PRESET_CODING_PARAMETERS_SEGMENT_SIZE {
                    return Err(JpegLsError::InvalidMarkerSegmentSize);
                }
                self.preset_coding_parameters = JpeglsPresetCodingParameters {
                    maximum_sample_value: i32::from(be_u16(data, 1)),
                    threshold1: i32::from(be_u16(data, 3)),
                    threshold2: i32::from(be_u16(data, 5)),
                    threshold3: i32::from(be_u16(data, 7)),
                    reset_value: i32::from(be_u16(data, 9)),
                };
                debug!("LSE preset coding parameters: {:?}", self.preset_coding_parameters);
                Ok(())
            }
            // Mapping tables and the oversize image dimension segment.
            2..=4 => Err(JpegLsError::ParameterValueNotSupported),
            // ISO/IEC 14495-2 extensions.
            5..=0x0D => Err(JpegLsError::JpeglsPresetExtendedParameterTypeNotSupported),
            _ => Err(JpegLsError::InvalidJpeglsPresetParameterType),
        }
    }

    fn read_define_restart_interval_segment(&mut self) -> Result<(), JpegLsError> {
        let data = self.read_segment()?;
        // ITU-T T.87 allows a 3 or 4 byte interval in addition to the 2 byte T.81 form.
        if !(2..=4).contains(&data.len()) {
            return Err(JpegLsError::InvalidMarkerSegmentSize);
        }

        self.restart_interval = data.iter().fold(0u32, |value, &byte| (value << 8) | u32::from(byte));
        debug!("DRI: restart interval {}", self.restart_interval);
        Ok(())
    }

    fn read_application_data0_segment(&mut self) -> Result<(), JpegLsError> {
        let data = self.read_segment()?;
        if data.len() < 14 || data[..5] != JFIF_IDENTIFIER {
            return Ok(());
        }

        self.jfif = JfifParameters {
            version: i32::from(be_u16(data, 5)),
            units: i32::from(data[7]),
            density_x: i32::from(be_u16(data, 8)),
            density_y: i32::from(be_u16(data, 10)),
            thumbnail_x: i32::from(data[12]),
            thumbnail_y: i32::from(data[13]),
            ..JfifParameters::default()
        };
        Ok(())
    }

    fn read_start_of_scan_segment(&mut self) -> Result<(), JpegLsError> {
        let frame_info = self.frame_info()?;
        let data = self.read_segment()?;
        let Some(&component_count) = data.first() else {
            return Err(JpegLsError::InvalidMarkerSegmentSize);
        };

        let component_count = component_count as usize;
        if component_count == 0 || component_count > frame_info.component_count as usize {
            return Err(JpegLsError::InvalidParameterComponentCount);
        }
        if data.len() != 1 + component_count * 2 + 3 {
            return Err(JpegLsError::InvalidMarkerSegmentSize);
        }

        let mut components = Vec::with_capacity(component_count);
        for selector in data[1..1 + component_count * 2].chunks_exact(2) {
            let index = self
                .component_ids
                .iter()
                .position(|&id| id == selector[0])
                .ok_or(JpegLsError::ParameterValueNotSupported)?;
            if selector[1] != 0 {
                // Mapping tables
                return Err(JpegLsError::ParameterValueNotSupported);
            }
            components.push(index);
        }

        let tail = &data[1 + component_count * 2..];
        let near_lossless = i32::from(tail[0]);
        let interleave_mode = InterleaveMode::try_from(tail[1])?;
        let point_transform = tail[2];

        if point_transform != 0 {
            return Err(JpegLsError::ParameterValueNotSupported);
        }
        if component_count > 1
            && (interleave_mode == InterleaveMode::None || component_count != frame_info.component_count as usize)
        {
            return Err(JpegLsError::ParameterValueNotSupported);
        }
        if interleave_mode == InterleaveMode::Sample && component_count > MAXIMUM_SAMPLE_INTERLEAVED_COMPONENTS {
            return Err(JpegLsError::ParameterValueNotSupported);
        }

        let maximum_sample_value = match self.preset_coding_parameters.maximum_sample_value {
            0 => frame_info.maximum_sample_value(),
            value => value,
        };
        if near_lossless > compute_maximum_near_lossless(maximum_sample_value) {
            return Err(JpegLsError::ParameterValueNotSupported);
        }

        debug!("SOS: components {components:?}, NEAR {near_lossless}, {interleave_mode:?}");
        self.scan_header = ScanHeader {
            components,
            near_lossless,
            interleave_mode,
        };
        Ok(())
    }
}

fn be_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    const START_OF_FRAME: [u8; 13] = [0xFF, 0xF7, 0, 11, 8, 0, 2, 0, 3, 1, 1, 0x11, 0];
    const START_OF_SCAN: [u8; 10] = [0xFF, 0xDA, 0, 8, 1, 1, 0, 0, 0, 0];

    fn stream(segments: &[&[u8]]) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        for segment in segments {
            data.extend_from_slice(segment);
        }
        data
    }

    fn read_header(data: &[u8]) -> Result<JpegStreamReader<'_>, JpegLsError> {
        let mut reader = JpegStreamReader::new(data);
        reader.read_header()?;
        Ok(reader)
    }

    #[test]
    fn minimal_header() {
        let data = stream(&[&START_OF_FRAME, &START_OF_SCAN]);
        let reader = read_header(&data).unwrap();
        let frame_info = reader.frame_info().unwrap();
        assert_eq!((frame_info.width, frame_info.height), (3, 2));
        assert_eq!(frame_info.bits_per_sample, 8);
        assert_eq!(reader.scan_header().components, vec![0]);
        assert!(reader.remaining_data().is_empty());
    }

    #[test]
    fn missing_start_byte() {
        assert_eq!(read_header(&[0x33, 0x33]).err(), Some(JpegLsError::JpegMarkerStartByteNotFound));
    }

    #[test]
    fn missing_start_of_image() {
        assert_eq!(read_header(&[0xFF, 0xD9]).err(), Some(JpegLsError::StartOfImageMarkerNotFound));
    }

    #[test]
    fn other_start_of_frame_is_not_supported() {
        let data = [0xFF, 0xD8, 0xFF, 0xC3, 0, 0];
        assert_eq!(read_header(&data).err(), Some(JpegLsError::EncodingNotSupported));
    }

    #[test]
    fn unknown_marker() {
        let data = [0xFF, 0xD8, 0xFF, 0x01, 0, 0];
        assert_eq!(read_header(&data).err(), Some(JpegLsError::UnknownJpegMarkerFound));
    }

    #[test]
    fn duplicate_markers() {
        let data = stream(&[&[0xFF, 0xD8]]);
        assert_eq!(read_header(&data).err(), Some(JpegLsError::DuplicateStartOfImageMarker));

        let data = stream(&[&START_OF_FRAME, &START_OF_FRAME]);
        assert_eq!(read_header(&data).err(), Some(JpegLsError::DuplicateStartOfFrameMarker));
    }

    #[test]
    fn early_end_of_image() {
        let data = stream(&[&[0xFF, 0xD9]]);
        assert_eq!(read_header(&data).err(), Some(JpegLsError::UnexpectedEndOfImageMarker));
    }

    #[test]
    fn start_of_scan_before_frame() {
        let data = stream(&[&START_OF_SCAN]);
        assert_eq!(read_header(&data).err(), Some(JpegLsError::StartOfFrameMarkerNotFound));
    }

    #[test]
    fn truncated_segment() {
        let data = stream(&[&START_OF_FRAME[..8]]);
        assert_eq!(read_header(&data).err(), Some(JpegLsError::SourceBufferTooSmall));
    }

    #[test]
    fn bad_frame_values() {
        let mut frame = START_OF_FRAME;
        frame[4] = 17;
        assert_eq!(
            read_header(&stream(&[&frame])).err(),
            Some(JpegLsError::InvalidParameterBitsPerSample)
        );

        let mut frame = START_OF_FRAME;
        frame[9] = 2;
        assert_eq!(
            read_header(&stream(&[&frame])).err(),
            Some(JpegLsError::InvalidMarkerSegmentSize)
        );

        let mut frame = START_OF_FRAME;
        frame[5] = 0;
        frame[6] = 0;
        assert_eq!(
            read_header(&stream(&[&frame])).err(),
            Some(JpegLsError::ParameterValueNotSupported)
        );
    }

    #[test]
    fn preset_parameter_types() {
        let preset = [0xFF, 0xF8, 0, 13, 1, 0, 255, 0, 3, 0, 7, 0, 21, 0, 64];
        let data = stream(&[&START_OF_FRAME, &preset, &START_OF_SCAN]);
        let reader = read_header(&data).unwrap();
        assert_eq!(reader.preset_coding_parameters().threshold3, 21);

        for (parameter_type, error) in [
            (2, JpegLsError::ParameterValueNotSupported),
            (5, JpegLsError::JpeglsPresetExtendedParameterTypeNotSupported),
            (0x20, JpegLsError::InvalidJpeglsPresetParameterType),
        ] {
            let segment = [0xFF, 0xF8, 0, 3, parameter_type];
            assert_eq!(read_header(&stream(&[&START_OF_FRAME, &segment])).err(), Some(error));
        }
    }

    #[test]
    fn comments_and_application_data_are_skipped() {
        let comment = [0xFF, 0xFE, 0, 5, b'a', b'b', b'c'];
        let application_data = [0xFF, 0xE3, 0, 2];
        let data = stream(&[&comment, &application_data, &START_OF_FRAME, &START_OF_SCAN]);
        assert!(read_header(&data).is_ok());
    }

    #[test]
    fn jfif_and_restart_interval() {
        let jfif = [
            0xFF, 0xE0, 0, 16, b'J', b'F', b'I', b'F', 0, 1, 2, 1, 0, 72, 0, 96, 0, 0,
        ];
        let restart = [0xFF, 0xDD, 0, 4, 0, 10];
        let data = stream(&[&jfif, &START_OF_FRAME, &restart, &START_OF_SCAN]);
        let reader = read_header(&data).unwrap();
        assert_eq!(reader.restart_interval(), 10);
        let parsed = reader.jfif();
        assert_eq!((parsed.version, parsed.units, parsed.density_x, parsed.density_y), (0x102, 1, 72, 96));
    }

    #[test]
    fn bad_scan_values() {
        let mut scan = START_OF_SCAN;
        scan[8] = 3;
        assert_eq!(
            read_header(&stream(&[&START_OF_FRAME, &scan])).err(),
            Some(JpegLsError::InvalidParameterInterleaveMode)
        );

        let mut scan = START_OF_SCAN;
        scan[7] = 200;
        assert_eq!(
            read_header(&stream(&[&START_OF_FRAME, &scan])).err(),
            Some(JpegLsError::ParameterValueNotSupported)
        );
    }
}
