use crate::error::JpegLsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JpegMarkerCode {
    /// SOI: Marks the start of an image.
    StartOfImage = 0xD8,

    /// EOI: Marks the end of an image.
    EndOfImage = 0xD9,

    /// SOS: Marks the start of scan.
    StartOfScan = 0xDA,

    /// DNL: Defines the number of lines in a scan.
    DefineNumberOfLines = 0xDC,

    /// DRI: Defines the restart interval used in succeeding scans.
    DefineRestartInterval = 0xDD,

    /// APP0: Application data 0: used for JFIF header.
    ApplicationData0 = 0xE0,
    /// APP8: Application data 8: used for HP color-transformation info or SPIFF header.
    ApplicationData8 = 0xE8,

    /// COM: Comment block.
    Comment = 0xFE,

    // The following markers are defined in ISO/IEC 14495-1 | ITU T.87. (JPEG-LS standard)
    /// SOF_55: Marks the start of a JPEG-LS encoded frame.
    StartOfFrameJpegls = 0xF7,

    /// LSE: Marks the start of a JPEG-LS preset parameters segment.
    JpeglsPresetParameters = 0xF8,
}

/// How the stream reader has to treat a marker byte that follows 0xFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerClass {
    /// A marker the JPEG-LS grammar knows.
    Known(JpegMarkerCode),
    /// APP1..APP15: skipped like APP0 and APP8.
    ApplicationData(u8),
    /// RST0..RST7 with its index.
    Restart(u8),
    /// A start of frame marker of another JPEG coding process (SOF0..SOF15, SOF57).
    OtherStartOfFrame(u8),
}

impl MarkerClass {
    pub fn from_byte(v: u8) -> Result<Self, JpegLsError> {
        if let Ok(code) = JpegMarkerCode::try_from(v) {
            return Ok(Self::Known(code));
        }

        match v {
            0xD0..=0xD7 => Ok(Self::Restart(v - JPEG_RESTART_MARKER_BASE)),
            0xE1..=0xEF => Ok(Self::ApplicationData(v)),
            // DHT (C4), JPG (C8) and DAC (CC) share the SOFn range but are not frames.
            0xC0..=0xCF if v != 0xC4 && v != 0xC8 && v != 0xCC => Ok(Self::OtherStartOfFrame(v)),
            0xF9 => Ok(Self::OtherStartOfFrame(v)),
            _ => Err(JpegLsError::UnknownJpegMarkerFound),
        }
    }
}

impl std::convert::TryFrom<u8> for JpegMarkerCode {
    type Error = JpegLsError;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0xD8 => Ok(Self::StartOfImage),
            0xD9 => Ok(Self::EndOfImage),
            0xDA => Ok(Self::StartOfScan),
            0xDC => Ok(Self::DefineNumberOfLines),
            0xDD => Ok(Self::DefineRestartInterval),
            0xE0 => Ok(Self::ApplicationData0),
            0xE8 => Ok(Self::ApplicationData8),
            0xFE => Ok(Self::Comment),
            0xF7 => Ok(Self::StartOfFrameJpegls),
            0xF8 => Ok(Self::JpeglsPresetParameters),
            _ => Err(JpegLsError::UnknownJpegMarkerFound),
        }
    }
}

pub const JPEG_MARKER_START_BYTE: u8 = 0xFF;
pub const JPEG_RESTART_MARKER_BASE: u8 = 0xD0;
pub const JPEG_RESTART_MARKER_RANGE: u8 = 8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_marker_bytes() {
        assert_eq!(
            MarkerClass::from_byte(0xF7),
            Ok(MarkerClass::Known(JpegMarkerCode::StartOfFrameJpegls))
        );
        assert_eq!(MarkerClass::from_byte(0xD3), Ok(MarkerClass::Restart(3)));
        assert_eq!(MarkerClass::from_byte(0xC3), Ok(MarkerClass::OtherStartOfFrame(0xC3)));
        assert_eq!(MarkerClass::from_byte(0xEE), Ok(MarkerClass::ApplicationData(0xEE)));
        assert_eq!(MarkerClass::from_byte(0xC4), Err(JpegLsError::UnknownJpegMarkerFound));
        assert_eq!(MarkerClass::from_byte(0x01), Err(JpegLsError::UnknownJpegMarkerFound));
    }
}
