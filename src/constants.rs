pub const DEFAULT_RESET_THRESHOLD: i32 = 64; // Default RESET value as defined in ISO/IEC 14495-1, table C.2

pub const MINIMUM_WIDTH: i32 = 1;
pub const MAXIMUM_WIDTH: i32 = u16::MAX as i32;
pub const MINIMUM_HEIGHT: i32 = 1;
pub const MAXIMUM_HEIGHT: i32 = u16::MAX as i32;
pub const MINIMUM_COMPONENT_COUNT: i32 = 1;
pub const MAXIMUM_COMPONENT_COUNT: i32 = 255;
pub const MINIMUM_BITS_PER_SAMPLE: i32 = 2;
pub const MAXIMUM_BITS_PER_SAMPLE: i32 = 16;
pub const MAXIMUM_NEAR_LOSSLESS: i32 = 255;

pub const MAX_K_VALUE: i32 = 16; // This is an implementation limit (theoretical limit is 32)

// Number of regular mode contexts, ISO/IEC 14495-1, A.3.3.
pub const REGULAR_MODE_CONTEXT_COUNT: usize = 365;

// Error values decoded in regular mode can't exceed the 16 bit sample range.
pub const MAXIMUM_ERROR_VALUE: i32 = u16::MAX as i32;

// Size of the preset coding parameters (LSE type 1) segment, excluding the length field.
pub const PRESET_CODING_PARAMETERS_SEGMENT_SIZE: usize = 11;

// JFIF APP0 segment: identifier, version, units, densities and thumbnail size.
pub const JFIF_IDENTIFIER: [u8; 5] = *b"JFIF\0";
pub const JFIF_SEGMENT_FIXED_SIZE: usize = 2 + 5 + 2 + 1 + 2 + 2 + 1 + 1;

// The size in bytes of the segment length field.
pub const SEGMENT_LENGTH_SIZE: usize = 2;

// The maximum size of the data bytes that fit in a segment.
pub const SEGMENT_MAX_DATA_SIZE: usize = u16::MAX as usize - SEGMENT_LENGTH_SIZE;

// Run length order table, ISO/IEC 14495-1, A.7.1.2.
pub const J: [i32; 32] = [
    0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 9, 10, 11, 12, 13, 14, 15,
];
