use crate::constants::DEFAULT_RESET_THRESHOLD;
use crate::jpegls::FrameInfo;
use crate::parameters::{InterleaveMode, JpeglsPresetCodingParameters};
use std::cmp::{max, min};

/// Scan level coding parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodingParameters {
    pub near_lossless: i32,
    pub restart_interval: u32,
    pub interleave_mode: InterleaveMode,
}

/// How the samples of one scan are arranged in the scan line buffers.
///
/// Every line has one extra sample (or pixel) on both sides for the edge
/// values used by the predictor. In line interleaved mode an image row is made
/// of one line per component, in sample interleaved mode one line holds whole
/// pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanLayout {
    pub width: usize,
    pub height: usize,
    pub component_count: usize,
    pub component_lines: usize,
    pub pixel_size: usize,
}

impl ScanLayout {
    pub fn new(frame_info: &FrameInfo, component_count: usize, interleave_mode: InterleaveMode) -> Self {
        let (component_lines, pixel_size) = match interleave_mode {
            InterleaveMode::None => (1, 1),
            InterleaveMode::Line => (component_count, 1),
            InterleaveMode::Sample => (1, component_count),
        };
        Self {
            width: frame_info.width as usize,
            height: frame_info.height as usize,
            component_count,
            component_lines,
            pixel_size,
        }
    }

    pub fn line_length(&self) -> usize {
        (self.width + 2) * self.pixel_size
    }

    pub fn row_length(&self) -> usize {
        self.line_length() * self.component_lines
    }

    /// Samples in one row of pixel interleaved scan data.
    pub fn samples_per_row(&self) -> usize {
        self.width * self.component_count
    }

    pub fn copy_to_line_buffer(&self, row: &[i32], lines: &mut [i32]) {
        for (x, pixel) in row.chunks_exact(self.component_count).enumerate() {
            for (c, &sample) in pixel.iter().enumerate() {
                lines[self.line_index(x, c)] = sample;
            }
        }
    }

    pub fn copy_from_line_buffer(&self, lines: &[i32], row: &mut [i32]) {
        for (x, pixel) in row.chunks_exact_mut(self.component_count).enumerate() {
            for (c, sample) in pixel.iter_mut().enumerate() {
                *sample = lines[self.line_index(x, c)];
            }
        }
    }

    /// Sets the left edge of `current` and the right edge of `previous`.
    pub fn initialize_edges(&self, previous: &mut [i32], current: &mut [i32]) {
        let pixel_size = self.pixel_size;
        for s in 0..pixel_size {
            previous[(self.width + 1) * pixel_size + s] = previous[self.width * pixel_size + s];
            current[s] = previous[pixel_size + s];
        }
    }

    fn line_index(&self, x: usize, component: usize) -> usize {
        if self.component_lines > 1 {
            component * self.line_length() + x + 1
        } else {
            (x + 1) * self.pixel_size + component
        }
    }
}

// Clamping function as defined by ISO/IEC 14495-1, Figure C.3
const fn clamp(i: i32, j: i32, maximum_sample_value: i32) -> i32 {
    if i > maximum_sample_value || i < j {
        j
    } else {
        i
    }
}

pub fn compute_maximum_near_lossless(maximum_sample_value: i32) -> i32 {
    min(255, maximum_sample_value / 2)
}

// Default coding threshold values as defined by ISO/IEC 14495-1, C.2.4.1.1.1
pub fn compute_default(maximum_sample_value: i32, near_lossless: i32) -> JpeglsPresetCodingParameters {
    debug_assert!(maximum_sample_value <= u16::MAX as i32);

    // Default threshold values for JPEG-LS statistical modeling as defined in ISO/IEC 14495-1, table C.3
    // for the case MAXVAL = 255 and NEAR = 0.
    const DEFAULT_THRESHOLD1: i32 = 3; // BASIC_T1
    const DEFAULT_THRESHOLD2: i32 = 7; // BASIC_T2
    const DEFAULT_THRESHOLD3: i32 = 21; // BASIC_T3

    if maximum_sample_value >= 128 {
        let factor = (min(maximum_sample_value, 4095) + 128) / 256;
        let threshold1 = clamp(
            factor * (DEFAULT_THRESHOLD1 - 2) + 2 + 3 * near_lossless,
            near_lossless + 1,
            maximum_sample_value,
        );
        let threshold2 = clamp(
            factor * (DEFAULT_THRESHOLD2 - 3) + 3 + 5 * near_lossless,
            threshold1,
            maximum_sample_value,
        );

        JpeglsPresetCodingParameters {
            maximum_sample_value,
            threshold1,
            threshold2,
            threshold3: clamp(
                factor * (DEFAULT_THRESHOLD3 - 4) + 4 + 7 * near_lossless,
                threshold2,
                maximum_sample_value,
            ),
            reset_value: DEFAULT_RESET_THRESHOLD,
        }
    } else {
        let factor = 256 / (maximum_sample_value + 1);
        let threshold1 = clamp(
            max(2, DEFAULT_THRESHOLD1 / factor + 3 * near_lossless),
            near_lossless + 1,
            maximum_sample_value,
        );
        let threshold2 = clamp(
            max(3, DEFAULT_THRESHOLD2 / factor + 5 * near_lossless),
            threshold1,
            maximum_sample_value,
        );

        JpeglsPresetCodingParameters {
            maximum_sample_value,
            threshold1,
            threshold2,
            threshold3: clamp(
                max(4, DEFAULT_THRESHOLD3 / factor + 7 * near_lossless),
                threshold2,
                maximum_sample_value,
            ),
            reset_value: DEFAULT_RESET_THRESHOLD,
        }
    }
}

/// True when the parameters are all zero or equal to `defaults`.
pub fn is_default(
    preset_coding_parameters: &JpeglsPresetCodingParameters,
    defaults: &JpeglsPresetCodingParameters,
) -> bool {
    *preset_coding_parameters == JpeglsPresetCodingParameters::default()
        || preset_coding_parameters == defaults
}

/// Checks the preset coding parameters against table C.1 and fills in the
/// defaults for the zero fields. `None` when a value is out of range.
pub fn is_valid(
    pc_parameters: &JpeglsPresetCodingParameters,
    maximum_component_value: i32,
    near_lossless: i32,
) -> Option<JpeglsPresetCodingParameters> {
    // ISO/IEC 14495-1, C.2.4.1.1, Table C.1 defines the valid JPEG-LS preset coding parameters values.
    if pc_parameters.maximum_sample_value != 0
        && (pc_parameters.maximum_sample_value < 1 || pc_parameters.maximum_sample_value > maximum_component_value)
    {
        return None;
    }

    let maximum_sample_value = if pc_parameters.maximum_sample_value != 0 {
        pc_parameters.maximum_sample_value
    } else {
        maximum_component_value
    };

    if pc_parameters.threshold1 != 0
        && (pc_parameters.threshold1 < near_lossless + 1 || pc_parameters.threshold1 > maximum_sample_value)
    {
        return None;
    }

    let defaults = compute_default(maximum_sample_value, near_lossless);

    let threshold1 = if pc_parameters.threshold1 != 0 {
        pc_parameters.threshold1
    } else {
        defaults.threshold1
    };

    if pc_parameters.threshold2 != 0
        && (pc_parameters.threshold2 < threshold1 || pc_parameters.threshold2 > maximum_sample_value)
    {
        return None;
    }

    let threshold2 = if pc_parameters.threshold2 != 0 {
        pc_parameters.threshold2
    } else {
        defaults.threshold2
    };

    if pc_parameters.threshold3 != 0
        && (pc_parameters.threshold3 < threshold2 || pc_parameters.threshold3 > maximum_sample_value)
    {
        return None;
    }

    if pc_parameters.reset_value != 0
        && (pc_parameters.reset_value < 3 || pc_parameters.reset_value > max(255, maximum_sample_value))
    {
        return None;
    }

    Some(JpeglsPresetCodingParameters {
        maximum_sample_value,
        threshold1,
        threshold2,
        threshold3: if pc_parameters.threshold3 != 0 {
            pc_parameters.threshold3
        } else {
            defaults.threshold3
        },
        reset_value: if pc_parameters.reset_value != 0 {
            pc_parameters.reset_value
        } else {
            defaults.reset_value
        },
    })
}

/// LIMIT as defined in ISO/IEC 14495-1, A.2.1.
pub fn compute_limit_parameter(bits_per_sample: i32) -> i32 {
    2 * (bits_per_sample + max(8, bits_per_sample))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_for_8_bit_lossless() {
        let defaults = compute_default(255, 0);
        assert_eq!(
            defaults,
            JpeglsPresetCodingParameters {
                maximum_sample_value: 255,
                threshold1: 3,
                threshold2: 7,
                threshold3: 21,
                reset_value: 64,
            }
        );
    }

    #[test]
    fn defaults_for_16_bit_and_low_bit_depths() {
        let defaults = compute_default(65535, 0);
        assert_eq!((defaults.threshold1, defaults.threshold2, defaults.threshold3), (18, 67, 276));

        let defaults = compute_default(3, 0);
        assert_eq!((defaults.threshold1, defaults.threshold2, defaults.threshold3), (2, 3, 3));
    }

    #[test]
    fn zero_parameters_are_default() {
        let defaults = compute_default(255, 0);
        assert!(is_default(&JpeglsPresetCodingParameters::default(), &defaults));
        assert!(is_default(&defaults, &defaults));
        let custom = JpeglsPresetCodingParameters {
            threshold1: 4,
            ..defaults
        };
        assert!(!is_default(&custom, &defaults));
    }

    #[test]
    fn validation_fills_in_defaults_and_rejects_out_of_range_values() {
        let partial = JpeglsPresetCodingParameters {
            threshold2: 9,
            ..Default::default()
        };
        let validated = is_valid(&partial, 255, 0).unwrap();
        assert_eq!(validated.threshold1, 3);
        assert_eq!(validated.threshold2, 9);
        assert_eq!(validated.threshold3, 21);

        let bad = JpeglsPresetCodingParameters {
            threshold1: 300,
            ..Default::default()
        };
        assert_eq!(is_valid(&bad, 255, 0), None);

        let bad = JpeglsPresetCodingParameters {
            reset_value: 2,
            ..Default::default()
        };
        assert_eq!(is_valid(&bad, 255, 0), None);
    }

    #[test]
    fn line_interleaved_rows_are_split_per_component() {
        let frame_info = FrameInfo {
            width: 2,
            height: 1,
            bits_per_sample: 8,
            component_count: 3,
        };
        let layout = ScanLayout::new(&frame_info, 3, InterleaveMode::Line);
        assert_eq!(layout.row_length(), 12);

        let row = [1, 2, 3, 4, 5, 6];
        let mut lines = vec![0; layout.row_length()];
        layout.copy_to_line_buffer(&row, &mut lines);
        assert_eq!(lines, [0, 1, 4, 0, 0, 2, 5, 0, 0, 3, 6, 0]);

        let mut back = [0; 6];
        layout.copy_from_line_buffer(&lines, &mut back);
        assert_eq!(back, row);
    }

    #[test]
    fn sample_interleaved_lines_hold_whole_pixels() {
        let frame_info = FrameInfo {
            width: 2,
            height: 1,
            bits_per_sample: 8,
            component_count: 3,
        };
        let layout = ScanLayout::new(&frame_info, 3, InterleaveMode::Sample);
        let mut lines = vec![0; layout.row_length()];
        layout.copy_to_line_buffer(&[1, 2, 3, 4, 5, 6], &mut lines);
        assert_eq!(lines, [0, 0, 0, 1, 2, 3, 4, 5, 6, 0, 0, 0]);

        let mut previous = lines.clone();
        let mut current = vec![0; layout.row_length()];
        layout.initialize_edges(&mut previous, &mut current);
        assert_eq!(&previous[9..], &[4, 5, 6]);
        assert_eq!(&current[..3], &[1, 2, 3]);
    }

    #[test]
    fn limit() {
        assert_eq!(compute_limit_parameter(8), 32);
        assert_eq!(compute_limit_parameter(16), 64);
        assert_eq!(compute_limit_parameter(2), 20);
    }
}
