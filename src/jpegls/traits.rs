//! Sample arithmetic shared by the scan encoder and decoder.

use crate::jpegls::coding_parameters::compute_limit_parameter;
use crate::parameters::JpeglsPresetCodingParameters;

/// The derived values of ISO/IEC 14495-1, A.2.1 for one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Traits {
    pub maximum_sample_value: i32,
    pub near_lossless: i32,
    pub range: i32,
    pub quantized_bits_per_sample: i32,
    pub bits_per_sample: i32,
    pub limit: i32,
    pub reset_threshold: i32,
}

impl Traits {
    pub fn new(maximum_sample_value: i32, near_lossless: i32, reset_threshold: i32) -> Self {
        let range = compute_range_parameter(maximum_sample_value, near_lossless);
        let bits_per_sample = log2_ceiling(maximum_sample_value);
        Self {
            maximum_sample_value,
            near_lossless,
            range,
            quantized_bits_per_sample: log2_ceiling(range),
            bits_per_sample,
            limit: compute_limit_parameter(bits_per_sample),
            reset_threshold,
        }
    }

    pub fn is_near(&self, lhs: i32, rhs: i32) -> bool {
        (lhs - rhs).abs() <= self.near_lossless
    }

    pub fn compute_error_value(&self, e: i32) -> i32 {
        self.modulo_range(self.quantize(e))
    }

    pub fn compute_reconstructed_sample(&self, predicted_value: i32, error_value: i32) -> i32 {
        self.fix_reconstructed_value(predicted_value + self.dequantize(error_value))
    }

    pub fn correct_prediction(&self, predicted: i32) -> i32 {
        predicted.clamp(0, self.maximum_sample_value)
    }

    // Code segment A.9
    pub fn modulo_range(&self, mut error_value: i32) -> i32 {
        if error_value < 0 {
            error_value += self.range;
        }
        if error_value >= (self.range + 1) / 2 {
            error_value -= self.range;
        }
        error_value
    }

    fn quantize(&self, error_value: i32) -> i32 {
        if error_value > 0 {
            (error_value + self.near_lossless) / (2 * self.near_lossless + 1)
        } else {
            -(self.near_lossless - error_value) / (2 * self.near_lossless + 1)
        }
    }

    fn dequantize(&self, error_value: i32) -> i32 {
        error_value * (2 * self.near_lossless + 1)
    }

    fn fix_reconstructed_value(&self, mut value: i32) -> i32 {
        if value < -self.near_lossless {
            value += self.range * (2 * self.near_lossless + 1);
        } else if value > self.maximum_sample_value + self.near_lossless {
            value -= self.range * (2 * self.near_lossless + 1);
        }
        self.correct_prediction(value)
    }
}

/// RANGE as defined in ISO/IEC 14495-1, A.2.1.
pub fn compute_range_parameter(maximum_sample_value: i32, near_lossless: i32) -> i32 {
    (maximum_sample_value + 2 * near_lossless) / (2 * near_lossless + 1) + 1
}

/// The smallest `x` with `n <= 2^x`.
pub fn log2_ceiling(n: i32) -> i32 {
    let mut x = 0;
    while n > (1 << x) {
        x += 1;
    }
    x
}

/// -1 for negative values, 0 otherwise.
pub fn bit_wise_sign(i: i32) -> i32 {
    i >> 31
}

/// -1 for negative values, 1 otherwise.
pub fn sign(n: i32) -> i32 {
    (n >> 31) | 1
}

/// Negates `i` when `sign` is -1 (as returned by [`bit_wise_sign`]).
pub fn apply_sign(i: i32, sign: i32) -> i32 {
    (sign ^ i) - sign
}

// Code segment A.11 folded into a branch free mapping.
pub fn map_error_value(error_value: i32) -> i32 {
    (error_value >> 30) ^ (2 * error_value)
}

pub fn unmap_error_value(mapped_error_value: i32) -> i32 {
    let sign = -(mapped_error_value & 1);
    sign ^ (mapped_error_value >> 1)
}

/// Median edge detector, ISO/IEC 14495-1, A.4.1.
pub fn compute_predicted_value(ra: i32, rb: i32, rc: i32) -> i32 {
    if ra < rb {
        if rc < ra {
            return rb;
        }
        if rc > rb {
            return ra;
        }
    } else {
        if rc < rb {
            return ra;
        }
        if rc > ra {
            return rb;
        }
    }
    ra + rb - rc
}

/// Maps a local gradient to one of the 9 regions of ISO/IEC 14495-1, A.3.3.
pub fn quantize_gradient(di: i32, near_lossless: i32, pc: &JpeglsPresetCodingParameters) -> i32 {
    if di <= -pc.threshold3 {
        return -4;
    }
    if di <= -pc.threshold2 {
        return -3;
    }
    if di <= -pc.threshold1 {
        return -2;
    }
    if di < -near_lossless {
        return -1;
    }
    if di <= near_lossless {
        return 0;
    }
    if di < pc.threshold1 {
        return 1;
    }
    if di < pc.threshold2 {
        return 2;
    }
    if di < pc.threshold3 {
        return 3;
    }
    4
}

pub fn compute_context_id(q1: i32, q2: i32, q3: i32) -> i32 {
    (q1 * 9 + q2) * 9 + q3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lossless_8_bit_traits() {
        let traits = Traits::new(255, 0, 64);
        assert_eq!(traits.range, 256);
        assert_eq!(traits.quantized_bits_per_sample, 8);
        assert_eq!(traits.bits_per_sample, 8);
        assert_eq!(traits.limit, 32);
    }

    #[test]
    fn near_lossless_traits() {
        let traits = Traits::new(255, 3, 64);
        assert_eq!(traits.range, 38);
        assert_eq!(traits.quantized_bits_per_sample, 6);
        assert_eq!(traits.compute_error_value(10), 1);
        assert_eq!(traits.compute_error_value(-10), -1);
        assert_eq!(traits.compute_reconstructed_sample(100, 1), 107);
    }

    #[test]
    fn error_mapping_is_invertible() {
        for e in -300..300 {
            assert_eq!(unmap_error_value(map_error_value(e)), e);
        }
        assert_eq!(map_error_value(0), 0);
        assert_eq!(map_error_value(-1), 1);
        assert_eq!(map_error_value(1), 2);
    }

    #[test]
    fn signs() {
        assert_eq!(bit_wise_sign(-5), -1);
        assert_eq!(bit_wise_sign(0), 0);
        assert_eq!(sign(0), 1);
        assert_eq!(sign(-3), -1);
        assert_eq!(apply_sign(7, -1), -7);
        assert_eq!(apply_sign(7, 0), 7);
    }

    #[test]
    fn median_predictor() {
        assert_eq!(compute_predicted_value(10, 20, 5), 20);
        assert_eq!(compute_predicted_value(10, 20, 25), 10);
        assert_eq!(compute_predicted_value(10, 20, 15), 15);
        assert_eq!(compute_predicted_value(20, 10, 25), 10);
    }

    #[test]
    fn gradient_regions() {
        let pc = crate::jpegls::coding_parameters::compute_default(255, 0);
        let regions: Vec<i32> = [-21, -7, -3, -1, 0, 1, 3, 7, 21]
            .into_iter()
            .map(|d| quantize_gradient(d, 0, &pc))
            .collect();
        assert_eq!(regions, [-4, -3, -2, -1, 0, 1, 2, 3, 4]);
        assert_eq!(compute_context_id(4, 4, 4), 364);
    }

    #[test]
    fn reconstruction_wraps_modulo_range() {
        let traits = Traits::new(255, 0, 64);
        assert_eq!(traits.compute_error_value(255), -1);
        assert_eq!(traits.compute_reconstructed_sample(0, -1), 255);
        assert_eq!(traits.compute_reconstructed_sample(255, 1), 0);
    }
}
