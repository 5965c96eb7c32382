use crate::constants::MAX_K_VALUE;
use crate::error::JpegLsError;
use crate::jpegls::traits::bit_wise_sign;

/// The A, B, C and N variables of one regular mode context (ISO/IEC 14495-1, A.2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegularModeContext {
    a: i32,
    b: i32,
    c: i32,
    n: i32,
}

impl RegularModeContext {
    pub fn new(range: i32) -> Self {
        Self {
            a: initialization_value_for_a(range),
            b: 0,
            c: 0,
            n: 1,
        }
    }

    pub fn c(&self) -> i32 {
        self.c
    }

    /// -1 when the error value has to be inverted for k == 0 (code segment A.11), 0 otherwise.
    pub fn get_error_correction(&self, k: i32) -> i32 {
        if k != 0 {
            return 0;
        }
        bit_wise_sign(2 * self.b + self.n - 1)
    }

    // Code segment A.12 and A.13
    pub fn update_variables_and_bias(
        &mut self,
        error_value: i32,
        near_lossless: i32,
        reset_threshold: i32,
    ) -> Result<(), JpegLsError> {
        debug_assert!(self.n != 0);

        self.a += error_value.abs();
        self.b += error_value * (2 * near_lossless + 1);

        const LIMIT: i32 = 65536 * 256;
        if self.a >= LIMIT || self.b.abs() >= LIMIT {
            return Err(JpegLsError::InvalidEncodedData);
        }

        if self.n == reset_threshold {
            self.a >>= 1;
            self.b >>= 1;
            self.n >>= 1;
        }

        self.n += 1;

        const MAX_C: i32 = 127;
        const MIN_C: i32 = -128;

        if self.b + self.n <= 0 {
            self.b += self.n;
            if self.b <= -self.n {
                self.b = -self.n + 1;
            }
            if self.c > MIN_C {
                self.c -= 1;
            }
        } else if self.b > 0 {
            self.b -= self.n;
            if self.b > 0 {
                self.b = 0;
            }
            if self.c < MAX_C {
                self.c += 1;
            }
        }
        Ok(())
    }

    // Code segment A.10
    pub fn compute_golomb_coding_parameter(&self) -> Result<i32, JpegLsError> {
        let mut k = 0;
        while (self.n << k) < self.a && k < MAX_K_VALUE {
            k += 1;
        }

        if k == MAX_K_VALUE {
            return Err(JpegLsError::InvalidEncodedData);
        }
        Ok(k)
    }
}

pub(crate) fn initialization_value_for_a(range: i32) -> i32 {
    std::cmp::max(2, (range + 32) / 64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_for_8_bit() {
        let context = RegularModeContext::new(256);
        assert_eq!(context.a, 4);
        assert_eq!(context.compute_golomb_coding_parameter(), Ok(2));
        assert_eq!(context.get_error_correction(0), 0);
        assert_eq!(context.get_error_correction(1), 0);
    }

    #[test]
    fn bias_moves_c_towards_the_error() {
        let mut context = RegularModeContext::new(256);
        for _ in 0..10 {
            context.update_variables_and_bias(5, 0, 64).unwrap();
        }
        assert!(context.c() > 0);

        let mut context = RegularModeContext::new(256);
        for _ in 0..10 {
            context.update_variables_and_bias(-5, 0, 64).unwrap();
        }
        assert!(context.c() < 0);
    }

    #[test]
    fn overflowing_a_is_invalid_data() {
        let mut context = RegularModeContext::new(256);
        assert_eq!(
            context.update_variables_and_bias(65536 * 256, 0, 64),
            Err(JpegLsError::InvalidEncodedData)
        );
    }
}
