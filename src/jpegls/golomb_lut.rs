//! Lookup table for Golomb codes that fit in one byte.
//!
//! Indexed by `k` and the next byte of the bit stream, each entry holds the
//! mapped error value and the code length. A length of 0 means the code is
//! longer than 8 bits and has to be read bit by bit.

use crate::constants::MAX_K_VALUE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GolombCodeMatch {
    pub mapped_error_value: i16,
    pub bit_count: i8,
}

const fn countl_zero_u8(mut x: u8) -> i8 {
    if x == 0 {
        return 8;
    }
    let mut count = 0;
    while (x & 0x80) == 0 {
        x <<= 1;
        count += 1;
    }
    count
}

pub const GOLOMB_LUT: [[GolombCodeMatch; 256]; MAX_K_VALUE as usize] = {
    let mut lut = [[GolombCodeMatch {
        mapped_error_value: 0,
        bit_count: 0,
    }; 256]; MAX_K_VALUE as usize];
    let mut k: usize = 0;
    while k < MAX_K_VALUE as usize {
        let mut value: usize = 0;
        while value < 256 {
            let unary_length = countl_zero_u8(value as u8);
            let length = unary_length as i32 + k as i32 + 1;

            if length <= 8 {
                let shift = 8 - length;
                let remainder = (value >> shift) & ((1 << k) - 1);
                lut[k][value] = GolombCodeMatch {
                    mapped_error_value: ((unary_length as i16) << k) + remainder as i16,
                    bit_count: length as i8,
                };
            }
            value += 1;
        }
        k += 1;
    }
    lut
};
