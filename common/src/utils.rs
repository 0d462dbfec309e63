//! Common Utilities
//!
//! Provides the integer and bit helpers used across the DU control path

use bytes::{Bytes, BytesMut, BufMut};
use tracing::trace;

use crate::types::SubcarrierSpacing;

/// Pack bits into bytes (MSB first)
pub fn pack_bits(bits: &[bool]) -> Bytes {
    let mut bytes = BytesMut::with_capacity((bits.len() + 7) / 8);

    for chunk in bits.chunks(8) {
        let mut byte = 0u8;
        for (i, &bit) in chunk.iter().enumerate() {
            if bit {
                byte |= 1 << (7 - i);
            }
        }
        bytes.put_u8(byte);
    }

    bytes.freeze()
}

/// Unpack bytes into bits (MSB first)
pub fn unpack_bits(bytes: &[u8]) -> Vec<bool> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);

    for &byte in bytes {
        for i in 0..8 {
            bits.push((byte & (1 << (7 - i))) != 0);
        }
    }

    bits
}

/// Greatest common divisor (Euclid)
pub fn gcd(a: u32, b: u32) -> u32 {
    let (mut a, mut b) = (a, b);
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// Least common multiple. `lcm(a, 0) == 0`.
pub fn lcm(a: u32, b: u32) -> u32 {
    if a == 0 || b == 0 {
        return 0;
    }
    a / gcd(a, b) * b
}

/// Least common multiple of a sequence, folded from the left.
///
/// Returns 1 for an empty sequence.
pub fn lcm_of<I>(values: I) -> u32
where
    I: IntoIterator<Item = u32>,
{
    let result = values.into_iter().fold(1, lcm);
    trace!("Computed LCM={}", result);
    result
}

/// Smallest `n` such that `2^n >= value`. `ceil_log2(0) == ceil_log2(1) == 0`.
pub fn ceil_log2(value: u32) -> u32 {
    if value <= 1 {
        return 0;
    }
    32 - (value - 1).leading_zeros()
}

/// Time utilities for slot/frame calculations
pub mod time {
    use super::SubcarrierSpacing;

    /// Slot duration in microseconds
    pub fn slot_duration_us(scs: SubcarrierSpacing) -> u64 {
        match scs {
            SubcarrierSpacing::Scs15 => 1000,   // 1 ms
            SubcarrierSpacing::Scs30 => 500,    // 0.5 ms
            SubcarrierSpacing::Scs60 => 250,    // 0.25 ms
            SubcarrierSpacing::Scs120 => 125,   // 0.125 ms
        }
    }
}
