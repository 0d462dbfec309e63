//! Packed UCI bit payloads
//!
//! UCI payloads travel between PHY and MAC as MSB-first packed bytes plus an
//! explicit bit length, since the payload size is rarely a multiple of eight.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::utils::{pack_bits, unpack_bits};

/// A bit sequence of known length stored MSB first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitPayload {
    data: Bytes,
    nof_bits: usize,
}

impl BitPayload {
    /// Empty payload
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a payload from individual bits
    pub fn from_bits(bits: &[bool]) -> Self {
        Self {
            data: pack_bits(bits),
            nof_bits: bits.len(),
        }
    }

    /// Wrap packed bytes. Returns `None` if `data` holds fewer than `nof_bits` bits.
    pub fn from_bytes(data: Bytes, nof_bits: usize) -> Option<Self> {
        if data.len() * 8 < nof_bits {
            return None;
        }
        Some(Self { data, nof_bits })
    }

    /// Number of valid bits
    pub fn len(&self) -> usize {
        self.nof_bits
    }

    pub fn is_empty(&self) -> bool {
        self.nof_bits == 0
    }

    /// Value of bit `index`
    pub fn test(&self, index: usize) -> bool {
        assert!(index < self.nof_bits, "Bit index {} out of range (len={})", index, self.nof_bits);
        (self.data[index / 8] >> (7 - index % 8)) & 1 != 0
    }

    /// Whether any bit is set
    pub fn any(&self) -> bool {
        self.iter().any(|bit| bit)
    }

    pub fn count_ones(&self) -> usize {
        self.iter().filter(|&bit| bit).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.nof_bits).map(move |i| self.test(i))
    }

    /// Unpacked copy of the valid bits
    pub fn to_bits(&self) -> Vec<bool> {
        let mut bits = unpack_bits(&self.data);
        bits.truncate(self.nof_bits);
        bits
    }

    /// Reader positioned at the first bit
    pub fn reader(&self) -> BitReader<'_> {
        BitReader { payload: self, pos: 0 }
    }
}

/// Sequential MSB-first field reader over a [`BitPayload`].
pub struct BitReader<'a> {
    payload: &'a BitPayload,
    pos: usize,
}

impl BitReader<'_> {
    /// Read an unsigned field of `nof_bits` (at most 32). Returns `None` past the end.
    pub fn read(&mut self, nof_bits: usize) -> Option<u32> {
        assert!(nof_bits <= 32, "Field width {} exceeds 32 bits", nof_bits);
        if self.remaining() < nof_bits {
            return None;
        }
        let mut value = 0u32;
        for _ in 0..nof_bits {
            value = (value << 1) | self.payload.test(self.pos) as u32;
            self.pos += 1;
        }
        Some(value)
    }

    /// Skip `nof_bits` bits. Returns `None` past the end.
    pub fn skip(&mut self, nof_bits: usize) -> Option<()> {
        if self.remaining() < nof_bits {
            return None;
        }
        self.pos += nof_bits;
        Some(())
    }

    pub fn remaining(&self) -> usize {
        self.payload.len() - self.pos
    }
}

/// Sequential MSB-first field writer producing a [`BitPayload`].
#[derive(Debug, Default)]
pub struct BitWriter {
    bits: Vec<bool>,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the `nof_bits` least significant bits of `value`, MSB first.
    pub fn write(&mut self, value: u32, nof_bits: usize) {
        assert!(nof_bits <= 32, "Field width {} exceeds 32 bits", nof_bits);
        assert!(
            nof_bits == 32 || value >> nof_bits == 0,
            "Value {} does not fit in {} bits",
            value,
            nof_bits
        );
        for i in (0..nof_bits).rev() {
            self.bits.push((value >> i) & 1 != 0);
        }
    }

    /// Append `nof_bits` zero bits
    pub fn pad(&mut self, nof_bits: usize) {
        self.bits.extend(std::iter::repeat(false).take(nof_bits));
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn finish(self) -> BitPayload {
        BitPayload::from_bits(&self.bits)
    }
}
