//! Common Types for the 5G DU
//!
//! Defines fundamental types shared by the DU manager, the scheduler and the
//! lower-layer interfaces

use serde::{Deserialize, Serialize};
use num_derive::FromPrimitive;
use std::fmt;
use std::ops::{Add, Sub};

/// Radio Network Temporary Identifier (RNTI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rnti(pub u16);

impl Rnti {
    /// Lowest C-RNTI value handed out by the DU
    pub const MIN_CRNTI: Rnti = Rnti(0x0001);
    /// Highest C-RNTI value handed out by the DU
    pub const MAX_CRNTI: Rnti = Rnti(0xFFEF);

    /// Create a new RNTI
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    /// Get the RNTI value
    pub fn value(&self) -> u16 {
        self.0
    }

    /// Whether the value lies in the C-RNTI range
    pub fn is_crnti(&self) -> bool {
        *self >= Self::MIN_CRNTI && *self <= Self::MAX_CRNTI
    }
}

impl fmt::Display for Rnti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// DU-wide UE index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DuUeIndex(pub u16);

impl DuUeIndex {
    /// Maximum number of UEs handled by one DU
    pub const MAX_NOF_DU_UES: u16 = 1024;
}

impl fmt::Display for DuUeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// DU-local cell index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DuCellIndex(pub u8);

impl DuCellIndex {
    /// Maximum number of cells handled by one DU
    pub const MAX_NOF_DU_CELLS: usize = 16;

    /// Index usable for slice/vector access
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DuCellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Subcarrier spacing values in kHz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, Serialize, Deserialize)]
pub enum SubcarrierSpacing {
    /// 15 kHz
    Scs15 = 15,
    /// 30 kHz
    Scs30 = 30,
    /// 60 kHz
    Scs60 = 60,
    /// 120 kHz
    Scs120 = 120,
}

impl SubcarrierSpacing {
    /// Numerology index (mu)
    pub fn numerology(&self) -> u32 {
        match self {
            SubcarrierSpacing::Scs15 => 0,
            SubcarrierSpacing::Scs30 => 1,
            SubcarrierSpacing::Scs60 => 2,
            SubcarrierSpacing::Scs120 => 3,
        }
    }

    /// Number of slots per 10 ms frame
    pub fn slots_per_frame(&self) -> u32 {
        10 << self.numerology()
    }
}

/// Absolute slot in the SFN cycle for a given numerology.
///
/// Arithmetic wraps around after `1024 * slots_per_frame` slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotPoint {
    scs: SubcarrierSpacing,
    count: u32,
}

impl SlotPoint {
    /// Number of system frames before the SFN wraps
    pub const NOF_SFNS: u32 = 1024;

    /// Create a slot from SFN and slot index within the frame
    pub fn new(scs: SubcarrierSpacing, sfn: u32, slot_index: u32) -> Self {
        assert!(sfn < Self::NOF_SFNS, "Invalid SFN={}", sfn);
        assert!(slot_index < scs.slots_per_frame(), "Invalid slot index={} for {:?}", slot_index, scs);
        Self {
            scs,
            count: sfn * scs.slots_per_frame() + slot_index,
        }
    }

    /// Create a slot from its absolute count within the SFN cycle
    pub fn from_count(scs: SubcarrierSpacing, count: u32) -> Self {
        Self {
            scs,
            count: count % Self::nof_slots_in_cycle(scs),
        }
    }

    /// Number of slots in one full SFN cycle
    pub fn nof_slots_in_cycle(scs: SubcarrierSpacing) -> u32 {
        Self::NOF_SFNS * scs.slots_per_frame()
    }

    pub fn scs(&self) -> SubcarrierSpacing {
        self.scs
    }

    /// Absolute slot count within the SFN cycle
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn sfn(&self) -> u32 {
        self.count / self.scs.slots_per_frame()
    }

    pub fn slot_index(&self) -> u32 {
        self.count % self.scs.slots_per_frame()
    }
}

impl Add<u32> for SlotPoint {
    type Output = SlotPoint;

    fn add(self, rhs: u32) -> SlotPoint {
        let cycle = Self::nof_slots_in_cycle(self.scs);
        SlotPoint {
            scs: self.scs,
            count: (self.count + rhs % cycle) % cycle,
        }
    }
}

impl Sub<u32> for SlotPoint {
    type Output = SlotPoint;

    fn sub(self, rhs: u32) -> SlotPoint {
        let cycle = Self::nof_slots_in_cycle(self.scs);
        SlotPoint {
            scs: self.scs,
            count: (self.count + cycle - rhs % cycle) % cycle,
        }
    }
}

impl fmt::Display for SlotPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.sfn(), self.slot_index())
    }
}
