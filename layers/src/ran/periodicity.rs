//! Periodicity enumerations
//!
//! Each enumeration's discriminant is the period in slots, as signalled in
//! TS 38.331 (SchedulingRequestResourceConfig, CSI-ReportPeriodicityAndOffset,
//! CSI-ResourcePeriodicityAndOffset).

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

/// SR periodicity in slots (symbol-level periodicities are not supported)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, Serialize, Deserialize)]
pub enum SrPeriodicity {
    Sl1 = 1,
    Sl2 = 2,
    Sl4 = 4,
    Sl5 = 5,
    Sl8 = 8,
    Sl10 = 10,
    Sl16 = 16,
    Sl20 = 20,
    Sl40 = 40,
    Sl80 = 80,
    Sl160 = 160,
    Sl320 = 320,
    Sl640 = 640,
}

/// Periodic/semi-persistent CSI report periodicity in slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, Serialize, Deserialize)]
pub enum CsiReportPeriodicity {
    Slots4 = 4,
    Slots5 = 5,
    Slots8 = 8,
    Slots10 = 10,
    Slots16 = 16,
    Slots20 = 20,
    Slots40 = 40,
    Slots80 = 80,
    Slots160 = 160,
    Slots320 = 320,
}

/// Periodic CSI-RS resource periodicity in slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, Serialize, Deserialize)]
pub enum CsiResourcePeriodicity {
    Slots4 = 4,
    Slots5 = 5,
    Slots8 = 8,
    Slots10 = 10,
    Slots16 = 16,
    Slots20 = 20,
    Slots32 = 32,
    Slots40 = 40,
    Slots64 = 64,
    Slots80 = 80,
    Slots160 = 160,
    Slots320 = 320,
    Slots640 = 640,
}

macro_rules! impl_periodicity {
    ($ty:ty) => {
        impl $ty {
            /// Period in slots
            pub fn to_slots(self) -> u32 {
                self as u32
            }

            /// Parse a period given in slots
            pub fn from_slots(slots: u32) -> Option<Self> {
                <$ty>::from_u32(slots)
            }
        }
    };
}

impl_periodicity!(SrPeriodicity);
impl_periodicity!(CsiReportPeriodicity);
impl_periodicity!(CsiResourcePeriodicity);
