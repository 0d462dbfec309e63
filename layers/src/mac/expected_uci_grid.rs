//! Expected UCI grid
//!
//! Ring buffer of the CSI reports expected in each slot, written when the
//! grants are scheduled and read when the UCI arrives.

use common::types::{Rnti, SlotPoint};
use interfaces::message_types::MAX_UCI_PDUS_PER_SLOT;
use tracing::warn;

use crate::ran::csi_report::CsiReportConfiguration;

/// Largest grid, divides the SFN cycle of every numerology
pub const MAX_EXPECTED_UCI_GRID_SIZE: usize = 2048;

/// A CSI report expected from a UE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedCsi {
    pub rnti: Rnti,
    pub csi_rep_cfg: CsiReportConfiguration,
}

#[derive(Debug, Clone, Default)]
struct GridSlot {
    /// Slot the entries were written for
    slot: Option<SlotPoint>,
    entries: Vec<ExpectedCsi>,
}

/// Expected CSI reports of the last `capacity` slots
#[derive(Debug, Clone)]
pub struct ExpectedUciGrid {
    slots: Vec<GridSlot>,
}

impl ExpectedUciGrid {
    /// # Panics
    ///
    /// Panics unless `capacity` is a power of two, at most
    /// [`MAX_EXPECTED_UCI_GRID_SIZE`] and above `max_round_trip_delay`.
    pub fn new(capacity: usize, max_round_trip_delay: u32) -> Self {
        assert!(
            capacity.is_power_of_two() && capacity <= MAX_EXPECTED_UCI_GRID_SIZE,
            "Invalid expected UCI grid size {}",
            capacity
        );
        assert!(
            capacity > max_round_trip_delay as usize,
            "Expected UCI grid of {} slots cannot cover a round trip of {} slots",
            capacity,
            max_round_trip_delay
        );
        Self {
            slots: vec![GridSlot::default(); capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn index(&self, slot: SlotPoint) -> usize {
        slot.count() as usize & (self.slots.len() - 1)
    }

    /// Replace the expected reports of `slot`
    pub fn store<I>(&mut self, slot: SlotPoint, entries: I)
    where
        I: IntoIterator<Item = ExpectedCsi>,
    {
        let idx = self.index(slot);
        let grid_slot = &mut self.slots[idx];
        grid_slot.slot = Some(slot);
        grid_slot.entries.clear();
        for entry in entries {
            if grid_slot.entries.len() == MAX_UCI_PDUS_PER_SLOT {
                warn!("slot={}: too many expected CSI reports, rnti={} dropped", slot, entry.rnti);
                continue;
            }
            grid_slot.entries.push(entry);
        }
    }

    /// CSI report expected from `rnti` in `slot`
    pub fn find(&self, slot: SlotPoint, rnti: Rnti) -> Option<&CsiReportConfiguration> {
        let grid_slot = &self.slots[self.index(slot)];
        if grid_slot.slot != Some(slot) {
            return None;
        }
        grid_slot
            .entries
            .iter()
            .find(|entry| entry.rnti == rnti)
            .map(|entry| &entry.csi_rep_cfg)
    }
}
