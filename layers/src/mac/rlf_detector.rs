//! Radio link failure detection
//!
//! The UCI decoders report every HARQ-ACK decision and every CSI decoding
//! outcome. A UE is declared in RLF once either kind fails too many times in
//! a row.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use common::types::{DuCellIndex, DuUeIndex};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Sink for the link quality events seen by the UCI decoders
pub trait RlfDetector: Send + Sync {
    /// A HARQ-ACK bit was decoded as ACK (`true`) or NACK (`false`)
    fn handle_ack(&self, ue_index: DuUeIndex, cell_index: DuCellIndex, ack: bool);

    /// A CSI report was (`true`) or could not be (`false`) decoded
    fn handle_csi(&self, ue_index: DuUeIndex, cell_index: DuCellIndex, csi_decoded: bool);
}

/// Consecutive failures leading to RLF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RlfThresholds {
    pub max_consecutive_kos: u32,
    pub max_consecutive_csi_kos: u32,
}

impl Default for RlfThresholds {
    fn default() -> Self {
        Self {
            max_consecutive_kos: 100,
            max_consecutive_csi_kos: 100,
        }
    }
}

#[derive(Debug, Default)]
struct UeLinkState {
    consecutive_kos: u32,
    consecutive_csi_kos: u32,
    rlf_detected: bool,
}

/// Declares RLF after a run of NACKs or of undecodable CSI reports
#[derive(Debug, Default)]
pub struct ConsecutiveKoRlfDetector {
    thresholds: RlfThresholds,
    ues: Mutex<HashMap<DuUeIndex, UeLinkState>>,
}

impl ConsecutiveKoRlfDetector {
    pub fn new(thresholds: RlfThresholds) -> Self {
        Self {
            thresholds,
            ues: Mutex::new(HashMap::new()),
        }
    }

    /// Start tracking a UE
    pub fn add_ue(&self, ue_index: DuUeIndex) {
        self.ues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ue_index, UeLinkState::default());
    }

    /// Stop tracking a UE
    pub fn rem_ue(&self, ue_index: DuUeIndex) {
        self.ues.lock().unwrap_or_else(PoisonError::into_inner).remove(&ue_index);
    }

    pub fn is_rlf_detected(&self, ue_index: DuUeIndex) -> bool {
        self.ues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&ue_index)
            .is_some_and(|ue| ue.rlf_detected)
    }

    /// UEs currently in RLF
    pub fn nof_ues_in_rlf(&self) -> usize {
        self.ues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|ue| ue.rlf_detected)
            .count()
    }

    fn update<F>(&self, ue_index: DuUeIndex, cell_index: DuCellIndex, f: F)
    where
        F: FnOnce(&mut UeLinkState, &RlfThresholds) -> Option<&'static str>,
    {
        let mut ues = self.ues.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(ue) = ues.get_mut(&ue_index) else {
            trace!("ue={} cell={}: link event for an untracked UE", ue_index, cell_index);
            return;
        };
        if let Some(cause) = f(ue, &self.thresholds) {
            if !ue.rlf_detected {
                ue.rlf_detected = true;
                warn!("ue={} cell={}: RLF detected. Cause: {}", ue_index, cell_index, cause);
            }
        }
    }
}

impl RlfDetector for ConsecutiveKoRlfDetector {
    fn handle_ack(&self, ue_index: DuUeIndex, cell_index: DuCellIndex, ack: bool) {
        self.update(ue_index, cell_index, |ue, thresholds| {
            if ack {
                ue.consecutive_kos = 0;
                return None;
            }
            ue.consecutive_kos += 1;
            (ue.consecutive_kos >= thresholds.max_consecutive_kos).then_some("consecutive HARQ-ACK KOs")
        });
    }

    fn handle_csi(&self, ue_index: DuUeIndex, cell_index: DuCellIndex, csi_decoded: bool) {
        self.update(ue_index, cell_index, |ue, thresholds| {
            if csi_decoded {
                ue.consecutive_csi_kos = 0;
                return None;
            }
            ue.consecutive_csi_kos += 1;
            (ue.consecutive_csi_kos >= thresholds.max_consecutive_csi_kos).then_some("consecutive CSI KOs")
        });
    }
}
