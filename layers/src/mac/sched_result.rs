//! Uplink scheduling results consumed by the UCI decoder

use common::types::{DuUeIndex, Rnti};
use serde::{Deserialize, Serialize};

use crate::ran::csi_report::CsiReportConfiguration;
use crate::ran::pucch::PucchFormat;

/// A PUCCH grant of a slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PucchInfo {
    pub crnti: Rnti,
    pub format: PucchFormat,
    pub harq_ack_nof_bits: u32,
    pub sr_nof_bits: u32,
    /// Set when the grant carries a CSI report
    pub csi_rep_cfg: Option<CsiReportConfiguration>,
}

/// UCI multiplexed on a PUSCH grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UciInfo {
    pub harq_ack_nof_bits: u32,
    pub csi: Option<CsiReportConfiguration>,
}

/// A PUSCH grant of a slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UlSchedInfo {
    pub crnti: Rnti,
    pub ue_index: DuUeIndex,
    pub uci: Option<UciInfo>,
}

impl UlSchedInfo {
    /// CSI report configuration of the piggybacked CSI, if any
    pub fn csi_rep_cfg(&self) -> Option<&CsiReportConfiguration> {
        self.uci.as_ref().and_then(|uci| uci.csi.as_ref())
    }
}
