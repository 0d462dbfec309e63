//! UCI indication delivered to the scheduler

use common::bits::BitPayload;
use common::types::{DuCellIndex, DuUeIndex, Rnti, SlotPoint};
use serde::{Deserialize, Serialize};

use crate::ran::csi_codec::CsiReportData;

/// HARQ-ACK decision forwarded to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarqAckStatus {
    Ack,
    Nack,
}

/// UCI received on PUCCH Format 0/1
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UciPucchF0OrF1 {
    pub sr_detected: bool,
    /// Detected HARQ-ACK bits, DTX bits are left out
    pub harqs: Vec<HarqAckStatus>,
    pub ul_sinr_db: Option<f32>,
    pub time_advance_offset: Option<i32>,
}

/// UCI received on PUCCH Format 2/3/4
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UciPucchF2OrF3OrF4 {
    /// Raw SR bits
    pub sr_info: Option<BitPayload>,
    /// Whether any SR bit is set
    pub sr_detected: bool,
    pub harqs: Vec<HarqAckStatus>,
    pub csi: Option<CsiReportData>,
    pub ul_sinr_db: Option<f32>,
    pub time_advance_offset: Option<i32>,
}

/// UCI multiplexed on PUSCH
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UciPusch {
    pub harqs: Vec<HarqAckStatus>,
    pub csi: Option<CsiReportData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UciPduKind {
    PucchF0OrF1(UciPucchF0OrF1),
    PucchF2OrF3OrF4(UciPucchF2OrF3OrF4),
    Pusch(UciPusch),
}

impl UciPduKind {
    pub fn harqs(&self) -> &[HarqAckStatus] {
        match self {
            UciPduKind::PucchF0OrF1(pdu) => &pdu.harqs,
            UciPduKind::PucchF2OrF3OrF4(pdu) => &pdu.harqs,
            UciPduKind::Pusch(pdu) => &pdu.harqs,
        }
    }

    pub fn csi(&self) -> Option<&CsiReportData> {
        match self {
            UciPduKind::PucchF0OrF1(_) => None,
            UciPduKind::PucchF2OrF3OrF4(pdu) => pdu.csi.as_ref(),
            UciPduKind::Pusch(pdu) => pdu.csi.as_ref(),
        }
    }
}

/// Decoded UCI of one UE
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UciPdu {
    pub ue_index: DuUeIndex,
    pub crnti: Rnti,
    pub pdu: UciPduKind,
}

/// Decoded UCIs of one slot of one cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UciIndication {
    pub cell_index: DuCellIndex,
    pub slot_rx: SlotPoint,
    pub ucis: Vec<UciPdu>,
}
