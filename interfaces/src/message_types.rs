//! Message Types for PHY-MAC UCI Communication
//!
//! Defines the UCI indication the PHY delivers to the MAC once per slot. Each
//! PDU is tagged with the channel shape it was received on, so the decoder can
//! match exhaustively on it.

use serde::{Deserialize, Serialize};

use common::bits::BitPayload;
use common::types::{Rnti, SlotPoint};

use crate::InterfaceError;

/// Maximum number of UCI PDUs reported in one slot
pub const MAX_UCI_PDUS_PER_SLOT: usize = 32;

/// Maximum number of HARQ-ACK bits carried in one UCI PDU
pub const MAX_NOF_HARQ_BITS: usize = 128;

/// HARQ-ACK detection outcome for PUCCH Format 0/1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PucchF0OrF1HarqValue {
    /// Acknowledged
    Ack,
    /// Not acknowledged
    Nack,
    /// Nothing detected
    Dtx,
}

/// SR detection outcome for PUCCH Format 0/1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrDetection {
    /// Whether a positive SR was detected
    pub detected: bool,
}

/// A decoded UCI field together with its decoding status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UciPayloadInfo {
    /// CRC pass / decoding success as reported by the PHY
    pub is_valid: bool,
    /// Decoded bits, in transmission order
    pub payload: BitPayload,
}

impl UciPayloadInfo {
    pub fn valid(payload: BitPayload) -> Self {
        Self { is_valid: true, payload }
    }

    pub fn invalid(nof_bits: usize) -> Self {
        Self {
            is_valid: false,
            payload: BitPayload::from_bits(&vec![false; nof_bits]),
        }
    }
}

/// UCI received on PUCCH Format 0 or Format 1
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PucchF0OrF1Uci {
    /// SR detection, if an SR occasion was monitored
    pub sr_info: Option<SrDetection>,
    /// One entry per HARQ-ACK bit (at most 2)
    pub harq_info: Option<Vec<PucchF0OrF1HarqValue>>,
    /// Measured UL SINR in dB
    pub ul_sinr_db: Option<f32>,
    /// Timing advance offset in units of T_A
    pub time_advance_offset: Option<i32>,
}

/// UCI received on PUCCH Format 2, 3 or 4
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PucchF2OrF3OrF4Uci {
    /// SR bits
    pub sr_info: Option<BitPayload>,
    /// HARQ-ACK bits
    pub harq_info: Option<UciPayloadInfo>,
    /// CSI part 1 bits
    pub csi_part1: Option<UciPayloadInfo>,
    /// CSI part 2 bits
    pub csi_part2: Option<UciPayloadInfo>,
    /// Measured UL SINR in dB
    pub ul_sinr_db: Option<f32>,
    /// Timing advance offset in units of T_A
    pub time_advance_offset: Option<i32>,
}

/// UCI multiplexed on PUSCH
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuschUci {
    /// HARQ-ACK bits
    pub harq_info: Option<UciPayloadInfo>,
    /// CSI part 1 bits
    pub csi_part1: Option<UciPayloadInfo>,
    /// CSI part 2 bits
    pub csi_part2: Option<UciPayloadInfo>,
}

/// Channel shape a UCI PDU was received on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MacUciPduKind {
    PucchF0OrF1(PucchF0OrF1Uci),
    PucchF2OrF3OrF4(PucchF2OrF3OrF4Uci),
    Pusch(PuschUci),
}

impl MacUciPduKind {
    /// Number of HARQ-ACK bits carried by the PDU
    pub fn nof_harq_bits(&self) -> usize {
        match self {
            MacUciPduKind::PucchF0OrF1(pdu) => pdu.harq_info.as_ref().map_or(0, |h| h.len()),
            MacUciPduKind::PucchF2OrF3OrF4(pdu) => pdu.harq_info.as_ref().map_or(0, |h| h.payload.len()),
            MacUciPduKind::Pusch(pdu) => pdu.harq_info.as_ref().map_or(0, |h| h.payload.len()),
        }
    }
}

/// UCI received for one RNTI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacUciPdu {
    pub rnti: Rnti,
    pub pdu: MacUciPduKind,
}

impl MacUciPdu {
    /// Check the PDU against the PHY-MAC interface limits
    pub fn validate(&self) -> Result<(), InterfaceError> {
        if !self.rnti.is_crnti() {
            return Err(InterfaceError::InvalidMessage(format!(
                "rnti={} is not a C-RNTI",
                self.rnti
            )));
        }
        let nof_harq_bits = self.pdu.nof_harq_bits();
        let max = match self.pdu {
            MacUciPduKind::PucchF0OrF1(_) => 2,
            _ => MAX_NOF_HARQ_BITS,
        };
        if nof_harq_bits > max {
            return Err(InterfaceError::TooManyHarqBits {
                rnti: self.rnti.value(),
                count: nof_harq_bits,
                max,
            });
        }
        Ok(())
    }
}

/// All UCIs received in one slot of one cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacUciIndicationMessage {
    /// Slot in which the UCIs were received
    pub sl_rx: SlotPoint,
    pub ucis: Vec<MacUciPdu>,
}

impl MacUciIndicationMessage {
    /// Create an empty indication for a slot
    pub fn new(sl_rx: SlotPoint) -> Self {
        Self { sl_rx, ucis: Vec::new() }
    }

    /// Check the message-level limits. PDUs are checked one by one with
    /// [`MacUciPdu::validate`].
    pub fn validate(&self) -> Result<(), InterfaceError> {
        if self.ucis.len() > MAX_UCI_PDUS_PER_SLOT {
            return Err(InterfaceError::TooManyPdus {
                count: self.ucis.len(),
                max: MAX_UCI_PDUS_PER_SLOT,
            });
        }
        Ok(())
    }
}
