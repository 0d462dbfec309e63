//! UCI cell decoder
//!
//! Turns the PHY UCI indications of one cell into scheduler UCI indications:
//! resolves RNTIs, converts HARQ-ACK bits, decodes CSI reports with the report
//! configuration stored when the grant was scheduled and feeds the RLF
//! detector.

use std::sync::Arc;

use common::bits::BitPayload;
use common::types::{DuCellIndex, DuUeIndex, Rnti, SlotPoint};
use interfaces::message_types::{
    MacUciIndicationMessage, MacUciPduKind, PucchF0OrF1HarqValue, PucchF0OrF1Uci, PucchF2OrF3OrF4Uci, PuschUci,
    UciPayloadInfo,
};
use tracing::{debug, info, warn};

use super::expected_uci_grid::{ExpectedCsi, ExpectedUciGrid};
use super::rlf_detector::RlfDetector;
use super::rnti_table::DuRntiTable;
use super::sched_result::{PucchInfo, UlSchedInfo};
use super::uci_indication::{
    HarqAckStatus, UciIndication, UciPdu, UciPduKind, UciPucchF0OrF1, UciPucchF2OrF3OrF4, UciPusch,
};
use crate::ran::csi_codec::{csi_report_unpack_pucch, validate_pucch_csi_payload, CsiReportData};

/// Convert HARQ-ACK bits reported on PUCCH Format 2/3/4 or PUSCH.
///
/// A payload flagged invalid by the PHY counts as NACK for every bit.
pub fn convert_mac_harq_bits_to_sched_harq_values(harq_info: &UciPayloadInfo) -> Vec<HarqAckStatus> {
    harq_info
        .payload
        .iter()
        .map(|bit| {
            if harq_info.is_valid && bit {
                HarqAckStatus::Ack
            } else {
                HarqAckStatus::Nack
            }
        })
        .collect()
}

/// Per-cell UCI decoder
pub struct UciCellDecoder {
    cell_index: DuCellIndex,
    rnti_table: Arc<DuRntiTable>,
    rlf_detector: Arc<dyn RlfDetector>,
    expected_uci_grid: ExpectedUciGrid,
}

impl UciCellDecoder {
    /// Create the decoder of a cell whose UCI arrives at most
    /// `max_round_trip_delay` slots after it was scheduled
    pub fn new(
        cell_index: DuCellIndex,
        rnti_table: Arc<DuRntiTable>,
        rlf_detector: Arc<dyn RlfDetector>,
        max_round_trip_delay: u32,
    ) -> Self {
        let capacity = (max_round_trip_delay as usize + 1).next_power_of_two();
        let expected_uci_grid = ExpectedUciGrid::new(capacity, max_round_trip_delay);
        debug!(
            "Cell {}: expected UCI grid of {} slots",
            cell_index,
            expected_uci_grid.capacity()
        );
        Self {
            cell_index,
            rnti_table,
            rlf_detector,
            expected_uci_grid,
        }
    }

    pub fn cell_index(&self) -> DuCellIndex {
        self.cell_index
    }

    /// Record the CSI reports expected in `slot` from the grants scheduled for it
    pub fn store_uci(&mut self, slot: SlotPoint, scheduled_pucchs: &[PucchInfo], scheduled_puschs: &[UlSchedInfo]) {
        let pucch_csi = scheduled_pucchs.iter().filter_map(|pucch| {
            pucch.csi_rep_cfg.map(|csi_rep_cfg| ExpectedCsi {
                rnti: pucch.crnti,
                csi_rep_cfg,
            })
        });
        let pusch_csi = scheduled_puschs.iter().filter_map(|pusch| {
            pusch.csi_rep_cfg().map(|csi_rep_cfg| ExpectedCsi {
                rnti: pusch.crnti,
                csi_rep_cfg: *csi_rep_cfg,
            })
        });
        self.expected_uci_grid.store(slot, pucch_csi.chain(pusch_csi));
    }

    /// Decode the UCI indication of one slot.
    ///
    /// Malformed PDUs and PDUs of unknown RNTIs are dropped without affecting
    /// the other PDUs of the slot. A CSI report that cannot be decoded is left
    /// out while the HARQ-ACK bits of the PDU are still delivered.
    pub fn decode_uci(&self, msg: &MacUciIndicationMessage) -> UciIndication {
        let mut ind = UciIndication {
            cell_index: self.cell_index,
            slot_rx: msg.sl_rx,
            ucis: Vec::with_capacity(msg.ucis.len()),
        };

        if let Err(err) = msg.validate() {
            warn!("cell={} slot={}: Discarding UCI indication. Cause: {}", self.cell_index, msg.sl_rx, err);
            return ind;
        }

        for uci in &msg.ucis {
            if let Err(err) = uci.validate() {
                warn!(
                    "cell={} rnti={}: Discarding UCI PDU. Cause: {}",
                    self.cell_index, uci.rnti, err
                );
                continue;
            }
            let Some(ue_index) = self.rnti_table.get(uci.rnti) else {
                info!(
                    "cell={} rnti={}: Discarding UCI PDU. Cause: no UE with the provided RNTI",
                    self.cell_index, uci.rnti
                );
                continue;
            };

            let pdu = match &uci.pdu {
                MacUciPduKind::PucchF0OrF1(pucch) => UciPduKind::PucchF0OrF1(self.decode_pucch_f0_or_f1(ue_index, pucch)),
                MacUciPduKind::PucchF2OrF3OrF4(pucch) => UciPduKind::PucchF2OrF3OrF4(
                    self.decode_pucch_f2_or_f3_or_f4(msg.sl_rx, uci.rnti, ue_index, pucch),
                ),
                MacUciPduKind::Pusch(pusch) => {
                    UciPduKind::Pusch(self.decode_pusch(msg.sl_rx, uci.rnti, ue_index, pusch))
                }
            };
            ind.ucis.push(UciPdu {
                ue_index,
                crnti: uci.rnti,
                pdu,
            });
        }

        debug!(
            "cell={} slot={}: decoded {} of {} UCI PDUs",
            self.cell_index,
            msg.sl_rx,
            ind.ucis.len(),
            msg.ucis.len()
        );
        ind
    }

    fn report_harqs(&self, ue_index: DuUeIndex, harqs: &[HarqAckStatus]) {
        for harq in harqs {
            self.rlf_detector
                .handle_ack(ue_index, self.cell_index, *harq == HarqAckStatus::Ack);
        }
    }

    fn decode_pucch_f0_or_f1(&self, ue_index: DuUeIndex, pucch: &PucchF0OrF1Uci) -> UciPucchF0OrF1 {
        // DTX would read as NACK on the scheduler side.
        let harqs: Vec<HarqAckStatus> = pucch
            .harq_info
            .iter()
            .flatten()
            .filter_map(|harq| match harq {
                PucchF0OrF1HarqValue::Ack => Some(HarqAckStatus::Ack),
                PucchF0OrF1HarqValue::Nack => Some(HarqAckStatus::Nack),
                PucchF0OrF1HarqValue::Dtx => None,
            })
            .collect();
        self.report_harqs(ue_index, &harqs);

        UciPucchF0OrF1 {
            sr_detected: pucch.sr_info.is_some_and(|sr| sr.detected),
            harqs,
            ul_sinr_db: pucch.ul_sinr_db,
            time_advance_offset: pucch.time_advance_offset,
        }
    }

    fn decode_pucch_f2_or_f3_or_f4(
        &self,
        slot: SlotPoint,
        rnti: Rnti,
        ue_index: DuUeIndex,
        pucch: &PucchF2OrF3OrF4Uci,
    ) -> UciPucchF2OrF3OrF4 {
        let harqs = pucch
            .harq_info
            .as_ref()
            .map(convert_mac_harq_bits_to_sched_harq_values)
            .unwrap_or_default();
        self.report_harqs(ue_index, &harqs);

        let csi = pucch
            .csi_part1
            .as_ref()
            .and_then(|csi| self.decode_csi(slot, rnti, ue_index, csi));

        UciPucchF2OrF3OrF4 {
            sr_detected: pucch.sr_info.as_ref().is_some_and(BitPayload::any),
            sr_info: pucch.sr_info.clone(),
            harqs,
            csi,
            ul_sinr_db: pucch.ul_sinr_db,
            time_advance_offset: pucch.time_advance_offset,
        }
    }

    fn decode_pusch(&self, slot: SlotPoint, rnti: Rnti, ue_index: DuUeIndex, pusch: &PuschUci) -> UciPusch {
        let harqs = pusch
            .harq_info
            .as_ref()
            .map(convert_mac_harq_bits_to_sched_harq_values)
            .unwrap_or_default();
        self.report_harqs(ue_index, &harqs);

        let csi = pusch
            .csi_part1
            .as_ref()
            .and_then(|csi| self.decode_csi(slot, rnti, ue_index, csi));

        UciPusch { harqs, csi }
    }

    fn decode_csi(
        &self,
        slot: SlotPoint,
        rnti: Rnti,
        ue_index: DuUeIndex,
        csi: &UciPayloadInfo,
    ) -> Option<CsiReportData> {
        if !csi.is_valid {
            debug!("cell={} rnti={} slot={}: CSI part 1 flagged invalid", self.cell_index, rnti, slot);
            self.rlf_detector.handle_csi(ue_index, self.cell_index, false);
            return None;
        }

        let Some(csi_rep_cfg) = self.expected_uci_grid.find(slot, rnti) else {
            warn!(
                "cell={} rnti={} slot={}: Discarding CSI report. Cause: no CSI report configuration expected",
                self.cell_index, rnti, slot
            );
            return None;
        };

        let decoded = validate_pucch_csi_payload(&csi.payload, csi_rep_cfg)
            .and_then(|()| csi_report_unpack_pucch(&csi.payload, csi_rep_cfg));
        match decoded {
            Ok(report) => {
                self.rlf_detector.handle_csi(ue_index, self.cell_index, true);
                Some(report)
            }
            Err(err) => {
                warn!(
                    "cell={} rnti={} slot={}: Discarding CSI report. Cause: {}",
                    self.cell_index, rnti, slot, err
                );
                self.rlf_detector.handle_csi(ue_index, self.cell_index, false);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::sched_result::UciInfo;
    use crate::ran::csi_codec::{csi_report_pack_pucch, CsiReportPmi};
    use crate::ran::csi_report::{CsiReportConfiguration, CsiReportQuantities, PmiCodebookType, RiRestriction};
    use crate::ran::pucch::PucchFormat;
    use common::types::SubcarrierSpacing;
    use interfaces::message_types::{MacUciPdu, SrDetection, MAX_UCI_PDUS_PER_SLOT};
    use std::sync::Mutex;

    const CELL: DuCellIndex = DuCellIndex(0);
    const RNTI: Rnti = Rnti(0x4601);
    const UE: DuUeIndex = DuUeIndex(7);

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum LinkEvent {
        Ack(DuUeIndex, bool),
        Csi(DuUeIndex, bool),
    }

    #[derive(Default)]
    struct RecordingRlfDetector {
        events: Mutex<Vec<LinkEvent>>,
    }

    impl RecordingRlfDetector {
        fn events(&self) -> Vec<LinkEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl RlfDetector for RecordingRlfDetector {
        fn handle_ack(&self, ue_index: DuUeIndex, _cell_index: DuCellIndex, ack: bool) {
            self.events.lock().unwrap().push(LinkEvent::Ack(ue_index, ack));
        }

        fn handle_csi(&self, ue_index: DuUeIndex, _cell_index: DuCellIndex, csi_decoded: bool) {
            self.events.lock().unwrap().push(LinkEvent::Csi(ue_index, csi_decoded));
        }
    }

    fn csi_cfg() -> CsiReportConfiguration {
        CsiReportConfiguration {
            nof_csi_rs_resources: 1,
            pmi_codebook: PmiCodebookType::TypeISinglePanel4PortsMode1,
            ri_restriction: RiRestriction(0b1111),
            quantities: CsiReportQuantities::CRI_RI_PMI_CQI,
        }
    }

    fn report() -> CsiReportData {
        CsiReportData {
            cri: Some(0),
            ri: Some(2),
            li: None,
            pmi: Some(CsiReportPmi::TypeISinglePanel4Ports {
                i_1_1: 3,
                i_1_3: Some(1),
                i_2: 0,
            }),
            first_tb_wideband_cqi: Some(12),
        }
    }

    fn slot(count: u32) -> SlotPoint {
        SlotPoint::from_count(SubcarrierSpacing::Scs30, count)
    }

    fn decoder() -> (UciCellDecoder, Arc<RecordingRlfDetector>) {
        let rnti_table = Arc::new(DuRntiTable::new());
        rnti_table.add_ue(RNTI, UE);
        let rlf = Arc::new(RecordingRlfDetector::default());
        (UciCellDecoder::new(CELL, rnti_table, rlf.clone(), 8), rlf)
    }

    fn pucch_f2_grant() -> PucchInfo {
        PucchInfo {
            crnti: RNTI,
            format: PucchFormat::Format2,
            harq_ack_nof_bits: 2,
            sr_nof_bits: 0,
            csi_rep_cfg: Some(csi_cfg()),
        }
    }

    fn f2_indication(sl_rx: SlotPoint, csi_part1: Option<UciPayloadInfo>) -> MacUciIndicationMessage {
        MacUciIndicationMessage {
            sl_rx,
            ucis: vec![MacUciPdu {
                rnti: RNTI,
                pdu: MacUciPduKind::PucchF2OrF3OrF4(PucchF2OrF3OrF4Uci {
                    sr_info: Some(BitPayload::from_bits(&[true])),
                    harq_info: Some(UciPayloadInfo::valid(BitPayload::from_bits(&[true, false]))),
                    csi_part1,
                    csi_part2: None,
                    ul_sinr_db: Some(12.5),
                    time_advance_offset: Some(3),
                }),
            }],
        }
    }

    #[test]
    fn test_convert_harq_bits() {
        let valid = UciPayloadInfo::valid(BitPayload::from_bits(&[true, false, true]));
        assert_eq!(
            convert_mac_harq_bits_to_sched_harq_values(&valid),
            vec![HarqAckStatus::Ack, HarqAckStatus::Nack, HarqAckStatus::Ack]
        );
        let invalid = UciPayloadInfo {
            is_valid: false,
            payload: BitPayload::from_bits(&[true, true]),
        };
        assert_eq!(
            convert_mac_harq_bits_to_sched_harq_values(&invalid),
            vec![HarqAckStatus::Nack, HarqAckStatus::Nack]
        );
    }

    #[test]
    fn test_f0_f1_dtx_is_not_forwarded() {
        let (decoder, rlf) = decoder();
        let mut msg = MacUciIndicationMessage::new(slot(10));
        msg.ucis.push(MacUciPdu {
            rnti: RNTI,
            pdu: MacUciPduKind::PucchF0OrF1(PucchF0OrF1Uci {
                sr_info: Some(SrDetection { detected: true }),
                harq_info: Some(vec![PucchF0OrF1HarqValue::Dtx, PucchF0OrF1HarqValue::Nack]),
                ul_sinr_db: Some(7.0),
                time_advance_offset: None,
            }),
        });

        let ind = decoder.decode_uci(&msg);
        assert_eq!(ind.ucis.len(), 1);
        assert_eq!(ind.ucis[0].ue_index, UE);
        let UciPduKind::PucchF0OrF1(f1) = &ind.ucis[0].pdu else {
            panic!("unexpected PDU {:?}", ind.ucis[0].pdu);
        };
        assert!(f1.sr_detected);
        assert_eq!(f1.harqs, vec![HarqAckStatus::Nack]);
        assert_eq!(f1.ul_sinr_db, Some(7.0));
        assert_eq!(rlf.events(), vec![LinkEvent::Ack(UE, false)]);
    }

    #[test]
    fn test_unknown_rnti_is_dropped() {
        let (decoder, rlf) = decoder();
        let mut msg = MacUciIndicationMessage::new(slot(10));
        msg.ucis.push(MacUciPdu {
            rnti: Rnti(0x4700),
            pdu: MacUciPduKind::PucchF0OrF1(PucchF0OrF1Uci {
                harq_info: Some(vec![PucchF0OrF1HarqValue::Ack]),
                ..Default::default()
            }),
        });
        let ind = decoder.decode_uci(&msg);
        assert!(ind.ucis.is_empty());
        assert!(rlf.events().is_empty());
    }

    #[test]
    fn test_f2_csi_decoded_with_stored_config() {
        let (mut decoder, rlf) = decoder();
        decoder.store_uci(slot(20), &[pucch_f2_grant()], &[]);

        let payload = csi_report_pack_pucch(&report(), &csi_cfg()).unwrap();
        let ind = decoder.decode_uci(&f2_indication(slot(20), Some(UciPayloadInfo::valid(payload))));

        let UciPduKind::PucchF2OrF3OrF4(f2) = &ind.ucis[0].pdu else {
            panic!("unexpected PDU {:?}", ind.ucis[0].pdu);
        };
        assert!(f2.sr_detected);
        assert_eq!(f2.harqs, vec![HarqAckStatus::Ack, HarqAckStatus::Nack]);
        assert_eq!(f2.csi, Some(report()));
        assert_eq!(f2.time_advance_offset, Some(3));
        assert_eq!(
            rlf.events(),
            vec![LinkEvent::Ack(UE, true), LinkEvent::Ack(UE, false), LinkEvent::Csi(UE, true)]
        );
    }

    #[test]
    fn test_csi_without_expected_entry_keeps_harq() {
        let (mut decoder, rlf) = decoder();
        decoder.store_uci(slot(20), &[pucch_f2_grant()], &[]);

        let payload = csi_report_pack_pucch(&report(), &csi_cfg()).unwrap();
        let ind = decoder.decode_uci(&f2_indication(slot(21), Some(UciPayloadInfo::valid(payload))));

        let UciPduKind::PucchF2OrF3OrF4(f2) = &ind.ucis[0].pdu else {
            panic!("unexpected PDU {:?}", ind.ucis[0].pdu);
        };
        assert_eq!(f2.csi, None);
        assert_eq!(f2.harqs.len(), 2);
        assert!(!rlf.events().iter().any(|event| matches!(event, LinkEvent::Csi(..))));
    }

    #[test]
    fn test_invalid_csi_reported_to_rlf() {
        let (mut decoder, rlf) = decoder();
        decoder.store_uci(slot(20), &[pucch_f2_grant()], &[]);

        let ind = decoder.decode_uci(&f2_indication(slot(20), Some(UciPayloadInfo::invalid(11))));
        assert_eq!(ind.ucis[0].pdu.csi(), None);

        // Wrong size for the stored configuration
        let short = UciPayloadInfo::valid(BitPayload::from_bits(&[false; 7]));
        let ind = decoder.decode_uci(&f2_indication(slot(20), Some(short)));
        assert_eq!(ind.ucis[0].pdu.csi(), None);

        let csi_events: Vec<_> = rlf
            .events()
            .into_iter()
            .filter(|event| matches!(event, LinkEvent::Csi(..)))
            .collect();
        assert_eq!(csi_events, vec![LinkEvent::Csi(UE, false), LinkEvent::Csi(UE, false)]);
    }

    #[test]
    fn test_pusch_csi_decoded() {
        let (mut decoder, _rlf) = decoder();
        let pusch = UlSchedInfo {
            crnti: RNTI,
            ue_index: UE,
            uci: Some(UciInfo {
                harq_ack_nof_bits: 1,
                csi: Some(csi_cfg()),
            }),
        };
        decoder.store_uci(slot(30), &[], &[pusch]);

        let payload = csi_report_pack_pucch(&report(), &csi_cfg()).unwrap();
        let mut msg = MacUciIndicationMessage::new(slot(30));
        msg.ucis.push(MacUciPdu {
            rnti: RNTI,
            pdu: MacUciPduKind::Pusch(PuschUci {
                harq_info: Some(UciPayloadInfo::invalid(1)),
                csi_part1: Some(UciPayloadInfo::valid(payload)),
                csi_part2: None,
            }),
        });

        let ind = decoder.decode_uci(&msg);
        assert_eq!(ind.ucis[0].pdu.harqs(), &[HarqAckStatus::Nack]);
        assert_eq!(ind.ucis[0].pdu.csi(), Some(&report()));
    }

    #[test]
    fn test_invalid_message_is_discarded() {
        let (decoder, _rlf) = decoder();
        let mut msg = MacUciIndicationMessage::new(slot(10));
        for _ in 0..=MAX_UCI_PDUS_PER_SLOT {
            msg.ucis.push(MacUciPdu {
                rnti: RNTI,
                pdu: MacUciPduKind::PucchF0OrF1(PucchF0OrF1Uci {
                    harq_info: Some(vec![PucchF0OrF1HarqValue::Ack]),
                    ..Default::default()
                }),
            });
        }
        assert!(decoder.decode_uci(&msg).ucis.is_empty());
    }

    #[test]
    fn test_malformed_pdu_does_not_drop_the_slot() {
        let (decoder, rlf) = decoder();
        let mut msg = MacUciIndicationMessage::new(slot(10));
        msg.ucis.push(MacUciPdu {
            rnti: RNTI,
            pdu: MacUciPduKind::PucchF0OrF1(PucchF0OrF1Uci {
                harq_info: Some(vec![PucchF0OrF1HarqValue::Ack]),
                ..Default::default()
            }),
        });
        msg.ucis.push(MacUciPdu {
            rnti: Rnti(0xFFF5),
            pdu: MacUciPduKind::PucchF0OrF1(PucchF0OrF1Uci {
                harq_info: Some(vec![PucchF0OrF1HarqValue::Nack]),
                ..Default::default()
            }),
        });
        msg.ucis.push(MacUciPdu {
            rnti: RNTI,
            pdu: MacUciPduKind::PucchF0OrF1(PucchF0OrF1Uci {
                harq_info: Some(vec![PucchF0OrF1HarqValue::Nack; 3]),
                ..Default::default()
            }),
        });

        let ind = decoder.decode_uci(&msg);
        assert_eq!(ind.ucis.len(), 1);
        assert_eq!(ind.ucis[0].crnti, RNTI);
        assert_eq!(ind.ucis[0].pdu.harqs(), &[HarqAckStatus::Ack]);
        assert_eq!(rlf.events(), vec![LinkEvent::Ack(UE, true)]);
    }
}
