//! Slot-driven DU control path simulation
//!
//! Admits UEs into the PUCCH resource pools, schedules their SR and CSI
//! occasions, synthesizes the UCI the PHY would report for them and feeds it to
//! the UCI cell decoders. UEs leave at random or on RLF and are replaced by new
//! ones, so the pools are continuously allocated and released.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use common::bits::BitPayload;
use common::types::{DuUeIndex, Rnti, SlotPoint, SubcarrierSpacing};
use common::utils::time::slot_duration_us;
use interfaces::message_types::{
    MacUciIndicationMessage, MacUciPdu, MacUciPduKind, PucchF0OrF1HarqValue, PucchF0OrF1Uci, PucchF2OrF3OrF4Uci,
    SrDetection, UciPayloadInfo,
};
use layers::du_manager::{CellGroupConfig, DuCellConfig, PucchResourceManager};
use layers::mac::{ConsecutiveKoRlfDetector, DuRntiTable, HarqAckStatus, PucchInfo, UciCellDecoder, UciIndication, UciPduKind};
use layers::ran::csi_codec::{csi_report_pack_pucch, get_csi_report_pucch_size, CsiReportData, CsiReportPmi};
use layers::ran::csi_report::{
    create_csi_report_configuration, CsiReportConfiguration, CsiReportQuantities, PmiCodebookType,
};
use layers::ran::pucch::PucchFormat;

use crate::config::DuAppConfig;

/// Probability of a UE asking for UL resources at an SR occasion
const SR_PROBABILITY: f64 = 0.1;

/// Periodic PUCCH occasion of a UE
#[derive(Debug, Clone, Copy)]
struct Occasion {
    period: u32,
    offset: u32,
    format: PucchFormat,
}

impl Occasion {
    fn is_due(&self, slot: SlotPoint) -> bool {
        slot.count() % self.period == self.offset
    }
}

/// UE holding PUCCH resources in a cell
#[derive(Debug, Clone)]
struct SimUe {
    ue_index: DuUeIndex,
    crnti: Rnti,
    cell_grp_cfg: CellGroupConfig,
    sr: Option<Occasion>,
    csi: Option<(Occasion, CsiReportConfiguration)>,
}

impl SimUe {
    fn new(ue_index: DuUeIndex, crnti: Rnti, cell_grp_cfg: CellGroupConfig) -> Self {
        let pcell = &cell_grp_cfg.pcell;
        let sr = pcell.pucch_cfg.as_ref().and_then(|pucch_cfg| {
            let sr_res = pucch_cfg.sr_res_list.first()?;
            let res = pucch_cfg.find_resource(sr_res.pucch_res_id.ue_res_id)?;
            Some(Occasion {
                period: sr_res.period.to_slots(),
                offset: sr_res.offset,
                format: res.format(),
            })
        });
        let csi = pcell
            .pucch_cfg
            .as_ref()
            .zip(pcell.csi_meas_cfg.as_ref())
            .and_then(|(pucch_cfg, csi_meas)| {
                let report = csi_meas.pucch_report()?;
                let csi_res = report.pucch_csi_res_list.first()?;
                let res = pucch_cfg.find_resource(csi_res.pucch_res_id.ue_res_id)?;
                let occasion = Occasion {
                    period: report.report_slot_period.to_slots(),
                    offset: report.report_slot_offset,
                    format: res.format(),
                };
                Some((occasion, create_csi_report_configuration(csi_meas)))
            });

        Self {
            ue_index,
            crnti,
            cell_grp_cfg,
            sr,
            csi,
        }
    }

    /// PUCCH grant of the UE in `slot`, if it has an SR or CSI occasion there
    fn pucch_grant<R: Rng>(&self, slot: SlotPoint, rng: &mut R) -> Option<PucchInfo> {
        let sr_due = self.sr.filter(|sr| sr.is_due(slot));
        let csi_due = self.csi.filter(|(csi, _)| csi.is_due(slot));
        let (format, csi_rep_cfg) = match (csi_due, sr_due) {
            (Some((csi, csi_rep_cfg)), _) => (csi.format, Some(csi_rep_cfg)),
            (None, Some(sr)) => (sr.format, None),
            (None, None) => return None,
        };
        Some(PucchInfo {
            crnti: self.crnti,
            format,
            harq_ack_nof_bits: rng.gen_range(0..=1),
            sr_nof_bits: u32::from(sr_due.is_some()),
            csi_rep_cfg,
        })
    }
}

/// Random CSI report that is valid for `cfg`
pub fn random_csi_report<R: Rng>(rng: &mut R, cfg: &CsiReportConfiguration) -> CsiReportData {
    let quantities = cfg.quantities;
    let nof_ports = cfg.pmi_codebook.nof_ports().unwrap_or(1);
    let ranks = cfg.ri_restriction.allowed_ranks(nof_ports);
    let rank = if quantities.contains(CsiReportQuantities::RI) && !ranks.is_empty() {
        ranks[rng.gen_range(0..ranks.len())]
    } else {
        ranks.first().copied().unwrap_or(1)
    };
    let i_2_range = if rank == 1 { 4 } else { 2 };

    let mut report = CsiReportData::default();
    if quantities.contains(CsiReportQuantities::CRI) {
        report.cri = Some(rng.gen_range(0..cfg.nof_csi_rs_resources.max(1)) as u8);
    }
    if quantities.contains(CsiReportQuantities::RI) {
        report.ri = Some(rank as u8);
    }
    if quantities.contains(CsiReportQuantities::LI) {
        report.li = Some(rng.gen_range(0..rank.min(4)) as u8);
    }
    if quantities.contains(CsiReportQuantities::PMI) {
        report.pmi = match cfg.pmi_codebook {
            PmiCodebookType::Two => Some(CsiReportPmi::TwoAntennaPort {
                pmi: rng.gen_range(0..i_2_range),
            }),
            PmiCodebookType::TypeISinglePanel4PortsMode1 => Some(CsiReportPmi::TypeISinglePanel4Ports {
                i_1_1: rng.gen_range(0..8),
                i_1_3: (rank == 2).then(|| rng.gen_range(0..2)),
                i_2: rng.gen_range(0..i_2_range),
            }),
            PmiCodebookType::One | PmiCodebookType::Other => None,
        };
    }
    if quantities.contains(CsiReportQuantities::CQI) {
        report.first_tb_wideband_cqi = Some(rng.gen_range(0..16));
    }
    report
}

/// Channel model of the UCI synthesizer
#[derive(Debug, Clone, Copy)]
struct ChannelModel {
    ack_probability: f64,
    csi_ok_probability: f64,
}

impl ChannelModel {
    fn csi_part1<R: Rng>(&self, rng: &mut R, cfg: &CsiReportConfiguration) -> UciPayloadInfo {
        let nof_bits = get_csi_report_pucch_size(cfg).unwrap_or(0) as usize;
        if !rng.gen_bool(self.csi_ok_probability) {
            return UciPayloadInfo::invalid(nof_bits);
        }
        match csi_report_pack_pucch(&random_csi_report(rng, cfg), cfg) {
            Ok(payload) => UciPayloadInfo::valid(payload),
            Err(err) => {
                warn!("Cannot pack CSI report: {}", err);
                UciPayloadInfo::invalid(nof_bits)
            }
        }
    }

    /// UCI PDU the PHY reports for a PUCCH grant
    fn uci_pdu<R: Rng>(&self, rng: &mut R, grant: &PucchInfo) -> MacUciPdu {
        let ul_sinr_db = Some(rng.gen_range(5.0..25.0));
        let time_advance_offset = Some(rng.gen_range(-2..=2));
        let sr = (grant.sr_nof_bits > 0).then(|| rng.gen_bool(SR_PROBABILITY));
        let harq_bits: Vec<bool> = (0..grant.harq_ack_nof_bits)
            .map(|_| rng.gen_bool(self.ack_probability))
            .collect();

        let pdu = match grant.format {
            PucchFormat::Format0 | PucchFormat::Format1 => {
                let harq_info = (!harq_bits.is_empty()).then(|| {
                    harq_bits
                        .iter()
                        .map(|&ack| match (ack, rng.gen_bool(0.5)) {
                            (true, _) => PucchF0OrF1HarqValue::Ack,
                            (false, true) => PucchF0OrF1HarqValue::Nack,
                            (false, false) => PucchF0OrF1HarqValue::Dtx,
                        })
                        .collect::<Vec<_>>()
                });
                MacUciPduKind::PucchF0OrF1(PucchF0OrF1Uci {
                    sr_info: sr.map(|detected| SrDetection { detected }),
                    harq_info,
                    ul_sinr_db,
                    time_advance_offset,
                })
            }
            PucchFormat::Format2 | PucchFormat::Format3 | PucchFormat::Format4 => {
                MacUciPduKind::PucchF2OrF3OrF4(PucchF2OrF3OrF4Uci {
                    sr_info: sr.map(|detected| BitPayload::from_bits(&[detected])),
                    harq_info: (!harq_bits.is_empty())
                        .then(|| UciPayloadInfo::valid(BitPayload::from_bits(&harq_bits))),
                    csi_part1: grant.csi_rep_cfg.map(|cfg| self.csi_part1(rng, &cfg)),
                    csi_part2: None,
                    ul_sinr_db,
                    time_advance_offset,
                })
            }
        };
        MacUciPdu { rnti: grant.crnti, pdu }
    }
}

/// Decoded UCI counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct UciStats {
    pub indications: u64,
    pub pdus: u64,
    /// PDUs dropped by the decoder, e.g. for UEs released meanwhile
    pub pdus_dropped: u64,
    pub harq_acks: u64,
    pub harq_nacks: u64,
    pub sr_detected: u64,
    pub csi_expected: u64,
    pub csi_decoded: u64,
}

impl UciStats {
    fn record(&mut self, grants: &[PucchInfo], nof_pdus: usize, ind: &UciIndication) {
        self.indications += 1;
        self.pdus += nof_pdus as u64;
        self.pdus_dropped += (nof_pdus - ind.ucis.len()) as u64;
        self.csi_expected += grants.iter().filter(|grant| grant.csi_rep_cfg.is_some()).count() as u64;
        for uci in &ind.ucis {
            for harq in uci.pdu.harqs() {
                match harq {
                    HarqAckStatus::Ack => self.harq_acks += 1,
                    HarqAckStatus::Nack => self.harq_nacks += 1,
                }
            }
            let sr_detected = match &uci.pdu {
                UciPduKind::PucchF0OrF1(pdu) => pdu.sr_detected,
                UciPduKind::PucchF2OrF3OrF4(pdu) => pdu.sr_detected,
                UciPduKind::Pusch(_) => false,
            };
            self.sr_detected += u64::from(sr_detected);
            self.csi_decoded += u64::from(uci.pdu.csi().is_some());
        }
    }
}

/// Final state of a cell
#[derive(Debug, Clone, Serialize)]
pub struct CellSummary {
    pub cell_index: u8,
    pub nof_ues: usize,
    pub free_sr_offsets: usize,
    pub free_csi_offsets: usize,
    /// Most PUCCH grants allocated to any slot of the grant counter
    pub max_pucch_grants_in_slot: u32,
}

/// Simulation summary
#[derive(Debug, Clone, Serialize)]
pub struct SimSummary {
    pub slots: u64,
    pub ues_admitted: u64,
    pub ues_rejected: u64,
    pub ues_released: u64,
    pub rlf_releases: u64,
    pub ues_in_rlf: usize,
    pub cells: Vec<CellSummary>,
    pub uci: UciStats,
}

impl SimSummary {
    pub fn log(&self) {
        info!("Simulation summary after {} slots:", self.slots);
        info!(
            "  UEs admitted: {}, rejected: {}, released: {} ({} on RLF)",
            self.ues_admitted, self.ues_rejected, self.ues_released, self.rlf_releases
        );
        for cell in &self.cells {
            info!(
                "  Cell {}: {} UEs, free SR offsets: {}, free CSI offsets: {}, max PUCCH grants in a slot: {}",
                cell.cell_index, cell.nof_ues, cell.free_sr_offsets, cell.free_csi_offsets, cell.max_pucch_grants_in_slot
            );
        }
        info!(
            "  UCI PDUs: {} ({} dropped), ACK: {}, NACK: {}, SR: {}, CSI decoded: {}/{}",
            self.uci.pdus,
            self.uci.pdus_dropped,
            self.uci.harq_acks,
            self.uci.harq_nacks,
            self.uci.sr_detected,
            self.uci.csi_decoded,
            self.uci.csi_expected
        );
    }
}

struct SimCell {
    cell_cfg: DuCellConfig,
    decoder: UciCellDecoder,
    ues: Vec<SimUe>,
    /// Grants scheduled ahead of their reception slot
    pending: VecDeque<(SlotPoint, Vec<PucchInfo>)>,
}

/// DU control path simulator
pub struct Simulator {
    scs: SubcarrierSpacing,
    round_trip_delay: u32,
    channel: ChannelModel,
    release_probability: f64,
    first_crnti: u16,
    crnti_counter: u32,
    free_ue_indexes: Vec<DuUeIndex>,
    pucch_res_mgr: PucchResourceManager,
    rnti_table: Arc<DuRntiTable>,
    rlf_detector: Arc<ConsecutiveKoRlfDetector>,
    cells: Vec<SimCell>,
    rng: StdRng,
    slot: SlotPoint,
    slots: u64,
    ues_admitted: u64,
    ues_rejected: u64,
    ues_released: u64,
    rlf_releases: u64,
    uci_stats: UciStats,
}

impl Simulator {
    /// Build the cells and admit the initial UE population
    pub fn new(cfg: &DuAppConfig) -> anyhow::Result<Self> {
        let scs = cfg.scs()?;
        let cell_cfgs = cfg.du_cell_configs()?;
        let pucch_res_mgr = PucchResourceManager::new(&cell_cfgs, cfg.max_pucch_grants_per_slot)?;
        let rnti_table = Arc::new(DuRntiTable::new());
        let rlf_detector = Arc::new(ConsecutiveKoRlfDetector::new(cfg.rlf));
        let round_trip_delay = cfg.ue.max_round_trip_delay;

        let cells = cell_cfgs
            .into_iter()
            .map(|cell_cfg| SimCell {
                decoder: UciCellDecoder::new(
                    cell_cfg.cell_index,
                    rnti_table.clone(),
                    rlf_detector.clone(),
                    round_trip_delay,
                ),
                cell_cfg,
                ues: Vec::new(),
                pending: VecDeque::new(),
            })
            .collect();

        let mut sim = Self {
            scs,
            round_trip_delay,
            channel: ChannelModel {
                ack_probability: cfg.ue.ack_probability,
                csi_ok_probability: cfg.ue.csi_ok_probability,
            },
            release_probability: cfg.ue.release_probability,
            first_crnti: cfg.ue.first_crnti,
            crnti_counter: 0,
            free_ue_indexes: (0..DuUeIndex::MAX_NOF_DU_UES).rev().map(DuUeIndex).collect(),
            pucch_res_mgr,
            rnti_table,
            rlf_detector,
            cells,
            rng: StdRng::seed_from_u64(cfg.ue.seed),
            slot: SlotPoint::from_count(scs, 0),
            slots: 0,
            ues_admitted: 0,
            ues_rejected: 0,
            ues_released: 0,
            rlf_releases: 0,
            uci_stats: UciStats::default(),
        };

        let nof_cells = sim.cells.len();
        for n in 0..cfg.ue.nof_ues as usize {
            sim.admit_ue(n % nof_cells);
        }
        info!(
            "Admitted {} of {} UEs over {} cells",
            sim.ues_admitted, cfg.ue.nof_ues, nof_cells
        );
        Ok(sim)
    }

    fn next_crnti(&mut self) -> Option<Rnti> {
        let first = self.first_crnti as u32;
        let span = Rnti::MAX_CRNTI.value() as u32 - first + 1;
        for _ in 0..span {
            let rnti = Rnti::new((first + self.crnti_counter % span) as u16);
            self.crnti_counter = self.crnti_counter.wrapping_add(1);
            if self.rnti_table.get(rnti).is_none() {
                return Some(rnti);
            }
        }
        None
    }

    fn admit_ue(&mut self, cell_pos: usize) -> bool {
        let Some(ue_index) = self.free_ue_indexes.pop() else {
            warn!("No free UE index");
            self.ues_rejected += 1;
            return false;
        };
        let Some(crnti) = self.next_crnti() else {
            warn!("No free C-RNTI");
            self.free_ue_indexes.push(ue_index);
            self.ues_rejected += 1;
            return false;
        };

        let cell = &mut self.cells[cell_pos];
        match self.pucch_res_mgr.alloc_resources(&cell.cell_cfg.make_ue_cell_group_config()) {
            Ok(cell_grp_cfg) => {
                self.rnti_table.add_ue(crnti, ue_index);
                self.rlf_detector.add_ue(ue_index);
                let ue = SimUe::new(ue_index, crnti, cell_grp_cfg);
                debug!(
                    "ue={} rnti={} cell={}: admitted, SR {:?}, CSI {:?}",
                    ue_index,
                    crnti,
                    cell.cell_cfg.cell_index,
                    ue.sr.map(|sr| (sr.period, sr.offset)),
                    ue.csi.map(|(csi, _)| (csi.period, csi.offset))
                );
                cell.ues.push(ue);
                self.ues_admitted += 1;
                true
            }
            Err(err) => {
                debug!("rnti={}: admission rejected. Cause: {}", crnti, err);
                self.free_ue_indexes.push(ue_index);
                self.ues_rejected += 1;
                false
            }
        }
    }

    fn release_ue(&mut self, cell_pos: usize, ue_pos: usize) {
        let ue = self.cells[cell_pos].ues.swap_remove(ue_pos);
        let _ = self.pucch_res_mgr.dealloc_resources(&ue.cell_grp_cfg);
        self.rnti_table.rem_ue(ue.crnti);
        self.rlf_detector.rem_ue(ue.ue_index);
        self.free_ue_indexes.push(ue.ue_index);
        self.ues_released += 1;
    }

    /// Schedule the grants received `round_trip_delay` slots from now
    fn schedule(&mut self, cell_pos: usize, sl_tx: SlotPoint) {
        let cell = &mut self.cells[cell_pos];
        let grants: Vec<PucchInfo> = cell
            .ues
            .iter()
            .filter_map(|ue| ue.pucch_grant(sl_tx, &mut self.rng))
            .collect();
        cell.decoder.store_uci(sl_tx, &grants, &[]);
        cell.pending.push_back((sl_tx, grants));
    }

    /// Synthesize and decode the UCI of the grants due in `sl_rx`
    fn receive(&mut self, cell_pos: usize, sl_rx: SlotPoint) {
        let cell = &mut self.cells[cell_pos];
        if cell.pending.front().map_or(true, |(slot, _)| *slot != sl_rx) {
            return;
        }
        let Some((_, grants)) = cell.pending.pop_front() else {
            return;
        };

        let mut msg = MacUciIndicationMessage::new(sl_rx);
        msg.ucis = grants
            .iter()
            .map(|grant| self.channel.uci_pdu(&mut self.rng, grant))
            .collect();
        let ind = cell.decoder.decode_uci(&msg);
        self.uci_stats.record(&grants, msg.ucis.len(), &ind);
    }

    /// Release UEs in RLF or leaving at random, and admit a replacement for each
    fn churn(&mut self) {
        for cell_pos in 0..self.cells.len() {
            let mut nof_released = 0;
            for ue_pos in (0..self.cells[cell_pos].ues.len()).rev() {
                let ue_index = self.cells[cell_pos].ues[ue_pos].ue_index;
                let in_rlf = self.rlf_detector.is_rlf_detected(ue_index);
                if in_rlf || self.rng.gen_bool(self.release_probability) {
                    self.release_ue(cell_pos, ue_pos);
                    self.rlf_releases += u64::from(in_rlf);
                    nof_released += 1;
                }
            }
            for _ in 0..nof_released {
                self.admit_ue(cell_pos);
            }
        }
    }

    /// Process one slot in all cells
    pub fn run_slot(&mut self) {
        let sl_tx = self.slot + self.round_trip_delay;
        for cell_pos in 0..self.cells.len() {
            self.schedule(cell_pos, sl_tx);
            self.receive(cell_pos, self.slot);
        }
        self.churn();
        self.slot = self.slot + 1;
        self.slots += 1;
    }

    /// Run `nof_slots` slots, paced to the slot duration when `realtime` is set
    pub async fn run(&mut self, nof_slots: u64, realtime: bool) {
        let mut interval = tokio::time::interval(Duration::from_micros(slot_duration_us(self.scs)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let slots_per_second = u64::from(self.scs.slots_per_frame()) * 100;

        for _ in 0..nof_slots {
            if realtime {
                interval.tick().await;
            }
            self.run_slot();

            if self.slots % slots_per_second == 0 {
                info!(
                    "slot={}: {} UEs, {} UCI PDUs, CSI decoded {}/{}",
                    self.slot,
                    self.rnti_table.len(),
                    self.uci_stats.pdus,
                    self.uci_stats.csi_decoded,
                    self.uci_stats.csi_expected
                );
            }
            if !realtime && self.slots % u64::from(self.scs.slots_per_frame()) == 0 {
                tokio::task::yield_now().await;
            }
        }
    }

    pub fn summary(&self) -> SimSummary {
        let cells = self
            .cells
            .iter()
            .map(|cell| {
                let cell_index = cell.cell_cfg.cell_index;
                CellSummary {
                    cell_index: cell_index.0,
                    nof_ues: cell.ues.len(),
                    free_sr_offsets: self.pucch_res_mgr.nof_free_sr_offsets(cell_index).unwrap_or(0),
                    free_csi_offsets: self.pucch_res_mgr.nof_free_csi_offsets(cell_index).unwrap_or(0),
                    max_pucch_grants_in_slot: self
                        .pucch_res_mgr
                        .pucch_grants_per_slot_cnt(cell_index)
                        .and_then(|cnt| cnt.iter().max().copied())
                        .unwrap_or(0),
                }
            })
            .collect();

        SimSummary {
            slots: self.slots,
            ues_admitted: self.ues_admitted,
            ues_rejected: self.ues_rejected,
            ues_released: self.ues_released,
            rlf_releases: self.rlf_releases,
            ues_in_rlf: self.rlf_detector.nof_ues_in_rlf(),
            cells,
            uci: self.uci_stats.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layers::ran::csi_codec::csi_report_unpack_pucch;
    use layers::ran::csi_report::RiRestriction;

    fn csi_cfg(pmi_codebook: PmiCodebookType, quantities: CsiReportQuantities) -> CsiReportConfiguration {
        CsiReportConfiguration {
            nof_csi_rs_resources: 2,
            pmi_codebook,
            ri_restriction: RiRestriction::ALL,
            quantities,
        }
    }

    fn lossless(mut cfg: DuAppConfig) -> DuAppConfig {
        cfg.ue.ack_probability = 1.0;
        cfg.ue.csi_ok_probability = 1.0;
        cfg.ue.release_probability = 0.0;
        cfg
    }

    #[test]
    fn test_random_reports_pack_and_unpack() {
        let mut rng = StdRng::seed_from_u64(3);
        let cfgs = [
            csi_cfg(PmiCodebookType::TypeISinglePanel4PortsMode1, CsiReportQuantities::CRI_RI_PMI_CQI),
            csi_cfg(PmiCodebookType::TypeISinglePanel4PortsMode1, CsiReportQuantities::CRI_RI_LI_PMI_CQI),
            csi_cfg(PmiCodebookType::Two, CsiReportQuantities::CRI_RI_PMI_CQI),
            csi_cfg(PmiCodebookType::Two, CsiReportQuantities::CRI_RI_CQI),
            csi_cfg(PmiCodebookType::One, CsiReportQuantities::CRI_RI_PMI_CQI),
        ];
        for cfg in &cfgs {
            for _ in 0..50 {
                let report = random_csi_report(&mut rng, cfg);
                let payload = csi_report_pack_pucch(&report, cfg).unwrap();
                assert_eq!(payload.len() as u32, get_csi_report_pucch_size(cfg).unwrap());
                assert_eq!(csi_report_unpack_pucch(&payload, cfg).unwrap(), report);
            }
        }
    }

    #[test]
    fn test_every_expected_csi_is_decoded_on_a_clean_channel() {
        let mut sim = Simulator::new(&lossless(DuAppConfig::default())).unwrap();
        assert!(sim.ues_admitted > 0);
        assert_eq!(sim.ues_admitted + sim.ues_rejected, 16);

        for _ in 0..200 {
            sim.run_slot();
        }
        let summary = sim.summary();
        assert!(summary.uci.csi_expected > 0);
        assert_eq!(summary.uci.csi_decoded, summary.uci.csi_expected);
        assert_eq!(summary.uci.pdus_dropped, 0);
        assert_eq!(summary.uci.harq_nacks, 0);
        assert_eq!(summary.ues_in_rlf, 0);
    }

    #[test]
    fn test_churn_keeps_pools_consistent() {
        let mut cfg = lossless(DuAppConfig::default());
        cfg.ue.release_probability = 0.2;
        let mut sim = Simulator::new(&cfg).unwrap();

        for _ in 0..300 {
            sim.run_slot();
        }
        let summary = sim.summary();
        assert!(summary.ues_released > 0);

        // Each UE holds exactly one SR and one CSI (resource, offset) pair.
        let cell = &summary.cells[0];
        let params = &sim.cells[0].cell_cfg.pucch_params;
        assert_eq!(cell.free_sr_offsets + cell.nof_ues, (params.nof_sr_resources * 20) as usize);
        assert_eq!(cell.free_csi_offsets + cell.nof_ues, (params.nof_csi_resources * 20) as usize);
        assert!(cell.max_pucch_grants_in_slot < cfg.max_pucch_grants_per_slot);
        assert_eq!(sim.rnti_table.len(), cell.nof_ues);
    }

    #[test]
    fn test_rlf_ues_are_replaced() {
        let mut cfg = lossless(DuAppConfig::default());
        cfg.ue.ack_probability = 0.0;
        cfg.rlf.max_consecutive_kos = 2;
        let mut sim = Simulator::new(&cfg).unwrap();
        let admitted = sim.ues_admitted;

        for _ in 0..400 {
            sim.run_slot();
        }
        let summary = sim.summary();
        assert!(summary.rlf_releases > 0);
        assert_eq!(summary.ues_in_rlf, 0);
        assert!(summary.ues_admitted > admitted);
        assert_eq!(summary.cells[0].nof_ues as u64, summary.ues_admitted - summary.ues_released);
    }

    #[tokio::test]
    async fn test_run_counts_slots() {
        let mut sim = Simulator::new(&lossless(DuAppConfig::default())).unwrap();
        sim.run(50, false).await;
        assert_eq!(sim.summary().slots, 50);
    }
}
