//! PUCCH resource manager
//!
//! Keeps, per cell, the free `(resource, slot offset)` pairs for SR and
//! periodic CSI and the number of PUCCH grants recurring in every slot of the
//! SR/CSI hyper-period. UEs are handed one SR pair and, when they report CSI,
//! one CSI pair, chosen so that no slot exceeds the PUCCH grant limit and the
//! CSI report fits the CSI resource.

use std::collections::BTreeSet;
use std::iter::StepBy;
use std::ops::Range;

use common::types::DuCellIndex;
use common::utils::lcm_of;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::pucch_builder_params::PucchBuilderParams;
use super::pucch_config_builder::{
    build_ue_pucch_config, csi_idx_from_ue_config, make_default_pucch_config, sr_idx_from_ue_config,
};
use super::pucch_resource_generator::generate_cell_pucch_res_list;
use super::{CellGroupConfig, DuCellConfig};
use crate::ran::csi_codec::{get_csi_report_pucch_size, CsiError};
use crate::ran::csi_meas::{CsiMeasConfig, PucchCsiResource};
use crate::ran::csi_report::create_csi_report_configuration;
use crate::ran::pucch::{PucchConfig, PucchFormat, PucchResId, PucchResource};
use crate::LayerError;

/// Slots a UE needs between a CSI-RS and the report measuring it
const MINIMUM_CSI_RS_REPORT_DISTANCE: i64 = 4;

/// Why a UE could not be given PUCCH resources
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PucchAllocError {
    #[error("Unknown cell index {0}")]
    UnknownCell(DuCellIndex),

    #[error("No free SR resource in cell {0}")]
    NoFreeSrResource(DuCellIndex),

    #[error("No free CSI resource in cell {0}")]
    NoFreeCsiResource(DuCellIndex),

    #[error("No SR/CSI offset within the PUCCH grant and payload limits in cell {0}")]
    NoSuitableOffset(DuCellIndex),

    #[error("Unsupported CSI report: {0}")]
    CsiReport(#[from] CsiError),
}

/// A resource index within the SR or CSI range and a slot offset within its period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceOffset {
    pub res_idx: u32,
    pub offset: u32,
}

/// Slots `offset, offset + period, ...` below `lcm`
fn recurrences(offset: u32, period: u32, lcm: u32) -> StepBy<Range<usize>> {
    (offset as usize..lcm as usize).step_by(period as usize)
}

/// Resource pools of one cell
#[derive(Debug, Clone)]
struct CellResourceContext {
    cell_index: DuCellIndex,
    params: PucchBuilderParams,
    cell_res_list: Vec<PucchResource>,
    default_pucch_cfg: PucchConfig,
    max_pucch_grants_per_slot: u32,
    sr_period: u32,
    /// `None` when the cell has no periodic CSI
    csi_period: Option<u32>,
    lcm: u32,
    sr_free: Vec<ResourceOffset>,
    csi_free: Vec<ResourceOffset>,
    /// Grants recurring in each slot of the `lcm` window
    pucch_grants_per_slot_cnt: Vec<u32>,
    /// Allocations so far, spreads UEs over the HARQ resource sets
    ue_idx: u32,
}

impl CellResourceContext {
    fn new(cell_cfg: &DuCellConfig, max_pucch_grants_per_slot: u32) -> Result<Self, LayerError> {
        cell_cfg.validate()?;

        let params = cell_cfg.pucch_params;
        let cell_res_list = generate_cell_pucch_res_list(&params, cell_cfg.bwp_nof_prbs)?;
        let default_pucch_cfg = make_default_pucch_config(&params, cell_cfg.sr_period);

        let sr_period = cell_cfg.sr_period.to_slots();
        let csi_period = cell_cfg
            .default_csi_meas_cfg
            .as_ref()
            .and_then(|csi_meas| csi_meas.pucch_report())
            .map(|report| report.report_slot_period.to_slots());
        let lcm = lcm_of(std::iter::once(sr_period).chain(csi_period));

        let sr_free = (0..params.nof_sr_resources)
            .flat_map(|res_idx| (0..sr_period).map(move |offset| ResourceOffset { res_idx, offset }))
            .collect();
        let csi_free = match csi_period {
            Some(period) => (0..params.nof_csi_resources)
                .flat_map(|res_idx| (0..period).map(move |offset| ResourceOffset { res_idx, offset }))
                .collect(),
            None => Vec::new(),
        };

        Ok(Self {
            cell_index: cell_cfg.cell_index,
            params,
            cell_res_list,
            default_pucch_cfg,
            max_pucch_grants_per_slot,
            sr_period,
            csi_period,
            lcm,
            sr_free,
            csi_free,
            pucch_grants_per_slot_cnt: vec![0; lcm as usize],
            ue_idx: 0,
        })
    }

    fn sr_resource(&self, sr_idx: u32) -> &PucchResource {
        &self.cell_res_list[self.params.cell_sr_res_id(sr_idx) as usize]
    }

    fn csi_resource(&self, csi_idx: u32) -> &PucchResource {
        &self.cell_res_list[self.params.cell_csi_res_id(csi_idx) as usize]
    }

    /// Whether a grant recurring every `period` slots from `offset` would
    /// exceed the grant limit in some slot
    fn offset_exceeds_grant_cnt(&self, offset: u32, period: u32) -> bool {
        recurrences(offset, period, self.lcm)
            .any(|slot| self.pucch_grants_per_slot_cnt[slot] >= self.max_pucch_grants_per_slot)
    }

    /// Whether some recurrence of the CSI offset falls on a recurrence of the SR offset
    fn csi_collides_with_sr(&self, csi_offset: u32, csi_period: u32, sr_offset: u32) -> bool {
        recurrences(csi_offset, csi_period, self.lcm).any(|slot| slot as u32 % self.sr_period == sr_offset)
    }

    /// Slots of the `lcm` window holding a grant of the SR or the CSI offset
    fn grant_slots(&self, sr_offset: u32, csi_offset: Option<u32>) -> BTreeSet<usize> {
        let mut slots: BTreeSet<usize> = recurrences(sr_offset, self.sr_period, self.lcm).collect();
        if let (Some(offset), Some(period)) = (csi_offset, self.csi_period) {
            slots.extend(recurrences(offset, period, self.lcm));
        }
        slots
    }

    /// Position in the CSI free list of the best CSI offset for a UE whose SR
    /// uses `sr_offset` on `sr_res`.
    ///
    /// Lower weight wins, ties go to the earlier entry. Offsets trailing the
    /// CSI-RS by at least [`MINIMUM_CSI_RS_REPORT_DISTANCE`] slots are
    /// preferred; offsets sharing slots with the SR are penalized and offsets
    /// that would exceed the grant limit are only picked when nothing else is
    /// free, in which case `None` is returned.
    fn find_optimal_csi_report_slot_offset(
        &self,
        sr_offset: u32,
        sr_res: &PucchResource,
        csi_meas: &CsiMeasConfig,
    ) -> Option<usize> {
        let csi_period = self.csi_period?;
        let (csi_rs_period, csi_rs_offset) = csi_meas.csi_rs_period_and_offset().unwrap_or((csi_period, 0));
        let csi_rs_period = i64::from(csi_rs_period);
        let csi_rs_offset = i64::from(csi_rs_offset);

        let weight = |candidate: &ResourceOffset| -> i64 {
            let mut weight = (csi_rs_period + i64::from(candidate.offset) - csi_rs_offset
                - MINIMUM_CSI_RS_REPORT_DISTANCE)
                .rem_euclid(csi_rs_period);

            // F0 and F2 in disjoint symbols cannot be multiplexed.
            let csi_res = self.csi_resource(candidate.res_idx);
            if sr_res.format() == PucchFormat::Format0
                && csi_res.format() == PucchFormat::Format2
                && !sr_res.symbols().overlaps(&csi_res.symbols())
            {
                return weight + 2 * csi_rs_period;
            }

            if self.csi_collides_with_sr(candidate.offset, csi_period, sr_offset) {
                weight += csi_rs_period;
            }
            if self.offset_exceeds_grant_cnt(candidate.offset, csi_period) {
                weight += 2 * csi_rs_period;
            }
            weight
        };

        let (pos, best) = self
            .csi_free
            .iter()
            .enumerate()
            .min_by_key(|&(_, candidate)| weight(candidate))?;

        if self.offset_exceeds_grant_cnt(best.offset, csi_period) {
            return None;
        }
        Some(pos)
    }

    /// Best CSI offset for the SR choice whose report, plus an SR bit when
    /// both share a slot, fits the CSI resource
    fn get_csi_resource_offset(
        &self,
        sr_offset: u32,
        sr_res: &PucchResource,
        csi_meas: &CsiMeasConfig,
        csi_report_size: u32,
    ) -> Option<usize> {
        let pos = self.find_optimal_csi_report_slot_offset(sr_offset, sr_res, csi_meas)?;
        let candidate = self.csi_free[pos];
        let csi_period = self.csi_period?;

        let sr_bits = u32::from(self.csi_collides_with_sr(candidate.offset, csi_period, sr_offset));
        let max_payload = self
            .params
            .f2_or_f3_or_f4_params
            .max_payload(self.csi_resource(candidate.res_idx));
        if csi_report_size + sr_bits > max_payload {
            debug!(
                "Cell {}: CSI report of {} bits (+{} SR) exceeds PUCCH {:?} payload of {} bits",
                self.cell_index,
                csi_report_size,
                sr_bits,
                self.params.f2_or_f3_or_f4_params.format(),
                max_payload
            );
            return None;
        }
        Some(pos)
    }

    /// Free list positions of the first SR offset (and CSI offset) that keep
    /// the grant limit
    fn select_offsets(&self, csi: Option<(&CsiMeasConfig, u32)>) -> Option<(usize, Option<usize>)> {
        for (sr_pos, sr_candidate) in self.sr_free.iter().enumerate() {
            if self.offset_exceeds_grant_cnt(sr_candidate.offset, self.sr_period) {
                continue;
            }
            let Some((csi_meas, csi_report_size)) = csi else {
                return Some((sr_pos, None));
            };
            let sr_res = self.sr_resource(sr_candidate.res_idx);
            if let Some(csi_pos) = self.get_csi_resource_offset(sr_candidate.offset, sr_res, csi_meas, csi_report_size)
            {
                return Some((sr_pos, Some(csi_pos)));
            }
        }
        None
    }

    fn alloc(&mut self, cell_grp_cfg: &CellGroupConfig) -> Result<CellGroupConfig, PucchAllocError> {
        let csi_meas = cell_grp_cfg
            .pcell
            .csi_meas_cfg
            .as_ref()
            .filter(|csi_meas| csi_meas.pucch_report().is_some());

        if self.sr_free.is_empty() {
            return Err(PucchAllocError::NoFreeSrResource(self.cell_index));
        }
        if csi_meas.is_some() && self.csi_free.is_empty() {
            return Err(PucchAllocError::NoFreeCsiResource(self.cell_index));
        }

        let csi_report_size = csi_meas
            .map(|csi_meas| get_csi_report_pucch_size(&create_csi_report_configuration(csi_meas)))
            .transpose()?;
        let (sr_pos, csi_pos) = self
            .select_offsets(csi_meas.zip(csi_report_size))
            .ok_or(PucchAllocError::NoSuitableOffset(self.cell_index))?;

        let sr = self.sr_free.remove(sr_pos);
        let csi = csi_pos.map(|pos| self.csi_free.remove(pos));
        for slot in self.grant_slots(sr.offset, csi.map(|csi| csi.offset)) {
            self.pucch_grants_per_slot_cnt[slot] += 1;
            debug_assert!(self.pucch_grants_per_slot_cnt[slot] <= self.max_pucch_grants_per_slot);
        }

        let harq_set = self.ue_idx % self.params.nof_cell_harq_pucch_res_sets;
        let mut pucch_cfg = build_ue_pucch_config(
            &self.params,
            &self.default_pucch_cfg,
            &self.cell_res_list,
            harq_set,
            sr.res_idx,
            csi.map(|csi| csi.res_idx),
        );
        if let Some(sr_res) = pucch_cfg.sr_res_list.first_mut() {
            sr_res.offset = sr.offset;
        }

        let mut cfg = cell_grp_cfg.clone();
        if let Some(csi) = csi {
            if let Some(report) = cfg.pcell.csi_meas_cfg.as_mut().and_then(|csi_meas| csi_meas.pucch_report_mut()) {
                report.report_slot_offset = csi.offset;
                report.pucch_csi_res_list = vec![PucchCsiResource {
                    ul_bwp: 0,
                    pucch_res_id: PucchResId {
                        cell_res_id: self.params.cell_csi_res_id(csi.res_idx),
                        ue_res_id: self.params.ue_csi_res_id(),
                    },
                }];
            }
        }
        cfg.pcell.pucch_cfg = Some(pucch_cfg);
        self.ue_idx = self.ue_idx.wrapping_add(1);

        debug!(
            "Cell {}: allocated SR {:?}, CSI {:?}, HARQ set {}",
            self.cell_index, sr, csi, harq_set
        );
        Ok(cfg)
    }

    fn dealloc(&mut self, pucch_cfg: &PucchConfig, csi_meas: Option<&CsiMeasConfig>) {
        let sr = pucch_cfg.sr_res_list.first().and_then(|sr_res| {
            sr_idx_from_ue_config(&self.params, pucch_cfg).map(|res_idx| ResourceOffset {
                res_idx,
                offset: sr_res.offset,
            })
        });
        let Some(sr) = sr else {
            warn!("Cell {}: released PUCCH config holds no SR resource of this cell", self.cell_index);
            return;
        };
        let csi = csi_idx_from_ue_config(&self.params, pucch_cfg)
            .zip(csi_meas.and_then(|csi_meas| csi_meas.pucch_report()))
            .map(|(res_idx, report)| ResourceOffset {
                res_idx,
                offset: report.report_slot_offset,
            });

        if self.sr_free.contains(&sr) || csi.is_some_and(|csi| self.csi_free.contains(&csi)) {
            warn!(
                "Cell {}: SR {:?}, CSI {:?} are already free, ignoring release",
                self.cell_index, sr, csi
            );
            return;
        }

        let slots = self.grant_slots(sr.offset, csi.map(|csi| csi.offset));
        if let Some(slot) = slots.iter().find(|&&slot| self.pucch_grants_per_slot_cnt[slot] == 0) {
            panic!("Cell {}: PUCCH grant counter underflow in slot {}", self.cell_index, slot);
        }

        self.sr_free.push(sr);
        if let Some(csi) = csi {
            self.csi_free.push(csi);
        }
        for slot in slots {
            self.pucch_grants_per_slot_cnt[slot] -= 1;
        }

        debug!("Cell {}: released SR {:?}, CSI {:?}", self.cell_index, sr, csi);
    }
}

/// SR and CSI PUCCH resource pools of all DU cells.
///
/// Calls for one cell must be serialized by the caller; cells are independent.
#[derive(Debug, Clone)]
pub struct PucchResourceManager {
    cells: Vec<CellResourceContext>,
    max_pucch_grants_per_slot: u32,
}

impl PucchResourceManager {
    /// Build the pools of `cell_cfgs`.
    ///
    /// One of the `max_pucch_grants_per_slot` PUCCH grants of a slot is kept
    /// for HARQ-only grants.
    pub fn new(cell_cfgs: &[DuCellConfig], max_pucch_grants_per_slot: u32) -> Result<Self, LayerError> {
        if max_pucch_grants_per_slot < 2 {
            return Err(LayerError::InvalidConfiguration(format!(
                "At least 2 PUCCH grants per slot are needed, got {}",
                max_pucch_grants_per_slot
            )));
        }

        let mut cells: Vec<CellResourceContext> = Vec::with_capacity(cell_cfgs.len());
        for cell_cfg in cell_cfgs {
            if cells.iter().any(|cell| cell.cell_index == cell_cfg.cell_index) {
                return Err(LayerError::DuplicateCell(cell_cfg.cell_index.0));
            }
            cells.push(CellResourceContext::new(cell_cfg, max_pucch_grants_per_slot - 1)?);
        }

        for cell in &cells {
            info!(
                "Cell {}: PUCCH pools with {} SR and {} CSI offsets over {} slots",
                cell.cell_index,
                cell.sr_free.len(),
                cell.csi_free.len(),
                cell.lcm
            );
        }

        Ok(Self {
            cells,
            max_pucch_grants_per_slot: max_pucch_grants_per_slot - 1,
        })
    }

    fn cell(&self, cell_index: DuCellIndex) -> Option<&CellResourceContext> {
        self.cells.iter().find(|cell| cell.cell_index == cell_index)
    }

    fn cell_mut(&mut self, cell_index: DuCellIndex) -> Option<&mut CellResourceContext> {
        self.cells.iter_mut().find(|cell| cell.cell_index == cell_index)
    }

    /// Grants per slot available to SR and CSI
    pub fn max_pucch_grants_per_slot(&self) -> u32 {
        self.max_pucch_grants_per_slot
    }

    /// Assign SR and, when the UE reports periodic CSI, CSI resources to a UE.
    ///
    /// Returns the UE configuration with its PUCCH-Config and CSI report
    /// placement filled in. On error the pools are left untouched and the
    /// caller keeps the UE without PUCCH.
    #[must_use = "the allocated resources live only in the returned configuration"]
    pub fn alloc_resources(&mut self, cell_grp_cfg: &CellGroupConfig) -> Result<CellGroupConfig, PucchAllocError> {
        let cell_index = cell_grp_cfg.pcell.cell_index;
        let cell = self
            .cell_mut(cell_index)
            .ok_or(PucchAllocError::UnknownCell(cell_index))?;

        let result = cell.alloc(cell_grp_cfg);
        if let Err(err) = &result {
            warn!("Cell {}: PUCCH resource allocation failed: {}", cell_index, err);
        }
        result
    }

    /// Return the UE's SR and CSI resources to the pools.
    ///
    /// Returns the configuration with PUCCH disabled. Configurations without
    /// PUCCH are returned unchanged and resources that are already free are
    /// left alone, so releasing twice is harmless.
    #[must_use = "the returned configuration no longer references the released resources"]
    pub fn dealloc_resources(&mut self, cell_grp_cfg: &CellGroupConfig) -> CellGroupConfig {
        let mut cfg = cell_grp_cfg.clone();
        let Some(pucch_cfg) = cell_grp_cfg.pcell.pucch_cfg.as_ref() else {
            return cfg;
        };

        let cell_index = cell_grp_cfg.pcell.cell_index;
        match self.cell_mut(cell_index) {
            Some(cell) => cell.dealloc(pucch_cfg, cell_grp_cfg.pcell.csi_meas_cfg.as_ref()),
            None => warn!("Cell {}: releasing PUCCH resources of an unknown cell", cell_index),
        }
        cfg.pcell.disable_pucch();
        cfg
    }

    /// Grants recurring in each slot of the cell's SR/CSI hyper-period
    pub fn pucch_grants_per_slot_cnt(&self, cell_index: DuCellIndex) -> Option<&[u32]> {
        self.cell(cell_index).map(|cell| cell.pucch_grants_per_slot_cnt.as_slice())
    }

    pub fn nof_free_sr_offsets(&self, cell_index: DuCellIndex) -> Option<usize> {
        self.cell(cell_index).map(|cell| cell.sr_free.len())
    }

    pub fn nof_free_csi_offsets(&self, cell_index: DuCellIndex) -> Option<usize> {
        self.cell(cell_index).map(|cell| cell.csi_free.len())
    }

    /// Cell-wide PUCCH resource list
    pub fn cell_pucch_res_list(&self, cell_index: DuCellIndex) -> Option<&[PucchResource]> {
        self.cell(cell_index).map(|cell| cell.cell_res_list.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::du_manager::{PucchF2OrF3OrF4Params, ServingCellConfig};
    use crate::ran::csi_meas::{make_default_csi_meas_config, CsiMeasParams, ReportQuantityType};
    use crate::ran::periodicity::{CsiReportPeriodicity, CsiResourcePeriodicity, SrPeriodicity};
    use crate::ran::pucch::{MaxCodeRate, OfdmSymbolRange, PucchFormatParams};
    use std::collections::HashSet;

    const CELL: DuCellIndex = DuCellIndex(0);

    fn csi_meas(
        nof_ports: u32,
        csi_rs_period: CsiResourcePeriodicity,
        csi_rs_offset: u32,
        report_period: CsiReportPeriodicity,
    ) -> CsiMeasConfig {
        make_default_csi_meas_config(&CsiMeasParams {
            nof_ports,
            csi_rs_period,
            csi_rs_offset,
            report_period,
            report_qty_type: ReportQuantityType::CriRiPmiCqi,
            ri_restriction: if nof_ports == 4 { 0b1111 } else { 0b11 },
        })
    }

    fn cell_cfg(
        nof_sr_resources: u32,
        nof_csi_resources: u32,
        sr_period: SrPeriodicity,
        csi: Option<CsiMeasConfig>,
    ) -> DuCellConfig {
        DuCellConfig {
            cell_index: CELL,
            bwp_nof_prbs: 52,
            pucch_params: PucchBuilderParams {
                nof_sr_resources,
                nof_csi_resources,
                ..PucchBuilderParams::default()
            },
            sr_period,
            default_csi_meas_cfg: csi,
        }
    }

    fn sr_only_manager(nof_sr_resources: u32, sr_period: SrPeriodicity, max_grants: u32) -> PucchResourceManager {
        PucchResourceManager::new(&[cell_cfg(nof_sr_resources, 0, sr_period, None)], max_grants).unwrap()
    }

    fn csi_manager(max_grants: u32) -> (PucchResourceManager, DuCellConfig) {
        let cfg = cell_cfg(
            2,
            2,
            SrPeriodicity::Sl10,
            Some(csi_meas(2, CsiResourcePeriodicity::Slots20, 2, CsiReportPeriodicity::Slots20)),
        );
        (PucchResourceManager::new(&[cfg.clone()], max_grants).unwrap(), cfg)
    }

    fn pool_state(mgr: &PucchResourceManager) -> (Vec<ResourceOffset>, Vec<ResourceOffset>, Vec<u32>) {
        let cell = mgr.cell(CELL).unwrap();
        (
            cell.sr_free.clone(),
            cell.csi_free.clone(),
            cell.pucch_grants_per_slot_cnt.clone(),
        )
    }

    fn sr_of(mgr: &PucchResourceManager, cfg: &CellGroupConfig) -> ResourceOffset {
        let pucch_cfg = cfg.pcell.pucch_cfg.as_ref().unwrap();
        ResourceOffset {
            res_idx: sr_idx_from_ue_config(&mgr.cell(CELL).unwrap().params, pucch_cfg).unwrap(),
            offset: pucch_cfg.sr_res_list[0].offset,
        }
    }

    fn csi_of(mgr: &PucchResourceManager, cfg: &CellGroupConfig) -> Option<ResourceOffset> {
        let pucch_cfg = cfg.pcell.pucch_cfg.as_ref().unwrap();
        let res_idx = csi_idx_from_ue_config(&mgr.cell(CELL).unwrap().params, pucch_cfg)?;
        let report = cfg.pcell.csi_meas_cfg.as_ref()?.pucch_report()?;
        Some(ResourceOffset {
            res_idx,
            offset: report.report_slot_offset,
        })
    }

    /// Grants per slot recomputed from the UE configurations
    fn expected_grants(mgr: &PucchResourceManager, ues: &[CellGroupConfig]) -> Vec<u32> {
        let cell = mgr.cell(CELL).unwrap();
        let mut cnt = vec![0; cell.lcm as usize];
        for ue in ues {
            let slots = cell.grant_slots(sr_of(mgr, ue).offset, csi_of(mgr, ue).map(|csi| csi.offset));
            for slot in slots {
                cnt[slot] += 1;
            }
        }
        cnt
    }

    #[test]
    fn test_manager_construction() {
        let mgr = sr_only_manager(2, SrPeriodicity::Sl4, 3);
        assert_eq!(mgr.max_pucch_grants_per_slot(), 2);
        assert_eq!(mgr.nof_free_sr_offsets(CELL), Some(8));
        assert_eq!(mgr.nof_free_csi_offsets(CELL), Some(0));
        assert_eq!(mgr.pucch_grants_per_slot_cnt(CELL).map(|cnt| cnt.len()), Some(4));

        let (mgr, _) = csi_manager(4);
        assert_eq!(mgr.nof_free_csi_offsets(CELL), Some(40));
        assert_eq!(mgr.pucch_grants_per_slot_cnt(CELL).map(|cnt| cnt.len()), Some(20));
    }

    #[test]
    fn test_invalid_manager_configuration() {
        let cfg = cell_cfg(2, 0, SrPeriodicity::Sl4, None);
        assert!(matches!(
            PucchResourceManager::new(&[cfg.clone()], 1),
            Err(LayerError::InvalidConfiguration(_))
        ));
        assert_eq!(
            PucchResourceManager::new(&[cfg.clone(), cfg], 3).unwrap_err(),
            LayerError::DuplicateCell(0)
        );
    }

    #[test]
    fn test_unknown_cell() {
        let mut mgr = sr_only_manager(1, SrPeriodicity::Sl4, 3);
        let mut ue = cell_cfg(1, 0, SrPeriodicity::Sl4, None).make_ue_cell_group_config();
        ue.pcell.cell_index = DuCellIndex(3);
        assert_eq!(mgr.alloc_resources(&ue), Err(PucchAllocError::UnknownCell(DuCellIndex(3))));
    }

    #[test]
    fn test_sr_exhaustion_fails_on_first_extra_ue() {
        let cfg = cell_cfg(2, 0, SrPeriodicity::Sl4, None);
        let mut mgr = PucchResourceManager::new(&[cfg.clone()], 3).unwrap();

        let mut ues = Vec::new();
        for _ in 0..8 {
            ues.push(mgr.alloc_resources(&cfg.make_ue_cell_group_config()).unwrap());
        }
        let before = pool_state(&mgr);
        assert_eq!(before.2, vec![2, 2, 2, 2]);

        let result = mgr.alloc_resources(&cfg.make_ue_cell_group_config());
        assert_eq!(result, Err(PucchAllocError::NoFreeSrResource(CELL)));
        assert_eq!(pool_state(&mgr), before);

        let pairs: HashSet<ResourceOffset> = ues.iter().map(|ue| sr_of(&mgr, ue)).collect();
        assert_eq!(pairs.len(), 8);
    }

    #[test]
    fn test_grant_limit_stops_allocation_before_free_list_is_empty() {
        let cfg = cell_cfg(3, 0, SrPeriodicity::Sl4, None);
        let mut mgr = PucchResourceManager::new(&[cfg.clone()], 3).unwrap();
        for _ in 0..8 {
            assert!(mgr.alloc_resources(&cfg.make_ue_cell_group_config()).is_ok());
        }
        let before = pool_state(&mgr);
        assert_eq!(before.0.len(), 4);
        assert_eq!(
            mgr.alloc_resources(&cfg.make_ue_cell_group_config()),
            Err(PucchAllocError::NoSuitableOffset(CELL))
        );
        assert_eq!(pool_state(&mgr), before);
    }

    #[test]
    fn test_alloc_writes_sr_and_csi_placement() {
        let (mut mgr, cfg) = csi_manager(4);
        let ue = mgr.alloc_resources(&cfg.make_ue_cell_group_config()).unwrap();

        let pucch_cfg = ue.pcell.pucch_cfg.as_ref().unwrap();
        assert_eq!(sr_of(&mgr, &ue), ResourceOffset { res_idx: 0, offset: 0 });
        // CSI-RS at offset 2: offset 6 is the first at least 4 slots later.
        assert_eq!(csi_of(&mgr, &ue), Some(ResourceOffset { res_idx: 0, offset: 6 }));

        let params = mgr.cell(CELL).unwrap().params;
        let report = ue.pcell.csi_meas_cfg.as_ref().unwrap().pucch_report().unwrap();
        assert_eq!(report.pucch_csi_res_list[0].pucch_res_id.ue_res_id, params.ue_csi_res_id());
        assert!(pucch_cfg.find_resource(params.ue_csi_res_id()).is_some());
        assert_eq!(pucch_cfg.max_payload(PucchFormat::Format1), 2);
        assert_eq!(pucch_cfg.max_payload(PucchFormat::Format2), 11);
        assert_eq!(pucch_cfg.set1_format, PucchFormat::Format2);
    }

    #[test]
    fn test_harq_sets_are_round_robin() {
        let mut cfg = cell_cfg(4, 0, SrPeriodicity::Sl10, None);
        cfg.pucch_params.nof_cell_harq_pucch_res_sets = 2;
        let mut mgr = PucchResourceManager::new(&[cfg.clone()], 4).unwrap();
        let first_harq_res = |ue: &CellGroupConfig| ue.pcell.pucch_cfg.as_ref().unwrap().pucch_res_list[0].res_id;

        let ue0 = mgr.alloc_resources(&cfg.make_ue_cell_group_config()).unwrap();
        let ue1 = mgr.alloc_resources(&cfg.make_ue_cell_group_config()).unwrap();
        let ue2 = mgr.alloc_resources(&cfg.make_ue_cell_group_config()).unwrap();
        assert_eq!(first_harq_res(&ue0).cell_res_id, 0);
        assert_eq!(first_harq_res(&ue1).cell_res_id, cfg.pucch_params.nof_ue_pucch_f0_or_f1_res_harq);
        assert_eq!(first_harq_res(&ue2).cell_res_id, 0);
        assert_eq!(first_harq_res(&ue1).ue_res_id, 0);
    }

    #[test]
    fn test_grant_counts_match_allocations_without_double_use() {
        let (mut mgr, cfg) = csi_manager(3);
        let mut ues = Vec::new();
        while let Ok(ue) = mgr.alloc_resources(&cfg.make_ue_cell_group_config()) {
            ues.push(ue);
            let cnt = mgr.pucch_grants_per_slot_cnt(CELL).unwrap();
            assert!(cnt.iter().all(|&c| c <= mgr.max_pucch_grants_per_slot()));
            assert_eq!(cnt, expected_grants(&mgr, &ues).as_slice());
        }
        assert!(ues.len() >= 10);

        let sr_pairs: HashSet<_> = ues.iter().map(|ue| sr_of(&mgr, ue)).collect();
        let csi_pairs: HashSet<_> = ues.iter().filter_map(|ue| csi_of(&mgr, ue)).collect();
        assert_eq!(sr_pairs.len(), ues.len());
        assert_eq!(csi_pairs.len(), ues.len());

        let free: HashSet<_> = mgr.cell(CELL).unwrap().sr_free.iter().copied().collect();
        assert!(sr_pairs.is_disjoint(&free));

        let released: Vec<_> = ues.drain(..ues.len() / 2).collect();
        for ue in &released {
            let _ = mgr.dealloc_resources(ue);
        }
        assert_eq!(mgr.pucch_grants_per_slot_cnt(CELL).unwrap(), expected_grants(&mgr, &ues).as_slice());
    }

    #[test]
    fn test_dealloc_restores_pools_and_is_idempotent() {
        let (mut mgr, cfg) = csi_manager(4);
        let (mut sr_free, mut csi_free, cnt) = pool_state(&mgr);

        let ue = mgr.alloc_resources(&cfg.make_ue_cell_group_config()).unwrap();
        assert_ne!(pool_state(&mgr).2, cnt);

        let released = mgr.dealloc_resources(&ue);
        assert!(released.pcell.pucch_cfg.is_none());

        let after_first = pool_state(&mgr);
        let (mut sr_after, mut csi_after, cnt_after) = after_first.clone();
        sr_free.sort();
        csi_free.sort();
        sr_after.sort();
        csi_after.sort();
        assert_eq!(sr_after, sr_free);
        assert_eq!(csi_after, csi_free);
        assert_eq!(cnt_after, cnt);

        let released_again = mgr.dealloc_resources(&released);
        assert_eq!(released_again, released);
        assert_eq!(pool_state(&mgr), after_first);
    }

    #[test]
    fn test_releasing_the_same_config_twice_keeps_pools_intact() {
        let (mut mgr, cfg) = csi_manager(4);
        let ue = mgr.alloc_resources(&cfg.make_ue_cell_group_config()).unwrap();
        let other = mgr.alloc_resources(&cfg.make_ue_cell_group_config()).unwrap();

        let _ = mgr.dealloc_resources(&ue);
        let after_first = pool_state(&mgr);
        let released_again = mgr.dealloc_resources(&ue);
        assert!(released_again.pcell.pucch_cfg.is_none());
        assert_eq!(pool_state(&mgr), after_first);

        let sr_free = &mgr.cell(CELL).unwrap().sr_free;
        let distinct: HashSet<_> = sr_free.iter().collect();
        assert_eq!(distinct.len(), sr_free.len());
        let csi_free = &mgr.cell(CELL).unwrap().csi_free;
        let distinct: HashSet<_> = csi_free.iter().collect();
        assert_eq!(distinct.len(), csi_free.len());

        // The other UE's resources are unaffected and can still be released.
        let _ = mgr.dealloc_resources(&other);
        assert!(mgr.pucch_grants_per_slot_cnt(CELL).unwrap().iter().all(|&cnt| cnt == 0));
    }

    #[test]
    fn test_ue_without_csi_gets_sr_only() {
        let (mut mgr, cfg) = csi_manager(4);
        let mut ue_cfg = cfg.make_ue_cell_group_config();
        ue_cfg.pcell.csi_meas_cfg = None;
        let ue = mgr.alloc_resources(&ue_cfg).unwrap();
        assert!(csi_of(&mgr, &ue).is_none());
        assert_eq!(mgr.nof_free_csi_offsets(CELL), Some(40));
    }

    #[test]
    fn test_csi_ue_in_cell_without_csi_resources() {
        let cfg = cell_cfg(2, 0, SrPeriodicity::Sl10, None);
        let mut mgr = PucchResourceManager::new(&[cfg.clone()], 3).unwrap();
        let ue_cfg = CellGroupConfig {
            pcell: ServingCellConfig {
                cell_index: CELL,
                pucch_cfg: None,
                csi_meas_cfg: Some(csi_meas(2, CsiResourcePeriodicity::Slots20, 0, CsiReportPeriodicity::Slots20)),
            },
        };
        assert_eq!(mgr.alloc_resources(&ue_cfg), Err(PucchAllocError::NoFreeCsiResource(CELL)));
    }

    fn csi_offset_cell() -> (PucchResourceManager, CsiMeasConfig) {
        let csi = csi_meas(2, CsiResourcePeriodicity::Slots5, 1, CsiReportPeriodicity::Slots5);
        let cfg = cell_cfg(1, 1, SrPeriodicity::Sl10, Some(csi.clone()));
        (PucchResourceManager::new(&[cfg], 3).unwrap(), csi)
    }

    #[test]
    fn test_csi_offset_avoids_sr_collision() {
        let (mut mgr, csi) = csi_offset_cell();
        let cell = mgr.cell_mut(CELL).unwrap();
        cell.csi_free = vec![ResourceOffset { res_idx: 0, offset: 0 }, ResourceOffset { res_idx: 0, offset: 3 }];
        let sr_res = *cell.sr_resource(0);
        assert_eq!(sr_res.format(), PucchFormat::Format1);
        assert_eq!(cell.find_optimal_csi_report_slot_offset(0, &sr_res, &csi), Some(1));
    }

    #[test]
    fn test_csi_offset_f0_f2_without_symbol_overlap() {
        let (mut mgr, csi) = csi_offset_cell();
        let cell = mgr.cell_mut(CELL).unwrap();
        cell.csi_free = vec![ResourceOffset { res_idx: 0, offset: 0 }, ResourceOffset { res_idx: 0, offset: 3 }];
        let sr_res = PucchResource {
            params: PucchFormatParams::Format0 {
                initial_cyclic_shift: 0,
                symbols: OfdmSymbolRange::new(0, 1),
            },
            ..*cell.sr_resource(0)
        };
        // Every candidate takes the same penalty, the SR collision is not considered.
        assert_eq!(cell.find_optimal_csi_report_slot_offset(0, &sr_res, &csi), Some(0));
    }

    #[test]
    fn test_csi_offset_grant_limit_dominates() {
        let (mut mgr, csi) = csi_offset_cell();
        let max = mgr.max_pucch_grants_per_slot();
        let cell = mgr.cell_mut(CELL).unwrap();
        cell.csi_free = vec![ResourceOffset { res_idx: 0, offset: 0 }, ResourceOffset { res_idx: 0, offset: 3 }];
        let sr_res = *cell.sr_resource(0);

        // Offset 3 recurs in slots 3 and 8.
        cell.pucch_grants_per_slot_cnt[8] = max;
        assert_eq!(cell.find_optimal_csi_report_slot_offset(0, &sr_res, &csi), Some(0));

        cell.pucch_grants_per_slot_cnt[5] = max;
        assert_eq!(cell.find_optimal_csi_report_slot_offset(0, &sr_res, &csi), None);
    }

    #[test]
    fn test_csi_exceeding_format2_payload_is_rejected() {
        let csi = csi_meas(4, CsiResourcePeriodicity::Slots20, 0, CsiReportPeriodicity::Slots20);
        let mut cfg = cell_cfg(1, 1, SrPeriodicity::Sl20, Some(csi.clone()));
        cfg.pucch_params.f2_or_f3_or_f4_params = PucchF2OrF3OrF4Params::F2 {
            max_nof_rbs: 1,
            nof_symbols: 2,
            max_payload_bits: None,
            max_code_rate: MaxCodeRate::Dot25,
            intraslot_freq_hopping: false,
        };
        let mut mgr = PucchResourceManager::new(&[cfg.clone()], 3).unwrap();

        let cell = mgr.cell(CELL).unwrap();
        let csi_report_size = get_csi_report_pucch_size(&create_csi_report_configuration(&csi)).unwrap();
        assert_eq!(csi_report_size, 11);
        let sr_res = cell.sr_resource(0);
        // A free offset exists, the report does not fit the resource.
        assert!(cell.find_optimal_csi_report_slot_offset(0, sr_res, &csi).is_some());
        assert_eq!(cell.get_csi_resource_offset(0, sr_res, &csi, csi_report_size), None);

        let before = pool_state(&mgr);
        assert_eq!(
            mgr.alloc_resources(&cfg.make_ue_cell_group_config()),
            Err(PucchAllocError::NoSuitableOffset(CELL))
        );
        assert_eq!(pool_state(&mgr), before);
    }

    #[test]
    fn test_sr_bit_counted_only_on_collision() {
        // F2 with a 7 bit payload cap: the 7 bit report fits alone but not with an SR bit.
        let csi = csi_meas(2, CsiResourcePeriodicity::Slots5, 1, CsiReportPeriodicity::Slots5);
        let mut cfg = cell_cfg(1, 1, SrPeriodicity::Sl10, Some(csi.clone()));
        cfg.pucch_params.f2_or_f3_or_f4_params = PucchF2OrF3OrF4Params::F2 {
            max_nof_rbs: 1,
            nof_symbols: 2,
            max_payload_bits: Some(7),
            max_code_rate: MaxCodeRate::Dot35,
            intraslot_freq_hopping: false,
        };
        let mut mgr = PucchResourceManager::new(&[cfg], 3).unwrap();
        let cell = mgr.cell_mut(CELL).unwrap();
        let sr_res = *cell.sr_resource(0);

        cell.csi_free = vec![ResourceOffset { res_idx: 0, offset: 3 }];
        assert_eq!(cell.get_csi_resource_offset(0, &sr_res, &csi, 7), Some(0));

        cell.csi_free = vec![ResourceOffset { res_idx: 0, offset: 0 }];
        assert_eq!(cell.get_csi_resource_offset(0, &sr_res, &csi, 7), None);
    }
}
