//! CSI measurement configuration model
//!
//! The subset of CSI-MeasConfig (TS 38.331) the DU uses to place periodic CSI
//! reports on PUCCH and to size and decode them.

use serde::{Deserialize, Serialize};

use super::periodicity::{CsiReportPeriodicity, CsiResourcePeriodicity};
use super::pucch::PucchResId;

/// NZP-CSI-RS-Resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NzpCsiRsResource {
    pub res_id: u32,
    /// Number of CSI-RS antenna ports (1, 2, 4, 8, ...)
    pub nof_ports: u32,
    /// Periodicity, `None` for aperiodic resources
    pub periodicity: Option<CsiResourcePeriodicity>,
    pub slot_offset: u32,
}

/// NZP-CSI-RS-ResourceSet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NzpCsiRsResourceSet {
    pub res_set_id: u32,
    pub nzp_csi_rs_res: Vec<u32>,
}

/// CSI-ResourceConfig
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsiResourceConfig {
    pub res_cfg_id: u32,
    pub nzp_csi_rs_res_set_list: Vec<u32>,
}

/// PUCCH resource carrying a periodic CSI report in one UL BWP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PucchCsiResource {
    pub ul_bwp: u32,
    pub pucch_res_id: PucchResId,
}

/// Periodic or semi-persistent report on PUCCH
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PucchCsiReport {
    pub report_slot_period: CsiReportPeriodicity,
    pub report_slot_offset: u32,
    pub pucch_csi_res_list: Vec<PucchCsiResource>,
}

/// reportConfigType
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CsiReportConfigType {
    PeriodicOnPucch(PucchCsiReport),
    SemiPersistentOnPucch(PucchCsiReport),
    SemiPersistentOnPusch,
    Aperiodic,
}

/// reportQuantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportQuantityType {
    None,
    CriRiPmiCqi,
    CriRiI1,
    CriRiI1Cqi,
    CriRiCqi,
    CriRsrp,
    SsbIndexRsrp,
    CriRiLiPmiCqi,
}

/// Antenna port layout of a Type I single-panel codebook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SinglePanelPorts {
    Two {
        two_tx_codebook_subset_restriction: u8,
    },
    MoreThanTwo {
        /// N1 x N2 panel layout
        n1: u32,
        n2: u32,
    },
}

/// Type I codebook sub types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type1Codebook {
    SinglePanel {
        nof_antenna_ports: SinglePanelPorts,
        /// Bit `i` allows rank `i + 1`
        typei_single_panel_ri_restriction: u8,
        /// codebookMode 1 or 2
        codebook_mode: u8,
    },
    MultiPanel {
        ri_restriction: u8,
    },
}

/// CodebookConfig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodebookConfig {
    Type1(Type1Codebook),
    Type2,
}

/// CSI-ReportConfig
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsiReportConfig {
    pub report_cfg_id: u32,
    /// CSI-ResourceConfig used for channel measurement
    pub res_for_channel_meas: u32,
    pub report_cfg_type: CsiReportConfigType,
    pub report_qty_type: ReportQuantityType,
    pub codebook_cfg: Option<CodebookConfig>,
}

impl CsiReportConfig {
    /// PUCCH placement of a periodic or semi-persistent report
    pub fn pucch_report(&self) -> Option<&PucchCsiReport> {
        match &self.report_cfg_type {
            CsiReportConfigType::PeriodicOnPucch(rep) | CsiReportConfigType::SemiPersistentOnPucch(rep) => Some(rep),
            _ => None,
        }
    }

    pub fn pucch_report_mut(&mut self) -> Option<&mut PucchCsiReport> {
        match &mut self.report_cfg_type {
            CsiReportConfigType::PeriodicOnPucch(rep) | CsiReportConfigType::SemiPersistentOnPucch(rep) => Some(rep),
            _ => None,
        }
    }
}

/// CSI-MeasConfig
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsiMeasConfig {
    pub nzp_csi_rs_res_list: Vec<NzpCsiRsResource>,
    pub nzp_csi_rs_res_set_list: Vec<NzpCsiRsResourceSet>,
    pub csi_res_cfg_list: Vec<CsiResourceConfig>,
    pub csi_report_cfg_list: Vec<CsiReportConfig>,
}

impl CsiMeasConfig {
    /// Resource set measured by the first report.
    ///
    /// Falls back to the first configured set when the report does not point
    /// to a known one.
    // TODO: support multiple report configs and resource sets.
    pub fn channel_measurement_res_set(&self) -> Option<&NzpCsiRsResourceSet> {
        let linked = self.csi_report_cfg_list.first().and_then(|report| {
            self.csi_res_cfg_list
                .iter()
                .find(|res_cfg| res_cfg.res_cfg_id == report.res_for_channel_meas)
                .and_then(|res_cfg| res_cfg.nzp_csi_rs_res_set_list.first())
                .and_then(|set_id| self.nzp_csi_rs_res_set_list.iter().find(|set| set.res_set_id == *set_id))
        });
        linked.or_else(|| self.nzp_csi_rs_res_set_list.first())
    }

    /// First NZP-CSI-RS resource used for channel measurement
    pub fn channel_measurement_resource(&self) -> Option<&NzpCsiRsResource> {
        let set = self.channel_measurement_res_set()?;
        let res_id = set.nzp_csi_rs_res.first()?;
        self.nzp_csi_rs_res_list.iter().find(|res| res.res_id == *res_id)
    }

    /// `(period, offset)` in slots of the periodic CSI-RS used for channel measurement
    pub fn csi_rs_period_and_offset(&self) -> Option<(u32, u32)> {
        let res = self.channel_measurement_resource()?;
        res.periodicity.map(|period| (period.to_slots(), res.slot_offset))
    }

    /// PUCCH placement of the first report, if it is reported on PUCCH
    pub fn pucch_report(&self) -> Option<&PucchCsiReport> {
        self.csi_report_cfg_list.first().and_then(|report| report.pucch_report())
    }

    pub fn pucch_report_mut(&mut self) -> Option<&mut PucchCsiReport> {
        self.csi_report_cfg_list.first_mut().and_then(|report| report.pucch_report_mut())
    }
}

/// Parameters of the CSI setup generated for every UE of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsiMeasParams {
    pub nof_ports: u32,
    pub csi_rs_period: CsiResourcePeriodicity,
    pub csi_rs_offset: u32,
    pub report_period: CsiReportPeriodicity,
    pub report_qty_type: ReportQuantityType,
    /// Allowed ranks, bit `i` allows rank `i + 1`
    pub ri_restriction: u8,
}

/// Build a CSI-MeasConfig with one periodic NZP-CSI-RS resource and one
/// periodic CSI report on PUCCH.
///
/// The report's slot offset and PUCCH resource are placeholders that the PUCCH
/// resource manager overwrites when it allocates the UE.
pub fn make_default_csi_meas_config(params: &CsiMeasParams) -> CsiMeasConfig {
    let codebook_cfg = match params.nof_ports {
        1 => None,
        2 => Some(CodebookConfig::Type1(Type1Codebook::SinglePanel {
            nof_antenna_ports: SinglePanelPorts::Two {
                two_tx_codebook_subset_restriction: 0b11_1111,
            },
            typei_single_panel_ri_restriction: params.ri_restriction,
            codebook_mode: 1,
        })),
        n => Some(CodebookConfig::Type1(Type1Codebook::SinglePanel {
            nof_antenna_ports: SinglePanelPorts::MoreThanTwo { n1: n / 2, n2: 1 },
            typei_single_panel_ri_restriction: params.ri_restriction,
            codebook_mode: 1,
        })),
    };

    CsiMeasConfig {
        nzp_csi_rs_res_list: vec![NzpCsiRsResource {
            res_id: 0,
            nof_ports: params.nof_ports,
            periodicity: Some(params.csi_rs_period),
            slot_offset: params.csi_rs_offset,
        }],
        nzp_csi_rs_res_set_list: vec![NzpCsiRsResourceSet {
            res_set_id: 0,
            nzp_csi_rs_res: vec![0],
        }],
        csi_res_cfg_list: vec![CsiResourceConfig {
            res_cfg_id: 0,
            nzp_csi_rs_res_set_list: vec![0],
        }],
        csi_report_cfg_list: vec![CsiReportConfig {
            report_cfg_id: 0,
            res_for_channel_meas: 0,
            report_cfg_type: CsiReportConfigType::PeriodicOnPucch(PucchCsiReport {
                report_slot_period: params.report_period,
                report_slot_offset: 0,
                pucch_csi_res_list: vec![PucchCsiResource {
                    ul_bwp: 0,
                    pucch_res_id: PucchResId { cell_res_id: 0, ue_res_id: 0 },
                }],
            }),
            report_qty_type: params.report_qty_type,
            codebook_cfg,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> CsiMeasParams {
        CsiMeasParams {
            nof_ports: 4,
            csi_rs_period: CsiResourcePeriodicity::Slots20,
            csi_rs_offset: 2,
            report_period: CsiReportPeriodicity::Slots20,
            report_qty_type: ReportQuantityType::CriRiPmiCqi,
            ri_restriction: 0b1111,
        }
    }

    #[test]
    fn test_default_csi_meas_config_lookups() {
        let cfg = make_default_csi_meas_config(&params());
        assert_eq!(cfg.csi_rs_period_and_offset(), Some((20, 2)));
        assert_eq!(cfg.channel_measurement_resource().map(|r| r.nof_ports), Some(4));
        assert_eq!(
            cfg.pucch_report().map(|r| r.report_slot_period),
            Some(CsiReportPeriodicity::Slots20)
        );
        assert!(matches!(
            cfg.csi_report_cfg_list[0].codebook_cfg,
            Some(CodebookConfig::Type1(Type1Codebook::SinglePanel {
                nof_antenna_ports: SinglePanelPorts::MoreThanTwo { n1: 2, n2: 1 },
                ..
            }))
        ));
    }

    #[test]
    fn test_single_port_has_no_codebook() {
        let cfg = make_default_csi_meas_config(&CsiMeasParams { nof_ports: 1, ..params() });
        assert!(cfg.csi_report_cfg_list[0].codebook_cfg.is_none());
    }

    #[test]
    fn test_res_set_falls_back_to_first_set() {
        let mut cfg = make_default_csi_meas_config(&params());
        cfg.csi_report_cfg_list[0].res_for_channel_meas = 7;
        assert_eq!(cfg.channel_measurement_res_set().map(|s| s.res_set_id), Some(0));
    }

    #[test]
    fn test_aperiodic_report_has_no_pucch_placement() {
        let mut cfg = make_default_csi_meas_config(&params());
        cfg.csi_report_cfg_list[0].report_cfg_type = CsiReportConfigType::Aperiodic;
        assert!(cfg.pucch_report().is_none());
        assert!(cfg.pucch_report_mut().is_none());
    }
}
