//! CSI report configuration
//!
//! Derives the compact report-shape descriptor the scheduler and the UCI
//! decoder share from a UE's CSI-MeasConfig.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::csi_meas::{CodebookConfig, CsiMeasConfig, ReportQuantityType, SinglePanelPorts, Type1Codebook};

bitflags! {
    /// Quantities carried in a CSI report
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CsiReportQuantities: u8 {
        const CRI = 1 << 0;
        const RI = 1 << 1;
        const LI = 1 << 2;
        const PMI = 1 << 3;
        const CQI = 1 << 4;
    }
}

impl CsiReportQuantities {
    pub const CRI_RI_PMI_CQI: Self = Self::CRI.union(Self::RI).union(Self::PMI).union(Self::CQI);
    pub const CRI_RI_CQI: Self = Self::CRI.union(Self::RI).union(Self::CQI);
    pub const CRI_RI_LI_PMI_CQI: Self = Self::CRI_RI_PMI_CQI.union(Self::LI);
}

/// PMI codebook the report is built against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PmiCodebookType {
    /// Single antenna port, no PMI
    One,
    /// Two antenna ports
    Two,
    /// Type I single panel, 4 ports (N1=2, N2=1), codebook mode 1
    TypeISinglePanel4PortsMode1,
    /// Any other layout, not decodable
    Other,
}

impl PmiCodebookType {
    /// Number of CSI-RS antenna ports, `None` for unsupported layouts
    pub fn nof_ports(&self) -> Option<u32> {
        match self {
            PmiCodebookType::One => Some(1),
            PmiCodebookType::Two => Some(2),
            PmiCodebookType::TypeISinglePanel4PortsMode1 => Some(4),
            PmiCodebookType::Other => None,
        }
    }
}

/// Rank indicator restriction, bit `i` allows rank `i + 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RiRestriction(pub u8);

impl RiRestriction {
    pub const ALL: RiRestriction = RiRestriction(0xFF);

    /// Allowed ranks up to `max_rank`, in increasing order
    pub fn allowed_ranks(&self, max_rank: u32) -> Vec<u32> {
        (1..=max_rank.min(8)).filter(|rank| self.0 & (1 << (rank - 1)) != 0).collect()
    }
}

/// Shape of a CSI report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CsiReportConfiguration {
    /// CSI-RS resources in the measured resource set
    pub nof_csi_rs_resources: u32,
    pub pmi_codebook: PmiCodebookType,
    pub ri_restriction: RiRestriction,
    /// Empty when nothing is reported
    pub quantities: CsiReportQuantities,
}

fn report_quantities(qty: ReportQuantityType) -> CsiReportQuantities {
    match qty {
        ReportQuantityType::CriRiPmiCqi => CsiReportQuantities::CRI_RI_PMI_CQI,
        ReportQuantityType::CriRiCqi => CsiReportQuantities::CRI_RI_CQI,
        ReportQuantityType::CriRiLiPmiCqi => CsiReportQuantities::CRI_RI_LI_PMI_CQI,
        _ => CsiReportQuantities::empty(),
    }
}

/// Derive the report shape of the first CSI report of `csi_meas`.
///
/// # Panics
///
/// Panics when the report uses a codebook other than Type I single panel,
/// since the report layout would be unknown.
pub fn create_csi_report_configuration(csi_meas: &CsiMeasConfig) -> CsiReportConfiguration {
    // TODO: support more than one CSI report config.
    let report = csi_meas
        .csi_report_cfg_list
        .first()
        .unwrap_or_else(|| panic!("CSI-MeasConfig without CSI report configs"));

    let nof_csi_rs_resources = csi_meas
        .channel_measurement_res_set()
        .map_or(0, |set| set.nzp_csi_rs_res.len() as u32);

    let mut csi_rep = CsiReportConfiguration {
        nof_csi_rs_resources,
        pmi_codebook: PmiCodebookType::One,
        ri_restriction: RiRestriction::ALL,
        quantities: report_quantities(report.report_qty_type),
    };

    if let Some(codebook) = &report.codebook_cfg {
        match codebook {
            CodebookConfig::Type1(Type1Codebook::SinglePanel {
                nof_antenna_ports,
                typei_single_panel_ri_restriction,
                codebook_mode,
            }) => {
                csi_rep.ri_restriction = RiRestriction(*typei_single_panel_ri_restriction);
                csi_rep.pmi_codebook = match nof_antenna_ports {
                    SinglePanelPorts::Two { .. } => PmiCodebookType::Two,
                    SinglePanelPorts::MoreThanTwo { n1: 2, n2: 1 } if *codebook_mode == 1 => {
                        PmiCodebookType::TypeISinglePanel4PortsMode1
                    }
                    SinglePanelPorts::MoreThanTwo { .. } => PmiCodebookType::Other,
                };
            }
            CodebookConfig::Type1(Type1Codebook::MultiPanel { .. }) => {
                panic!("Unsupported CSI codebook: Type I multi-panel")
            }
            CodebookConfig::Type2 => panic!("Unsupported CSI codebook: Type II"),
        }
    }

    debug!("Derived CSI report configuration: {:?}", csi_rep);
    csi_rep
}
