//! DU Manager
//!
//! Cell configuration and per-UE cell group configuration, plus the PUCCH
//! resource pools handing SR and periodic CSI resources to UEs.

pub mod pucch_builder_params;
pub mod pucch_config_builder;
pub mod pucch_resource_generator;
pub mod pucch_resource_manager;

pub use pucch_builder_params::{PucchBuilderParams, PucchF0OrF1Params, PucchF2OrF3OrF4Params};
pub use pucch_resource_manager::{PucchAllocError, PucchResourceManager, ResourceOffset};

use common::types::DuCellIndex;
use serde::{Deserialize, Serialize};

use crate::ran::csi_codec::get_csi_report_pucch_size;
use crate::ran::csi_meas::CsiMeasConfig;
use crate::ran::csi_report::create_csi_report_configuration;
use crate::ran::periodicity::SrPeriodicity;
use crate::ran::pucch::PucchConfig;
use crate::LayerError;

/// Static configuration of one DU cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuCellConfig {
    pub cell_index: DuCellIndex,
    /// PRBs of the initial UL BWP
    pub bwp_nof_prbs: u32,
    pub pucch_params: PucchBuilderParams,
    pub sr_period: SrPeriodicity,
    /// CSI-MeasConfig given to every UE, `None` disables periodic CSI
    pub default_csi_meas_cfg: Option<CsiMeasConfig>,
}

impl DuCellConfig {
    /// Validate the cell configuration
    pub fn validate(&self) -> Result<(), LayerError> {
        self.pucch_params.validate()?;

        if let Some(csi_meas) = &self.default_csi_meas_cfg {
            csi_meas.pucch_report().ok_or_else(|| {
                LayerError::InvalidConfiguration(format!(
                    "Cell {}: default CSI report is not periodic on PUCCH",
                    self.cell_index
                ))
            })?;
            if self.pucch_params.nof_csi_resources == 0 {
                return Err(LayerError::InvalidConfiguration(format!(
                    "Cell {}: CSI is configured without CSI PUCCH resources",
                    self.cell_index
                )));
            }
            if let Some((period, offset)) = csi_meas.csi_rs_period_and_offset() {
                if offset >= period {
                    return Err(LayerError::InvalidConfiguration(format!(
                        "Cell {}: CSI-RS offset {} not below period {}",
                        self.cell_index, offset, period
                    )));
                }
            }
            if csi_meas.channel_measurement_res_set().is_none() {
                return Err(LayerError::InvalidConfiguration(format!(
                    "Cell {}: CSI report {} has no NZP-CSI-RS resource set",
                    self.cell_index, csi_meas.csi_report_cfg_list[0].report_cfg_id
                )));
            }
            let report_cfg = create_csi_report_configuration(csi_meas);
            get_csi_report_pucch_size(&report_cfg).map_err(|err| {
                LayerError::InvalidConfiguration(format!("Cell {}: CSI report: {}", self.cell_index, err))
            })?;
        }
        Ok(())
    }

    /// Cell group configuration a new UE of this cell starts from
    pub fn make_ue_cell_group_config(&self) -> CellGroupConfig {
        CellGroupConfig {
            pcell: ServingCellConfig {
                cell_index: self.cell_index,
                pucch_cfg: None,
                csi_meas_cfg: self.default_csi_meas_cfg.clone(),
            },
        }
    }
}

/// UE-dedicated configuration of one serving cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServingCellConfig {
    pub cell_index: DuCellIndex,
    /// `None` while the UE holds no PUCCH resources
    pub pucch_cfg: Option<PucchConfig>,
    pub csi_meas_cfg: Option<CsiMeasConfig>,
}

impl ServingCellConfig {
    /// Remove the PUCCH configuration and the CSI reports that depend on it
    pub fn disable_pucch(&mut self) {
        self.pucch_cfg = None;
        self.csi_meas_cfg = None;
    }
}

/// UE cell group configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellGroupConfig {
    pub pcell: ServingCellConfig,
}
