//! DU simulation configuration
//!
//! Loaded from YAML or TOML depending on the file extension. Every field has a
//! default, so an empty file describes one 30 kHz cell with periodic 4-port CSI.

use std::path::Path;

use anyhow::{anyhow, bail, Context};
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use common::types::{DuCellIndex, Rnti, SubcarrierSpacing};
use layers::du_manager::{DuCellConfig, PucchBuilderParams};
use layers::mac::{RlfThresholds, MAX_EXPECTED_UCI_GRID_SIZE};
use layers::ran::csi_meas::{make_default_csi_meas_config, CsiMeasConfig, CsiMeasParams, ReportQuantityType};
use layers::ran::periodicity::{CsiReportPeriodicity, CsiResourcePeriodicity, SrPeriodicity};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DuAppConfig {
    /// Common subcarrier spacing in kHz
    #[serde(default = "default_common_scs")]
    pub common_scs: u32,
    /// PUCCH grants the scheduler can place in one slot of a cell
    #[serde(default = "default_max_pucch_grants_per_slot")]
    pub max_pucch_grants_per_slot: u32,
    /// Cells served by the DU
    #[serde(default = "default_cells")]
    pub cells: Vec<CellAppConfig>,
    /// Simulated UE population
    #[serde(default)]
    pub ue: UeAppConfig,
    /// Radio link failure thresholds
    #[serde(default)]
    pub rlf: RlfThresholds,
}

fn default_common_scs() -> u32 {
    30
}

fn default_max_pucch_grants_per_slot() -> u32 {
    3
}

fn default_cells() -> Vec<CellAppConfig> {
    vec![CellAppConfig::new(0)]
}

impl Default for DuAppConfig {
    fn default() -> Self {
        Self {
            common_scs: default_common_scs(),
            max_pucch_grants_per_slot: default_max_pucch_grants_per_slot(),
            cells: default_cells(),
            ue: UeAppConfig::default(),
            rlf: RlfThresholds::default(),
        }
    }
}

/// Cell configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CellAppConfig {
    /// DU cell index
    pub cell_index: u8,
    /// PRBs of the initial UL BWP
    #[serde(default = "default_bwp_nof_prbs")]
    pub bwp_nof_prbs: u32,
    /// SR period in slots
    #[serde(default = "default_sr_period")]
    pub sr_period: u32,
    /// PUCCH resource pool layout
    #[serde(default)]
    pub pucch: PucchBuilderParams,
    /// Periodic CSI reporting
    #[serde(default)]
    pub csi: CsiAppConfig,
}

fn default_bwp_nof_prbs() -> u32 {
    51 // 20 MHz at 30 kHz
}

fn default_sr_period() -> u32 {
    20
}

/// Periodic CSI configuration of a cell
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CsiAppConfig {
    /// Configure periodic CSI reports on PUCCH
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// CSI-RS antenna ports (1, 2 or 4)
    #[serde(default = "default_nof_ports")]
    pub nof_ports: u32,
    /// CSI-RS period in slots
    #[serde(default = "default_csi_period")]
    pub csi_rs_period: u32,
    /// CSI-RS slot offset
    #[serde(default = "default_csi_rs_offset")]
    pub csi_rs_offset: u32,
    /// CSI report period in slots
    #[serde(default = "default_csi_period")]
    pub report_period: u32,
    /// Reported quantities
    #[serde(default = "default_report_quantity")]
    pub report_quantity: ReportQuantityType,
    /// Allowed ranks, bit `i` allows rank `i + 1`
    #[serde(default = "default_ri_restriction")]
    pub ri_restriction: u8,
}

fn default_true() -> bool {
    true
}

fn default_nof_ports() -> u32 {
    4
}

fn default_csi_period() -> u32 {
    20
}

fn default_csi_rs_offset() -> u32 {
    2
}

fn default_report_quantity() -> ReportQuantityType {
    ReportQuantityType::CriRiPmiCqi
}

fn default_ri_restriction() -> u8 {
    0b11 // Ranks 1 and 2
}

impl Default for CsiAppConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            nof_ports: default_nof_ports(),
            csi_rs_period: default_csi_period(),
            csi_rs_offset: default_csi_rs_offset(),
            report_period: default_csi_period(),
            report_quantity: default_report_quantity(),
            ri_restriction: default_ri_restriction(),
        }
    }
}

/// Simulated UE population and channel
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UeAppConfig {
    /// UEs admitted at start-up, spread over the cells
    #[serde(default = "default_nof_ues")]
    pub nof_ues: u16,
    /// C-RNTI of the first UE
    #[serde(default = "default_first_crnti")]
    pub first_crnti: u16,
    /// Slots between scheduling a PUCCH grant and receiving its UCI
    #[serde(default = "default_max_round_trip_delay")]
    pub max_round_trip_delay: u32,
    /// Probability of a transmitted HARQ-ACK bit being an ACK
    #[serde(default = "default_ack_probability")]
    pub ack_probability: f64,
    /// Probability of a CSI report passing the PHY CRC
    #[serde(default = "default_csi_ok_probability")]
    pub csi_ok_probability: f64,
    /// Probability of a UE leaving the cell in a given slot
    #[serde(default = "default_release_probability")]
    pub release_probability: f64,
    /// Seed of the UCI synthesizer
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_nof_ues() -> u16 {
    16
}

fn default_first_crnti() -> u16 {
    0x4601
}

fn default_max_round_trip_delay() -> u32 {
    4
}

fn default_ack_probability() -> f64 {
    0.9
}

fn default_csi_ok_probability() -> f64 {
    0.98
}

fn default_release_probability() -> f64 {
    0.001
}

fn default_seed() -> u64 {
    1
}

impl Default for UeAppConfig {
    fn default() -> Self {
        Self {
            nof_ues: default_nof_ues(),
            first_crnti: default_first_crnti(),
            max_round_trip_delay: default_max_round_trip_delay(),
            ack_probability: default_ack_probability(),
            csi_ok_probability: default_csi_ok_probability(),
            release_probability: default_release_probability(),
            seed: default_seed(),
        }
    }
}

impl DuAppConfig {
    /// Load configuration from a YAML (`.yml`, `.yaml`) or TOML (`.toml`) file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yml") | Some("yaml") => Self::from_yaml_str(&contents),
            Some("toml") => Self::from_toml_str(&contents),
            _ => bail!("Unsupported configuration file format: {}", path.display()),
        }
    }

    pub fn from_yaml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn scs(&self) -> anyhow::Result<SubcarrierSpacing> {
        SubcarrierSpacing::from_u32(self.common_scs)
            .ok_or_else(|| anyhow!("Invalid subcarrier spacing: {} kHz", self.common_scs))
    }

    /// Validated cell configurations handed to the DU manager
    pub fn du_cell_configs(&self) -> anyhow::Result<Vec<DuCellConfig>> {
        if self.cells.is_empty() {
            bail!("No cells configured");
        }
        if !Rnti::new(self.ue.first_crnti).is_crnti() {
            bail!("Invalid first C-RNTI {:#06x}", self.ue.first_crnti);
        }
        if self.ue.max_round_trip_delay as usize >= MAX_EXPECTED_UCI_GRID_SIZE {
            bail!("Round trip delay of {} slots is too long", self.ue.max_round_trip_delay);
        }
        for (name, p) in [
            ("ack_probability", self.ue.ack_probability),
            ("csi_ok_probability", self.ue.csi_ok_probability),
            ("release_probability", self.ue.release_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                bail!("Invalid {}: {}", name, p);
            }
        }
        self.cells.iter().map(CellAppConfig::to_du_cell_config).collect()
    }
}

impl CellAppConfig {
    fn new(cell_index: u8) -> Self {
        Self {
            cell_index,
            bwp_nof_prbs: default_bwp_nof_prbs(),
            sr_period: default_sr_period(),
            pucch: PucchBuilderParams::default(),
            csi: CsiAppConfig::default(),
        }
    }

    pub fn to_du_cell_config(&self) -> anyhow::Result<DuCellConfig> {
        if self.cell_index as usize >= DuCellIndex::MAX_NOF_DU_CELLS {
            bail!("Invalid cell index {}", self.cell_index);
        }
        let sr_period = SrPeriodicity::from_slots(self.sr_period)
            .ok_or_else(|| anyhow!("Cell {}: invalid SR period of {} slots", self.cell_index, self.sr_period))?;
        let default_csi_meas_cfg = if self.csi.enabled {
            Some(
                self.csi
                    .to_csi_meas_config()
                    .with_context(|| format!("Cell {}", self.cell_index))?,
            )
        } else {
            None
        };

        let cell_cfg = DuCellConfig {
            cell_index: DuCellIndex(self.cell_index),
            bwp_nof_prbs: self.bwp_nof_prbs,
            pucch_params: self.pucch,
            sr_period,
            default_csi_meas_cfg,
        };
        cell_cfg.validate()?;
        Ok(cell_cfg)
    }
}

impl CsiAppConfig {
    pub fn to_csi_meas_config(&self) -> anyhow::Result<CsiMeasConfig> {
        if ![1, 2, 4].contains(&self.nof_ports) {
            bail!("Unsupported number of CSI-RS ports: {}", self.nof_ports);
        }
        let csi_rs_period = CsiResourcePeriodicity::from_slots(self.csi_rs_period)
            .ok_or_else(|| anyhow!("Invalid CSI-RS period of {} slots", self.csi_rs_period))?;
        let report_period = CsiReportPeriodicity::from_slots(self.report_period)
            .ok_or_else(|| anyhow!("Invalid CSI report period of {} slots", self.report_period))?;
        Ok(make_default_csi_meas_config(&CsiMeasParams {
            nof_ports: self.nof_ports,
            csi_rs_period,
            csi_rs_offset: self.csi_rs_offset,
            report_period,
            report_qty_type: self.report_quantity,
            ri_restriction: self.ri_restriction,
        }))
    }
}
