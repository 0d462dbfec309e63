//! PUCCH builder parameters
//!
//! Cell-wide description of the PUCCH resource pool and of the mapping
//! between cell resource ids and the ids signalled to each UE.

use serde::{Deserialize, Serialize};

use crate::ran::pucch::{MaxCodeRate, PucchFormat, PucchFormatCommonParams, PucchResource, NOF_OFDM_SYMBOLS_PER_SLOT};
use crate::ran::pucch_payload::get_pucch_resource_max_payload;
use crate::LayerError;

/// PRB counts a PUCCH Format 3 resource may span (2^a * 3^b * 5^c, at most 16)
const PUCCH_F3_VALID_NOF_PRBS: [u32; 12] = [1, 2, 3, 4, 5, 6, 8, 9, 10, 12, 15, 16];

/// Parameters of the PUCCH Format 0/1 resources (HARQ-ACK and SR)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PucchF0OrF1Params {
    F0 {
        /// 1 or 2 symbols at the end of the slot
        nof_symbols: u32,
        intraslot_freq_hopping: bool,
    },
    F1 {
        /// Multiplex UEs in the same PRB with time-domain OCC
        occ_supported: bool,
        /// Cyclic shifts per PRB, one of 1, 2, 3, 4, 6, 12
        nof_cyc_shifts: u32,
        intraslot_freq_hopping: bool,
    },
}

impl PucchF0OrF1Params {
    pub fn format(&self) -> PucchFormat {
        match self {
            PucchF0OrF1Params::F0 { .. } => PucchFormat::Format0,
            PucchF0OrF1Params::F1 { .. } => PucchFormat::Format1,
        }
    }

    pub fn intraslot_freq_hopping(&self) -> bool {
        match *self {
            PucchF0OrF1Params::F0 { intraslot_freq_hopping, .. }
            | PucchF0OrF1Params::F1 { intraslot_freq_hopping, .. } => intraslot_freq_hopping,
        }
    }
}

/// Parameters of the PUCCH Format 2/3/4 resources (HARQ-ACK and CSI)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PucchF2OrF3OrF4Params {
    F2 {
        max_nof_rbs: u32,
        /// 1 or 2 symbols at the end of the slot
        nof_symbols: u32,
        /// Optional cap on the UCI payload signalled to the UE
        max_payload_bits: Option<u32>,
        max_code_rate: MaxCodeRate,
        intraslot_freq_hopping: bool,
    },
    F3 {
        max_nof_rbs: u32,
        /// 4 to 14 symbols
        nof_symbols: u32,
        max_payload_bits: Option<u32>,
        max_code_rate: MaxCodeRate,
        intraslot_freq_hopping: bool,
        additional_dmrs: bool,
        pi2_bpsk: bool,
    },
    F4 {
        /// 4 to 14 symbols
        nof_symbols: u32,
        max_code_rate: MaxCodeRate,
        intraslot_freq_hopping: bool,
        additional_dmrs: bool,
        pi2_bpsk: bool,
        /// Spreading factor, 2 or 4
        occ_length: u32,
    },
}

impl PucchF2OrF3OrF4Params {
    pub fn format(&self) -> PucchFormat {
        match self {
            PucchF2OrF3OrF4Params::F2 { .. } => PucchFormat::Format2,
            PucchF2OrF3OrF4Params::F3 { .. } => PucchFormat::Format3,
            PucchF2OrF3OrF4Params::F4 { .. } => PucchFormat::Format4,
        }
    }

    pub fn nof_symbols(&self) -> u32 {
        match *self {
            PucchF2OrF3OrF4Params::F2 { nof_symbols, .. }
            | PucchF2OrF3OrF4Params::F3 { nof_symbols, .. }
            | PucchF2OrF3OrF4Params::F4 { nof_symbols, .. } => nof_symbols,
        }
    }

    pub fn intraslot_freq_hopping(&self) -> bool {
        match *self {
            PucchF2OrF3OrF4Params::F2 { intraslot_freq_hopping, .. }
            | PucchF2OrF3OrF4Params::F3 { intraslot_freq_hopping, .. }
            | PucchF2OrF3OrF4Params::F4 { intraslot_freq_hopping, .. } => intraslot_freq_hopping,
        }
    }

    pub fn max_payload_bits(&self) -> Option<u32> {
        match *self {
            PucchF2OrF3OrF4Params::F2 { max_payload_bits, .. }
            | PucchF2OrF3OrF4Params::F3 { max_payload_bits, .. } => max_payload_bits,
            PucchF2OrF3OrF4Params::F4 { .. } => None,
        }
    }

    /// PUCCH-FormatConfig shared by the resources of this format
    pub fn common_params(&self) -> PucchFormatCommonParams {
        let (max_c_rate, additional_dmrs, pi2_bpsk) = match *self {
            PucchF2OrF3OrF4Params::F2 { max_code_rate, .. } => (max_code_rate, false, false),
            PucchF2OrF3OrF4Params::F3 {
                max_code_rate,
                additional_dmrs,
                pi2_bpsk,
                ..
            }
            | PucchF2OrF3OrF4Params::F4 {
                max_code_rate,
                additional_dmrs,
                pi2_bpsk,
                ..
            } => (max_code_rate, additional_dmrs, pi2_bpsk),
        };
        PucchFormatCommonParams {
            max_c_rate,
            additional_dmrs,
            pi2_bpsk,
            simultaneous_harq_ack_csi: true,
        }
    }

    /// UCI payload a resource of this format can carry, including the
    /// configured cap
    pub fn max_payload(&self, res: &PucchResource) -> u32 {
        let max_payload = get_pucch_resource_max_payload(res, &self.common_params());
        match self.max_payload_bits() {
            Some(cap) => max_payload.min(cap),
            None => max_payload,
        }
    }
}

/// Cell-wide PUCCH resource pool parameters.
///
/// The cell resource list is laid out as
/// `[F0/F1 HARQ x sets][SR][F2/F3/F4 HARQ x sets][CSI]` and every UE sees the
/// ids `[F0/F1 HARQ][SR][F2/F3/F4 HARQ][CSI]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PucchBuilderParams {
    /// F0/F1 HARQ resources per UE (PUCCH resource set 0)
    pub nof_ue_pucch_f0_or_f1_res_harq: u32,
    /// F2/F3/F4 HARQ resources per UE (PUCCH resource set 1)
    pub nof_ue_pucch_f2_or_f3_or_f4_res_harq: u32,
    /// Number of HARQ resource sets UEs are spread over
    pub nof_cell_harq_pucch_res_sets: u32,
    /// SR resources in the cell
    pub nof_sr_resources: u32,
    /// CSI resources in the cell
    pub nof_csi_resources: u32,
    pub f0_or_f1_params: PucchF0OrF1Params,
    pub f2_or_f3_or_f4_params: PucchF2OrF3OrF4Params,
}

impl Default for PucchBuilderParams {
    fn default() -> Self {
        Self {
            nof_ue_pucch_f0_or_f1_res_harq: 6,
            nof_ue_pucch_f2_or_f3_or_f4_res_harq: 6,
            nof_cell_harq_pucch_res_sets: 1,
            nof_sr_resources: 2,
            nof_csi_resources: 2,
            f0_or_f1_params: PucchF0OrF1Params::F1 {
                occ_supported: false,
                nof_cyc_shifts: 2,
                intraslot_freq_hopping: false,
            },
            f2_or_f3_or_f4_params: PucchF2OrF3OrF4Params::F2 {
                max_nof_rbs: 1,
                nof_symbols: 2,
                max_payload_bits: None,
                max_code_rate: MaxCodeRate::Dot35,
                intraslot_freq_hopping: false,
            },
        }
    }
}

impl PucchBuilderParams {
    /// Check that the parameters describe a buildable resource pool
    pub fn validate(&self) -> Result<(), LayerError> {
        let invalid = |msg: String| Err(LayerError::InvalidConfiguration(msg));

        if self.nof_cell_harq_pucch_res_sets == 0 {
            return invalid("at least one PUCCH HARQ resource set is required".into());
        }
        if !(1..=8).contains(&self.nof_ue_pucch_f0_or_f1_res_harq) {
            return invalid(format!(
                "F0/F1 HARQ resources per UE must be in 1..=8, got {}",
                self.nof_ue_pucch_f0_or_f1_res_harq
            ));
        }
        if !(1..=8).contains(&self.nof_ue_pucch_f2_or_f3_or_f4_res_harq) {
            return invalid(format!(
                "F2/F3/F4 HARQ resources per UE must be in 1..=8, got {}",
                self.nof_ue_pucch_f2_or_f3_or_f4_res_harq
            ));
        }
        if self.nof_sr_resources == 0 {
            return invalid("at least one SR resource is required".into());
        }

        match self.f0_or_f1_params {
            PucchF0OrF1Params::F0 {
                nof_symbols,
                intraslot_freq_hopping,
            } => {
                if !(1..=2).contains(&nof_symbols) {
                    return invalid(format!("PUCCH F0 supports 1 or 2 symbols, got {}", nof_symbols));
                }
                if intraslot_freq_hopping && nof_symbols != 2 {
                    return invalid("PUCCH F0 frequency hopping requires 2 symbols".into());
                }
            }
            PucchF0OrF1Params::F1 { nof_cyc_shifts, .. } => {
                if ![1, 2, 3, 4, 6, 12].contains(&nof_cyc_shifts) {
                    return invalid(format!("Invalid number of PUCCH F1 cyclic shifts {}", nof_cyc_shifts));
                }
            }
        }

        match self.f2_or_f3_or_f4_params {
            PucchF2OrF3OrF4Params::F2 {
                max_nof_rbs,
                nof_symbols,
                intraslot_freq_hopping,
                ..
            } => {
                if !(1..=16).contains(&max_nof_rbs) {
                    return invalid(format!("PUCCH F2 supports 1..=16 PRBs, got {}", max_nof_rbs));
                }
                if !(1..=2).contains(&nof_symbols) {
                    return invalid(format!("PUCCH F2 supports 1 or 2 symbols, got {}", nof_symbols));
                }
                if intraslot_freq_hopping && nof_symbols != 2 {
                    return invalid("PUCCH F2 frequency hopping requires 2 symbols".into());
                }
            }
            PucchF2OrF3OrF4Params::F3 {
                max_nof_rbs,
                nof_symbols,
                ..
            } => {
                if !PUCCH_F3_VALID_NOF_PRBS.contains(&max_nof_rbs) {
                    return invalid(format!(
                        "PUCCH F3 PRB count must be one of {:?}, got {}",
                        PUCCH_F3_VALID_NOF_PRBS, max_nof_rbs
                    ));
                }
                if !(4..=NOF_OFDM_SYMBOLS_PER_SLOT).contains(&nof_symbols) {
                    return invalid(format!("PUCCH F3 supports 4..=14 symbols, got {}", nof_symbols));
                }
            }
            PucchF2OrF3OrF4Params::F4 {
                nof_symbols,
                occ_length,
                ..
            } => {
                if !(4..=NOF_OFDM_SYMBOLS_PER_SLOT).contains(&nof_symbols) {
                    return invalid(format!("PUCCH F4 supports 4..=14 symbols, got {}", nof_symbols));
                }
                if occ_length != 2 && occ_length != 4 {
                    return invalid(format!("PUCCH F4 OCC length must be 2 or 4, got {}", occ_length));
                }
            }
        }

        Ok(())
    }

    /// F0/F1 HARQ resources in the cell
    pub fn nof_cell_f0_or_f1_harq_res(&self) -> u32 {
        self.nof_cell_harq_pucch_res_sets * self.nof_ue_pucch_f0_or_f1_res_harq
    }

    /// F2/F3/F4 HARQ resources in the cell
    pub fn nof_cell_f2_or_f3_or_f4_harq_res(&self) -> u32 {
        self.nof_cell_harq_pucch_res_sets * self.nof_ue_pucch_f2_or_f3_or_f4_res_harq
    }

    /// F0/F1 resources in the cell (HARQ and SR)
    pub fn nof_cell_f0_or_f1_res(&self) -> u32 {
        self.nof_cell_f0_or_f1_harq_res() + self.nof_sr_resources
    }

    /// F2/F3/F4 resources in the cell (HARQ and CSI)
    pub fn nof_cell_f2_or_f3_or_f4_res(&self) -> u32 {
        self.nof_cell_f2_or_f3_or_f4_harq_res() + self.nof_csi_resources
    }

    pub fn nof_cell_res(&self) -> u32 {
        self.nof_cell_f0_or_f1_res() + self.nof_cell_f2_or_f3_or_f4_res()
    }

    /// Cell resource id of F0/F1 HARQ resource `res_idx` of set `harq_set`
    pub fn cell_f0_or_f1_harq_res_id(&self, harq_set: u32, res_idx: u32) -> u32 {
        harq_set * self.nof_ue_pucch_f0_or_f1_res_harq + res_idx
    }

    /// Cell resource id of SR resource `sr_idx`
    pub fn cell_sr_res_id(&self, sr_idx: u32) -> u32 {
        self.nof_cell_f0_or_f1_harq_res() + sr_idx
    }

    /// Cell resource id of F2/F3/F4 HARQ resource `res_idx` of set `harq_set`
    pub fn cell_f2_or_f3_or_f4_harq_res_id(&self, harq_set: u32, res_idx: u32) -> u32 {
        self.nof_cell_f0_or_f1_res() + harq_set * self.nof_ue_pucch_f2_or_f3_or_f4_res_harq + res_idx
    }

    /// Cell resource id of CSI resource `csi_idx`
    pub fn cell_csi_res_id(&self, csi_idx: u32) -> u32 {
        self.nof_cell_f0_or_f1_res() + self.nof_cell_f2_or_f3_or_f4_harq_res() + csi_idx
    }

    /// SR resource index of a cell resource id, `None` outside the SR range
    pub fn sr_idx_from_cell_res_id(&self, cell_res_id: u32) -> Option<u32> {
        cell_res_id
            .checked_sub(self.nof_cell_f0_or_f1_harq_res())
            .filter(|idx| *idx < self.nof_sr_resources)
    }

    /// CSI resource index of a cell resource id, `None` outside the CSI range
    pub fn csi_idx_from_cell_res_id(&self, cell_res_id: u32) -> Option<u32> {
        cell_res_id
            .checked_sub(self.nof_cell_f0_or_f1_res() + self.nof_cell_f2_or_f3_or_f4_harq_res())
            .filter(|idx| *idx < self.nof_csi_resources)
    }

    /// UE resource id of the SR resource
    pub fn ue_sr_res_id(&self) -> u32 {
        self.nof_ue_pucch_f0_or_f1_res_harq
    }

    /// UE resource id of F2/F3/F4 HARQ resource `res_idx`
    pub fn ue_f2_or_f3_or_f4_harq_res_id(&self, res_idx: u32) -> u32 {
        self.nof_ue_pucch_f0_or_f1_res_harq + 1 + res_idx
    }

    /// UE resource id of the CSI resource
    pub fn ue_csi_res_id(&self) -> u32 {
        self.nof_ue_pucch_f0_or_f1_res_harq + 1 + self.nof_ue_pucch_f2_or_f3_or_f4_res_harq
    }
}
