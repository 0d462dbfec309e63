//! PUCCH configuration model
//!
//! Mirrors the parts of the UE-dedicated PUCCH-Config (TS 38.331) the DU
//! needs to assign resources and bound UCI payloads.

use serde::{Deserialize, Serialize};

use super::periodicity::SrPeriodicity;

/// Number of OFDM symbols in a slot (normal cyclic prefix)
pub const NOF_OFDM_SYMBOLS_PER_SLOT: u32 = 14;

/// PUCCH format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PucchFormat {
    Format0,
    Format1,
    Format2,
    Format3,
    Format4,
}

impl PucchFormat {
    /// Position of the format in per-format tables
    pub fn index(&self) -> usize {
        match self {
            PucchFormat::Format0 => 0,
            PucchFormat::Format1 => 1,
            PucchFormat::Format2 => 2,
            PucchFormat::Format3 => 3,
            PucchFormat::Format4 => 4,
        }
    }

    /// Whether the format carries more than 2 UCI bits
    pub fn is_long_payload(&self) -> bool {
        matches!(self, PucchFormat::Format2 | PucchFormat::Format3 | PucchFormat::Format4)
    }
}

/// PUCCH resource identifier, in both the cell and the UE index spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PucchResId {
    /// Index of the resource in the cell-wide PUCCH resource list
    pub cell_res_id: u32,
    /// pucch-ResourceId signalled to the UE in its PUCCH-Config
    pub ue_res_id: u32,
}

/// Contiguous range of OFDM symbols within a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfdmSymbolRange {
    /// First symbol
    pub start: u32,
    /// Number of symbols
    pub length: u32,
}

impl OfdmSymbolRange {
    pub fn new(start: u32, length: u32) -> Self {
        Self { start, length }
    }

    /// One past the last symbol
    pub fn stop(&self) -> u32 {
        self.start + self.length
    }

    /// Whether both ranges share at least one symbol
    pub fn overlaps(&self, other: &OfdmSymbolRange) -> bool {
        self.start < other.stop() && other.start < self.stop()
    }
}

/// Format-specific parameters of a PUCCH resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PucchFormatParams {
    Format0 {
        initial_cyclic_shift: u32,
        symbols: OfdmSymbolRange,
    },
    Format1 {
        initial_cyclic_shift: u32,
        time_domain_occ: u32,
        symbols: OfdmSymbolRange,
    },
    Format2 {
        nof_prbs: u32,
        symbols: OfdmSymbolRange,
    },
    Format3 {
        nof_prbs: u32,
        symbols: OfdmSymbolRange,
    },
    Format4 {
        /// Spreading factor, 2 or 4
        occ_length: u32,
        occ_index: u32,
        symbols: OfdmSymbolRange,
    },
}

impl PucchFormatParams {
    pub fn format(&self) -> PucchFormat {
        match self {
            PucchFormatParams::Format0 { .. } => PucchFormat::Format0,
            PucchFormatParams::Format1 { .. } => PucchFormat::Format1,
            PucchFormatParams::Format2 { .. } => PucchFormat::Format2,
            PucchFormatParams::Format3 { .. } => PucchFormat::Format3,
            PucchFormatParams::Format4 { .. } => PucchFormat::Format4,
        }
    }

    pub fn symbols(&self) -> OfdmSymbolRange {
        match *self {
            PucchFormatParams::Format0 { symbols, .. }
            | PucchFormatParams::Format1 { symbols, .. }
            | PucchFormatParams::Format2 { symbols, .. }
            | PucchFormatParams::Format3 { symbols, .. }
            | PucchFormatParams::Format4 { symbols, .. } => symbols,
        }
    }

    /// PRBs occupied per hop
    pub fn nof_prbs(&self) -> u32 {
        match *self {
            PucchFormatParams::Format2 { nof_prbs, .. } | PucchFormatParams::Format3 { nof_prbs, .. } => nof_prbs,
            _ => 1,
        }
    }
}

/// A PUCCH resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PucchResource {
    pub res_id: PucchResId,
    /// First PRB of the first hop
    pub starting_prb: u32,
    /// First PRB of the second hop, when intra-slot frequency hopping is enabled
    pub second_hop_prb: Option<u32>,
    pub params: PucchFormatParams,
}

impl PucchResource {
    pub fn format(&self) -> PucchFormat {
        self.params.format()
    }

    pub fn symbols(&self) -> OfdmSymbolRange {
        self.params.symbols()
    }

    pub fn intraslot_freq_hopping(&self) -> bool {
        self.second_hop_prb.is_some()
    }
}

/// PUCCH-MaxCodeRate (TS 38.331)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaxCodeRate {
    Dot08,
    Dot15,
    Dot25,
    Dot35,
    Dot45,
    Dot60,
    Dot80,
}

impl MaxCodeRate {
    pub fn to_float(self) -> f64 {
        match self {
            MaxCodeRate::Dot08 => 0.08,
            MaxCodeRate::Dot15 => 0.15,
            MaxCodeRate::Dot25 => 0.25,
            MaxCodeRate::Dot35 => 0.35,
            MaxCodeRate::Dot45 => 0.45,
            MaxCodeRate::Dot60 => 0.60,
            MaxCodeRate::Dot80 => 0.80,
        }
    }

    /// Map a configured rate (e.g. `0.35`) to the enumeration
    pub fn from_float(rate: f64) -> Option<Self> {
        [
            MaxCodeRate::Dot08,
            MaxCodeRate::Dot15,
            MaxCodeRate::Dot25,
            MaxCodeRate::Dot35,
            MaxCodeRate::Dot45,
            MaxCodeRate::Dot60,
            MaxCodeRate::Dot80,
        ]
        .into_iter()
        .find(|c| (c.to_float() - rate).abs() < 1e-6)
    }
}

/// PUCCH-FormatConfig, shared by all resources of one format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PucchFormatCommonParams {
    pub max_c_rate: MaxCodeRate,
    pub additional_dmrs: bool,
    pub pi2_bpsk: bool,
    pub simultaneous_harq_ack_csi: bool,
}

/// PUCCH-ResourceSet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PucchResourceSet {
    pub pucch_res_set_id: u32,
    /// UE resource ids (`ue_res_id`) of the set members
    pub pucch_res_id_list: Vec<u32>,
}

/// SchedulingRequestResourceConfig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingRequestResourceConfig {
    pub sr_res_id: u32,
    pub sr_id: u32,
    pub period: SrPeriodicity,
    /// Slot offset within the period
    pub offset: u32,
    pub pucch_res_id: PucchResId,
}

/// UE-dedicated PUCCH configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PucchConfig {
    /// Resource set 0 (F0/F1, up to 2 UCI bits) and set 1 (F2/F3/F4)
    pub pucch_res_set: [PucchResourceSet; 2],
    pub pucch_res_list: Vec<PucchResource>,
    pub sr_res_list: Vec<SchedulingRequestResourceConfig>,
    pub format_1_common_param: Option<PucchFormatCommonParams>,
    pub format_2_common_param: Option<PucchFormatCommonParams>,
    pub format_3_common_param: Option<PucchFormatCommonParams>,
    pub format_4_common_param: Option<PucchFormatCommonParams>,
    /// Maximum UCI payload in bits, indexed by [`PucchFormat::index`]
    pub format_max_payload: [u32; 5],
    /// Format used by the resources of set 1
    pub set1_format: PucchFormat,
}

impl PucchConfig {
    /// Resource signalled to the UE with `ue_res_id`
    pub fn find_resource(&self, ue_res_id: u32) -> Option<&PucchResource> {
        self.pucch_res_list.iter().find(|res| res.res_id.ue_res_id == ue_res_id)
    }

    pub fn max_payload(&self, format: PucchFormat) -> u32 {
        self.format_max_payload[format.index()]
    }

    pub fn set_max_payload(&mut self, format: PucchFormat, nof_bits: u32) {
        self.format_max_payload[format.index()] = nof_bits;
    }

    /// Common parameters applying to `format`
    pub fn common_params(&self, format: PucchFormat) -> Option<&PucchFormatCommonParams> {
        match format {
            PucchFormat::Format0 => None,
            PucchFormat::Format1 => self.format_1_common_param.as_ref(),
            PucchFormat::Format2 => self.format_2_common_param.as_ref(),
            PucchFormat::Format3 => self.format_3_common_param.as_ref(),
            PucchFormat::Format4 => self.format_4_common_param.as_ref(),
        }
    }
}
