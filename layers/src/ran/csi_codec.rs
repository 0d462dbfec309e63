//! CSI report packing for PUCCH
//!
//! Field sizes and bit order of wideband CSI part 1 reports on PUCCH, per
//! TS 38.212 Section 6.3.1.1.2 and TS 38.214 Section 5.2.2.2.1. Fields are
//! mapped MSB first in the order CRI, RI, LI, zero padding, PMI (X1 then X2),
//! wideband CQI of the first transport block. The padding keeps the report
//! length independent of the reported rank.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use common::bits::{BitPayload, BitReader, BitWriter};
use common::utils::ceil_log2;

use super::csi_report::{CsiReportConfiguration, CsiReportQuantities, PmiCodebookType};

/// Wideband CQI field width (one transport block)
pub const WIDEBAND_CQI_NOF_BITS: u32 = 4;

/// CSI report errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CsiError {
    #[error("CSI payload size mismatch: expected {expected} bits, got {actual}")]
    PayloadSizeMismatch { expected: usize, actual: usize },

    #[error("Unsupported PMI codebook: {0:?}")]
    UnsupportedCodebook(PmiCodebookType),

    #[error("RI restriction {0:#04x} allows no rank")]
    NoAllowedRank(u8),

    #[error("Invalid RI field value {0}")]
    InvalidRi(u32),

    #[error("CSI field {0} inconsistent with the report configuration")]
    InvalidField(&'static str),
}

/// Wideband PMI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CsiReportPmi {
    /// Two antenna ports, codebook index
    TwoAntennaPort { pmi: u8 },
    /// Type I single panel, 4 ports, mode 1. `i_1_3` is only reported for rank 2.
    TypeISinglePanel4Ports { i_1_1: u8, i_1_3: Option<u8>, i_2: u8 },
}

/// Decoded CSI report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsiReportData {
    pub cri: Option<u8>,
    /// Reported rank (1..=8), not the raw field value
    pub ri: Option<u8>,
    pub li: Option<u8>,
    pub pmi: Option<CsiReportPmi>,
    pub first_tb_wideband_cqi: Option<u8>,
}

/// PMI field widths for one rank
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PmiFieldSizes {
    i_1_1: u32,
    i_1_3: u32,
    i_2: u32,
}

impl PmiFieldSizes {
    fn total(&self) -> u32 {
        self.i_1_1 + self.i_1_3 + self.i_2
    }
}

/// Rank-independent view of a report's field widths
struct ReportLayout {
    config: CsiReportConfiguration,
    allowed_ranks: Vec<u32>,
    cri_bits: u32,
    ri_bits: u32,
    max_rank_dependent_bits: u32,
}

impl ReportLayout {
    fn new(config: &CsiReportConfiguration) -> Result<Self, CsiError> {
        let quantities = config.quantities;
        if quantities.is_empty() {
            return Ok(Self {
                config: *config,
                allowed_ranks: vec![1],
                cri_bits: 0,
                ri_bits: 0,
                max_rank_dependent_bits: 0,
            });
        }

        let nof_ports = config
            .pmi_codebook
            .nof_ports()
            .ok_or(CsiError::UnsupportedCodebook(config.pmi_codebook))?;
        let allowed_ranks = config.ri_restriction.allowed_ranks(nof_ports);
        if allowed_ranks.is_empty() {
            return Err(CsiError::NoAllowedRank(config.ri_restriction.0));
        }

        let cri_bits = if quantities.contains(CsiReportQuantities::CRI) {
            ceil_log2(config.nof_csi_rs_resources)
        } else {
            0
        };
        let ri_bits = if quantities.contains(CsiReportQuantities::RI) {
            ceil_log2(nof_ports).min(ceil_log2(allowed_ranks.len() as u32))
        } else {
            0
        };

        let mut layout = Self {
            config: *config,
            allowed_ranks,
            cri_bits,
            ri_bits,
            max_rank_dependent_bits: 0,
        };
        layout.max_rank_dependent_bits = layout
            .allowed_ranks
            .iter()
            .map(|&rank| layout.rank_dependent_bits(rank))
            .max()
            .unwrap_or(0);
        Ok(layout)
    }

    fn has(&self, quantity: CsiReportQuantities) -> bool {
        self.config.quantities.contains(quantity)
    }

    fn li_bits(&self, rank: u32) -> u32 {
        if self.has(CsiReportQuantities::LI) {
            ceil_log2(rank).min(2)
        } else {
            0
        }
    }

    fn pmi_bits(&self, rank: u32) -> PmiFieldSizes {
        if !self.has(CsiReportQuantities::PMI) {
            return PmiFieldSizes::default();
        }
        match self.config.pmi_codebook {
            PmiCodebookType::Two => PmiFieldSizes {
                i_2: if rank == 1 { 2 } else { 1 },
                ..Default::default()
            },
            // N1=2, O1=4: i_1_1 spans 8 beams, N2=1 so i_1_2 is empty.
            PmiCodebookType::TypeISinglePanel4PortsMode1 => PmiFieldSizes {
                i_1_1: 3,
                i_1_3: if rank == 2 { 1 } else { 0 },
                i_2: if rank == 1 { 2 } else { 1 },
            },
            PmiCodebookType::One | PmiCodebookType::Other => PmiFieldSizes::default(),
        }
    }

    fn cqi_bits(&self) -> u32 {
        if self.has(CsiReportQuantities::CQI) {
            WIDEBAND_CQI_NOF_BITS
        } else {
            0
        }
    }

    fn rank_dependent_bits(&self, rank: u32) -> u32 {
        self.li_bits(rank) + self.pmi_bits(rank).total() + self.cqi_bits()
    }

    fn padding_bits(&self, rank: u32) -> u32 {
        self.max_rank_dependent_bits - self.rank_dependent_bits(rank)
    }

    fn total_bits(&self) -> u32 {
        self.cri_bits + self.ri_bits + self.max_rank_dependent_bits
    }
}

/// Exact CSI part 1 size in bits of a report on PUCCH
pub fn get_csi_report_pucch_size(config: &CsiReportConfiguration) -> Result<u32, CsiError> {
    Ok(ReportLayout::new(config)?.total_bits())
}

/// Check that `payload` can be unpacked with `config`
pub fn validate_pucch_csi_payload(payload: &BitPayload, config: &CsiReportConfiguration) -> Result<(), CsiError> {
    let expected = get_csi_report_pucch_size(config)? as usize;
    if payload.len() != expected {
        return Err(CsiError::PayloadSizeMismatch {
            expected,
            actual: payload.len(),
        });
    }
    Ok(())
}

fn read_field(reader: &mut BitReader<'_>, nof_bits: u32) -> Result<u32, CsiError> {
    reader.read(nof_bits as usize).ok_or(CsiError::InvalidField("truncated payload"))
}

/// Unpack a CSI part 1 report received on PUCCH
pub fn csi_report_unpack_pucch(payload: &BitPayload, config: &CsiReportConfiguration) -> Result<CsiReportData, CsiError> {
    validate_pucch_csi_payload(payload, config)?;
    let layout = ReportLayout::new(config)?;
    let mut reader = payload.reader();
    let mut report = CsiReportData::default();

    if config.quantities.is_empty() {
        return Ok(report);
    }

    if layout.has(CsiReportQuantities::CRI) {
        report.cri = Some(read_field(&mut reader, layout.cri_bits)? as u8);
    }

    let mut rank = layout.allowed_ranks[0];
    if layout.has(CsiReportQuantities::RI) {
        let ri_value = read_field(&mut reader, layout.ri_bits)?;
        rank = *layout
            .allowed_ranks
            .get(ri_value as usize)
            .ok_or(CsiError::InvalidRi(ri_value))?;
        report.ri = Some(rank as u8);
    }

    if layout.has(CsiReportQuantities::LI) {
        report.li = Some(read_field(&mut reader, layout.li_bits(rank))? as u8);
    }

    reader
        .skip(layout.padding_bits(rank) as usize)
        .ok_or(CsiError::InvalidField("truncated payload"))?;

    if layout.has(CsiReportQuantities::PMI) {
        let sizes = layout.pmi_bits(rank);
        report.pmi = match config.pmi_codebook {
            PmiCodebookType::Two => Some(CsiReportPmi::TwoAntennaPort {
                pmi: read_field(&mut reader, sizes.i_2)? as u8,
            }),
            PmiCodebookType::TypeISinglePanel4PortsMode1 => {
                let i_1_1 = read_field(&mut reader, sizes.i_1_1)? as u8;
                let i_1_3 = if sizes.i_1_3 > 0 {
                    Some(read_field(&mut reader, sizes.i_1_3)? as u8)
                } else {
                    None
                };
                let i_2 = read_field(&mut reader, sizes.i_2)? as u8;
                Some(CsiReportPmi::TypeISinglePanel4Ports { i_1_1, i_1_3, i_2 })
            }
            PmiCodebookType::One | PmiCodebookType::Other => None,
        };
    }

    if layout.has(CsiReportQuantities::CQI) {
        report.first_tb_wideband_cqi = Some(read_field(&mut reader, layout.cqi_bits())? as u8);
    }

    Ok(report)
}

fn write_field(writer: &mut BitWriter, value: Option<u8>, nof_bits: u32, field: &'static str) -> Result<(), CsiError> {
    let value = value.ok_or(CsiError::InvalidField(field))? as u32;
    if nof_bits < 32 && value >> nof_bits != 0 {
        return Err(CsiError::InvalidField(field));
    }
    writer.write(value, nof_bits as usize);
    Ok(())
}

/// Pack a CSI part 1 report the way a UE maps it onto PUCCH.
///
/// Inverse of [`csi_report_unpack_pucch`].
pub fn csi_report_pack_pucch(report: &CsiReportData, config: &CsiReportConfiguration) -> Result<BitPayload, CsiError> {
    let layout = ReportLayout::new(config)?;
    let mut writer = BitWriter::new();

    if config.quantities.is_empty() {
        return Ok(writer.finish());
    }

    if layout.has(CsiReportQuantities::CRI) {
        write_field(&mut writer, report.cri, layout.cri_bits, "cri")?;
    }

    let mut rank = layout.allowed_ranks[0];
    if layout.has(CsiReportQuantities::RI) {
        let ri = report.ri.ok_or(CsiError::InvalidField("ri"))? as u32;
        let ri_value = layout
            .allowed_ranks
            .iter()
            .position(|&allowed| allowed == ri)
            .ok_or(CsiError::InvalidField("ri"))?;
        rank = ri;
        writer.write(ri_value as u32, layout.ri_bits as usize);
    }

    if layout.has(CsiReportQuantities::LI) {
        write_field(&mut writer, report.li, layout.li_bits(rank), "li")?;
    }

    writer.pad(layout.padding_bits(rank) as usize);

    if layout.has(CsiReportQuantities::PMI) {
        let sizes = layout.pmi_bits(rank);
        match (config.pmi_codebook, report.pmi) {
            (PmiCodebookType::Two, Some(CsiReportPmi::TwoAntennaPort { pmi })) => {
                write_field(&mut writer, Some(pmi), sizes.i_2, "pmi")?;
            }
            (
                PmiCodebookType::TypeISinglePanel4PortsMode1,
                Some(CsiReportPmi::TypeISinglePanel4Ports { i_1_1, i_1_3, i_2 }),
            ) => {
                write_field(&mut writer, Some(i_1_1), sizes.i_1_1, "i_1_1")?;
                match (sizes.i_1_3, i_1_3) {
                    (0, None) => {}
                    (nof_bits, Some(value)) if nof_bits > 0 => {
                        write_field(&mut writer, Some(value), nof_bits, "i_1_3")?;
                    }
                    _ => return Err(CsiError::InvalidField("i_1_3")),
                }
                write_field(&mut writer, Some(i_2), sizes.i_2, "i_2")?;
            }
            (PmiCodebookType::One, None) => {}
            _ => return Err(CsiError::InvalidField("pmi")),
        }
    }

    if layout.has(CsiReportQuantities::CQI) {
        write_field(&mut writer, report.first_tb_wideband_cqi, layout.cqi_bits(), "cqi")?;
    }

    Ok(writer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ran::csi_report::RiRestriction;

    fn config(pmi_codebook: PmiCodebookType, quantities: CsiReportQuantities) -> CsiReportConfiguration {
        CsiReportConfiguration {
            nof_csi_rs_resources: 1,
            pmi_codebook,
            ri_restriction: RiRestriction::ALL,
            quantities,
        }
    }

    fn four_port() -> CsiReportConfiguration {
        config(PmiCodebookType::TypeISinglePanel4PortsMode1, CsiReportQuantities::CRI_RI_PMI_CQI)
    }

    #[test]
    fn test_report_sizes() {
        // RI 2 + PMI 5 + CQI 4
        assert_eq!(get_csi_report_pucch_size(&four_port()), Ok(11));
        // RI 1 + PMI 2 + CQI 4
        let two_port = config(PmiCodebookType::Two, CsiReportQuantities::CRI_RI_PMI_CQI);
        assert_eq!(get_csi_report_pucch_size(&two_port), Ok(7));
        // Single port: CQI only
        let one_port = config(PmiCodebookType::One, CsiReportQuantities::CRI_RI_PMI_CQI);
        assert_eq!(get_csi_report_pucch_size(&one_port), Ok(4));
        // No report
        assert_eq!(get_csi_report_pucch_size(&config(PmiCodebookType::Two, CsiReportQuantities::empty())), Ok(0));
    }

    #[test]
    fn test_report_size_with_cri_li_and_restriction() {
        let mut cfg = config(PmiCodebookType::TypeISinglePanel4PortsMode1, CsiReportQuantities::CRI_RI_LI_PMI_CQI);
        cfg.nof_csi_rs_resources = 4;
        // CRI 2 + RI 2 + max over ranks of (LI + PMI + CQI): rank 4 -> 2 + 4 + 4 = 10
        assert_eq!(get_csi_report_pucch_size(&cfg), Ok(14));

        // Only ranks 1 and 2 allowed: RI shrinks to 1 bit, LI at most 1 bit
        cfg.ri_restriction = RiRestriction(0b0011);
        assert_eq!(get_csi_report_pucch_size(&cfg), Ok(2 + 1 + 1 + 5 + 4));
    }

    #[test]
    fn test_other_codebook_cannot_be_sized() {
        let cfg = config(PmiCodebookType::Other, CsiReportQuantities::CRI_RI_PMI_CQI);
        assert_eq!(
            get_csi_report_pucch_size(&cfg),
            Err(CsiError::UnsupportedCodebook(PmiCodebookType::Other))
        );
    }

    #[test]
    fn test_four_port_rank2_round_trip_and_layout() {
        let report = CsiReportData {
            cri: Some(0),
            ri: Some(2),
            li: None,
            pmi: Some(CsiReportPmi::TypeISinglePanel4Ports { i_1_1: 3, i_1_3: Some(1), i_2: 0 }),
            first_tb_wideband_cqi: Some(12),
        };
        let packed = csi_report_pack_pucch(&report, &four_port()).unwrap();
        // RI=01, i_1_1=011, i_1_3=1, i_2=0, CQI=1100
        let expected = [false, true, false, true, true, true, false, true, true, false, false];
        assert_eq!(packed.to_bits(), expected);

        let unpacked = csi_report_unpack_pucch(&packed, &four_port()).unwrap();
        assert_eq!(unpacked, report);
    }

    #[test]
    fn test_padding_precedes_pmi_for_lower_payload_ranks() {
        let report = CsiReportData {
            cri: Some(0),
            ri: Some(3),
            li: None,
            pmi: Some(CsiReportPmi::TypeISinglePanel4Ports { i_1_1: 7, i_1_3: None, i_2: 1 }),
            first_tb_wideband_cqi: Some(5),
        };
        let packed = csi_report_pack_pucch(&report, &four_port()).unwrap();
        assert_eq!(packed.len(), 11);
        // RI=10, padding 0, i_1_1=111, i_2=1, CQI=0101
        let expected = [true, false, false, true, true, true, true, false, true, false, true];
        assert_eq!(packed.to_bits(), expected);
        assert_eq!(csi_report_unpack_pucch(&packed, &four_port()).unwrap(), report);
    }

    #[test]
    fn test_round_trip_every_rank() {
        let cfgs = [
            config(PmiCodebookType::Two, CsiReportQuantities::CRI_RI_PMI_CQI),
            four_port(),
            config(PmiCodebookType::TypeISinglePanel4PortsMode1, CsiReportQuantities::CRI_RI_LI_PMI_CQI),
            config(PmiCodebookType::Two, CsiReportQuantities::CRI_RI_CQI),
        ];
        for cfg in cfgs {
            let nof_ports = cfg.pmi_codebook.nof_ports().unwrap();
            for rank in 1..=nof_ports as u8 {
                let pmi = if !cfg.quantities.contains(CsiReportQuantities::PMI) {
                    None
                } else if nof_ports == 2 {
                    Some(CsiReportPmi::TwoAntennaPort { pmi: if rank == 1 { 3 } else { 1 } })
                } else {
                    Some(CsiReportPmi::TypeISinglePanel4Ports {
                        i_1_1: 5,
                        i_1_3: if rank == 2 { Some(1) } else { None },
                        i_2: if rank == 1 { 2 } else { 1 },
                    })
                };
                let report = CsiReportData {
                    cri: Some(0),
                    ri: Some(rank),
                    li: cfg.quantities.contains(CsiReportQuantities::LI).then_some(rank.min(4) - 1),
                    pmi,
                    first_tb_wideband_cqi: Some(15),
                };
                let packed = csi_report_pack_pucch(&report, &cfg).unwrap();
                assert_eq!(packed.len() as u32, get_csi_report_pucch_size(&cfg).unwrap());
                assert_eq!(csi_report_unpack_pucch(&packed, &cfg).unwrap(), report, "cfg={:?}", cfg);
            }
        }
    }

    #[test]
    fn test_validate_rejects_short_payload() {
        let payload = BitPayload::from_bits(&[true; 10]);
        assert_eq!(
            validate_pucch_csi_payload(&payload, &four_port()),
            Err(CsiError::PayloadSizeMismatch { expected: 11, actual: 10 })
        );
        assert!(csi_report_unpack_pucch(&payload, &four_port()).is_err());
    }

    #[test]
    fn test_unpack_rejects_ri_outside_restriction() {
        let mut cfg = four_port();
        // Three allowed ranks still need 2 RI bits, leaving value 3 unused.
        cfg.ri_restriction = RiRestriction(0b0111);
        let size = get_csi_report_pucch_size(&cfg).unwrap() as usize;
        let mut bits = vec![false; size];
        bits[0] = true;
        bits[1] = true;
        let payload = BitPayload::from_bits(&bits);
        assert_eq!(csi_report_unpack_pucch(&payload, &cfg), Err(CsiError::InvalidRi(3)));
    }

    #[test]
    fn test_pack_rejects_inconsistent_fields() {
        let mut report = CsiReportData {
            cri: Some(0),
            ri: Some(1),
            li: None,
            pmi: Some(CsiReportPmi::TypeISinglePanel4Ports { i_1_1: 3, i_1_3: Some(1), i_2: 0 }),
            first_tb_wideband_cqi: Some(12),
        };
        // i_1_3 is not reported for rank 1
        assert_eq!(csi_report_pack_pucch(&report, &four_port()), Err(CsiError::InvalidField("i_1_3")));

        report.pmi = Some(CsiReportPmi::TypeISinglePanel4Ports { i_1_1: 3, i_1_3: None, i_2: 0 });
        report.first_tb_wideband_cqi = Some(16);
        assert_eq!(csi_report_pack_pucch(&report, &four_port()), Err(CsiError::InvalidField("cqi")));
    }
}
