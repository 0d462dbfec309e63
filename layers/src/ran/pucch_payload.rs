//! PUCCH format payload limits
//!
//! Number of UCI bits a PUCCH resource can carry for a maximum code rate,
//! based on TS 38.211 Section 6.3.2 (resource elements and modulation) and
//! TS 38.212 Section 6.3.1.2.1 (UCI CRC attachment).

use super::pucch::{MaxCodeRate, PucchFormatCommonParams, PucchFormatParams, PucchResource};

/// HARQ-ACK bits carried by PUCCH Format 0/1
pub const FORMAT0_1_MAX_HARQ_PAYLOAD: u32 = 2;
/// Data subcarriers per PRB for Format 2 (4 of 12 carry DMRS)
pub const FORMAT2_NOF_DATA_SC_PER_PRB: u32 = 8;
/// Subcarriers per resource block
pub const NOF_SUBCARRIERS_PER_RB: u32 = 12;

/// Maximum UCI payload given `max_nof_bits = floor(E * R)` coded bits,
/// accounting for the CRC attached to payloads above 11 bits.
pub fn uci_max_payload_from_bits(max_nof_bits: u32) -> u32 {
    // K <= 11: no CRC. 12 <= K <= 19: 6-bit CRC. K >= 20: 11-bit CRC.
    if max_nof_bits >= 20 + 11 {
        max_nof_bits - 11
    } else if max_nof_bits >= 12 + 6 {
        (max_nof_bits - 6).min(19)
    } else {
        max_nof_bits.min(11)
    }
}

fn max_payload_from_coded_bits(nof_coded_bits: u32, max_code_rate: MaxCodeRate) -> u32 {
    let max_nof_bits = (nof_coded_bits as f64 * max_code_rate.to_float()).floor() as u32;
    uci_max_payload_from_bits(max_nof_bits)
}

/// DMRS symbols of a Format 3/4 resource (TS 38.211 Table 6.4.1.3.3.2-1)
pub fn get_pucch_format3_4_nof_dmrs_symbols(nof_symbols: u32, intraslot_freq_hopping: bool, additional_dmrs: bool) -> u32 {
    match nof_symbols {
        4 => {
            if intraslot_freq_hopping {
                2
            } else {
                1
            }
        }
        5..=9 => 2,
        10..=14 => {
            if additional_dmrs {
                4
            } else {
                2
            }
        }
        _ => panic!("Invalid number of symbols {} for PUCCH Format 3/4", nof_symbols),
    }
}

/// Max UCI payload of a Format 2 resource (QPSK)
pub fn get_pucch_format2_max_payload(nof_prbs: u32, nof_symbols: u32, max_code_rate: MaxCodeRate) -> u32 {
    let nof_re = FORMAT2_NOF_DATA_SC_PER_PRB * nof_prbs * nof_symbols;
    max_payload_from_coded_bits(nof_re * 2, max_code_rate)
}

/// Max UCI payload of a Format 3 resource
pub fn get_pucch_format3_max_payload(
    nof_prbs: u32,
    nof_symbols: u32,
    max_code_rate: MaxCodeRate,
    intraslot_freq_hopping: bool,
    additional_dmrs: bool,
    pi2_bpsk: bool,
) -> u32 {
    let nof_data_symbols =
        nof_symbols - get_pucch_format3_4_nof_dmrs_symbols(nof_symbols, intraslot_freq_hopping, additional_dmrs);
    let bits_per_re = if pi2_bpsk { 1 } else { 2 };
    let nof_re = NOF_SUBCARRIERS_PER_RB * nof_prbs * nof_data_symbols;
    max_payload_from_coded_bits(nof_re * bits_per_re, max_code_rate)
}

/// Max UCI payload of a Format 4 resource (single PRB, `occ_length` 2 or 4)
pub fn get_pucch_format4_max_payload(
    nof_symbols: u32,
    max_code_rate: MaxCodeRate,
    intraslot_freq_hopping: bool,
    additional_dmrs: bool,
    pi2_bpsk: bool,
    occ_length: u32,
) -> u32 {
    assert!(occ_length == 2 || occ_length == 4, "Invalid PUCCH Format 4 OCC length {}", occ_length);
    let nof_data_symbols =
        nof_symbols - get_pucch_format3_4_nof_dmrs_symbols(nof_symbols, intraslot_freq_hopping, additional_dmrs);
    let bits_per_re = if pi2_bpsk { 1 } else { 2 };
    let nof_re = NOF_SUBCARRIERS_PER_RB / occ_length * nof_data_symbols;
    max_payload_from_coded_bits(nof_re * bits_per_re, max_code_rate)
}

/// Max UCI payload of a given resource under the format's common parameters.
///
/// Format 0/1 resources always return [`FORMAT0_1_MAX_HARQ_PAYLOAD`].
pub fn get_pucch_resource_max_payload(res: &PucchResource, common: &PucchFormatCommonParams) -> u32 {
    let hopping = res.intraslot_freq_hopping();
    match res.params {
        PucchFormatParams::Format0 { .. } | PucchFormatParams::Format1 { .. } => FORMAT0_1_MAX_HARQ_PAYLOAD,
        PucchFormatParams::Format2 { nof_prbs, symbols } => {
            get_pucch_format2_max_payload(nof_prbs, symbols.length, common.max_c_rate)
        }
        PucchFormatParams::Format3 { nof_prbs, symbols } => get_pucch_format3_max_payload(
            nof_prbs,
            symbols.length,
            common.max_c_rate,
            hopping,
            common.additional_dmrs,
            common.pi2_bpsk,
        ),
        PucchFormatParams::Format4 { occ_length, symbols, .. } => get_pucch_format4_max_payload(
            symbols.length,
            common.max_c_rate,
            hopping,
            common.additional_dmrs,
            common.pi2_bpsk,
            occ_length,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ran::pucch::{OfdmSymbolRange, PucchResId};

    #[test]
    fn test_crc_attachment_rule() {
        assert_eq!(uci_max_payload_from_bits(8), 8);
        assert_eq!(uci_max_payload_from_bits(11), 11);
        // 12 payload bits need 18 coded bits
        assert_eq!(uci_max_payload_from_bits(17), 11);
        assert_eq!(uci_max_payload_from_bits(18), 12);
        assert_eq!(uci_max_payload_from_bits(25), 19);
        assert_eq!(uci_max_payload_from_bits(30), 19);
        assert_eq!(uci_max_payload_from_bits(31), 20);
        assert_eq!(uci_max_payload_from_bits(100), 89);
    }

    #[test]
    fn test_format2_max_payload() {
        // 1 PRB, 2 symbols: 16 RE, 32 coded bits, 8 at rate 0.25
        assert_eq!(get_pucch_format2_max_payload(1, 2, MaxCodeRate::Dot25), 8);
        // 2 PRB, 2 symbols at 0.35: 64 * 0.35 = 22 -> 16 with 6-bit CRC
        assert_eq!(get_pucch_format2_max_payload(2, 2, MaxCodeRate::Dot35), 16);
        assert_eq!(get_pucch_format2_max_payload(4, 2, MaxCodeRate::Dot80), 91);
    }

    #[test]
    fn test_format3_dmrs_symbols() {
        assert_eq!(get_pucch_format3_4_nof_dmrs_symbols(4, false, false), 1);
        assert_eq!(get_pucch_format3_4_nof_dmrs_symbols(4, true, false), 2);
        assert_eq!(get_pucch_format3_4_nof_dmrs_symbols(7, false, true), 2);
        assert_eq!(get_pucch_format3_4_nof_dmrs_symbols(14, false, false), 2);
        assert_eq!(get_pucch_format3_4_nof_dmrs_symbols(14, false, true), 4);
    }

    #[test]
    fn test_format3_and_format4_max_payload() {
        // F3: 1 PRB, 14 symbols, 2 DMRS -> 144 RE, QPSK 288 bits, rate 0.25 -> 72 -> 61
        assert_eq!(get_pucch_format3_max_payload(1, 14, MaxCodeRate::Dot25, false, false, false), 61);
        // pi/2-BPSK halves the coded bits: 144 * 0.25 = 36 -> 25
        assert_eq!(get_pucch_format3_max_payload(1, 14, MaxCodeRate::Dot25, false, false, true), 25);
        // F4 OCC 2: 6 subcarriers x 12 data symbols x 2 bits = 144, rate 0.25 -> 36 -> 25
        assert_eq!(get_pucch_format4_max_payload(14, MaxCodeRate::Dot25, false, false, false, 2), 25);
        // OCC 4 halves it again: 72 * 0.25 = 18 -> 12
        assert_eq!(get_pucch_format4_max_payload(14, MaxCodeRate::Dot25, false, false, false, 4), 12);
    }

    #[test]
    fn test_resource_max_payload_dispatch() {
        let common = PucchFormatCommonParams {
            max_c_rate: MaxCodeRate::Dot25,
            additional_dmrs: false,
            pi2_bpsk: false,
            simultaneous_harq_ack_csi: true,
        };
        let f1 = PucchResource {
            res_id: PucchResId { cell_res_id: 0, ue_res_id: 0 },
            starting_prb: 0,
            second_hop_prb: None,
            params: PucchFormatParams::Format1 {
                initial_cyclic_shift: 0,
                time_domain_occ: 0,
                symbols: OfdmSymbolRange::new(0, 14),
            },
        };
        assert_eq!(get_pucch_resource_max_payload(&f1, &common), FORMAT0_1_MAX_HARQ_PAYLOAD);

        let f2 = PucchResource {
            params: PucchFormatParams::Format2 { nof_prbs: 1, symbols: OfdmSymbolRange::new(12, 2) },
            ..f1
        };
        assert_eq!(get_pucch_resource_max_payload(&f2, &common), 8);
    }
}
