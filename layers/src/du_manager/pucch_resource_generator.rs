//! Cell PUCCH resource list generation
//!
//! Places the cell's F0/F1 resources at the lower band edge, followed by the
//! F2/F3/F4 resources. With intra-slot hopping enabled each resource's second
//! hop is mirrored at the upper band edge.

use tracing::debug;

use super::pucch_builder_params::{PucchBuilderParams, PucchF0OrF1Params, PucchF2OrF3OrF4Params};
use crate::ran::pucch::{OfdmSymbolRange, PucchFormatParams, PucchResId, PucchResource, NOF_OFDM_SYMBOLS_PER_SLOT};
use crate::LayerError;

/// Cyclic shifts available in one PRB
const NOF_CYCLIC_SHIFTS: u32 = 12;

/// First PRB of the mirrored second hop
fn second_hop_prb(bwp_nof_prbs: u32, starting_prb: u32, nof_prbs: u32, hopping: bool) -> Option<u32> {
    hopping.then(|| bwp_nof_prbs - starting_prb - nof_prbs)
}

/// Number of F1 resources sharing one PRB
fn f1_resources_per_prb(occ_supported: bool, nof_cyc_shifts: u32, hopping: bool) -> u32 {
    let nof_occ = match (occ_supported, hopping) {
        (false, _) => 1,
        // floor(7 / 2) per hop
        (true, true) => 3,
        (true, false) => NOF_OFDM_SYMBOLS_PER_SLOT / 2,
    };
    nof_occ * nof_cyc_shifts
}

fn f0_or_f1_params(params: &PucchF0OrF1Params, res_idx: u32) -> (u32, PucchFormatParams) {
    match *params {
        PucchF0OrF1Params::F0 { nof_symbols, .. } => (
            res_idx,
            PucchFormatParams::Format0 {
                initial_cyclic_shift: 0,
                symbols: OfdmSymbolRange::new(NOF_OFDM_SYMBOLS_PER_SLOT - nof_symbols, nof_symbols),
            },
        ),
        PucchF0OrF1Params::F1 {
            occ_supported,
            nof_cyc_shifts,
            intraslot_freq_hopping,
        } => {
            let per_prb = f1_resources_per_prb(occ_supported, nof_cyc_shifts, intraslot_freq_hopping);
            let within_prb = res_idx % per_prb;
            (
                res_idx / per_prb,
                PucchFormatParams::Format1 {
                    initial_cyclic_shift: (within_prb % nof_cyc_shifts) * (NOF_CYCLIC_SHIFTS / nof_cyc_shifts),
                    time_domain_occ: within_prb / nof_cyc_shifts,
                    symbols: OfdmSymbolRange::new(0, NOF_OFDM_SYMBOLS_PER_SLOT),
                },
            )
        }
    }
}

fn f2_or_f3_or_f4_params(params: &PucchF2OrF3OrF4Params, res_idx: u32) -> (u32, u32, PucchFormatParams) {
    let symbols = OfdmSymbolRange::new(NOF_OFDM_SYMBOLS_PER_SLOT - params.nof_symbols(), params.nof_symbols());
    match *params {
        PucchF2OrF3OrF4Params::F2 { max_nof_rbs, .. } => (
            res_idx * max_nof_rbs,
            max_nof_rbs,
            PucchFormatParams::Format2 {
                nof_prbs: max_nof_rbs,
                symbols,
            },
        ),
        PucchF2OrF3OrF4Params::F3 { max_nof_rbs, .. } => (
            res_idx * max_nof_rbs,
            max_nof_rbs,
            PucchFormatParams::Format3 {
                nof_prbs: max_nof_rbs,
                symbols,
            },
        ),
        PucchF2OrF3OrF4Params::F4 { occ_length, .. } => (
            res_idx / occ_length,
            1,
            PucchFormatParams::Format4 {
                occ_length,
                occ_index: res_idx % occ_length,
                symbols,
            },
        ),
    }
}

/// Generate the cell-wide PUCCH resource list.
///
/// Resource `i` of the list has `cell_res_id == i`. Fails when the resources
/// do not fit in the BWP.
pub fn generate_cell_pucch_res_list(
    params: &PucchBuilderParams,
    bwp_nof_prbs: u32,
) -> Result<Vec<PucchResource>, LayerError> {
    params.validate()?;

    let f01_hopping = params.f0_or_f1_params.intraslot_freq_hopping();
    let f234_hopping = params.f2_or_f3_or_f4_params.intraslot_freq_hopping();
    let usable_prbs = if f01_hopping || f234_hopping {
        bwp_nof_prbs / 2
    } else {
        bwp_nof_prbs
    };

    let mut res_list = Vec::with_capacity(params.nof_cell_res() as usize);

    let mut f01_nof_prbs = 0;
    for res_idx in 0..params.nof_cell_f0_or_f1_res() {
        let (prb, format_params) = f0_or_f1_params(&params.f0_or_f1_params, res_idx);
        f01_nof_prbs = f01_nof_prbs.max(prb + 1);
        res_list.push(PucchResource {
            res_id: PucchResId {
                cell_res_id: res_list.len() as u32,
                ue_res_id: res_list.len() as u32,
            },
            starting_prb: prb,
            second_hop_prb: None,
            params: format_params,
        });
    }

    let mut used_prbs = f01_nof_prbs;
    for res_idx in 0..params.nof_cell_f2_or_f3_or_f4_res() {
        let (prb_offset, nof_prbs, format_params) = f2_or_f3_or_f4_params(&params.f2_or_f3_or_f4_params, res_idx);
        let starting_prb = f01_nof_prbs + prb_offset;
        used_prbs = used_prbs.max(starting_prb + nof_prbs);
        res_list.push(PucchResource {
            res_id: PucchResId {
                cell_res_id: res_list.len() as u32,
                ue_res_id: res_list.len() as u32,
            },
            starting_prb,
            second_hop_prb: None,
            params: format_params,
        });
    }

    if used_prbs > usable_prbs {
        return Err(LayerError::InvalidConfiguration(format!(
            "PUCCH resources need {} PRBs per hop, only {} of {} BWP PRBs available",
            used_prbs, usable_prbs, bwp_nof_prbs
        )));
    }

    for res in res_list.iter_mut() {
        let hopping = if res.format().is_long_payload() {
            f234_hopping
        } else {
            f01_hopping
        };
        res.second_hop_prb = second_hop_prb(bwp_nof_prbs, res.starting_prb, res.params.nof_prbs(), hopping);
    }

    debug!(
        "Generated {} PUCCH resources over {} PRBs per hop (BWP {} PRBs)",
        res_list.len(),
        used_prbs,
        bwp_nof_prbs
    );
    Ok(res_list)
}
