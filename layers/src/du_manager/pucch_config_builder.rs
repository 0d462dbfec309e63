//! UE PUCCH-Config builder
//!
//! Maps the resources picked for a UE (HARQ set, SR resource, CSI resource)
//! from the cell resource list into the UE's PUCCH-Config, and back.

use super::pucch_builder_params::{PucchBuilderParams, PucchF0OrF1Params};
use crate::ran::periodicity::SrPeriodicity;
use crate::ran::pucch::{
    PucchConfig, PucchFormat, PucchFormatCommonParams, PucchResId, PucchResource, PucchResourceSet,
    SchedulingRequestResourceConfig,
};
use crate::ran::pucch_payload::FORMAT0_1_MAX_HARQ_PAYLOAD;

/// Cell default PUCCH-Config: format parameters and one SR resource, no
/// resources assigned yet
pub fn make_default_pucch_config(params: &PucchBuilderParams, sr_period: SrPeriodicity) -> PucchConfig {
    let set1_format = params.f2_or_f3_or_f4_params.format();
    let f234_common = params.f2_or_f3_or_f4_params.common_params();

    let mut pucch_cfg = PucchConfig {
        pucch_res_set: [
            PucchResourceSet {
                pucch_res_set_id: 0,
                pucch_res_id_list: Vec::new(),
            },
            PucchResourceSet {
                pucch_res_set_id: 1,
                pucch_res_id_list: Vec::new(),
            },
        ],
        pucch_res_list: Vec::new(),
        sr_res_list: vec![SchedulingRequestResourceConfig {
            sr_res_id: 1,
            sr_id: 0,
            period: sr_period,
            offset: 0,
            pucch_res_id: PucchResId {
                cell_res_id: params.cell_sr_res_id(0),
                ue_res_id: params.ue_sr_res_id(),
            },
        }],
        format_1_common_param: None,
        format_2_common_param: None,
        format_3_common_param: None,
        format_4_common_param: None,
        format_max_payload: [0; 5],
        set1_format,
    };

    if let PucchF0OrF1Params::F1 { .. } = params.f0_or_f1_params {
        pucch_cfg.format_1_common_param = Some(PucchFormatCommonParams {
            additional_dmrs: false,
            pi2_bpsk: false,
            ..f234_common
        });
    }
    match set1_format {
        PucchFormat::Format2 => pucch_cfg.format_2_common_param = Some(f234_common),
        PucchFormat::Format3 => pucch_cfg.format_3_common_param = Some(f234_common),
        _ => pucch_cfg.format_4_common_param = Some(f234_common),
    }
    pucch_cfg
}

fn ue_resource(cell_res_list: &[PucchResource], cell_res_id: u32, ue_res_id: u32) -> PucchResource {
    PucchResource {
        res_id: PucchResId { cell_res_id, ue_res_id },
        ..cell_res_list[cell_res_id as usize]
    }
}

/// Build a UE PUCCH-Config from the cell defaults.
///
/// `harq_set` picks the HARQ resources, `sr_idx` and `csi_idx` index the SR
/// and CSI resource ranges. The SR and CSI slot offsets are left to the caller.
pub fn build_ue_pucch_config(
    params: &PucchBuilderParams,
    default_pucch_cfg: &PucchConfig,
    cell_res_list: &[PucchResource],
    harq_set: u32,
    sr_idx: u32,
    csi_idx: Option<u32>,
) -> PucchConfig {
    let mut pucch_cfg = default_pucch_cfg.clone();
    pucch_cfg.pucch_res_list.clear();

    let nof_f01 = params.nof_ue_pucch_f0_or_f1_res_harq;
    let nof_f234 = params.nof_ue_pucch_f2_or_f3_or_f4_res_harq;

    for res_idx in 0..nof_f01 {
        let cell_res_id = params.cell_f0_or_f1_harq_res_id(harq_set, res_idx);
        pucch_cfg.pucch_res_list.push(ue_resource(cell_res_list, cell_res_id, res_idx));
    }

    let sr_res_id = PucchResId {
        cell_res_id: params.cell_sr_res_id(sr_idx),
        ue_res_id: params.ue_sr_res_id(),
    };
    pucch_cfg
        .pucch_res_list
        .push(ue_resource(cell_res_list, sr_res_id.cell_res_id, sr_res_id.ue_res_id));

    for res_idx in 0..nof_f234 {
        let cell_res_id = params.cell_f2_or_f3_or_f4_harq_res_id(harq_set, res_idx);
        let ue_res_id = params.ue_f2_or_f3_or_f4_harq_res_id(res_idx);
        pucch_cfg.pucch_res_list.push(ue_resource(cell_res_list, cell_res_id, ue_res_id));
    }

    if let Some(csi_idx) = csi_idx {
        let cell_res_id = params.cell_csi_res_id(csi_idx);
        pucch_cfg
            .pucch_res_list
            .push(ue_resource(cell_res_list, cell_res_id, params.ue_csi_res_id()));
    }

    pucch_cfg.pucch_res_set[0].pucch_res_id_list = (0..nof_f01).collect();
    pucch_cfg.pucch_res_set[1].pucch_res_id_list =
        (0..nof_f234).map(|idx| params.ue_f2_or_f3_or_f4_harq_res_id(idx)).collect();

    if let Some(sr) = pucch_cfg.sr_res_list.first_mut() {
        sr.pucch_res_id = sr_res_id;
    }

    let f234_res = &cell_res_list[params.cell_f2_or_f3_or_f4_harq_res_id(harq_set, 0) as usize];
    pucch_cfg.set_max_payload(params.f0_or_f1_params.format(), FORMAT0_1_MAX_HARQ_PAYLOAD);
    pucch_cfg.set_max_payload(
        params.f2_or_f3_or_f4_params.format(),
        params.f2_or_f3_or_f4_params.max_payload(f234_res),
    );
    pucch_cfg.set1_format = params.f2_or_f3_or_f4_params.format();

    pucch_cfg
}

/// SR resource index of a UE PUCCH-Config
pub fn sr_idx_from_ue_config(params: &PucchBuilderParams, pucch_cfg: &PucchConfig) -> Option<u32> {
    let sr = pucch_cfg.sr_res_list.first()?;
    params.sr_idx_from_cell_res_id(sr.pucch_res_id.cell_res_id)
}

/// CSI resource index of a UE PUCCH-Config, `None` without a CSI resource
pub fn csi_idx_from_ue_config(params: &PucchBuilderParams, pucch_cfg: &PucchConfig) -> Option<u32> {
    let res = pucch_cfg.find_resource(params.ue_csi_res_id())?;
    params.csi_idx_from_cell_res_id(res.res_id.cell_res_id)
}
