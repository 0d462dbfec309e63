//! RAN configuration model and CSI/PUCCH helpers
//!
//! Types and pure functions shared by the DU manager and the MAC scheduler:
//! PUCCH and CSI-MeasConfig models, PUCCH format payload limits and the CSI
//! report PUCCH codec.

pub mod csi_codec;
pub mod csi_meas;
pub mod csi_report;
pub mod periodicity;
pub mod pucch;
pub mod pucch_payload;

pub use csi_codec::{
    csi_report_pack_pucch, csi_report_unpack_pucch, get_csi_report_pucch_size, validate_pucch_csi_payload,
    CsiError, CsiReportData, CsiReportPmi,
};
pub use csi_meas::{make_default_csi_meas_config, CsiMeasConfig, CsiMeasParams};
pub use csi_report::{
    create_csi_report_configuration, CsiReportConfiguration, CsiReportQuantities, PmiCodebookType, RiRestriction,
};
pub use periodicity::{CsiReportPeriodicity, CsiResourcePeriodicity, SrPeriodicity};
pub use pucch::{MaxCodeRate, PucchConfig, PucchFormat, PucchResource};
