//! MAC UCI handling
//!
//! Receive side of the uplink control information: the scheduling results that
//! announce which CSI reports are expected, the per-cell UCI decoder and the
//! link monitoring it feeds.

pub mod expected_uci_grid;
pub mod rlf_detector;
pub mod rnti_table;
pub mod sched_result;
pub mod uci_decoder;
pub mod uci_indication;

pub use expected_uci_grid::{ExpectedCsi, ExpectedUciGrid, MAX_EXPECTED_UCI_GRID_SIZE};
pub use rlf_detector::{ConsecutiveKoRlfDetector, RlfDetector, RlfThresholds};
pub use rnti_table::DuRntiTable;
pub use sched_result::{PucchInfo, UciInfo, UlSchedInfo};
pub use uci_decoder::{convert_mac_harq_bits_to_sched_harq_values, UciCellDecoder};
pub use uci_indication::{HarqAckStatus, UciIndication, UciPdu, UciPduKind, UciPucchF0OrF1, UciPucchF2OrF3OrF4, UciPusch};
