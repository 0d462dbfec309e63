//! DU Control Path Layers Library
//!
//! This crate implements the uplink control path of the 5G NR DU: PUCCH
//! resource pooling for SR and periodic CSI, CSI report sizing and decoding,
//! and the per-cell UCI decoder feeding the scheduler.

pub mod ran;
pub mod du_manager;
pub mod mac;

use thiserror::Error;

/// Common errors for the DU layers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Cell index {0} configured more than once")]
    DuplicateCell(u8),
}
