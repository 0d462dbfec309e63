//! Lower-Layer Interfaces Library
//! 
//! This crate defines the messages the PHY hands to the MAC, in particular the
//! per-slot UCI indications decoded from PUCCH and PUSCH.

pub mod message_types;

use thiserror::Error;

/// Interface errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("Too many UCI PDUs in slot: {count} > {max}")]
    TooManyPdus { count: usize, max: usize },

    #[error("Too many HARQ-ACK bits for rnti={rnti}: {count} > {max}")]
    TooManyHarqBits { rnti: u16, count: usize, max: usize },
}
