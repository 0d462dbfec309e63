//! Common Utilities and Types Library
//! 
//! This crate provides shared types and utilities used across the DU control path.

pub mod bits;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use bits::*;
pub use types::*;
pub use utils::*;
