//! # velock-core
//! Foundation types for the Velock vote-escrow engine.

pub mod constants;
pub mod epoch;
pub mod error;
pub mod line;
pub mod traits;
pub mod types;
