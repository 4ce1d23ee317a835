//! Integration and adversarial test suite for the Velock escrow engine.
//!
//! This crate contains full-lifecycle tests driving the ledger through
//! multi-epoch scenarios, and adversarial tests that try to double-count
//! voting power, skip decay, or extract principal twice.

pub mod helpers;
