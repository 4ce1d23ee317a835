//! # velock-ledger — Lazy decay-accounting ledger.
//!
//! Tracks a linearly decaying voting-power balance for every account,
//! delegate, and (user, delegate) pair without ever iterating over all
//! locks:
//! - **Decay lines**: each lock contributes a `(bias, slope)` pair that
//!   reaches zero exactly at the lock's expiry.
//! - **Lazy catch-up**: aggregates advance epoch by epoch only when next
//!   touched, applying scheduled slope expiries as they go. Cost is
//!   O(missed epochs) per touch, O(1) for an account touched every epoch.
//! - **Forward-booked delegation**: voting-power hand-overs are queued
//!   against the next epoch boundary so the old and new holder never both
//!   count the same lock in one accounting period.

pub mod aggregate;
pub mod config;
pub mod ledger;

pub use aggregate::{Aggregate, GlobalAggregate, PendingDelta};
pub use config::LedgerConfig;
pub use ledger::VeLedger;
