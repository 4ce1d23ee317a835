//! Ledger configuration.
//!
//! Provides [`LedgerConfig`] with defaults taken from the protocol
//! constants. All engine math reads its parameters from the config, so
//! tests can run with short epochs without touching the constants.

use serde::{Deserialize, Serialize};

use velock_core::constants::{
    EPOCH_DURATION, MAX_LOCK_DURATION, MIN_DELEGATION_EPOCHS, MIN_LOCK_PRINCIPAL,
};

/// Configuration for a ledger instance.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct LedgerConfig {
    /// Duration of one accounting epoch in seconds.
    pub epoch_duration: u64,
    /// Longest allowed lock term; also the slope denominator.
    pub max_lock_duration: u64,
    /// Minimum combined principal for lock creation.
    pub min_lock_principal: u64,
    /// Minimum remaining lifetime, in full epochs, for delegation actions.
    pub min_delegation_epochs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            epoch_duration: EPOCH_DURATION,
            max_lock_duration: MAX_LOCK_DURATION,
            min_lock_principal: MIN_LOCK_PRINCIPAL,
            min_delegation_epochs: MIN_DELEGATION_EPOCHS,
        }
    }
}
