//! Shared test helpers for lifecycle and delegation tests.

use std::sync::Once;

use velock_core::constants::MAX_LOCK_DURATION;
use velock_core::traits::MemoryVault;
use velock_core::types::{AccountId, PrincipalPair};
use velock_ledger::{LedgerConfig, VeLedger};

static TRACING: Once = Once::new();

/// Install the tracing subscriber once per test binary, honoring
/// `RUST_LOG` for filtering.
pub fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

/// Simple account id from a seed byte.
pub fn acct(seed: u8) -> AccountId {
    AccountId([seed; 32])
}

/// A principal pair whose combined value decays at exactly `slope` units
/// per second when locked for the full maximum term.
pub fn principal(slope: u64) -> PrincipalPair {
    PrincipalPair::new(slope * MAX_LOCK_DURATION / 2, slope * MAX_LOCK_DURATION / 2)
}

/// Fresh ledger with default config plus a vault funding each account
/// generously enough for any scenario in this suite.
pub fn setup(accounts: &[AccountId]) -> (VeLedger, MemoryVault) {
    init_tracing();
    let ledger = VeLedger::new(LedgerConfig::default());
    let mut vault = MemoryVault::new();
    for account in accounts {
        vault.credit(*account, PrincipalPair::new(u64::MAX / 4, u64::MAX / 4));
    }
    (ledger, vault)
}
