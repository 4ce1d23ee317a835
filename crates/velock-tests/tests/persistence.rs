//! Ledger serialization tests.
//!
//! The ledger is persisted as a single bincode blob; a reloaded ledger
//! must answer every query identically, including queries that trigger
//! fresh catch-up walks over state that was mid-decay when saved.

use velock_core::constants::EPOCH_DURATION;
use velock_core::types::AccountClass;
use velock_ledger::VeLedger;
use velock_tests::helpers::*;

const E: u64 = EPOCH_DURATION;
const E0: u64 = 1000 * E;

fn roundtrip(ledger: &VeLedger) -> VeLedger {
    let bytes = bincode::encode_to_vec(ledger, bincode::config::standard()).unwrap();
    let (decoded, read) =
        bincode::decode_from_slice(&bytes, bincode::config::standard()).unwrap();
    assert_eq!(read, bytes.len());
    decoded
}

#[test]
fn reloaded_ledger_is_identical() {
    let (mut ledger, mut vault) = setup(&[acct(1), acct(2), acct(3)]);
    ledger.set_delegate_registration(acct(3), true);
    let a = ledger
        .create_lock(acct(1), principal(100), E0 + 10 * E, E0, &mut vault)
        .unwrap();
    ledger
        .create_lock(acct(2), principal(40), E0 + 6 * E, E0, &mut vault)
        .unwrap();
    ledger.delegate_lock(a, acct(1), acct(3), E0 + E).unwrap();
    ledger
        .increase_amount(a, acct(1), principal(10), E0 + E + 500, &mut vault)
        .unwrap();

    let reloaded = roundtrip(&ledger);
    assert_eq!(reloaded, ledger);
}

#[test]
fn reloaded_ledger_answers_queries_identically() {
    let (mut ledger, mut vault) = setup(&[acct(1), acct(2)]);
    ledger.set_delegate_registration(acct(2), true);
    let id = ledger
        .create_lock(acct(1), principal(100), E0 + 8 * E, E0, &mut vault)
        .unwrap();
    ledger.delegate_lock(id, acct(1), acct(2), E0 + E).unwrap();

    // Save with the hand-over still pending, then compare answers that
    // force the reloaded copy to walk past the effective epoch.
    let reloaded = roundtrip(&ledger);
    for k in 0..=9u64 {
        let t = E0 + k * E;
        assert_eq!(
            reloaded.balance_at_epoch(AccountClass::User, acct(1), t),
            ledger.balance_at_epoch(AccountClass::User, acct(1), t),
            "user, epoch {k}"
        );
        assert_eq!(
            reloaded.balance_at_epoch(AccountClass::Delegate, acct(2), t),
            ledger.balance_at_epoch(AccountClass::Delegate, acct(2), t),
            "delegate, epoch {k}"
        );
        assert_eq!(
            reloaded.total_supply_at_epoch(t),
            ledger.total_supply_at_epoch(t),
            "supply, epoch {k}"
        );
    }
    assert_eq!(
        reloaded.lock_balance_at(id, E0 + 3 * E).unwrap(),
        ledger.lock_balance_at(id, E0 + 3 * E).unwrap()
    );
}
