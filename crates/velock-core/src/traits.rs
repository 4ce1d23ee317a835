//! Collaborator seams consumed by the escrow engine.
//!
//! The engine never moves tokens itself. It calls an [`AssetVault`] to pull
//! principal in on lock creation/increase and push it back out on unlock.
//! The [`MemoryVault`] is suitable for testing; a production deployment
//! wires in the real two-denomination transfer capability.

use std::collections::HashMap;

use crate::error::VaultError;
use crate::types::{AccountId, PrincipalPair};

/// Two-denomination asset transfer capability.
///
/// Both calls are all-or-nothing: a failed deposit or withdrawal must leave
/// balances untouched, since the ledger aborts the whole operation on error.
pub trait AssetVault: Send + Sync {
    /// Pull `amount` of both denominations from `from` into escrow.
    ///
    /// # Errors
    ///
    /// [`VaultError::InsufficientBalance`] if either denomination is short.
    fn deposit(&mut self, from: &AccountId, amount: PrincipalPair) -> Result<(), VaultError>;

    /// Return `amount` of both denominations from escrow to `to`.
    ///
    /// # Errors
    ///
    /// [`VaultError::InsufficientBalance`] if escrow holds less than `amount`
    /// of either denomination. Under correct ledger bookkeeping this never
    /// happens.
    fn withdraw(&mut self, to: &AccountId, amount: PrincipalPair) -> Result<(), VaultError>;
}

/// In-memory vault for testing. No persistence, no real transfers.
#[derive(Debug, Clone, Default)]
pub struct MemoryVault {
    /// Free balances per account.
    balances: HashMap<AccountId, PrincipalPair>,
    /// Total escrowed amounts across all accounts.
    escrowed: PrincipalPair,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit free balance to an account (test setup).
    pub fn credit(&mut self, account: AccountId, amount: PrincipalPair) {
        let entry = self.balances.entry(account).or_default();
        entry.base += amount.base;
        entry.boost += amount.boost;
    }

    /// Free balance of an account.
    pub fn balance_of(&self, account: &AccountId) -> PrincipalPair {
        self.balances.get(account).copied().unwrap_or_default()
    }

    /// Total escrowed amounts.
    pub fn escrowed(&self) -> PrincipalPair {
        self.escrowed
    }
}

impl AssetVault for MemoryVault {
    fn deposit(&mut self, from: &AccountId, amount: PrincipalPair) -> Result<(), VaultError> {
        let have = self.balances.get(from).copied().unwrap_or_default();
        if have.base < amount.base {
            return Err(VaultError::InsufficientBalance { have: have.base, need: amount.base });
        }
        if have.boost < amount.boost {
            return Err(VaultError::InsufficientBalance { have: have.boost, need: amount.boost });
        }
        let entry = self.balances.entry(*from).or_default();
        entry.base -= amount.base;
        entry.boost -= amount.boost;
        self.escrowed.base += amount.base;
        self.escrowed.boost += amount.boost;
        Ok(())
    }

    fn withdraw(&mut self, to: &AccountId, amount: PrincipalPair) -> Result<(), VaultError> {
        if self.escrowed.base < amount.base {
            return Err(VaultError::InsufficientBalance { have: self.escrowed.base, need: amount.base });
        }
        if self.escrowed.boost < amount.boost {
            return Err(VaultError::InsufficientBalance { have: self.escrowed.boost, need: amount.boost });
        }
        self.escrowed.base -= amount.base;
        self.escrowed.boost -= amount.boost;
        let entry = self.balances.entry(*to).or_default();
        entry.base += amount.base;
        entry.boost += amount.boost;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(seed: u8) -> AccountId {
        AccountId([seed; 32])
    }

    #[test]
    fn deposit_moves_balance_into_escrow() {
        let mut vault = MemoryVault::new();
        vault.credit(acct(1), PrincipalPair::new(100, 50));
        vault.deposit(&acct(1), PrincipalPair::new(60, 20)).unwrap();

        assert_eq!(vault.balance_of(&acct(1)), PrincipalPair::new(40, 30));
        assert_eq!(vault.escrowed(), PrincipalPair::new(60, 20));
    }

    #[test]
    fn deposit_rejects_insufficient_balance() {
        let mut vault = MemoryVault::new();
        vault.credit(acct(1), PrincipalPair::new(10, 0));
        let err = vault.deposit(&acct(1), PrincipalPair::new(60, 0)).unwrap_err();
        assert_eq!(err, VaultError::InsufficientBalance { have: 10, need: 60 });
        // Nothing moved.
        assert_eq!(vault.balance_of(&acct(1)), PrincipalPair::new(10, 0));
        assert_eq!(vault.escrowed(), PrincipalPair::ZERO);
    }

    #[test]
    fn withdraw_round_trips() {
        let mut vault = MemoryVault::new();
        vault.credit(acct(1), PrincipalPair::new(100, 50));
        vault.deposit(&acct(1), PrincipalPair::new(100, 50)).unwrap();
        vault.withdraw(&acct(2), PrincipalPair::new(100, 50)).unwrap();

        assert_eq!(vault.balance_of(&acct(2)), PrincipalPair::new(100, 50));
        assert_eq!(vault.escrowed(), PrincipalPair::ZERO);
    }

    #[test]
    fn withdraw_rejects_overdraw_of_escrow() {
        let mut vault = MemoryVault::new();
        assert!(vault.withdraw(&acct(1), PrincipalPair::new(1, 0)).is_err());
    }
}
