//! Error types for the Velock escrow engine.
use thiserror::Error;

use crate::types::{AccountId, LockId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("lock not found: {0}")] NotFound(LockId),
    #[error("caller {caller} is not the owner of {lock}")] NotOwner { lock: LockId, caller: AccountId },
    #[error("lock {lock} already expired at {expiry}")] Expired { lock: LockId, expiry: u64 },
    #[error("lock {lock} not expired until {expiry}")] NotExpired { lock: LockId, expiry: u64 },
    #[error("lock already withdrawn: {0}")] AlreadyWithdrawn(LockId),
    #[error("expiry {0} is not on an epoch boundary")] ExpiryNotAligned(u64),
    #[error("expiry {expiry} not past {now}")] ExpiryTooEarly { expiry: u64, now: u64 },
    #[error("expiry {expiry} exceeds the maximum term ending at {max}")] DurationTooLong { expiry: u64, max: u64 },
    #[error("combined principal {got} below minimum {min}")] BelowMinimumPrincipal { got: u64, min: u64 },
    #[error("principal overflow")] PrincipalOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DelegationError {
    #[error("lock already delegated: {0}")] AlreadyDelegated(LockId),
    #[error("lock not delegated: {0}")] NotDelegated(LockId),
    #[error("delegate not registered: {0}")] DelegateNotRegistered(AccountId),
    #[error("cannot delegate to the lock owner: {0}")] SelfDelegation(AccountId),
    #[error("lock already delegated to {0}")] SameDelegate(AccountId),
    #[error("remaining lifetime ends at {expiry}, need at least {min_epochs} full epochs from {now}")]
    LifetimeTooShort { expiry: u64, now: u64, min_epochs: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("insufficient balance: have {have}, need {need}")] InsufficientBalance { have: u64, need: u64 },
    #[error("transfer failed: {0}")] TransferFailed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscrowError {
    #[error(transparent)] Lock(#[from] LockError),
    #[error(transparent)] Delegation(#[from] DelegationError),
    #[error(transparent)] Vault(#[from] VaultError),
}
