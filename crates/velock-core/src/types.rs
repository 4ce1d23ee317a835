//! Core escrow types: accounts, locks, and checkpoints.
//!
//! All timestamps are seconds since the Unix epoch and every expiry or
//! hand-over boundary is a multiple of the configured epoch duration.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::line::DecayLine;

/// A 32-byte account identifier.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    /// The zero account. Used only as a placeholder in tests.
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for AccountId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Sequential opaque lock identifier assigned by the ledger.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
pub struct LockId(pub u64);

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lock-{}", self.0)
    }
}

/// Which aggregate family an account is queried under.
///
/// The same 32-byte identifier can appear both as a user (lock owner) and
/// as a delegate; the two roles are accounted independently.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub enum AccountClass {
    /// A lock owner voting with their own locks.
    User,
    /// A registered delegate voting with power handed over by users.
    Delegate,
}

/// The two independently accounted principal denominations of a lock.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct PrincipalPair {
    pub base: u64,
    pub boost: u64,
}

impl PrincipalPair {
    pub const ZERO: Self = Self { base: 0, boost: 0 };

    pub fn new(base: u64, boost: u64) -> Self {
        Self { base, boost }
    }

    /// Combined principal used for slope derivation. `None` on overflow.
    pub fn checked_combined(&self) -> Option<u64> {
        self.base.checked_add(self.boost)
    }

    /// Component-wise sum. `None` on overflow of either denomination.
    pub fn checked_add(&self, other: Self) -> Option<Self> {
        Some(Self {
            base: self.base.checked_add(other.base)?,
            boost: self.boost.checked_add(other.boost)?,
        })
    }

    pub fn is_zero(&self) -> bool {
        self.base == 0 && self.boost == 0
    }
}

/// A principal lock and its delegation state.
///
/// Locks are never deleted: on unlock the principal is zeroed and the
/// `withdrawn` flag set, because the checkpoint history keyed by the lock
/// id remains load-bearing for point-in-time queries.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Lock {
    pub id: LockId,
    pub owner: AccountId,
    pub principal: PrincipalPair,
    /// Expiry timestamp; always an epoch boundary.
    pub expiry: u64,
    /// Delegation target once every pending hand-over has taken effect.
    /// `None` means the owner holds (or will hold) the power.
    pub delegate: Option<AccountId>,
    /// The account entitled to the lock's power before
    /// [`holder_effective_at`](Self::holder_effective_at) is reached.
    /// Meaningful only while a hand-over is mid-flight.
    pub current_holder: AccountId,
    /// Epoch boundary at which [`delegate`](Self::delegate) (or the owner,
    /// if `None`) becomes the entitled holder.
    pub holder_effective_at: u64,
    pub withdrawn: bool,
}

impl Lock {
    /// The account entitled to this lock's voting power in the epoch
    /// starting at `epoch_start`.
    pub fn holder_at(&self, epoch_start: u64) -> AccountId {
        if epoch_start >= self.holder_effective_at {
            self.delegate.unwrap_or(self.owner)
        } else {
            self.current_holder
        }
    }
}

/// A stored snapshot of a line at a specific epoch boundary.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Checkpoint {
    pub line: DecayLine,
    pub epoch_start: u64,
}

/// Append a checkpoint, overwriting in place when the most recent entry
/// already covers the same epoch (at most one checkpoint per epoch).
pub fn record_checkpoint(list: &mut Vec<Checkpoint>, epoch_start: u64, line: DecayLine) {
    if let Some(last) = list.last_mut() {
        debug_assert!(last.epoch_start <= epoch_start, "checkpoints must be appended in order");
        if last.epoch_start == epoch_start {
            last.line = line;
            return;
        }
    }
    list.push(Checkpoint { line, epoch_start });
}

/// The latest checkpointed line at or before `ts`, via binary search.
///
/// Returns the zero line when `ts` predates the first checkpoint.
pub fn checkpoint_line_at(list: &[Checkpoint], ts: u64) -> DecayLine {
    let idx = list.partition_point(|c| c.epoch_start <= ts);
    if idx == 0 {
        DecayLine::ZERO
    } else {
        list[idx - 1].line
    }
}
