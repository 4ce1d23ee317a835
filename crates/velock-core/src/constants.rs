//! Protocol constants. Principal values are in the token's smallest unit;
//! all times in seconds since the Unix epoch.

/// Duration of one accounting epoch in seconds (one week).
///
/// Every decay event — lock expiry, slope reduction, delegation
/// hand-over — is quantized to multiples of this value.
pub const EPOCH_DURATION: u64 = 7 * 24 * 60 * 60;

/// Longest allowed lock term: 104 epochs (two years of weeks).
///
/// The voting-power slope of a lock is `combined_principal / MAX_LOCK_DURATION`,
/// so a max-term lock starts at full weight and any shorter term starts
/// proportionally lower.
pub const MAX_LOCK_DURATION: u64 = 104 * EPOCH_DURATION;

/// Minimum combined principal for a lock.
///
/// Equal to [`MAX_LOCK_DURATION`] in smallest units so that the derived
/// slope (`principal / MAX_LOCK_DURATION`) is at least 1 and the lock
/// never rounds to zero voting power on creation.
pub const MIN_LOCK_PRINCIPAL: u64 = MAX_LOCK_DURATION;

/// Minimum remaining lifetime, in full epochs, for a delegation action.
///
/// A delegation takes effect at the next epoch boundary; requiring the
/// current epoch plus two more guarantees the lock still carries non-zero
/// power in the epoch the hand-over lands, so a short-lived lock cannot be
/// voted by its owner and handed to a delegate inside the same epoch.
pub const MIN_DELEGATION_EPOCHS: u64 = 3;

/// Sentinel anchor value for an aggregate that has never been advanced.
pub const ANCHOR_UNSET: u64 = u64::MAX;
