//! Decay-line arithmetic.
//!
//! A [`DecayLine`] encodes a linearly decaying balance as a `(bias, slope)`
//! pair representing `value(t) = max(bias - slope * t, 0)`. Lines are closed
//! under component-wise addition and subtraction because every line in use
//! is constructed with `bias = slope * expiry`, which makes each line's
//! value proportional to the time remaining before its expiry.
//!
//! All arithmetic is integer-only with u128 widths for overflow headroom.
//! Subtraction saturates at zero; under correct bookkeeping the floor is
//! never reached, and a triggered floor in tests is a bug signal.

use serde::{Deserialize, Serialize};

/// A linearly decaying balance: `value(t) = max(bias - slope * t, 0)`.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct DecayLine {
    /// Value of the line at t = 0.
    pub bias: u128,
    /// Decay per second.
    pub slope: u128,
}

impl DecayLine {
    /// The zero line: no balance, no decay.
    pub const ZERO: Self = Self { bias: 0, slope: 0 };

    pub fn new(bias: u128, slope: u128) -> Self {
        Self { bias, slope }
    }

    /// Build the line for a lock with the given combined principal and expiry.
    ///
    /// `slope = principal / max_lock_duration` (integer division), then
    /// `bias = slope * expiry` so that the line reaches exactly zero at
    /// the lock's expiry.
    pub fn from_principal(combined_principal: u64, expiry: u64, max_lock_duration: u64) -> Self {
        let slope = combined_principal as u128 / max_lock_duration as u128;
        Self {
            bias: slope * expiry as u128,
            slope,
        }
    }

    /// Component-wise sum of two lines.
    pub fn add(self, other: Self) -> Self {
        Self {
            bias: self.bias + other.bias,
            slope: self.slope + other.slope,
        }
    }

    /// Component-wise difference, flooring each component at zero.
    pub fn saturating_sub(self, other: Self) -> Self {
        Self {
            bias: self.bias.saturating_sub(other.bias),
            slope: self.slope.saturating_sub(other.slope),
        }
    }

    /// Evaluate the line at timestamp `t`, clamped to zero past expiry.
    pub fn value_at(self, t: u64) -> u128 {
        self.bias.saturating_sub(self.slope * t as u128)
    }

    /// Remove a contribution that matured at `expiry_epoch`.
    ///
    /// A contribution with slope `s` expiring at `e` carries `bias = s * e`,
    /// so removing it subtracts `s * e` from the bias and `s` from the slope.
    pub fn subtract_expired(self, expiring_slope: u128, expiry_epoch: u64) -> Self {
        Self {
            bias: self.bias.saturating_sub(expiring_slope * expiry_epoch as u128),
            slope: self.slope.saturating_sub(expiring_slope),
        }
    }

    pub fn is_zero(self) -> bool {
        self.bias == 0 && self.slope == 0
    }
}
