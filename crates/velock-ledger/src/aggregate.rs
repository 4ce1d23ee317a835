//! Aggregate decay state and the lazy catch-up walk.
//!
//! One [`GlobalAggregate`] tracks protocol-wide supply; one [`Aggregate`]
//! exists per user, per delegate, and per (user, delegate) pair. Each holds
//! a current line, an anchor (the last epoch boundary it was advanced to),
//! and a slope-expiry schedule. Non-global aggregates additionally carry a
//! pending-delta queue for forward-booked voting-power hand-overs and a
//! checkpoint history.
//!
//! The catch-up walk is monotonic and idempotent: repeating it for the same
//! target is a no-op, and a pending slot is cleared the moment it is
//! applied, so it can never be drained twice.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use velock_core::constants::ANCHOR_UNSET;
use velock_core::line::DecayLine;
use velock_core::types::{record_checkpoint, Checkpoint};

/// A queued voting-power change that takes effect at a future epoch.
///
/// Absence from the queue means nothing is queued; a slot that exists but
/// nets to zero is still a real booking (`Both` with equal halves), which
/// keeps "nothing queued" and "queued a net-zero change" distinguishable.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub enum PendingDelta {
    Addition(DecayLine),
    Subtraction(DecayLine),
    Both { add: DecayLine, sub: DecayLine },
}

impl PendingDelta {
    /// Merge another addition into this slot.
    pub fn with_addition(self, line: DecayLine) -> Self {
        match self {
            Self::Addition(add) => Self::Addition(add.add(line)),
            Self::Subtraction(sub) => Self::Both { add: line, sub },
            Self::Both { add, sub } => Self::Both { add: add.add(line), sub },
        }
    }

    /// Merge another subtraction into this slot.
    pub fn with_subtraction(self, line: DecayLine) -> Self {
        match self {
            Self::Addition(add) => Self::Both { add, sub: line },
            Self::Subtraction(sub) => Self::Subtraction(sub.add(line)),
            Self::Both { add, sub } => Self::Both { add, sub: sub.add(line) },
        }
    }

    /// Apply this slot to a line: additions first, then subtractions.
    pub fn apply(self, line: DecayLine) -> DecayLine {
        match self {
            Self::Addition(add) => line.add(add),
            Self::Subtraction(sub) => line.saturating_sub(sub),
            Self::Both { add, sub } => line.add(add).saturating_sub(sub),
        }
    }
}

/// Protocol-wide aggregate: the sum of every live lock's line.
///
/// The catch-up walk is the only writer of the per-epoch supply history.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct GlobalAggregate {
    pub line: DecayLine,
    /// Last epoch boundary advanced to; [`ANCHOR_UNSET`] until first touch.
    pub anchor: u64,
    /// Slope to remove at each expiry epoch, consumed as the walk passes it.
    pub slope_expiries: BTreeMap<u64, u128>,
    /// Total-supply snapshot recorded at each walked epoch boundary.
    pub supply_history: BTreeMap<u64, u128>,
    /// One line snapshot per walked epoch, for point-in-time queries at
    /// timestamps the anchor has already moved past.
    pub checkpoints: Vec<Checkpoint>,
}

impl GlobalAggregate {
    pub fn new() -> Self {
        Self {
            line: DecayLine::ZERO,
            anchor: ANCHOR_UNSET,
            slope_expiries: BTreeMap::new(),
            supply_history: BTreeMap::new(),
            checkpoints: Vec::new(),
        }
    }

    /// Register `slope` to expire at `expiry_epoch`.
    pub fn schedule_expiry(&mut self, expiry_epoch: u64, slope: u128) {
        *self.slope_expiries.entry(expiry_epoch).or_insert(0) += slope;
    }

    /// Remove `slope` from the schedule entry at `expiry_epoch`.
    pub fn unschedule_expiry(&mut self, expiry_epoch: u64, slope: u128) {
        if let Some(entry) = self.slope_expiries.get_mut(&expiry_epoch) {
            *entry = entry.saturating_sub(slope);
            if *entry == 0 {
                self.slope_expiries.remove(&expiry_epoch);
            }
        }
    }

    /// Advance the global line to `target` (an epoch boundary), one epoch at
    /// a time, applying scheduled slope expiries and snapshotting supply at
    /// every visited boundary.
    ///
    /// A never-updated aggregate jumps its anchor to `target` unchanged:
    /// nothing can have expired before first use.
    pub fn catch_up(&mut self, target: u64, epoch_duration: u64) {
        if self.anchor == ANCHOR_UNSET {
            self.anchor = target;
            record_checkpoint(&mut self.checkpoints, target, self.line);
            return;
        }
        if self.anchor >= target {
            return;
        }
        let mut epoch = self.anchor;
        while epoch < target {
            epoch += epoch_duration;
            if let Some(slope) = self.slope_expiries.remove(&epoch) {
                self.line = self.line.subtract_expired(slope, epoch);
            }
            self.supply_history.insert(epoch, self.line.value_at(epoch));
            record_checkpoint(&mut self.checkpoints, epoch, self.line);
        }
        self.anchor = target;
    }

    /// Fold a delta taking effect at the current epoch into the line and
    /// refresh that epoch's supply snapshot and checkpoint, which the walk
    /// may already have recorded without the delta.
    pub fn apply_now(&mut self, delta: DecayLine, epoch_start: u64) {
        self.line = self.line.add(delta);
        self.supply_history
            .insert(epoch_start, self.line.value_at(epoch_start));
        record_checkpoint(&mut self.checkpoints, epoch_start, self.line);
    }
}

impl Default for GlobalAggregate {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-account aggregate used for the user, delegate, and (user, delegate)
/// pair families.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Aggregate {
    pub line: DecayLine,
    /// Last epoch boundary advanced to; [`ANCHOR_UNSET`] until first touch.
    pub anchor: u64,
    /// Slope to remove at each expiry epoch, consumed as the walk passes it.
    pub slope_expiries: BTreeMap<u64, u128>,
    /// Forward-booked hand-overs keyed by the epoch they take effect.
    pub pending: BTreeMap<u64, PendingDelta>,
    /// One line snapshot per walked epoch, for point-in-time queries.
    pub checkpoints: Vec<Checkpoint>,
}

impl Aggregate {
    pub fn new() -> Self {
        Self {
            line: DecayLine::ZERO,
            anchor: ANCHOR_UNSET,
            slope_expiries: BTreeMap::new(),
            pending: BTreeMap::new(),
            checkpoints: Vec::new(),
        }
    }

    /// Register `slope` to expire at `expiry_epoch`.
    pub fn schedule_expiry(&mut self, expiry_epoch: u64, slope: u128) {
        *self.slope_expiries.entry(expiry_epoch).or_insert(0) += slope;
    }

    /// Remove `slope` from the schedule entry at `expiry_epoch`.
    pub fn unschedule_expiry(&mut self, expiry_epoch: u64, slope: u128) {
        if let Some(entry) = self.slope_expiries.get_mut(&expiry_epoch) {
            *entry = entry.saturating_sub(slope);
            if *entry == 0 {
                self.slope_expiries.remove(&expiry_epoch);
            }
        }
    }

    /// Book an addition that takes effect at `epoch`.
    pub fn queue_addition(&mut self, epoch: u64, line: DecayLine) {
        let merged = match self.pending.remove(&epoch) {
            None => PendingDelta::Addition(line),
            Some(slot) => slot.with_addition(line),
        };
        self.pending.insert(epoch, merged);
    }

    /// Book a subtraction that takes effect at `epoch`.
    pub fn queue_subtraction(&mut self, epoch: u64, line: DecayLine) {
        let merged = match self.pending.remove(&epoch) {
            None => PendingDelta::Subtraction(line),
            Some(slot) => slot.with_subtraction(line),
        };
        self.pending.insert(epoch, merged);
    }

    /// Apply an immediate delta at the caller's current epoch and checkpoint
    /// the result. The aggregate must already be caught up to `epoch_start`.
    pub fn apply_now(&mut self, delta: DecayLine, epoch_start: u64) {
        self.line = self.line.add(delta);
        record_checkpoint(&mut self.checkpoints, epoch_start, self.line);
    }

    /// Advance this aggregate to `target` (an epoch boundary), stepping the
    /// global line alongside so global work is shared across accounts.
    ///
    /// At each visited epoch the walk applies this aggregate's scheduled
    /// slope expiry, drains the pending-delta slot (additions before
    /// subtractions, slot cleared), and writes a checkpoint.
    ///
    /// Returns the caught-up line.
    pub fn catch_up(
        &mut self,
        global: &mut GlobalAggregate,
        target: u64,
        epoch_duration: u64,
    ) -> DecayLine {
        if self.anchor == ANCHOR_UNSET {
            self.anchor = target;
            global.catch_up(target, epoch_duration);
            record_checkpoint(&mut self.checkpoints, target, DecayLine::ZERO);
            return DecayLine::ZERO;
        }
        if self.anchor >= target {
            // Already current; pending slots for future epochs stay queued.
            return self.line;
        }
        let mut epoch = self.anchor;
        while epoch < target {
            epoch += epoch_duration;
            global.catch_up(epoch, epoch_duration);
            if let Some(slope) = self.slope_expiries.remove(&epoch) {
                self.line = self.line.subtract_expired(slope, epoch);
            }
            if let Some(slot) = self.pending.remove(&epoch) {
                self.line = slot.apply(self.line);
            }
            record_checkpoint(&mut self.checkpoints, epoch, self.line);
        }
        self.anchor = target;
        self.line
    }
}

impl Default for Aggregate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use velock_core::constants::{EPOCH_DURATION, MAX_LOCK_DURATION};

    const E: u64 = EPOCH_DURATION;

    fn line_for(principal_slope: u128, expiry: u64) -> DecayLine {
        DecayLine::from_principal(
            (principal_slope as u64) * MAX_LOCK_DURATION,
            expiry,
            MAX_LOCK_DURATION,
        )
    }

    // --- PendingDelta ---

    #[test]
    fn slot_merges_addition_and_subtraction_into_both() {
        let add = DecayLine::new(100, 1);
        let sub = DecayLine::new(40, 1);
        let slot = PendingDelta::Addition(add).with_subtraction(sub);
        assert_eq!(slot, PendingDelta::Both { add, sub });
    }

    #[test]
    fn slot_applies_addition_before_subtraction() {
        // Subtraction exceeds the starting line but not the post-addition
        // line; applying in the wrong order would hit the saturation floor.
        let start = DecayLine::new(10, 1);
        let slot = PendingDelta::Both {
            add: DecayLine::new(100, 2),
            sub: DecayLine::new(50, 2),
        };
        assert_eq!(slot.apply(start), DecayLine::new(60, 1));
    }

    #[test]
    fn net_zero_slot_is_still_a_booking() {
        let line = DecayLine::new(70, 3);
        let slot = PendingDelta::Addition(line).with_subtraction(line);
        assert_eq!(slot.apply(DecayLine::new(5, 1)), DecayLine::new(5, 1));
    }

    // --- global catch-up ---

    #[test]
    fn first_touch_jumps_anchor_without_decay() {
        let mut global = GlobalAggregate::new();
        global.catch_up(10 * E, E);
        assert_eq!(global.anchor, 10 * E);
        assert_eq!(global.line, DecayLine::ZERO);
        assert!(global.supply_history.is_empty());
        // The jump still leaves a zero checkpoint for later past queries.
        assert_eq!(global.checkpoints, vec![Checkpoint { line: DecayLine::ZERO, epoch_start: 10 * E }]);
    }

    #[test]
    fn global_walk_applies_expiry_and_snapshots_each_epoch() {
        let mut global = GlobalAggregate::new();
        global.catch_up(10 * E, E);

        let line = line_for(7, 12 * E);
        global.apply_now(line, 10 * E);
        global.schedule_expiry(12 * E, line.slope);

        global.catch_up(14 * E, E);
        assert_eq!(global.anchor, 14 * E);
        assert_eq!(global.line, DecayLine::ZERO);
        assert_eq!(global.supply_history[&(11 * E)], line.value_at(11 * E));
        assert_eq!(global.supply_history[&(12 * E)], 0);
        assert_eq!(global.supply_history[&(13 * E)], 0);
        assert!(global.slope_expiries.is_empty());
        // Every visited boundary left a line checkpoint behind.
        let epochs: Vec<u64> = global.checkpoints.iter().map(|c| c.epoch_start).collect();
        assert_eq!(epochs, vec![10 * E, 11 * E, 12 * E, 13 * E, 14 * E]);
    }

    #[test]
    fn global_catch_up_is_idempotent() {
        let mut global = GlobalAggregate::new();
        global.catch_up(10 * E, E);
        let line = line_for(3, 13 * E);
        global.apply_now(line, 10 * E);
        global.schedule_expiry(13 * E, line.slope);
        global.catch_up(12 * E, E);

        let snapshot = global.clone();
        global.catch_up(12 * E, E);
        assert_eq!(global, snapshot);
    }

    // --- account catch-up ---

    #[test]
    fn first_touch_returns_zero_and_checkpoints() {
        let mut global = GlobalAggregate::new();
        let mut agg = Aggregate::new();
        let line = agg.catch_up(&mut global, 10 * E, E);
        assert_eq!(line, DecayLine::ZERO);
        assert_eq!(agg.anchor, 10 * E);
        assert_eq!(global.anchor, 10 * E);
        assert_eq!(agg.checkpoints.len(), 1);
    }

    #[test]
    fn walk_drains_pending_slot_exactly_once() {
        let mut global = GlobalAggregate::new();
        let mut agg = Aggregate::new();
        agg.catch_up(&mut global, 10 * E, E);

        let line = line_for(5, 20 * E);
        agg.queue_addition(11 * E, line);
        agg.schedule_expiry(20 * E, line.slope);

        let caught = agg.catch_up(&mut global, 12 * E, E);
        assert_eq!(caught, line);
        assert!(agg.pending.is_empty(), "drained slot must read as empty");

        // A second pass performs no steps and sees no slot.
        let again = agg.catch_up(&mut global, 12 * E, E);
        assert_eq!(again, line);
    }

    #[test]
    fn walk_applies_own_expiry_schedule() {
        let mut global = GlobalAggregate::new();
        let mut agg = Aggregate::new();
        agg.catch_up(&mut global, 10 * E, E);

        let line = line_for(9, 12 * E);
        agg.apply_now(line, 10 * E);
        agg.schedule_expiry(12 * E, line.slope);

        agg.catch_up(&mut global, 15 * E, E);
        assert_eq!(agg.line, DecayLine::ZERO);
        assert!(agg.slope_expiries.is_empty());
    }

    #[test]
    fn walk_steps_global_alongside() {
        let mut global = GlobalAggregate::new();
        global.catch_up(10 * E, E);
        let line = line_for(2, 14 * E);
        global.apply_now(line, 10 * E);
        global.schedule_expiry(14 * E, line.slope);

        let mut agg = Aggregate::new();
        agg.catch_up(&mut global, 10 * E, E);
        agg.catch_up(&mut global, 16 * E, E);

        assert_eq!(global.anchor, 16 * E);
        assert_eq!(global.line, DecayLine::ZERO);
        assert!(global.supply_history.contains_key(&(16 * E)));
    }

    #[test]
    fn checkpoints_written_for_every_visited_epoch() {
        let mut global = GlobalAggregate::new();
        let mut agg = Aggregate::new();
        agg.catch_up(&mut global, 10 * E, E);
        let line = line_for(4, 30 * E);
        agg.apply_now(line, 10 * E);
        agg.schedule_expiry(30 * E, line.slope);

        agg.catch_up(&mut global, 13 * E, E);
        let epochs: Vec<u64> = agg.checkpoints.iter().map(|c| c.epoch_start).collect();
        assert_eq!(epochs, vec![10 * E, 11 * E, 12 * E, 13 * E]);
    }

    #[test]
    fn future_pending_slots_survive_a_short_walk() {
        let mut global = GlobalAggregate::new();
        let mut agg = Aggregate::new();
        agg.catch_up(&mut global, 10 * E, E);
        agg.queue_addition(15 * E, line_for(1, 20 * E));

        agg.catch_up(&mut global, 12 * E, E);
        assert!(agg.pending.contains_key(&(15 * E)));
        assert_eq!(agg.line, DecayLine::ZERO);
    }

    // --- properties ---

    use proptest::prelude::*;

    proptest! {
        /// The walk matches the closed form: after catching up past every
        /// scheduled expiry, the line equals the sum of the surviving
        /// contributions, and a repeated walk changes nothing.
        #[test]
        fn walk_matches_sum_of_surviving_contributions(
            contributions in prop::collection::vec((1u128..=100, 1u64..=50), 1..10),
            target_epochs in 1u64..=60,
        ) {
            let mut global = GlobalAggregate::new();
            let mut agg = Aggregate::new();
            agg.catch_up(&mut global, 0, E);
            for &(slope, expiry_epochs) in &contributions {
                let line = line_for(slope, expiry_epochs * E);
                agg.apply_now(line, 0);
                agg.schedule_expiry(expiry_epochs * E, line.slope);
            }

            let target = target_epochs * E;
            agg.catch_up(&mut global, target, E);

            let expected: u128 = contributions
                .iter()
                .filter(|&&(_, e)| e > target_epochs)
                .map(|&(slope, e)| slope * u128::from(e * E - target))
                .sum();
            prop_assert_eq!(agg.line.value_at(target), expected);

            let snapshot = agg.clone();
            agg.catch_up(&mut global, target, E);
            prop_assert_eq!(agg, snapshot);
        }
    }
}
