//! The vote-escrow ledger: lock registry, aggregate families, and the
//! public state-mutating and read-only operations.
//!
//! Every mutating operation follows the same shape: validate all
//! preconditions from the existing records, settle any external transfer,
//! then catch up the global line, the touched account lines, and any
//! (user, delegate) pair lines before applying its own delta — so a
//! rejected input never leaves partial state behind. Read-only queries run
//! the identical catch-up on cloned state and persist nothing.
//!
//! The ledger is a single owned object; callers serialize access to it.
//! There is no background process: all decay is realized lazily, exactly
//! when state is next touched.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use velock_core::epoch;
use velock_core::error::{DelegationError, EscrowError, LockError};
use velock_core::line::DecayLine;
use velock_core::traits::AssetVault;
use velock_core::types::{
    checkpoint_line_at, record_checkpoint, AccountClass, AccountId, Checkpoint, Lock, LockId,
    PrincipalPair,
};

use crate::aggregate::{Aggregate, GlobalAggregate};
use crate::config::LedgerConfig;

/// The complete persisted state of the escrow engine.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct VeLedger {
    config: LedgerConfig,
    global: GlobalAggregate,
    users: HashMap<AccountId, Aggregate>,
    delegates: HashMap<AccountId, Aggregate>,
    pairs: HashMap<(AccountId, AccountId), Aggregate>,
    locks: HashMap<LockId, Lock>,
    lock_checkpoints: HashMap<LockId, Vec<Checkpoint>>,
    registered_delegates: HashSet<AccountId>,
    next_lock_id: u64,
}

impl VeLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            global: GlobalAggregate::new(),
            users: HashMap::new(),
            delegates: HashMap::new(),
            pairs: HashMap::new(),
            locks: HashMap::new(),
            lock_checkpoints: HashMap::new(),
            registered_delegates: HashSet::new(),
            next_lock_id: 1,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // --- delegate registry (set by the external voting-policy component) ---

    /// Register or unregister an account as a delegation target.
    pub fn set_delegate_registration(&mut self, account: AccountId, registered: bool) {
        if registered {
            self.registered_delegates.insert(account);
        } else {
            self.registered_delegates.remove(&account);
        }
        debug!(account = %account, registered, "delegate registration updated");
    }

    pub fn is_registered_delegate(&self, account: &AccountId) -> bool {
        self.registered_delegates.contains(account)
    }

    // --- lock lifecycle ---

    /// Create a lock escrowing `principal` until `expiry`.
    ///
    /// # Errors
    ///
    /// Rejected before any state change if the combined principal is below
    /// the minimum, the expiry is unaligned, in the past, or beyond the
    /// maximum term, or the vault deposit fails.
    pub fn create_lock(
        &mut self,
        owner: AccountId,
        principal: PrincipalPair,
        expiry: u64,
        now: u64,
        vault: &mut dyn AssetVault,
    ) -> Result<LockId, EscrowError> {
        let d = self.config.epoch_duration;
        let combined = principal
            .checked_combined()
            .ok_or(LockError::PrincipalOverflow)?;
        if combined < self.config.min_lock_principal {
            return Err(LockError::BelowMinimumPrincipal {
                got: combined,
                min: self.config.min_lock_principal,
            }
            .into());
        }
        if !epoch::is_epoch_boundary(expiry, d) {
            return Err(LockError::ExpiryNotAligned(expiry).into());
        }
        if expiry <= now {
            return Err(LockError::ExpiryTooEarly { expiry, now }.into());
        }
        let now_epoch = epoch::epoch_start(now, d);
        let max = now_epoch + self.config.max_lock_duration;
        if expiry > max {
            return Err(LockError::DurationTooLong { expiry, max }.into());
        }

        vault.deposit(&owner, principal)?;

        let line = DecayLine::from_principal(combined, expiry, self.config.max_lock_duration);

        self.global.catch_up(now_epoch, d);
        self.global.apply_now(line, now_epoch);
        self.global.schedule_expiry(expiry, line.slope);

        self.with_account(AccountClass::User, owner, now_epoch, |agg| {
            agg.apply_now(line, now_epoch);
            agg.schedule_expiry(expiry, line.slope);
        });

        let id = LockId(self.next_lock_id);
        self.next_lock_id += 1;
        self.locks.insert(
            id,
            Lock {
                id,
                owner,
                principal,
                expiry,
                delegate: None,
                current_holder: owner,
                holder_effective_at: 0,
                withdrawn: false,
            },
        );
        record_checkpoint(self.lock_checkpoints.entry(id).or_default(), now_epoch, line);

        info!(lock = %id, owner = %owner, expiry, "created lock");
        Ok(id)
    }

    /// Escrow additional principal into an existing lock.
    ///
    /// The added voting power lands with whichever account is currently
    /// entitled to vote with this lock, and follows any mid-flight
    /// delegation hand-over across the next epoch boundary.
    pub fn increase_amount(
        &mut self,
        lock_id: LockId,
        caller: AccountId,
        additional: PrincipalPair,
        now: u64,
        vault: &mut dyn AssetVault,
    ) -> Result<(), EscrowError> {
        let d = self.config.epoch_duration;
        let lock = self.lock_for_update(lock_id, caller)?;
        if now >= lock.expiry {
            return Err(LockError::Expired { lock: lock_id, expiry: lock.expiry }.into());
        }
        if additional.is_zero() {
            return Err(LockError::BelowMinimumPrincipal { got: 0, min: 1 }.into());
        }
        let new_principal = lock
            .principal
            .checked_add(additional)
            .ok_or(LockError::PrincipalOverflow)?;
        let old_combined = lock
            .principal
            .checked_combined()
            .ok_or(LockError::PrincipalOverflow)?;
        let new_combined = new_principal
            .checked_combined()
            .ok_or(LockError::PrincipalOverflow)?;

        vault.deposit(&caller, additional)?;

        let now_epoch = epoch::epoch_start(now, d);
        let max_lock = self.config.max_lock_duration;
        let old_line = DecayLine::from_principal(old_combined, lock.expiry, max_lock);
        let new_line = DecayLine::from_principal(new_combined, lock.expiry, max_lock);
        let delta = new_line.saturating_sub(old_line);

        self.global.catch_up(now_epoch, d);
        self.global.apply_now(delta, now_epoch);
        self.global.unschedule_expiry(lock.expiry, old_line.slope);
        self.global.schedule_expiry(lock.expiry, new_line.slope);

        self.reconcile_entitled(
            &lock,
            now_epoch,
            delta,
            lock.expiry,
            old_line.slope,
            lock.expiry,
            new_line.slope,
        );

        if let Some(stored) = self.locks.get_mut(&lock_id) {
            stored.principal = new_principal;
        }
        record_checkpoint(
            self.lock_checkpoints.entry(lock_id).or_default(),
            now_epoch,
            new_line,
        );

        debug!(lock = %lock_id, "increased lock amount");
        Ok(())
    }

    /// Push a lock's expiry further out by `extra` seconds (a whole number
    /// of epochs).
    pub fn increase_duration(
        &mut self,
        lock_id: LockId,
        caller: AccountId,
        extra: u64,
        now: u64,
    ) -> Result<(), EscrowError> {
        let d = self.config.epoch_duration;
        let lock = self.lock_for_update(lock_id, caller)?;
        if now >= lock.expiry {
            return Err(LockError::Expired { lock: lock_id, expiry: lock.expiry }.into());
        }
        let new_expiry = lock.expiry + extra;
        if extra == 0 || !epoch::is_epoch_boundary(new_expiry, d) {
            return Err(LockError::ExpiryNotAligned(new_expiry).into());
        }
        let now_epoch = epoch::epoch_start(now, d);
        let max = now_epoch + self.config.max_lock_duration;
        if new_expiry > max {
            return Err(LockError::DurationTooLong { expiry: new_expiry, max }.into());
        }
        let combined = lock
            .principal
            .checked_combined()
            .ok_or(LockError::PrincipalOverflow)?;

        let max_lock = self.config.max_lock_duration;
        let old_line = DecayLine::from_principal(combined, lock.expiry, max_lock);
        let new_line = DecayLine::from_principal(combined, new_expiry, max_lock);
        // Slope is principal-derived, so only the bias grows.
        let delta = new_line.saturating_sub(old_line);

        self.global.catch_up(now_epoch, d);
        self.global.apply_now(delta, now_epoch);
        self.global.unschedule_expiry(lock.expiry, old_line.slope);
        self.global.schedule_expiry(new_expiry, new_line.slope);

        self.reconcile_entitled(
            &lock,
            now_epoch,
            delta,
            lock.expiry,
            old_line.slope,
            new_expiry,
            new_line.slope,
        );

        if let Some(stored) = self.locks.get_mut(&lock_id) {
            stored.expiry = new_expiry;
        }
        record_checkpoint(
            self.lock_checkpoints.entry(lock_id).or_default(),
            now_epoch,
            new_line,
        );

        debug!(lock = %lock_id, new_expiry, "increased lock duration");
        Ok(())
    }

    /// Return an expired lock's principal to its owner.
    ///
    /// The lock record survives with zeroed principal and the withdrawn
    /// flag set; its checkpoint history remains queryable.
    pub fn unlock(
        &mut self,
        lock_id: LockId,
        caller: AccountId,
        now: u64,
        vault: &mut dyn AssetVault,
    ) -> Result<PrincipalPair, EscrowError> {
        let d = self.config.epoch_duration;
        let lock = self.lock_for_update(lock_id, caller)?;
        if now < lock.expiry {
            return Err(LockError::NotExpired { lock: lock_id, expiry: lock.expiry }.into());
        }

        vault.withdraw(&lock.owner, lock.principal)?;

        // Realize the matured decay on the entitled holder before zeroing
        // the record; the slope schedule does the actual removal.
        let now_epoch = epoch::epoch_start(now, d);
        self.global.catch_up(now_epoch, d);
        let holder = lock.holder_at(now_epoch);
        let cls = Self::class_of(lock.owner, holder);
        self.with_account(cls, holder, now_epoch, |_| {});
        if holder != lock.owner {
            self.with_pair(lock.owner, holder, now_epoch, |_| {});
        }

        let principal = lock.principal;
        if let Some(stored) = self.locks.get_mut(&lock_id) {
            stored.principal = PrincipalPair::ZERO;
            stored.withdrawn = true;
        }
        record_checkpoint(
            self.lock_checkpoints.entry(lock_id).or_default(),
            now_epoch,
            DecayLine::ZERO,
        );

        info!(lock = %lock_id, owner = %lock.owner, "unlocked principal");
        Ok(principal)
    }

    // --- delegation ---

    /// Hand a lock's voting power to a registered delegate, effective at
    /// the next epoch boundary.
    ///
    /// The owner keeps the power for the remainder of the current epoch;
    /// the delegate gains it starting next epoch; at no instant do both
    /// count it.
    pub fn delegate_lock(
        &mut self,
        lock_id: LockId,
        caller: AccountId,
        delegate: AccountId,
        now: u64,
    ) -> Result<(), EscrowError> {
        let lock = self.lock_for_update(lock_id, caller)?;
        self.check_delegation_lifetime(&lock, now)?;
        if lock.delegate.is_some() {
            return Err(DelegationError::AlreadyDelegated(lock_id).into());
        }
        if delegate == lock.owner {
            return Err(DelegationError::SelfDelegation(delegate).into());
        }
        if !self.registered_delegates.contains(&delegate) {
            return Err(DelegationError::DelegateNotRegistered(delegate).into());
        }

        self.rebook_holder(&lock, Some(delegate), now)?;
        info!(lock = %lock_id, delegate = %delegate, "delegated lock");
        Ok(())
    }

    /// Move a delegated lock from its current delegate to a new one in a
    /// single pass sharing one catch-up.
    pub fn switch_delegate(
        &mut self,
        lock_id: LockId,
        caller: AccountId,
        new_delegate: AccountId,
        now: u64,
    ) -> Result<(), EscrowError> {
        let lock = self.lock_for_update(lock_id, caller)?;
        self.check_delegation_lifetime(&lock, now)?;
        let old = lock
            .delegate
            .ok_or(DelegationError::NotDelegated(lock_id))?;
        if new_delegate == old {
            return Err(DelegationError::SameDelegate(old).into());
        }
        if new_delegate == lock.owner {
            return Err(DelegationError::SelfDelegation(new_delegate).into());
        }
        if !self.registered_delegates.contains(&new_delegate) {
            return Err(DelegationError::DelegateNotRegistered(new_delegate).into());
        }

        self.rebook_holder(&lock, Some(new_delegate), now)?;
        info!(lock = %lock_id, from = %old, to = %new_delegate, "switched delegate");
        Ok(())
    }

    /// Reclaim a delegated lock's voting power for the owner, effective at
    /// the next epoch boundary. Mirror image of [`delegate_lock`](Self::delegate_lock).
    pub fn undelegate_lock(
        &mut self,
        lock_id: LockId,
        caller: AccountId,
        now: u64,
    ) -> Result<(), EscrowError> {
        let lock = self.lock_for_update(lock_id, caller)?;
        self.check_delegation_lifetime(&lock, now)?;
        let old = lock
            .delegate
            .ok_or(DelegationError::NotDelegated(lock_id))?;

        self.rebook_holder(&lock, None, now)?;
        info!(lock = %lock_id, from = %old, "undelegated lock");
        Ok(())
    }

    // --- read-only queries (catch-up on cloned state, nothing persisted) ---

    /// Voting power of an account at an exact timestamp.
    pub fn balance_of_at(&self, class: AccountClass, account: AccountId, ts: u64) -> u128 {
        let target = epoch::epoch_start(ts, self.config.epoch_duration);
        self.frozen_account_line(class, account, target).value_at(ts)
    }

    /// Voting power of an account pinned to an epoch boundary.
    ///
    /// Evaluates the caught-up line exactly at the boundary of the epoch
    /// containing `epoch`, regardless of query time, so power used for a
    /// decision made mid-epoch is frozen against further intra-epoch decay.
    pub fn balance_at_epoch(&self, class: AccountClass, account: AccountId, epoch: u64) -> u128 {
        let target = epoch::epoch_start(epoch, self.config.epoch_duration);
        self.frozen_account_line(class, account, target).value_at(target)
    }

    /// The (user, delegate) pair balance pinned to an epoch boundary.
    ///
    /// Used by the downstream reward-splitting consumer to prorate a
    /// delegate's captured rewards among its delegators; never consulted
    /// for voting-power queries.
    pub fn delegated_balance_at_epoch(
        &self,
        user: AccountId,
        delegate: AccountId,
        epoch: u64,
    ) -> u128 {
        let d = self.config.epoch_duration;
        let target = epoch::epoch_start(epoch, d);
        let Some(agg) = self.pairs.get(&(user, delegate)) else {
            return 0;
        };
        if target < agg.anchor {
            return checkpoint_line_at(&agg.checkpoints, target).value_at(target);
        }
        let mut global = self.global.clone();
        let mut agg = agg.clone();
        agg.catch_up(&mut global, target, d).value_at(target)
    }

    /// Total live voting power at an exact timestamp.
    pub fn total_supply_at(&self, ts: u64) -> u128 {
        let d = self.config.epoch_duration;
        let target = epoch::epoch_start(ts, d);
        if target < self.global.anchor {
            return checkpoint_line_at(&self.global.checkpoints, target).value_at(ts);
        }
        let mut global = self.global.clone();
        global.catch_up(target, d);
        global.line.value_at(ts)
    }

    /// Total supply snapshot for the epoch containing `epoch`.
    ///
    /// Served from the snapshot table when the catch-up walk has recorded
    /// it; otherwise computed from a cloned walk.
    pub fn total_supply_at_epoch(&self, epoch: u64) -> u128 {
        let d = self.config.epoch_duration;
        let target = epoch::epoch_start(epoch, d);
        if let Some(value) = self.global.supply_history.get(&target) {
            return *value;
        }
        if target < self.global.anchor {
            // An unrecorded boundary behind the anchor predates the first
            // lock; the checkpoint search reads zero there.
            return checkpoint_line_at(&self.global.checkpoints, target).value_at(target);
        }
        let mut global = self.global.clone();
        global.catch_up(target, d);
        global
            .supply_history
            .get(&target)
            .copied()
            .unwrap_or_else(|| global.line.value_at(target))
    }

    /// A single lock's voting power at a timestamp, reconstructed from its
    /// checkpoint history.
    pub fn lock_balance_at(&self, lock_id: LockId, ts: u64) -> Result<u128, EscrowError> {
        let checkpoints = self
            .lock_checkpoints
            .get(&lock_id)
            .ok_or(LockError::NotFound(lock_id))?;
        Ok(checkpoint_line_at(checkpoints, ts).value_at(ts))
    }

    // --- registry accessors ---

    pub fn lock(&self, lock_id: LockId) -> Option<&Lock> {
        self.locks.get(&lock_id)
    }

    pub fn locks(&self) -> impl Iterator<Item = &Lock> {
        self.locks.values()
    }

    pub fn locks_of(&self, owner: &AccountId) -> Vec<LockId> {
        let mut ids: Vec<LockId> = self
            .locks
            .values()
            .filter(|l| l.owner == *owner)
            .map(|l| l.id)
            .collect();
        ids.sort();
        ids
    }

    pub fn lock_checkpoints(&self, lock_id: LockId) -> Option<&[Checkpoint]> {
        self.lock_checkpoints.get(&lock_id).map(Vec::as_slice)
    }

    // --- internals ---

    fn class_of(owner: AccountId, account: AccountId) -> AccountClass {
        if account == owner {
            AccountClass::User
        } else {
            AccountClass::Delegate
        }
    }

    /// Fetch a lock for mutation, checking ownership and withdrawal.
    fn lock_for_update(&self, lock_id: LockId, caller: AccountId) -> Result<Lock, EscrowError> {
        let lock = self
            .locks
            .get(&lock_id)
            .ok_or(LockError::NotFound(lock_id))?;
        if lock.owner != caller {
            return Err(LockError::NotOwner { lock: lock_id, caller }.into());
        }
        if lock.withdrawn {
            return Err(LockError::AlreadyWithdrawn(lock_id).into());
        }
        Ok(lock.clone())
    }

    /// A delegation change takes effect next epoch, so the lock must carry
    /// non-zero power through the current epoch plus two more; anything
    /// shorter would allow voting with a lock the same epoch it transfers.
    fn check_delegation_lifetime(&self, lock: &Lock, now: u64) -> Result<(), EscrowError> {
        let d = self.config.epoch_duration;
        let min_epochs = self.config.min_delegation_epochs;
        let remaining = epoch::epochs_between(epoch::epoch_start(now, d), lock.expiry, d);
        if remaining < min_epochs {
            return Err(DelegationError::LifetimeTooShort {
                expiry: lock.expiry,
                now,
                min_epochs,
            }
            .into());
        }
        Ok(())
    }

    /// Catch up an account aggregate (creating it on first touch) and run
    /// `f` against the caught-up state.
    fn with_account<R>(
        &mut self,
        class: AccountClass,
        id: AccountId,
        target: u64,
        f: impl FnOnce(&mut Aggregate) -> R,
    ) -> R {
        let d = self.config.epoch_duration;
        let agg = match class {
            AccountClass::User => self.users.entry(id).or_default(),
            AccountClass::Delegate => self.delegates.entry(id).or_default(),
        };
        agg.catch_up(&mut self.global, target, d);
        f(agg)
    }

    /// Catch up a (user, delegate) pair aggregate and run `f` against it.
    fn with_pair<R>(
        &mut self,
        user: AccountId,
        delegate: AccountId,
        target: u64,
        f: impl FnOnce(&mut Aggregate) -> R,
    ) -> R {
        let d = self.config.epoch_duration;
        let agg = self.pairs.entry((user, delegate)).or_default();
        agg.catch_up(&mut self.global, target, d);
        f(agg)
    }

    /// The account's line as of the boundary `target`, for read-only
    /// queries. Boundaries behind the anchor answer from the checkpoint
    /// history; current and future ones run the catch-up on cloned state.
    fn frozen_account_line(&self, class: AccountClass, account: AccountId, target: u64) -> DecayLine {
        let d = self.config.epoch_duration;
        let stored = match class {
            AccountClass::User => self.users.get(&account),
            AccountClass::Delegate => self.delegates.get(&account),
        };
        let Some(agg) = stored else {
            return DecayLine::ZERO;
        };
        if target < agg.anchor {
            return checkpoint_line_at(&agg.checkpoints, target);
        }
        let mut global = self.global.clone();
        let mut agg = agg.clone();
        agg.catch_up(&mut global, target, d)
    }

    /// Book the hand-over of a lock's full line from its next-epoch holder
    /// to `new_delegate` (or back to the owner), effective at the next
    /// epoch boundary.
    ///
    /// The future slope-expiry schedule entry moves immediately so decay
    /// stays correct from the effective epoch onward; the line itself moves
    /// through the pending-delta queue.
    fn rebook_holder(
        &mut self,
        lock: &Lock,
        new_delegate: Option<AccountId>,
        now: u64,
    ) -> Result<(), EscrowError> {
        let d = self.config.epoch_duration;
        let now_epoch = epoch::epoch_start(now, d);
        let eff = epoch::next_epoch_start(now, d);
        let owner = lock.owner;
        // Book against the holder the lock would have had at `eff`, so
        // same-epoch action sequences compose (their slots merge).
        let old = lock.holder_at(eff);
        let new = new_delegate.unwrap_or(owner);
        let combined = lock
            .principal
            .checked_combined()
            .ok_or(LockError::PrincipalOverflow)?;
        let line = DecayLine::from_principal(combined, lock.expiry, self.config.max_lock_duration);

        self.global.catch_up(now_epoch, d);

        let old_cls = Self::class_of(owner, old);
        self.with_account(old_cls, old, now_epoch, |agg| {
            agg.unschedule_expiry(lock.expiry, line.slope);
            agg.queue_subtraction(eff, line);
        });
        if old != owner {
            self.with_pair(owner, old, now_epoch, |agg| {
                agg.unschedule_expiry(lock.expiry, line.slope);
                agg.queue_subtraction(eff, line);
            });
        }

        let new_cls = Self::class_of(owner, new);
        self.with_account(new_cls, new, now_epoch, |agg| {
            agg.schedule_expiry(lock.expiry, line.slope);
            agg.queue_addition(eff, line);
        });
        if new != owner {
            self.with_pair(owner, new, now_epoch, |agg| {
                agg.schedule_expiry(lock.expiry, line.slope);
                agg.queue_addition(eff, line);
            });
        }

        let current = lock.holder_at(now_epoch);
        if let Some(stored) = self.locks.get_mut(&lock.id) {
            stored.current_holder = current;
            stored.delegate = new_delegate;
            stored.holder_effective_at = eff;
        }
        Ok(())
    }

    /// Apply an amount/duration delta to the account currently entitled to
    /// vote with the lock.
    ///
    /// With no hand-over mid-flight the delta and the schedule move land on
    /// the entitled holder (and the pair aggregate when that holder is a
    /// delegate). With a hand-over outstanding, the entitled holder gets
    /// the delta only for the rest of this epoch: the booked transfer slots
    /// grow by the same delta and the schedule follows the future holder.
    fn reconcile_entitled(
        &mut self,
        lock: &Lock,
        now_epoch: u64,
        delta: DecayLine,
        old_expiry: u64,
        old_slope: u128,
        new_expiry: u64,
        new_slope: u128,
    ) {
        let d = self.config.epoch_duration;
        let owner = lock.owner;
        let entitled = lock.holder_at(now_epoch);
        let future = lock.holder_at(now_epoch + d);

        if entitled == future {
            let cls = Self::class_of(owner, entitled);
            self.with_account(cls, entitled, now_epoch, |agg| {
                agg.apply_now(delta, now_epoch);
                agg.unschedule_expiry(old_expiry, old_slope);
                agg.schedule_expiry(new_expiry, new_slope);
            });
            if entitled != owner {
                self.with_pair(owner, entitled, now_epoch, |agg| {
                    agg.apply_now(delta, now_epoch);
                    agg.unschedule_expiry(old_expiry, old_slope);
                    agg.schedule_expiry(new_expiry, new_slope);
                });
            }
            return;
        }

        let eff = lock.holder_effective_at;
        let entitled_cls = Self::class_of(owner, entitled);
        self.with_account(entitled_cls, entitled, now_epoch, |agg| {
            agg.apply_now(delta, now_epoch);
            agg.queue_subtraction(eff, delta);
        });
        if entitled != owner {
            self.with_pair(owner, entitled, now_epoch, |agg| {
                agg.apply_now(delta, now_epoch);
                agg.queue_subtraction(eff, delta);
            });
        }

        let future_cls = Self::class_of(owner, future);
        self.with_account(future_cls, future, now_epoch, |agg| {
            agg.queue_addition(eff, delta);
            agg.unschedule_expiry(old_expiry, old_slope);
            agg.schedule_expiry(new_expiry, new_slope);
        });
        if future != owner {
            self.with_pair(owner, future, now_epoch, |agg| {
                agg.queue_addition(eff, delta);
                agg.unschedule_expiry(old_expiry, old_slope);
                agg.schedule_expiry(new_expiry, new_slope);
            });
        }
    }
}
