//! Share-seconds ledger for one distribution window.
//!
//! The ledger owns every user's [`UserParticipation`] plus running totals of
//! lifetime and in-range share-seconds. It is built for a single window,
//! usually by [`ParticipationLedger::replay`] over an [`EventLog`], and then
//! settled to the window end before distribution.
//!
//! After any error from [`settle_all`](ParticipationLedger::settle_all) or
//! [`replay`](ParticipationLedger::replay) the ledger must be discarded and
//! rebuilt from the log.

use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use tally_core::{
    Amount, InputError, InvariantViolation, LedgerError, Timestamp, UserId, WeightCurve, Window,
};

use crate::events::{EventLog, StakeAction, StakeEvent};
use crate::participation::{Accrual, UserParticipation};

pub struct ParticipationLedger {
    curve: Arc<dyn WeightCurve>,
    window: Window,
    users: BTreeMap<UserId, UserParticipation>,
    total_share_seconds: u128,
    total_share_seconds_in_range: u128,
}

impl ParticipationLedger {
    pub fn new(curve: Arc<dyn WeightCurve>, window: Window) -> Self {
        Self {
            curve,
            window,
            users: BTreeMap::new(),
            total_share_seconds: 0,
            total_share_seconds_in_range: 0,
        }
    }

    /// Rebuild a ledger for `window` from every logged event at or before the
    /// window end. Users are replayed on a pool of `workers` threads; the
    /// result does not depend on the worker count.
    ///
    /// The returned ledger is not settled.
    pub fn replay(
        curve: Arc<dyn WeightCurve>,
        window: Window,
        log: &EventLog,
        workers: usize,
    ) -> Result<Self, LedgerError> {
        let started = Instant::now();
        let mut slots: Vec<ReplaySlot<'_>> = log
            .users()
            .map(|user| ReplaySlot {
                user,
                events: log.events_for(user),
                state: UserParticipation::new(),
            })
            .collect();

        let weight: &dyn WeightCurve = &*curve;
        let total = worker_pool(workers)?.install(|| {
            slots
                .par_iter_mut()
                .map(|slot| slot.replay(weight, window))
                .try_reduce(Accrual::default, add_accruals)
        })?;

        let users: BTreeMap<UserId, UserParticipation> = slots
            .into_iter()
            .filter(|slot| slot.state.last_update_time().is_some())
            .map(|slot| (slot.user.clone(), slot.state))
            .collect();

        info!(
            window = %window,
            users = users.len(),
            events = log.len(),
            workers,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "replayed event log"
        );
        Ok(Self {
            curve,
            window,
            users,
            total_share_seconds: total.lifetime,
            total_share_seconds_in_range: total.in_range,
        })
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn curve(&self) -> &Arc<dyn WeightCurve> {
        &self.curve
    }

    pub fn stake(&mut self, user: &UserId, amount: Amount, at: Timestamp) -> Result<(), LedgerError> {
        let (curve, window) = (&*self.curve, self.window);
        let step = with_user(&mut self.users, user, |p| p.stake(user, curve, window, amount, at))?;
        debug!(user = %user, amount = %amount, at, "stake");
        self.credit(step)
    }

    pub fn unstake(&mut self, user: &UserId, amount: Amount, at: Timestamp) -> Result<(), LedgerError> {
        let (curve, window) = (&*self.curve, self.window);
        let step = with_user(&mut self.users, user, |p| p.unstake(user, curve, window, amount, at))?;
        debug!(user = %user, amount = %amount, at, "unstake");
        self.credit(step)
    }

    /// Accrue `user` up to `at`. Unknown users accrue nothing.
    pub fn accrue(&mut self, user: &UserId, at: Timestamp) -> Result<Accrual, LedgerError> {
        let Some(p) = self.users.get_mut(user) else {
            return Ok(Accrual::default());
        };
        let step = p.accrue(user, &*self.curve, self.window, at)?;
        self.credit(step)?;
        Ok(step)
    }

    pub fn settle_to_window_end(&mut self, user: &UserId) -> Result<Accrual, LedgerError> {
        self.accrue(user, self.window.end())
    }

    /// Settle every user to the window end on a pool of `workers` threads.
    ///
    /// Users already settled past the window end are rejected as out of order.
    pub fn settle_all(&mut self, workers: usize) -> Result<Accrual, LedgerError> {
        let (curve, window) = (&*self.curve, self.window);
        let end = window.end();
        let users = &mut self.users;
        let step = worker_pool(workers)?.install(|| {
            users
                .par_iter_mut()
                .map(|(user, p)| p.accrue(user, curve, window, end))
                .try_reduce(Accrual::default, add_accruals)
        })?;
        self.credit(step)?;
        debug!(window = %window, users = self.users.len(), in_range = %step.in_range, "settled ledger");
        Ok(step)
    }

    pub fn user(&self, user: &UserId) -> Option<&UserParticipation> {
        self.users.get(user)
    }

    pub fn users(&self) -> impl Iterator<Item = (&UserId, &UserParticipation)> {
        self.users.iter()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Running lifetime share-seconds across all users.
    pub fn total_share_seconds(&self) -> u128 {
        self.total_share_seconds
    }

    /// Running in-range share-seconds across all users.
    pub fn total_share_seconds_in_range(&self) -> u128 {
        self.total_share_seconds_in_range
    }

    /// Σ in-range share-seconds recomputed from the users.
    pub fn sum_share_seconds_in_range(&self) -> Result<u128, InputError> {
        self.users
            .values()
            .try_fold(0u128, |acc, p| acc.checked_add(p.share_seconds_in_range()))
            .ok_or(InputError::ArithmeticOverflow)
    }

    /// Σ lifetime share-seconds recomputed from the users.
    pub fn sum_share_seconds(&self) -> Result<u128, InputError> {
        self.users
            .values()
            .try_fold(0u128, |acc, p| acc.checked_add(p.share_seconds()))
            .ok_or(InputError::ArithmeticOverflow)
    }

    /// Check the running totals and every stake queue against the users.
    pub fn verify(&self) -> Result<(), LedgerError> {
        let summed = self.sum_share_seconds_in_range()?;
        if summed != self.total_share_seconds_in_range {
            let violation = InvariantViolation::LedgerTotalMismatch {
                running: self.total_share_seconds_in_range,
                summed,
            };
            error!(%violation, "ledger in-range total drifted");
            return Err(violation.into());
        }
        let summed = self.sum_share_seconds()?;
        if summed != self.total_share_seconds {
            let violation = InvariantViolation::LedgerTotalMismatch {
                running: self.total_share_seconds,
                summed,
            };
            error!(%violation, "ledger lifetime total drifted");
            return Err(violation.into());
        }
        for (user, p) in &self.users {
            p.verify_queue(user).inspect_err(|violation| {
                error!(%violation, "stake queue drifted");
            })?;
        }
        Ok(())
    }

    fn credit(&mut self, step: Accrual) -> Result<(), LedgerError> {
        let lifetime = self
            .total_share_seconds
            .checked_add(step.lifetime)
            .ok_or(InputError::ArithmeticOverflow)?;
        let in_range = self
            .total_share_seconds_in_range
            .checked_add(step.in_range)
            .ok_or(InputError::ArithmeticOverflow)?;
        self.total_share_seconds = lifetime;
        self.total_share_seconds_in_range = in_range;
        Ok(())
    }
}

/// Run `op` on `user`'s participation, creating it if needed. A user created
/// for an event that is then rejected is not kept.
fn with_user<F>(
    users: &mut BTreeMap<UserId, UserParticipation>,
    user: &UserId,
    op: F,
) -> Result<Accrual, LedgerError>
where
    F: FnOnce(&mut UserParticipation) -> Result<Accrual, LedgerError>,
{
    let created = !users.contains_key(user);
    let result = op(users.entry(user.clone()).or_default());
    if result.is_err() && created {
        users.remove(user);
    }
    result
}

fn add_accruals(a: Accrual, b: Accrual) -> Result<Accrual, LedgerError> {
    a.checked_add(b).ok_or_else(|| InputError::ArithmeticOverflow.into())
}

/// Dedicated pool so settlement honours the configured worker count.
fn worker_pool(workers: usize) -> Result<rayon::ThreadPool, LedgerError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("tally-settle-{i}"))
        .build()
        .map_err(|e| LedgerError::WorkerPool(e.to_string()))
}

struct ReplaySlot<'a> {
    user: &'a UserId,
    events: &'a [StakeEvent],
    state: UserParticipation,
}

impl ReplaySlot<'_> {
    fn replay(&mut self, curve: &dyn WeightCurve, window: Window) -> Result<Accrual, LedgerError> {
        let mut total = Accrual::default();
        for event in self.events.iter().take_while(|e| e.at <= window.end()) {
            let step = match event.action {
                StakeAction::Stake => self.state.stake(self.user, curve, window, event.amount, event.at)?,
                StakeAction::Unstake => self.state.unstake(self.user, curve, window, event.amount, event.at)?,
            };
            total = total.checked_add(step).ok_or(InputError::ArithmeticOverflow)?;
        }
        Ok(total)
    }
}
