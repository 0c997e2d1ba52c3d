//! Per-user stake queue and share-seconds accumulators.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use tally_core::{
    Amount, InputError, InvariantViolation, LedgerError, Ratio, Stake, Timestamp, UserId,
    WeightCurve, Window,
};

/// Share-seconds credited by one accrual step.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Accrual {
    pub lifetime: u128,
    pub in_range: u128,
}

impl Accrual {
    pub fn checked_add(self, other: Self) -> Option<Self> {
        Some(Self {
            lifetime: self.lifetime.checked_add(other.lifetime)?,
            in_range: self.in_range.checked_add(other.in_range)?,
        })
    }

    pub fn is_zero(&self) -> bool {
        self.lifetime == 0 && self.in_range == 0
    }
}

/// One user's position and accumulated weighted stake time.
///
/// The stake queue is FIFO: unstakes consume the oldest deposits first, so
/// the newest deposits keep their multiplier progress.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct UserParticipation {
    stakes: VecDeque<Stake>,
    total_staked: Amount,
    last_update_time: Option<Timestamp>,
    share_seconds: u128,
    share_seconds_in_range: u128,
    max_multiplier_seen: Ratio,
}

impl UserParticipation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stakes(&self) -> &VecDeque<Stake> {
        &self.stakes
    }

    pub fn total_staked(&self) -> Amount {
        self.total_staked
    }

    /// `None` until the first event.
    pub fn last_update_time(&self) -> Option<Timestamp> {
        self.last_update_time
    }

    pub fn share_seconds(&self) -> u128 {
        self.share_seconds
    }

    pub fn share_seconds_in_range(&self) -> u128 {
        self.share_seconds_in_range
    }

    pub fn max_multiplier_seen(&self) -> Ratio {
        self.max_multiplier_seen
    }

    pub fn has_position(&self) -> bool {
        self.total_staked > 0
    }

    /// Credit weighted stake time from the last update to `at`.
    ///
    /// The in-range part only counts time inside `window`. The accumulators
    /// are updated only when every stake's contribution was computed
    /// successfully.
    pub fn accrue(
        &mut self,
        user: &UserId,
        curve: &dyn WeightCurve,
        window: Window,
        at: Timestamp,
    ) -> Result<Accrual, LedgerError> {
        let Some(last) = self.last_update_time else {
            self.last_update_time = Some(at);
            return Ok(Accrual::default());
        };
        if at < last {
            return Err(InputError::OutOfOrder {
                user: user.to_string(),
                last_update: last,
                at,
            }
            .into());
        }
        if at == last {
            return Ok(Accrual::default());
        }

        let range_lo = last.max(window.start());
        let range_hi = at.min(window.end());
        let mut step = Accrual::default();
        let mut max_multiplier = self.max_multiplier_seen;

        for stake in &self.stakes {
            let lifetime = weighted(user, curve, stake, last, at)?;
            let in_range = if range_hi > range_lo {
                weighted(user, curve, stake, range_lo, range_hi)?
            } else {
                0
            };
            step = step
                .checked_add(Accrual { lifetime, in_range })
                .ok_or(InputError::ArithmeticOverflow)?;
            max_multiplier = max_multiplier.max(curve.multiplier_at(stake.elapsed(at)?)?);
        }

        let share_seconds = self
            .share_seconds
            .checked_add(step.lifetime)
            .ok_or(InputError::ArithmeticOverflow)?;
        let share_seconds_in_range = self
            .share_seconds_in_range
            .checked_add(step.in_range)
            .ok_or(InputError::ArithmeticOverflow)?;

        self.share_seconds = share_seconds;
        self.share_seconds_in_range = share_seconds_in_range;
        self.max_multiplier_seen = max_multiplier;
        self.last_update_time = Some(at);
        Ok(step)
    }

    /// Accrue up to `staked_at`, then push a new deposit.
    pub fn stake(
        &mut self,
        user: &UserId,
        curve: &dyn WeightCurve,
        window: Window,
        amount: Amount,
        staked_at: Timestamp,
    ) -> Result<Accrual, LedgerError> {
        if amount == 0 {
            return Err(InputError::ZeroAmount(user.to_string()).into());
        }
        let total = self
            .total_staked
            .checked_add(amount)
            .ok_or(InputError::ArithmeticOverflow)?;
        let step = self.accrue(user, curve, window, staked_at)?;
        self.stakes.push_back(Stake { amount, staked_at });
        self.total_staked = total;
        Ok(step)
    }

    /// Accrue up to `at`, then withdraw `amount` from the oldest deposits.
    ///
    /// The amount is checked before anything is accrued, so a rejected
    /// unstake leaves the user untouched.
    pub fn unstake(
        &mut self,
        user: &UserId,
        curve: &dyn WeightCurve,
        window: Window,
        amount: Amount,
        at: Timestamp,
    ) -> Result<Accrual, LedgerError> {
        if amount == 0 {
            return Err(InputError::ZeroAmount(user.to_string()).into());
        }
        if amount > self.total_staked {
            return Err(LedgerError::InsufficientStake {
                user: user.to_string(),
                have: self.total_staked,
                need: amount,
            });
        }
        let step = self.accrue(user, curve, window, at)?;

        let mut remaining = amount;
        while remaining > 0 {
            let Some(oldest) = self.stakes.front_mut() else {
                break;
            };
            if oldest.amount <= remaining {
                remaining -= oldest.amount;
                self.stakes.pop_front();
            } else {
                oldest.amount -= remaining;
                remaining = 0;
            }
        }
        self.total_staked -= amount;
        Ok(step)
    }

    /// Check that the queue sums to `total_staked`.
    pub fn verify_queue(&self, user: &UserId) -> Result<(), InvariantViolation> {
        let queued = self
            .stakes
            .iter()
            .try_fold(0u128, |acc, s| acc.checked_add(s.amount));
        match queued {
            Some(queued) if queued == self.total_staked => Ok(()),
            queued => Err(InvariantViolation::StakeQueueMismatch {
                user: user.to_string(),
                queued: queued.unwrap_or(u128::MAX),
                total: self.total_staked,
            }),
        }
    }
}

/// `floor(stake.amount * ∫ multiplier)` over `[from, to]` in absolute time.
fn weighted(
    user: &UserId,
    curve: &dyn WeightCurve,
    stake: &Stake,
    from: Timestamp,
    to: Timestamp,
) -> Result<u128, LedgerError> {
    let integral = curve.integral(stake.elapsed(from)?, stake.elapsed(to)?)?;
    if integral.is_negative() {
        return Err(InvariantViolation::NegativeAccrual {
            user: user.to_string(),
            numer: integral.numer(),
            denom: integral.denom(),
        }
        .into());
    }
    integral
        .mul_floor(stake.amount)
        .ok_or_else(|| InputError::ArithmeticOverflow.into())
}
