//! Linear unlock schedules.
//!
//! A token may have several [`UnlockSchedule`] tranches; the vested amount of
//! the token is the sum over its tranches. Each tranche releases
//! `initial_amount` linearly over `[start_time, start_time + duration]`,
//! rounding down, and is capped at `initial_amount` from its end time on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::ConfigError;
use crate::ratio::mul_div_floor;
use crate::traits::VestingSource;
use crate::types::{Amount, Timestamp, TokenId};

/// One vesting tranche. Immutable after construction.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(try_from = "ScheduleParams", into = "ScheduleParams")]
pub struct UnlockSchedule {
    initial_amount: Amount,
    start_time: Timestamp,
    duration: i64,
}

impl UnlockSchedule {
    /// Create a schedule. `duration` must be positive and the end time must
    /// be representable.
    pub fn new(initial_amount: Amount, start_time: Timestamp, duration: i64) -> Result<Self, ConfigError> {
        if duration <= 0 {
            return Err(ConfigError::NonPositiveDuration(duration));
        }
        if start_time.checked_add(duration).is_none() {
            return Err(ConfigError::EndTimeOverflow {
                start: start_time,
                duration,
            });
        }
        Ok(Self {
            initial_amount,
            start_time,
            duration,
        })
    }

    pub fn initial_amount(&self) -> Amount {
        self.initial_amount
    }

    pub fn start_time(&self) -> Timestamp {
        self.start_time
    }

    pub fn duration(&self) -> i64 {
        self.duration
    }

    pub fn end_time(&self) -> Timestamp {
        // checked in `new`
        self.start_time + self.duration
    }

    /// Amount released by `at`.
    pub fn vested_at(&self, at: Timestamp) -> Amount {
        if at < self.start_time {
            return 0;
        }
        let elapsed = (at as i128 - self.start_time as i128) as u128;
        let duration = self.duration as u128;
        if elapsed >= duration {
            return self.initial_amount;
        }
        // elapsed < duration, so the quotient is below initial_amount and fits
        mul_div_floor(self.initial_amount, elapsed, duration)
            .unwrap_or(self.initial_amount)
            .min(self.initial_amount)
    }

    /// Progress of this tranche at `at`.
    pub fn phase_at(&self, at: Timestamp) -> SchedulePhase {
        if at < self.start_time {
            SchedulePhase::Pending
        } else if at >= self.end_time() {
            SchedulePhase::Complete
        } else {
            SchedulePhase::Active
        }
    }
}

/// Input shape for a schedule, as it appears in configuration files.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduleParams {
    pub initial_amount: Amount,
    pub start_time: Timestamp,
    pub duration: i64,
}

impl ScheduleParams {
    pub fn into_schedule(self) -> Result<UnlockSchedule, ConfigError> {
        UnlockSchedule::new(self.initial_amount, self.start_time, self.duration)
    }
}

impl TryFrom<ScheduleParams> for UnlockSchedule {
    type Error = ConfigError;

    fn try_from(params: ScheduleParams) -> Result<Self, Self::Error> {
        params.into_schedule()
    }
}

impl From<UnlockSchedule> for ScheduleParams {
    fn from(s: UnlockSchedule) -> Self {
        Self {
            initial_amount: s.initial_amount,
            start_time: s.start_time,
            duration: s.duration,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SchedulePhase {
    Pending,
    Active,
    Complete,
}

/// Human-readable progress report for one tranche.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ScheduleStatus {
    pub index: usize,
    pub initial_amount: Amount,
    pub vested: Amount,
    /// Seconds since `start_time`, clamped to `[0, duration]`.
    pub elapsed: i64,
    pub duration: i64,
    /// Reporting only; never feeds an allocation.
    pub percent_elapsed: f64,
    pub phase: SchedulePhase,
}

/// Token → ordered tranches. Insertion order is the schedule index.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct ScheduleSet {
    schedules: BTreeMap<TokenId, Vec<UnlockSchedule>>,
}

impl ScheduleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every tranche of `token`. Configuring the same list twice
    /// leaves the set unchanged.
    pub fn configure(&mut self, token: TokenId, schedules: Vec<UnlockSchedule>) -> Result<(), ConfigError> {
        sum_initial(&schedules).ok_or_else(|| ConfigError::SupplyOverflow(token.to_string()))?;
        debug!(token = %token, tranches = schedules.len(), "configured unlock schedules");
        self.schedules.insert(token, schedules);
        Ok(())
    }

    /// Append one tranche to `token`.
    pub fn add_schedule(&mut self, token: TokenId, schedule: UnlockSchedule) -> Result<(), ConfigError> {
        let entry = self.schedules.entry(token.clone()).or_default();
        sum_initial(entry)
            .and_then(|total| total.checked_add(schedule.initial_amount))
            .ok_or_else(|| ConfigError::SupplyOverflow(token.to_string()))?;
        entry.push(schedule);
        Ok(())
    }

    /// Tranches of `token` in insertion order; empty for unknown tokens.
    pub fn schedules(&self, token: &TokenId) -> &[UnlockSchedule] {
        self.schedules.get(token).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Σ `initial_amount` over the token's tranches.
    pub fn total_locked(&self, token: &TokenId) -> Amount {
        // overflow rejected at configuration time
        sum_initial(self.schedules(token)).unwrap_or(Amount::MAX)
    }

    /// Cumulative amount of `token` vested by `at`.
    pub fn vested_amount(&self, token: &TokenId, at: Timestamp) -> Amount {
        // each term is bounded by its initial_amount, whose sum fits
        self.schedules(token)
            .iter()
            .fold(0, |acc: Amount, s| acc.saturating_add(s.vested_at(at)))
    }

    pub fn schedule_status(&self, token: &TokenId, at: Timestamp) -> Vec<ScheduleStatus> {
        let report: Vec<ScheduleStatus> = self
            .schedules(token)
            .iter()
            .enumerate()
            .map(|(index, s)| {
                let elapsed = at.saturating_sub(s.start_time).clamp(0, s.duration);
                ScheduleStatus {
                    index,
                    initial_amount: s.initial_amount,
                    vested: s.vested_at(at),
                    elapsed,
                    duration: s.duration,
                    percent_elapsed: elapsed as f64 / s.duration as f64 * 100.0,
                    phase: s.phase_at(at),
                }
            })
            .collect();
        debug!(token = %token, at, tranches = report.len(), "schedule status");
        report
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }
}

impl VestingSource for ScheduleSet {
    fn vested_amount(&self, token: &TokenId, at: Timestamp) -> Amount {
        ScheduleSet::vested_amount(self, token, at)
    }

    fn tokens(&self) -> Vec<TokenId> {
        self.schedules.keys().cloned().collect()
    }
}

fn sum_initial(schedules: &[UnlockSchedule]) -> Option<Amount> {
    schedules
        .iter()
        .try_fold(0 as Amount, |acc, s| acc.checked_add(s.initial_amount))
}
