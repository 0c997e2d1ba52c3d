//! # tally-core
//! Foundation types, unlock schedules and multiplier curves for Tally.
//!
//! Everything that feeds an allocation decision is integer or exact-rational
//! arithmetic; floating point only appears in reporting helpers.

pub mod constants;
pub mod error;
pub mod multiplier;
pub mod ratio;
pub mod schedule;
pub mod traits;
pub mod types;

pub use error::{
    ConfigError, DustDiscrepancy, InputError, InvariantViolation, LedgerError, TallyError,
};
pub use multiplier::{CurvePoint, MultiplierCurve};
pub use ratio::Ratio;
pub use schedule::{ScheduleParams, SchedulePhase, ScheduleSet, ScheduleStatus, UnlockSchedule};
pub use traits::{VestingSource, WeightCurve};
pub use types::{Amount, Stake, Timestamp, TokenId, UserId, Window};
