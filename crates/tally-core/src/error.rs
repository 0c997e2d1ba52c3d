//! Error types for Tally.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::TokenId;

/// Rejected configuration. Raised at construction time, never at query time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("schedule duration must be positive, got {0}")] NonPositiveDuration(i64),
    #[error("schedule end time overflows: start {start} + duration {duration}")] EndTimeOverflow { start: i64, duration: i64 },
    #[error("total locked for token {0} overflows")] SupplyOverflow(String),
    #[error("multiplier curve must start at x = 0, got {0}")] CurveStartNotAtOrigin(i64),
    #[error("degenerate multiplier curve domain: start {start}, end {end}")] DegenerateCurveDomain { start: i64, end: i64 },
    #[error("settlement workers must be at least 1")] ZeroWorkers,
    #[error("duplicate reward source: {0}")] DuplicateSource(String),
}

/// Bad caller input. Always recoverable by correcting the input and retrying.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("negative elapsed time: {0}")] NegativeElapsed(i64),
    #[error("out-of-order event for {user}: {at} < last update {last_update}")] OutOfOrder { user: String, last_update: i64, at: i64 },
    #[error("inverted window: end {end} < start {start}")] InvertedWindow { start: i64, end: i64 },
    #[error("zero amount for {0}")] ZeroAmount(String),
    #[error("arithmetic overflow")] ArithmeticOverflow,
    #[error("ratio denominator must be non-zero")] ZeroDenominator,
}

/// A broken bookkeeping identity. Fatal: the distribution run must abort.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("negative accrual for {user}: {numer}/{denom}")] NegativeAccrual { user: String, numer: i128, denom: i128 },
    #[error("negative vesting for {token} in [{start}, {end}]: {at_start} > {at_end}")] NegativeVesting { token: String, start: i64, end: i64, at_start: u128, at_end: u128 },
    #[error("over-allocation of {token}: allocated {allocated} > available {available}")] OverAllocation { token: String, allocated: u128, available: u128 },
    #[error("in-range share-seconds mismatch: distributed {distributed}, ledger {ledger}")] RangeTotalMismatch { distributed: u128, ledger: u128 },
    #[error("ledger running total {running} != sum over users {summed}")] LedgerTotalMismatch { running: u128, summed: u128 },
    #[error("vested amount for {token} drifted: result {recorded}, schedules {recomputed}")] VestedAmountMismatch { token: String, recorded: u128, recomputed: u128 },
    #[error("stake queue for {user} sums to {queued}, total staked is {total}")] StakeQueueMismatch { user: String, queued: u128, total: u128 },
}

/// Failures from the participation ledger and the event log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// An unstake larger than the user's current position. The event is not applied.
    #[error("insufficient stake for {user}: have {have}, need {need}")]
    InsufficientStake {
        /// The user attempting the unstake.
        user: String,
        /// Current total staked.
        have: u128,
        /// Requested unstake amount.
        need: u128,
    },

    /// The settlement thread pool could not be started.
    #[error("failed to start settlement pool: {0}")]
    WorkerPool(String),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// Vested-versus-allocated gap at or above the dust tolerance.
///
/// Not an abort condition: it is attached to the distribution result so the
/// caller can route the residue by hand.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("dust for {token}: vested {vested}, allocated {allocated}, dust {dust} >= tolerance {tolerance}")]
pub struct DustDiscrepancy {
    pub token: TokenId,
    pub vested: u128,
    pub allocated: u128,
    pub dust: u128,
    pub tolerance: u128,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TallyError {
    #[error(transparent)] Config(#[from] ConfigError),
    #[error(transparent)] Input(#[from] InputError),
    #[error(transparent)] Ledger(#[from] LedgerError),
    #[error(transparent)] Invariant(#[from] InvariantViolation),
}

impl TallyError {
    /// Whether this error indicates a defect rather than bad input.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TallyError::Invariant(_) | TallyError::Ledger(LedgerError::Invariant(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_insufficient_stake() {
        let e = LedgerError::InsufficientStake {
            user: "alice".into(),
            have: 100,
            need: 200,
        };
        assert_eq!(e.to_string(), "insufficient stake for alice: have 100, need 200");
    }

    #[test]
    fn display_inverted_window() {
        let e = InputError::InvertedWindow { start: 10, end: 5 };
        assert_eq!(e.to_string(), "inverted window: end 5 < start 10");
    }

    #[test]
    fn display_dust_discrepancy() {
        let d = DustDiscrepancy {
            token: TokenId::from("BADGER"),
            vested: 900,
            allocated: 0,
            dust: 900,
            tolerance: 10,
        };
        assert_eq!(
            d.to_string(),
            "dust for BADGER: vested 900, allocated 0, dust 900 >= tolerance 10"
        );
    }

    #[test]
    fn from_input_error_into_ledger() {
        let ledger: LedgerError = InputError::ArithmeticOverflow.into();
        assert_eq!(ledger, LedgerError::Input(InputError::ArithmeticOverflow));
    }

    #[test]
    fn invariants_are_fatal() {
        let direct: TallyError = InvariantViolation::RangeTotalMismatch {
            distributed: 1,
            ledger: 2,
        }
        .into();
        assert!(direct.is_fatal());

        let nested: TallyError = LedgerError::Invariant(InvariantViolation::NegativeAccrual {
            user: "bob".into(),
            numer: -1,
            denom: 1,
        })
        .into();
        assert!(nested.is_fatal());
    }

    #[test]
    fn recoverable_errors_are_not_fatal() {
        let e: TallyError = ConfigError::NonPositiveDuration(0).into();
        assert!(!e.is_fatal());
        let e: TallyError = LedgerError::InsufficientStake {
            user: "carol".into(),
            have: 0,
            need: 1,
        }
        .into();
        assert!(!e.is_fatal());
    }
}
