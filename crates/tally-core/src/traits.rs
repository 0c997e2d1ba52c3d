//! Trait interfaces between the Tally crates.
//!
//! - [`VestingSource`]: how much of a token has unlocked by a time
//!   ([`ScheduleSet`](crate::schedule::ScheduleSet) implements)
//! - [`WeightCurve`]: how staked time is weighted
//!   ([`MultiplierCurve`](crate::multiplier::MultiplierCurve) implements)
//!
//! Both are read-only and shared across settlement threads, hence `Send + Sync`.

use crate::error::{InputError, InvariantViolation, TallyError};
use crate::ratio::Ratio;
use crate::types::{Amount, Timestamp, TokenId, Window};

/// Source of vested token amounts.
pub trait VestingSource: Send + Sync {
    /// Cumulative amount of `token` vested as of `at`. Unknown tokens vest 0.
    fn vested_amount(&self, token: &TokenId, at: Timestamp) -> Amount;

    /// Tokens this source knows about, in ascending order.
    fn tokens(&self) -> Vec<TokenId>;

    /// Amount of `token` vested inside `[start, end]`.
    ///
    /// Default implementation: `vested_amount(end) - vested_amount(start)`.
    /// A negative difference means the source is not monotone, which is a
    /// fatal [`InvariantViolation`], never a valid state.
    fn vested_in_window(
        &self,
        token: &TokenId,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Amount, TallyError> {
        let window = Window::new(start, end)?;
        let at_start = self.vested_amount(token, window.start());
        let at_end = self.vested_amount(token, window.end());
        at_end.checked_sub(at_start).ok_or_else(|| {
            InvariantViolation::NegativeVesting {
                token: token.to_string(),
                start,
                end,
                at_start,
                at_end,
            }
            .into()
        })
    }
}

/// Time-weighting of staked positions.
///
/// Elapsed values are seconds since a stake was made; negative elapsed time
/// is rejected with [`InputError::NegativeElapsed`].
pub trait WeightCurve: Send + Sync {
    /// Multiplier for a stake held for `elapsed` seconds.
    fn multiplier_at(&self, elapsed: i64) -> Result<Ratio, InputError>;

    /// Exact integral of the multiplier over `[elapsed_start, elapsed_end]`
    /// (multiplier-seconds). Negative when `elapsed_end < elapsed_start`.
    fn integral(&self, elapsed_start: i64, elapsed_end: i64) -> Result<Ratio, InputError>;
}
