//! Engine constants. All token amounts are in base units, all times in seconds.

/// Fixed-point denominator for multipliers: `10_000` bps = 1.0x.
pub const BPS_PRECISION: u64 = 10_000;

/// Largest per-token gap between vested and allocated amounts that is still
/// treated as rounding dust rather than a reportable discrepancy.
pub const DUST_TOLERANCE: u128 = 10_000_000_000;

pub const SECONDS_PER_HOUR: i64 = 3_600;
pub const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;
pub const SECONDS_PER_WEEK: i64 = 7 * SECONDS_PER_DAY;

/// Default multiplier ramp: eight weeks from 1.0x to 2.0x.
pub const DEFAULT_RAMP_DURATION_SECS: i64 = 8 * SECONDS_PER_WEEK;
pub const DEFAULT_START_MULTIPLIER_BPS: u64 = BPS_PRECISION;
pub const DEFAULT_END_MULTIPLIER_BPS: u64 = 2 * BPS_PRECISION;
