//! Two-point piecewise-linear multiplier curve.
//!
//! The multiplier ramps linearly from `start.y` at `x = 0` to `end.y` at
//! `x = end.x` and stays flat at `end.y` afterwards. Multipliers are given in
//! basis points ([`BPS_PRECISION`] = 1.0x) and evaluated exactly as [`Ratio`]s.
//!
//! Internally every evaluation is scaled by `duration * BPS_PRECISION`:
//! `scaled(x) = start.y * duration + (end.y - start.y) * min(x, duration)`,
//! so a curve only ever produces fractions over one common denominator.

use serde::{Deserialize, Serialize};

use crate::constants::BPS_PRECISION;
use crate::error::{ConfigError, InputError};
use crate::ratio::Ratio;
use crate::traits::WeightCurve;

/// A control point: elapsed seconds and multiplier in basis points.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurvePoint {
    pub x: i64,
    pub y_bps: u64,
}

impl CurvePoint {
    pub fn new(x: i64, y_bps: u64) -> Self {
        Self { x, y_bps }
    }
}

/// Linearly increasing (or decreasing) multiplier between two points, flat
/// beyond the end point.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(try_from = "CurvePoints")]
pub struct MultiplierCurve {
    start: CurvePoint,
    end: CurvePoint,
}

#[derive(Deserialize)]
struct CurvePoints {
    start: CurvePoint,
    end: CurvePoint,
}

impl TryFrom<CurvePoints> for MultiplierCurve {
    type Error = ConfigError;

    fn try_from(points: CurvePoints) -> Result<Self, Self::Error> {
        Self::new(points.start, points.end)
    }
}

impl MultiplierCurve {
    /// Build a curve. `start.x` must be 0 and `end.x` strictly greater.
    pub fn new(start: CurvePoint, end: CurvePoint) -> Result<Self, ConfigError> {
        if start.x != 0 {
            return Err(ConfigError::CurveStartNotAtOrigin(start.x));
        }
        if end.x <= start.x {
            return Err(ConfigError::DegenerateCurveDomain {
                start: start.x,
                end: end.x,
            });
        }
        Ok(Self { start, end })
    }

    /// Ramp from `start_bps` to `end_bps` over `duration` seconds.
    pub fn linear(duration: i64, start_bps: u64, end_bps: u64) -> Result<Self, ConfigError> {
        Self::new(CurvePoint::new(0, start_bps), CurvePoint::new(duration, end_bps))
    }

    /// A flat multiplier (the domain is nominal; the value never changes).
    pub fn constant(bps: u64) -> Self {
        Self {
            start: CurvePoint::new(0, bps),
            end: CurvePoint::new(1, bps),
        }
    }

    pub fn start(&self) -> CurvePoint {
        self.start
    }

    pub fn end(&self) -> CurvePoint {
        self.end
    }

    /// Length of the ramp in seconds.
    pub fn duration(&self) -> i64 {
        self.end.x - self.start.x
    }

    /// Multiplier at `x = 0`.
    pub fn intercept(&self) -> Ratio {
        Ratio::from_bps(self.start.y_bps)
    }

    /// Multiplier change per second along the ramp.
    pub fn slope(&self) -> Ratio {
        let rise = self.end.y_bps as i128 - self.start.y_bps as i128;
        let run = self.duration() as i128 * BPS_PRECISION as i128;
        Ratio::new(rise, run).unwrap_or(Ratio::ZERO)
    }

    fn denominator(&self) -> i128 {
        self.duration() as i128 * BPS_PRECISION as i128
    }

    /// `multiplier(x) * duration * BPS_PRECISION`, exact.
    fn scaled(&self, elapsed: i64) -> Result<i128, InputError> {
        if elapsed < 0 {
            return Err(InputError::NegativeElapsed(elapsed));
        }
        let duration = self.duration() as i128;
        let x = (elapsed as i128).min(duration);
        let y0 = self.start.y_bps as i128;
        let rise = self.end.y_bps as i128 - y0;
        y0.checked_mul(duration)
            .and_then(|base| rise.checked_mul(x).and_then(|r| base.checked_add(r)))
            .ok_or(InputError::ArithmeticOverflow)
    }

    /// Twice the scaled trapezoid area over `[a, b]`: `(scaled(a) + scaled(b)) * (b - a)`.
    ///
    /// Exact only when `[a, b]` does not cross the kink at `duration`.
    fn trapezoid(&self, a: i64, b: i64) -> Result<i128, InputError> {
        let heights = self
            .scaled(a)?
            .checked_add(self.scaled(b)?)
            .ok_or(InputError::ArithmeticOverflow)?;
        let width = (b as i128) - (a as i128);
        heights
            .checked_mul(width)
            .ok_or(InputError::ArithmeticOverflow)
    }

    /// Multiplier after `elapsed` seconds of staking.
    pub fn multiplier_at(&self, elapsed: i64) -> Result<Ratio, InputError> {
        Ratio::new(self.scaled(elapsed)?, self.denominator()).ok_or(InputError::ArithmeticOverflow)
    }

    /// Exact integral of the multiplier between two elapsed times.
    ///
    /// An interval that crosses the end of the ramp is split there so each
    /// piece is integrated on a single linear segment.
    pub fn integral(&self, elapsed_start: i64, elapsed_end: i64) -> Result<Ratio, InputError> {
        let kink = self.end.x;
        let (lo, hi) = (elapsed_start.min(elapsed_end), elapsed_start.max(elapsed_end));
        let doubled = if lo < kink && kink < hi {
            self.trapezoid(elapsed_start, kink)?
                .checked_add(self.trapezoid(kink, elapsed_end)?)
                .ok_or(InputError::ArithmeticOverflow)?
        } else {
            self.trapezoid(elapsed_start, elapsed_end)?
        };
        let denom = self
            .denominator()
            .checked_mul(2)
            .ok_or(InputError::ArithmeticOverflow)?;
        Ratio::new(doubled, denom).ok_or(InputError::ArithmeticOverflow)
    }
}

impl WeightCurve for MultiplierCurve {
    fn multiplier_at(&self, elapsed: i64) -> Result<Ratio, InputError> {
        MultiplierCurve::multiplier_at(self, elapsed)
    }

    fn integral(&self, elapsed_start: i64, elapsed_end: i64) -> Result<Ratio, InputError> {
        MultiplierCurve::integral(self, elapsed_start, elapsed_end)
    }
}
