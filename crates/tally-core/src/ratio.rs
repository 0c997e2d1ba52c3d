//! Exact rational arithmetic for multipliers and weighted durations.
//!
//! A [`Ratio`] is always stored reduced with a positive denominator, so the
//! derived equality is exact equality of values. All operations are checked
//! and return `None` on overflow; callers map that to
//! [`InputError::ArithmeticOverflow`](crate::error::InputError::ArithmeticOverflow).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::constants::BPS_PRECISION;
use crate::error::InputError;

/// A reduced fraction `numer / denom` with `denom > 0`.
///
/// Deserialized values go through [`Ratio::new`], so stored fractions are
/// reduced and zero denominators are rejected.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(try_from = "RawRatio")]
pub struct Ratio {
    numer: i128,
    denom: i128,
}

impl Ratio {
    pub const ZERO: Self = Self { numer: 0, denom: 1 };
    pub const ONE: Self = Self { numer: 1, denom: 1 };

    /// Build a reduced ratio. Returns `None` for a zero denominator or when
    /// normalising the sign would overflow.
    pub fn new(numer: i128, denom: i128) -> Option<Self> {
        if denom == 0 {
            return None;
        }
        let (numer, denom) = if denom < 0 {
            (numer.checked_neg()?, denom.checked_neg()?)
        } else {
            (numer, denom)
        };
        let g = gcd(numer.unsigned_abs(), denom.unsigned_abs()) as i128;
        Some(Self {
            numer: numer / g,
            denom: denom / g,
        })
    }

    pub fn from_integer(n: i128) -> Self {
        Self { numer: n, denom: 1 }
    }

    /// A multiplier given in basis points (`10_000` = 1.0x).
    pub fn from_bps(bps: u64) -> Self {
        // gcd with a non-zero denominator never fails
        Self::new(bps as i128, BPS_PRECISION as i128).unwrap_or(Self::ZERO)
    }

    pub fn numer(&self) -> i128 {
        self.numer
    }

    pub fn denom(&self) -> i128 {
        self.denom
    }

    pub fn is_zero(&self) -> bool {
        self.numer == 0
    }

    pub fn is_negative(&self) -> bool {
        self.numer < 0
    }

    /// Largest integer not greater than the value.
    pub fn floor(&self) -> i128 {
        self.numer.div_euclid(self.denom)
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        if self.denom == other.denom {
            return Self::new(self.numer.checked_add(other.numer)?, self.denom);
        }
        let lhs = self.numer.checked_mul(other.denom)?;
        let rhs = other.numer.checked_mul(self.denom)?;
        Self::new(lhs.checked_add(rhs)?, self.denom.checked_mul(other.denom)?)
    }

    pub fn checked_mul_int(self, k: i128) -> Option<Self> {
        Self::new(self.numer.checked_mul(k)?, self.denom)
    }

    /// `floor(amount * self)` for a non-negative ratio, computed without
    /// rounding the ratio first. `None` on overflow or a negative ratio.
    pub fn mul_floor(&self, amount: u128) -> Option<u128> {
        if self.numer < 0 {
            return None;
        }
        mul_div_floor(amount, self.numer as u128, self.denom as u128)
    }

    /// Lossy conversion for human-readable reporting only.
    pub fn to_f64(&self) -> f64 {
        self.numer as f64 / self.denom as f64
    }
}

#[derive(Deserialize)]
struct RawRatio {
    numer: i128,
    denom: i128,
}

impl TryFrom<RawRatio> for Ratio {
    type Error = InputError;

    fn try_from(raw: RawRatio) -> Result<Self, Self::Error> {
        if raw.denom == 0 {
            return Err(InputError::ZeroDenominator);
        }
        Self::new(raw.numer, raw.denom).ok_or(InputError::ArithmeticOverflow)
    }
}

impl Default for Ratio {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialOrd for Ratio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ratio {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_fractions(self.numer, self.denom, other.numer, other.denom)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denom == 1 {
            write!(f, "{}", self.numer)
        } else {
            write!(f, "{}/{}", self.numer, self.denom)
        }
    }
}

/// `floor(a * b / c)` without requiring `a * b` to fit in a `u128`.
///
/// The product is formed in 256 bits, so the result is exact whenever the
/// quotient itself fits. Returns `None` for `c == 0` or on overflow.
pub fn mul_div_floor(a: u128, b: u128, c: u128) -> Option<u128> {
    if c == 0 {
        return None;
    }
    if let Some(product) = a.checked_mul(b) {
        return Some(product / c);
    }
    let (hi, lo) = widening_mul(a, b);
    div_wide(hi, lo, c)
}

/// Full 256-bit product as `(high, low)` halves.
fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = u64::MAX as u128;
    let (a1, a0) = (a >> 64, a & MASK);
    let (b1, b0) = (b >> 64, b & MASK);
    let p00 = a0 * b0;
    let p01 = a0 * b1;
    let p10 = a1 * b0;
    let p11 = a1 * b1;
    let mid = (p00 >> 64) + (p01 & MASK) + (p10 & MASK);
    let lo = (p00 & MASK) | (mid << 64);
    let hi = p11 + (p01 >> 64) + (p10 >> 64) + (mid >> 64);
    (hi, lo)
}

/// `(hi * 2^128 + lo) / c`, `None` when the quotient does not fit.
fn div_wide(hi: u128, lo: u128, c: u128) -> Option<u128> {
    if hi >= c {
        return None;
    }
    let mut rem = hi;
    let mut quot = 0u128;
    for bit in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> bit) & 1);
        quot <<= 1;
        if carry == 1 || rem >= c {
            rem = rem.wrapping_sub(c);
            quot |= 1;
        }
    }
    Some(quot)
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}

/// Exact comparison of `a/b` and `c/d` (`b, d > 0`) by continued-fraction
/// expansion, so no cross product can overflow.
fn cmp_fractions(mut a: i128, mut b: i128, mut c: i128, mut d: i128) -> Ordering {
    loop {
        let (qa, ra) = (a.div_euclid(b), a.rem_euclid(b));
        let (qc, rc) = (c.div_euclid(d), c.rem_euclid(d));
        return match qa.cmp(&qc) {
            Ordering::Equal => match (ra == 0, rc == 0) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => {
                    // ra/b vs rc/d has the same order as d/rc vs b/ra
                    (a, b, c, d) = (d, rc, b, ra);
                    continue;
                }
            },
            ord => ord,
        };
    }
}
