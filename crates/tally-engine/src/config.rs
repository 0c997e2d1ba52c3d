//! Engine configuration.
//!
//! [`EngineConfig`] carries everything a distribution run depends on besides
//! schedules and events: the multiplier curve, the dust tolerance and the
//! settlement parallelism. Missing fields in a serialized config take their
//! defaults.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

use tally_core::constants::{
    DEFAULT_END_MULTIPLIER_BPS, DEFAULT_RAMP_DURATION_SECS, DEFAULT_START_MULTIPLIER_BPS,
    DUST_TOLERANCE,
};
use tally_core::{ConfigError, MultiplierCurve};

/// Linear multiplier ramp, in basis points.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct CurveConfig {
    /// Seconds until the multiplier reaches its end value.
    pub ramp_duration_secs: i64,
    pub start_multiplier_bps: u64,
    pub end_multiplier_bps: u64,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            ramp_duration_secs: DEFAULT_RAMP_DURATION_SECS,
            start_multiplier_bps: DEFAULT_START_MULTIPLIER_BPS,
            end_multiplier_bps: DEFAULT_END_MULTIPLIER_BPS,
        }
    }
}

impl CurveConfig {
    pub fn build(&self) -> Result<MultiplierCurve, ConfigError> {
        MultiplierCurve::linear(
            self.ramp_duration_secs,
            self.start_multiplier_bps,
            self.end_multiplier_bps,
        )
    }
}

/// Configuration for a [`DistributionEngine`](crate::DistributionEngine).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub curve: CurveConfig,
    /// Per-token vested/allocated gap, in base units, below which the
    /// residue is plain rounding dust.
    pub dust_tolerance: u128,
    /// Threads used to replay and settle users.
    pub settlement_workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            curve: CurveConfig::default(),
            dust_tolerance: DUST_TOLERANCE,
            settlement_workers: default_workers(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settlement_workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        self.curve.build()?;
        Ok(())
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::constants::SECONDS_PER_WEEK;
    use tally_core::Ratio;

    #[test]
    fn default_curve_is_eight_week_doubling() {
        let curve = CurveConfig::default().build().unwrap();
        assert_eq!(curve.duration(), 8 * SECONDS_PER_WEEK);
        assert_eq!(curve.multiplier_at(0).unwrap(), Ratio::ONE);
        assert_eq!(curve.multiplier_at(8 * SECONDS_PER_WEEK).unwrap(), Ratio::from_integer(2));
    }

    #[test]
    fn default_tolerance() {
        assert_eq!(EngineConfig::default().dust_tolerance, 10_000_000_000);
    }

    #[test]
    fn default_workers_at_least_one() {
        let cfg = EngineConfig::default();
        assert!(cfg.settlement_workers >= 1);
        cfg.validate().unwrap();
    }

    #[test]
    fn zero_workers_rejected() {
        let cfg = EngineConfig {
            settlement_workers: 0,
            ..EngineConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroWorkers));
    }

    #[test]
    fn bad_curve_rejected() {
        let cfg = EngineConfig {
            curve: CurveConfig {
                ramp_duration_secs: 0,
                ..CurveConfig::default()
            },
            ..EngineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::DegenerateCurveDomain { .. })));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"curve":{"end_multiplier_bps":30000},"settlement_workers":2}"#).unwrap();
        assert_eq!(cfg.curve.end_multiplier_bps, 30_000);
        assert_eq!(cfg.curve.start_multiplier_bps, 10_000);
        assert_eq!(cfg.settlement_workers, 2);
        assert_eq!(cfg.dust_tolerance, DUST_TOLERANCE);
    }
}
