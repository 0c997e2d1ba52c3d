//! Environment overrides for the engine configuration.

use anyhow::{Context, Result};

use tally_engine::EngineConfig;

pub const DUST_TOLERANCE_VAR: &str = "TALLY_DUST_TOLERANCE";
pub const SETTLEMENT_WORKERS_VAR: &str = "TALLY_SETTLEMENT_WORKERS";

/// Apply `TALLY_*` variables from the process environment.
pub fn from_env(config: EngineConfig) -> Result<EngineConfig> {
    apply_overrides(config, |key| std::env::var(key).ok())
}

/// Apply overrides from any key lookup; unset keys keep the file value.
pub fn apply_overrides(mut config: EngineConfig, lookup: impl Fn(&str) -> Option<String>) -> Result<EngineConfig> {
    if let Some(raw) = lookup(DUST_TOLERANCE_VAR) {
        config.dust_tolerance = raw
            .trim()
            .parse()
            .with_context(|| format!("{DUST_TOLERANCE_VAR} must be a non-negative integer, got {raw:?}"))?;
    }
    if let Some(raw) = lookup(SETTLEMENT_WORKERS_VAR) {
        config.settlement_workers = raw
            .trim()
            .parse()
            .with_context(|| format!("{SETTLEMENT_WORKERS_VAR} must be a positive integer, got {raw:?}"))?;
    }
    config.validate().context("invalid engine configuration")?;
    Ok(config)
}
