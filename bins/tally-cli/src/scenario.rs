//! JSON scenario files.
//!
//! A scenario describes one reward cycle: the engine configuration, the
//! distribution window, the tokens to distribute and one or more staking
//! pools, each with its own unlock schedules and stake event feed.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use tally_core::{ScheduleParams, TokenId, Window};
use tally_engine::{DistributionEngine, EngineConfig};
use tally_ledger::{EventLog, StakeEvent};

#[derive(Deserialize, Debug, Clone)]
pub struct Scenario {
    #[serde(default)]
    pub config: EngineConfig,
    pub window: Window,
    /// Tokens to distribute; every scheduled token when omitted.
    #[serde(default)]
    pub tokens: Vec<TokenId>,
    pub pools: Vec<PoolScenario>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PoolScenario {
    pub name: String,
    #[serde(default)]
    pub schedules: BTreeMap<TokenId, Vec<ScheduleParams>>,
    /// Stake and unstake events, in any order.
    #[serde(default)]
    pub events: Vec<StakeEvent>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse scenario {}", path.display()))
    }

    /// Explicit token list, or the union of every pool's scheduled tokens.
    pub fn tokens(&self) -> Vec<TokenId> {
        if !self.tokens.is_empty() {
            return self.tokens.clone();
        }
        self.pools
            .iter()
            .flat_map(|p| p.schedules.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// One configured engine per pool, in file order.
    pub fn engines(&self, config: &EngineConfig) -> Result<Vec<(String, DistributionEngine)>> {
        self.pools
            .iter()
            .map(|pool| {
                let engine = pool
                    .engine(config.clone())
                    .with_context(|| format!("invalid pool {}", pool.name))?;
                Ok((pool.name.clone(), engine))
            })
            .collect()
    }
}

impl PoolScenario {
    fn engine(&self, config: EngineConfig) -> Result<DistributionEngine> {
        let mut engine = DistributionEngine::new(config).context("invalid engine config")?;
        for (token, params) in &self.schedules {
            engine
                .configure_schedules(token.clone(), params)
                .with_context(|| format!("invalid schedules for {token}"))?;
        }
        let log = EventLog::from_unordered(self.events.iter().cloned()).context("invalid event feed")?;
        engine.replace_events(log);
        Ok(engine)
    }
}
