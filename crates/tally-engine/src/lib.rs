//! # tally-engine
//! Distribution of vested tokens over a window in proportion to weighted
//! participation, with reconciliation and export.
//!
//! - [`config`]: engine configuration and defaults
//! - [`engine`]: [`distribute`] and the stateful [`DistributionEngine`]
//! - [`reconcile`]: post-run checks and the dust report
//! - [`result`]: [`DistributionResult`] and its export record
//! - [`rewards_list`]: per-cycle aggregation over several pools

pub mod config;
pub mod engine;
pub mod reconcile;
pub mod result;
pub mod rewards_list;

pub use config::{CurveConfig, EngineConfig};
pub use engine::{distribute, DistributionEngine};
pub use reconcile::verify;
pub use result::{ClaimRecord, DistributionRecord, DistributionResult, TokenRecord, UserMetadata};
pub use rewards_list::{RewardsList, RewardsRecord};
