//! Per-cycle rewards aggregated across several staking pools.
//!
//! Each pool runs its own distribution; the rewards list sums the claims
//! per user and token while keeping every source result for auditing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use tally_core::{Amount, ConfigError, InputError, TallyError, TokenId, UserId};

use crate::result::{DistributionRecord, DistributionResult, UserMetadata};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RewardsList {
    cycle: u64,
    sources: BTreeMap<String, DistributionResult>,
    claims: BTreeMap<UserId, BTreeMap<TokenId, Amount>>,
    totals: BTreeMap<TokenId, Amount>,
    metadata: BTreeMap<UserId, UserMetadata>,
}

impl RewardsList {
    pub fn new(cycle: u64) -> Self {
        Self {
            cycle,
            ..Self::default()
        }
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Fold one pool's result into the list. Each source name may be added once.
    pub fn add_source(&mut self, name: impl Into<String>, result: DistributionResult) -> Result<(), TallyError> {
        let name = name.into();
        if self.sources.contains_key(&name) {
            return Err(ConfigError::DuplicateSource(name).into());
        }

        // compute into copies so a failed merge leaves the list untouched
        let mut claims = self.claims.clone();
        let mut totals = self.totals.clone();
        let mut metadata = self.metadata.clone();

        for (user, amounts) in result.claims() {
            let user_claims = claims.entry(user.clone()).or_default();
            for (token, amount) in amounts {
                add_to(user_claims.entry(token.clone()).or_default(), *amount)?;
                add_to(totals.entry(token.clone()).or_default(), *amount)?;
            }
        }
        for (user, meta) in result.metadata() {
            let merged = metadata.entry(user.clone()).or_default();
            add_to(&mut merged.share_seconds, meta.share_seconds)?;
            add_to(&mut merged.share_seconds_in_range, meta.share_seconds_in_range)?;
            merged.max_multiplier = merged.max_multiplier.max(meta.max_multiplier);
        }

        info!(cycle = self.cycle, source = %name, users = result.claims().len(), "added reward source");
        self.claims = claims;
        self.totals = totals;
        self.metadata = metadata;
        self.sources.insert(name, result);
        Ok(())
    }

    pub fn sources(&self) -> &BTreeMap<String, DistributionResult> {
        &self.sources
    }

    pub fn source(&self, name: &str) -> Option<&DistributionResult> {
        self.sources.get(name)
    }

    pub fn claims(&self) -> &BTreeMap<UserId, BTreeMap<TokenId, Amount>> {
        &self.claims
    }

    pub fn claim(&self, user: &UserId, token: &TokenId) -> Amount {
        self.claims
            .get(user)
            .and_then(|c| c.get(token))
            .copied()
            .unwrap_or(0)
    }

    /// Per-source amounts of `token` owed to `user`.
    pub fn breakdown(&self, user: &UserId, token: &TokenId) -> BTreeMap<&str, Amount> {
        self.sources
            .iter()
            .map(|(name, result)| (name.as_str(), result.claim(user, token)))
            .filter(|(_, amount)| *amount > 0)
            .collect()
    }

    pub fn totals(&self) -> &BTreeMap<TokenId, Amount> {
        &self.totals
    }

    pub fn metadata(&self) -> &BTreeMap<UserId, UserMetadata> {
        &self.metadata
    }

    pub fn export(&self) -> RewardsRecord {
        RewardsRecord {
            cycle: self.cycle,
            totals: self
                .totals
                .iter()
                .map(|(t, a)| (t.clone(), a.to_string()))
                .collect(),
            claims: self
                .claims
                .iter()
                .map(|(u, amounts)| {
                    let amounts = amounts
                        .iter()
                        .map(|(t, a)| (t.clone(), a.to_string()))
                        .collect();
                    (u.clone(), amounts)
                })
                .collect(),
            sources: self
                .sources
                .iter()
                .map(|(name, result)| (name.clone(), result.export()))
                .collect(),
        }
    }
}

/// Export of a [`RewardsList`]; amounts are decimal strings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RewardsRecord {
    pub cycle: u64,
    pub totals: BTreeMap<TokenId, String>,
    pub claims: BTreeMap<UserId, BTreeMap<TokenId, String>>,
    pub sources: BTreeMap<String, DistributionRecord>,
}

impl RewardsRecord {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn add_to(slot: &mut u128, amount: u128) -> Result<(), InputError> {
    *slot = slot.checked_add(amount).ok_or(InputError::ArithmeticOverflow)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{Ratio, Window};

    fn result_with(claims: &[(&str, &str, Amount)]) -> DistributionResult {
        let mut by_user: BTreeMap<UserId, BTreeMap<TokenId, Amount>> = BTreeMap::new();
        let mut totals: BTreeMap<TokenId, Amount> = BTreeMap::new();
        let mut metadata = BTreeMap::new();
        for (user, token, amount) in claims {
            by_user
                .entry(UserId::from(*user))
                .or_default()
                .insert(TokenId::from(*token), *amount);
            *totals.entry(TokenId::from(*token)).or_default() += amount;
            metadata.insert(
                UserId::from(*user),
                UserMetadata {
                    share_seconds: 10,
                    share_seconds_in_range: 5,
                    max_multiplier: Ratio::ONE,
                },
            );
        }
        DistributionResult {
            window: Window::new(0, 10).unwrap(),
            amounts: totals.clone(),
            claims: by_user,
            totals,
            metadata,
            total_share_seconds_in_range: 5 * claims.len() as u128,
            dust: BTreeMap::new(),
            discrepancies: Vec::new(),
        }
    }

    #[test]
    fn claims_are_summed_across_sources() {
        let mut list = RewardsList::new(7);
        list.add_source("geyser-a", result_with(&[("alice", "BADGER", 10), ("bob", "BADGER", 5)]))
            .unwrap();
        list.add_source("geyser-b", result_with(&[("alice", "BADGER", 3), ("alice", "DIGG", 1)]))
            .unwrap();

        let alice = UserId::from("alice");
        assert_eq!(list.claim(&alice, &TokenId::from("BADGER")), 13);
        assert_eq!(list.claim(&alice, &TokenId::from("DIGG")), 1);
        assert_eq!(list.totals()[&TokenId::from("BADGER")], 18);
        assert_eq!(list.metadata()[&alice].share_seconds, 20);

        let breakdown = list.breakdown(&alice, &TokenId::from("BADGER"));
        assert_eq!(breakdown, BTreeMap::from([("geyser-a", 10), ("geyser-b", 3)]));
    }

    #[test]
    fn duplicate_source_rejected() {
        let mut list = RewardsList::new(1);
        list.add_source("geyser", result_with(&[("alice", "BADGER", 1)])).unwrap();
        let err = list
            .add_source("geyser", result_with(&[("alice", "BADGER", 1)]))
            .unwrap_err();
        assert_eq!(err, TallyError::Config(ConfigError::DuplicateSource("geyser".into())));
        assert_eq!(list.claim(&UserId::from("alice"), &TokenId::from("BADGER")), 1);
    }

    #[test]
    fn overflow_leaves_list_unchanged() {
        let mut list = RewardsList::new(1);
        list.add_source("a", result_with(&[("alice", "BADGER", u128::MAX)])).unwrap();
        let before = list.clone();
        assert!(list.add_source("b", result_with(&[("alice", "BADGER", 1)])).is_err());
        assert_eq!(list, before);
    }

    #[test]
    fn export_shape() {
        let mut list = RewardsList::new(3);
        list.add_source("geyser", result_with(&[("alice", "BADGER", 42)])).unwrap();
        let record = list.export();
        assert_eq!(record.cycle, 3);
        assert_eq!(record.claims[&UserId::from("alice")][&TokenId::from("BADGER")], "42");
        assert!(record.sources.contains_key("geyser"));
        assert!(record.to_json().unwrap().contains("\"cycle\": 3"));
    }
}
