//! Distribution results and their export form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use tally_core::{Amount, DustDiscrepancy, Ratio, TokenId, UserId, Window};

/// Participation figures reported alongside a user's claims.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UserMetadata {
    pub share_seconds: u128,
    pub share_seconds_in_range: u128,
    pub max_multiplier: Ratio,
}

/// Outcome of one distribution run over one window.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DistributionResult {
    pub(crate) window: Window,
    /// Token → amount vested inside the window.
    pub(crate) amounts: BTreeMap<TokenId, Amount>,
    /// User → token → allocation. Every ledger user appears.
    pub(crate) claims: BTreeMap<UserId, BTreeMap<TokenId, Amount>>,
    /// Token → Σ allocations.
    pub(crate) totals: BTreeMap<TokenId, Amount>,
    pub(crate) metadata: BTreeMap<UserId, UserMetadata>,
    pub(crate) total_share_seconds_in_range: u128,
    /// Token → vested but unallocated residue.
    pub(crate) dust: BTreeMap<TokenId, Amount>,
    pub(crate) discrepancies: Vec<DustDiscrepancy>,
}

impl DistributionResult {
    pub fn window(&self) -> Window {
        self.window
    }

    pub fn tokens(&self) -> impl Iterator<Item = &TokenId> {
        self.amounts.keys()
    }

    pub fn amounts(&self) -> &BTreeMap<TokenId, Amount> {
        &self.amounts
    }

    pub fn amount_for(&self, token: &TokenId) -> Amount {
        self.amounts.get(token).copied().unwrap_or(0)
    }

    pub fn claims(&self) -> &BTreeMap<UserId, BTreeMap<TokenId, Amount>> {
        &self.claims
    }

    /// Allocation of `token` to `user`; 0 if either is unknown.
    pub fn claim(&self, user: &UserId, token: &TokenId) -> Amount {
        self.claims
            .get(user)
            .and_then(|c| c.get(token))
            .copied()
            .unwrap_or(0)
    }

    pub fn totals(&self) -> &BTreeMap<TokenId, Amount> {
        &self.totals
    }

    pub fn total_for(&self, token: &TokenId) -> Amount {
        self.totals.get(token).copied().unwrap_or(0)
    }

    pub fn metadata(&self) -> &BTreeMap<UserId, UserMetadata> {
        &self.metadata
    }

    pub fn total_share_seconds_in_range(&self) -> u128 {
        self.total_share_seconds_in_range
    }

    pub fn dust(&self) -> &BTreeMap<TokenId, Amount> {
        &self.dust
    }

    pub fn dust_for(&self, token: &TokenId) -> Amount {
        self.dust.get(token).copied().unwrap_or(0)
    }

    pub fn discrepancies(&self) -> &[DustDiscrepancy] {
        &self.discrepancies
    }

    pub fn has_discrepancies(&self) -> bool {
        !self.discrepancies.is_empty()
    }

    pub(crate) fn with_discrepancies(mut self, discrepancies: Vec<DustDiscrepancy>) -> Self {
        self.discrepancies = discrepancies;
        self
    }

    /// Serializable record with every amount as a decimal string.
    pub fn export(&self) -> DistributionRecord {
        let tokens = self
            .amounts
            .iter()
            .map(|(token, vested)| {
                let record = TokenRecord {
                    vested: vested.to_string(),
                    allocated: self.total_for(token).to_string(),
                    dust: self.dust_for(token).to_string(),
                    within_tolerance: !self.discrepancies.iter().any(|d| &d.token == token),
                };
                (token.clone(), record)
            })
            .collect();

        let claims = self
            .claims
            .iter()
            .map(|(user, amounts)| {
                let meta = self.metadata.get(user).copied().unwrap_or_default();
                let record = ClaimRecord {
                    amounts: amounts
                        .iter()
                        .map(|(t, a)| (t.clone(), a.to_string()))
                        .collect(),
                    share_seconds: meta.share_seconds.to_string(),
                    share_seconds_in_range: meta.share_seconds_in_range.to_string(),
                    max_multiplier: meta.max_multiplier.to_string(),
                };
                (user.clone(), record)
            })
            .collect();

        DistributionRecord {
            window_start: self.window.start(),
            window_end: self.window.end(),
            total_share_seconds_in_range: self.total_share_seconds_in_range.to_string(),
            tokens,
            claims,
        }
    }
}

/// Export of a [`DistributionResult`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DistributionRecord {
    pub window_start: i64,
    pub window_end: i64,
    pub total_share_seconds_in_range: String,
    pub tokens: BTreeMap<TokenId, TokenRecord>,
    pub claims: BTreeMap<UserId, ClaimRecord>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenRecord {
    pub vested: String,
    pub allocated: String,
    pub dust: String,
    pub within_tolerance: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ClaimRecord {
    pub amounts: BTreeMap<TokenId, String>,
    pub share_seconds: String,
    pub share_seconds_in_range: String,
    /// Exact ratio, `n` or `n/d`.
    pub max_multiplier: String,
}

impl DistributionRecord {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DistributionResult {
        let token = TokenId::from("BADGER");
        let alice = UserId::from("alice");
        DistributionResult {
            window: Window::new(0, 100).unwrap(),
            amounts: BTreeMap::from([(token.clone(), 900)]),
            claims: BTreeMap::from([(alice.clone(), BTreeMap::from([(token.clone(), 899)]))]),
            totals: BTreeMap::from([(token.clone(), 899)]),
            metadata: BTreeMap::from([(
                alice,
                UserMetadata {
                    share_seconds: 1_000,
                    share_seconds_in_range: 1_000,
                    max_multiplier: Ratio::new(3, 2).unwrap(),
                },
            )]),
            total_share_seconds_in_range: 1_000,
            dust: BTreeMap::from([(token, 1)]),
            discrepancies: Vec::new(),
        }
    }

    #[test]
    fn lookups_default_to_zero() {
        let r = sample();
        assert_eq!(r.claim(&UserId::from("alice"), &TokenId::from("BADGER")), 899);
        assert_eq!(r.claim(&UserId::from("bob"), &TokenId::from("BADGER")), 0);
        assert_eq!(r.amount_for(&TokenId::from("DIGG")), 0);
    }

    #[test]
    fn export_uses_decimal_strings() {
        let record = sample().export();
        let token = &record.tokens[&TokenId::from("BADGER")];
        assert_eq!(token.vested, "900");
        assert_eq!(token.dust, "1");
        assert!(token.within_tolerance);
        let claim = &record.claims[&UserId::from("alice")];
        assert_eq!(claim.amounts[&TokenId::from("BADGER")], "899");
        assert_eq!(claim.max_multiplier, "3/2");
    }

    #[test]
    fn export_flags_discrepant_tokens() {
        let token = TokenId::from("BADGER");
        let r = sample().with_discrepancies(vec![DustDiscrepancy {
            token: token.clone(),
            vested: 900,
            allocated: 899,
            dust: 1,
            tolerance: 1,
        }]);
        assert!(r.has_discrepancies());
        assert!(!r.export().tokens[&token].within_tolerance);
    }

    #[test]
    fn json_round_trip_keeps_precision() {
        let mut r = sample();
        let token = TokenId::from("BADGER");
        r.amounts.insert(token.clone(), u128::MAX);
        let json = r.export().to_json().unwrap();
        assert!(json.contains(&u128::MAX.to_string()));
        let back: DistributionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r.export());
    }
}
