//! Validated stake/unstake feed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use tally_core::{Amount, InputError, LedgerError, Timestamp, UserId};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StakeAction {
    Stake,
    Unstake,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StakeEvent {
    pub user: UserId,
    pub action: StakeAction,
    pub amount: Amount,
    pub at: Timestamp,
}

impl StakeEvent {
    pub fn stake(user: impl Into<UserId>, amount: Amount, at: Timestamp) -> Self {
        Self {
            user: user.into(),
            action: StakeAction::Stake,
            amount,
            at,
        }
    }

    pub fn unstake(user: impl Into<UserId>, amount: Amount, at: Timestamp) -> Self {
        Self {
            user: user.into(),
            action: StakeAction::Unstake,
            amount,
            at,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct UserHistory {
    events: Vec<StakeEvent>,
    balance: Amount,
}

/// Per-user, time-ordered history of accepted events.
///
/// Every event is checked against the user's running balance and last
/// timestamp on the way in, so a replay of the log can only fail on
/// arithmetic limits.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventLog {
    users: BTreeMap<UserId, UserHistory>,
    len: usize,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from events in any order.
    ///
    /// Events are sorted by timestamp; at equal timestamps stakes come before
    /// unstakes. Otherwise the input order is kept.
    pub fn from_unordered(events: impl IntoIterator<Item = StakeEvent>) -> Result<Self, LedgerError> {
        let mut events: Vec<StakeEvent> = events.into_iter().collect();
        events.sort_by_key(|e| (e.at, e.action));
        let mut log = Self::new();
        for event in events {
            log.record(event)?;
        }
        Ok(log)
    }

    pub fn record_stake(&mut self, user: UserId, amount: Amount, at: Timestamp) -> Result<(), LedgerError> {
        self.record(StakeEvent {
            user,
            action: StakeAction::Stake,
            amount,
            at,
        })
    }

    pub fn record_unstake(&mut self, user: UserId, amount: Amount, at: Timestamp) -> Result<(), LedgerError> {
        self.record(StakeEvent {
            user,
            action: StakeAction::Unstake,
            amount,
            at,
        })
    }

    /// Validate and append one event. A rejected event leaves the log unchanged.
    pub fn record(&mut self, event: StakeEvent) -> Result<(), LedgerError> {
        if event.amount == 0 {
            return Err(InputError::ZeroAmount(event.user.to_string()).into());
        }
        let history = self.users.get(&event.user);
        let balance = history.map_or(0, |h| h.balance);
        if let Some(last) = history.and_then(|h| h.events.last()) {
            if event.at < last.at {
                return Err(InputError::OutOfOrder {
                    user: event.user.to_string(),
                    last_update: last.at,
                    at: event.at,
                }
                .into());
            }
        }
        let balance = match event.action {
            StakeAction::Stake => balance
                .checked_add(event.amount)
                .ok_or(InputError::ArithmeticOverflow)?,
            StakeAction::Unstake => balance.checked_sub(event.amount).ok_or_else(|| {
                LedgerError::InsufficientStake {
                    user: event.user.to_string(),
                    have: balance,
                    need: event.amount,
                }
            })?,
        };

        debug!(user = %event.user, action = ?event.action, amount = %event.amount, at = event.at, "recorded event");
        let history = self.users.entry(event.user.clone()).or_default();
        history.balance = balance;
        history.events.push(event);
        self.len += 1;
        Ok(())
    }

    /// Users with at least one event, ascending.
    pub fn users(&self) -> impl Iterator<Item = &UserId> {
        self.users.keys()
    }

    pub fn events_for(&self, user: &UserId) -> &[StakeEvent] {
        self.users.get(user).map(|h| h.events.as_slice()).unwrap_or(&[])
    }

    /// Every event, grouped by user.
    pub fn iter(&self) -> impl Iterator<Item = &StakeEvent> {
        self.users.values().flat_map(|h| h.events.iter())
    }

    /// Current staked balance after all recorded events.
    pub fn balance(&self, user: &UserId) -> Amount {
        self.users.get(user).map_or(0, |h| h.balance)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
