//! Window distribution.
//!
//! [`distribute`] is the stateless core: given a vesting source and a ledger
//! built for a window, it settles the ledger and splits each token's vested
//! amount pro rata by in-range share-seconds, rounding every allocation down.
//!
//! [`DistributionEngine`] owns schedules, the event log and configuration and
//! runs complete cycles: replay, distribute, reconcile.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use tally_core::ratio::mul_div_floor;
use tally_core::{
    Amount, ConfigError, InputError, InvariantViolation, LedgerError, MultiplierCurve,
    ScheduleParams, ScheduleSet, TallyError, Timestamp, TokenId, UnlockSchedule, UserId,
    VestingSource, WeightCurve, Window,
};
use tally_ledger::{EventLog, ParticipationLedger};

use crate::config::EngineConfig;
use crate::reconcile::verify;
use crate::result::{DistributionResult, UserMetadata};

/// Distribute every token in `tokens` over the ledger's window.
///
/// Settles the ledger to the window end first. The ledger must not have been
/// accrued past the window end.
pub fn distribute(
    vesting: &dyn VestingSource,
    ledger: &mut ParticipationLedger,
    tokens: &[TokenId],
    workers: usize,
) -> Result<DistributionResult, TallyError> {
    let window = ledger.window();

    let mut amounts = BTreeMap::new();
    for token in tokens {
        let amount = vesting.vested_in_window(token, window.start(), window.end())?;
        amounts.insert(token.clone(), amount);
    }

    ledger.settle_all(workers)?;

    let total_range = ledger.sum_share_seconds_in_range()?;
    if total_range != ledger.total_share_seconds_in_range() {
        let violation = InvariantViolation::RangeTotalMismatch {
            distributed: total_range,
            ledger: ledger.total_share_seconds_in_range(),
        };
        error!(%violation, "participation identity failed");
        return Err(violation.into());
    }
    if total_range == 0 {
        warn!(window = %window, users = ledger.user_count(), "no in-range participation, whole window is dust");
    }

    let mut claims: BTreeMap<UserId, BTreeMap<TokenId, Amount>> = BTreeMap::new();
    let mut metadata = BTreeMap::new();
    let mut totals: BTreeMap<TokenId, Amount> = amounts.keys().map(|t| (t.clone(), 0)).collect();

    for (user, participation) in ledger.users() {
        let in_range = participation.share_seconds_in_range();
        let mut user_claims = BTreeMap::new();
        for (token, &amount) in &amounts {
            let allocation = if in_range > 0 && total_range > 0 {
                mul_div_floor(amount, in_range, total_range).ok_or(InputError::ArithmeticOverflow)?
            } else {
                0
            };
            let total = totals.entry(token.clone()).or_default();
            *total = total
                .checked_add(allocation)
                .ok_or(InputError::ArithmeticOverflow)?;
            user_claims.insert(token.clone(), allocation);
        }
        claims.insert(user.clone(), user_claims);
        metadata.insert(
            user.clone(),
            UserMetadata {
                share_seconds: participation.share_seconds(),
                share_seconds_in_range: in_range,
                max_multiplier: participation.max_multiplier_seen(),
            },
        );
    }

    let mut dust = BTreeMap::new();
    for (token, &amount) in &amounts {
        let allocated = totals.get(token).copied().unwrap_or(0);
        let residue = amount.checked_sub(allocated).ok_or_else(|| {
            let violation = InvariantViolation::OverAllocation {
                token: token.to_string(),
                allocated,
                available: amount,
            };
            error!(%violation, "allocation exceeds vested amount");
            violation
        })?;
        dust.insert(token.clone(), residue);
    }

    Ok(DistributionResult {
        window,
        amounts,
        claims,
        totals,
        metadata,
        total_share_seconds_in_range: total_range,
        dust,
        discrepancies: Vec::new(),
    })
}

/// Stateful front end: schedules, event log and configuration.
#[derive(Debug)]
pub struct DistributionEngine {
    config: EngineConfig,
    curve: Arc<MultiplierCurve>,
    schedules: ScheduleSet,
    events: EventLog,
}

impl DistributionEngine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let curve = Arc::new(config.curve.build()?);
        Ok(Self {
            config,
            curve,
            schedules: ScheduleSet::new(),
            events: EventLog::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn curve(&self) -> &MultiplierCurve {
        &self.curve
    }

    pub fn schedules(&self) -> &ScheduleSet {
        &self.schedules
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Replace the token's tranches. Idempotent.
    pub fn configure_schedules(&mut self, token: TokenId, params: &[ScheduleParams]) -> Result<(), ConfigError> {
        let schedules = params
            .iter()
            .map(|p| p.into_schedule())
            .collect::<Result<Vec<UnlockSchedule>, _>>()?;
        self.schedules.configure(token, schedules)
    }

    pub fn record_stake(&mut self, user: UserId, amount: Amount, at: Timestamp) -> Result<(), LedgerError> {
        self.events.record_stake(user, amount, at)
    }

    pub fn record_unstake(&mut self, user: UserId, amount: Amount, at: Timestamp) -> Result<(), LedgerError> {
        self.events.record_unstake(user, amount, at)
    }

    /// Replace the event log, e.g. with one built from an unordered feed.
    pub fn replace_events(&mut self, events: EventLog) {
        self.events = events;
    }

    /// Fresh, unsettled ledger for `window` replayed from the event log.
    pub fn ledger_for(&self, window: Window) -> Result<ParticipationLedger, LedgerError> {
        let curve: Arc<dyn WeightCurve> = self.curve.clone();
        ParticipationLedger::replay(curve, window, &self.events, self.config.settlement_workers)
    }

    /// Run one full cycle over `[window_start, window_end]`.
    ///
    /// Dust discrepancies are attached to the result; any invariant failure
    /// aborts the run.
    pub fn run_distribution(
        &self,
        window_start: Timestamp,
        window_end: Timestamp,
        tokens: &[TokenId],
    ) -> Result<DistributionResult, TallyError> {
        let started = Instant::now();
        let window = Window::new(window_start, window_end)?;
        let mut ledger = self.ledger_for(window)?;
        let result = distribute(&self.schedules, &mut ledger, tokens, self.config.settlement_workers)?;
        let discrepancies = verify(&result, &self.schedules, &ledger, self.config.dust_tolerance)?;
        let result = result.with_discrepancies(discrepancies);

        info!(
            window = %window,
            tokens = tokens.len(),
            users = result.claims().len(),
            share_seconds_in_range = %result.total_share_seconds_in_range(),
            discrepancies = result.discrepancies().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "distribution complete"
        );
        Ok(result)
    }
}
