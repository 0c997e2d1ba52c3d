//! Shared builders for integration tests.

use std::sync::Arc;

use tally_core::{
    Amount, MultiplierCurve, ScheduleParams, Timestamp, TokenId, UserId, WeightCurve, Window,
};
use tally_engine::{CurveConfig, DistributionEngine, EngineConfig};
use tally_ledger::{EventLog, ParticipationLedger, StakeEvent};

pub fn token() -> TokenId {
    TokenId::from("BADGER")
}

pub fn user(name: &str) -> UserId {
    UserId::from(name)
}

pub fn window(start: Timestamp, end: Timestamp) -> Window {
    Window::new(start, end).unwrap()
}

/// Multiplier fixed at 1.0x.
pub fn flat_curve() -> Arc<dyn WeightCurve> {
    Arc::new(MultiplierCurve::constant(10_000))
}

/// Engine config with a 1.0x → `end_bps` ramp over `ramp_secs` seconds.
pub fn config(ramp_secs: i64, end_bps: u64, workers: usize) -> EngineConfig {
    EngineConfig {
        curve: CurveConfig {
            ramp_duration_secs: ramp_secs,
            start_multiplier_bps: 10_000,
            end_multiplier_bps: end_bps,
        },
        dust_tolerance: 10_000_000_000,
        settlement_workers: workers,
    }
}

/// Engine config with a constant 1.0x multiplier.
pub fn flat_config(workers: usize) -> EngineConfig {
    config(1, 10_000, workers)
}

/// Engine with one linear tranche of [`token`] and the given events.
pub fn engine(
    config: EngineConfig,
    schedule: (Amount, Timestamp, i64),
    events: Vec<StakeEvent>,
) -> DistributionEngine {
    let (initial_amount, start_time, duration) = schedule;
    let mut engine = DistributionEngine::new(config).unwrap();
    engine
        .configure_schedules(
            token(),
            &[ScheduleParams {
                initial_amount,
                start_time,
                duration,
            }],
        )
        .unwrap();
    engine.replace_events(EventLog::from_unordered(events).unwrap());
    engine
}

/// Replay `events` into a settled ledger for `window`.
pub fn settled_ledger(
    curve: Arc<dyn WeightCurve>,
    window: Window,
    events: Vec<StakeEvent>,
    workers: usize,
) -> ParticipationLedger {
    let log = EventLog::from_unordered(events).unwrap();
    let mut ledger = ParticipationLedger::replay(curve, window, &log, workers).unwrap();
    ledger.settle_all(workers).unwrap();
    ledger
}
