//! Property-based checks of the bookkeeping identities.
//!
//! Properties tested:
//! - vesting is monotone in time and capped at the locked supply
//! - allocations never exceed the vested amount, and allocations plus dust
//!   equal it exactly
//! - in-range share-seconds reported by a distribution equal the ledger's
//! - replaying the same log is idempotent and independent of worker count
//! - the multiplier is clamped after the ramp and integrals are additive
//! - FIFO unstaking keeps the stake queue consistent with the balance

use proptest::prelude::*;

use tally_core::{MultiplierCurve, ScheduleSet, UnlockSchedule, WeightCurve};
use tally_ledger::{EventLog, ParticipationLedger, StakeEvent};
use tally_tests::helpers::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// A per-user feed of stakes and unstakes that never over-withdraws.
fn event_feed() -> impl Strategy<Value = Vec<StakeEvent>> {
    let step = (any::<bool>(), 1u128..1_000_000_000_000_000_000u128, 0i64..2_000);
    proptest::collection::vec((0usize..6, step), 1..40).prop_map(|raw| {
        let mut balances = [0u128; 6];
        let mut clocks = [0i64; 6];
        let mut events = Vec::new();
        for (u, (unstake, amount, dt)) in raw {
            clocks[u] += dt;
            let name = format!("user-{u}");
            if unstake && balances[u] > 0 {
                let amount = amount.min(balances[u]);
                balances[u] -= amount;
                events.push(StakeEvent::unstake(name, amount, clocks[u]));
            } else {
                balances[u] += amount;
                events.push(StakeEvent::stake(name, amount, clocks[u]));
            }
        }
        events
    })
}

fn window_strategy() -> impl Strategy<Value = (i64, i64)> {
    (0i64..10_000, 0i64..20_000).prop_map(|(start, len)| (start, start + len))
}

// ---------------------------------------------------------------------------
// Vesting
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn vesting_monotone_and_capped(
        tranches in proptest::collection::vec((0u128..1u128 << 90, -1_000i64..1_000, 1i64..5_000), 1..6),
        t in -2_000i64..8_000,
        dt in 0i64..8_000,
    ) {
        let mut set = ScheduleSet::new();
        let schedules: Vec<_> = tranches
            .iter()
            .map(|(a, s, d)| UnlockSchedule::new(*a, *s, *d).unwrap())
            .collect();
        let end = schedules.iter().map(UnlockSchedule::end_time).max().unwrap();
        set.configure(token(), schedules).unwrap();

        prop_assert!(set.vested_amount(&token(), t) <= set.vested_amount(&token(), t + dt));
        prop_assert_eq!(set.vested_amount(&token(), end + dt), set.total_locked(&token()));
    }
}

// ---------------------------------------------------------------------------
// Distribution identities
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn no_over_allocation_and_exact_dust(
        events in event_feed(),
        supply in 0u128..1_000_000_000_000_000_000_000_000_000u128,
        (start, end) in window_strategy(),
    ) {
        let engine = engine(config(5_000, 25_000, 3), (supply, 0, 15_000), events);
        let result = engine.run_distribution(start, end, &[token()]).unwrap();
        let amount = result.amount_for(&token());
        let allocated: u128 = result.claims().values().map(|c| c[&token()]).sum();
        prop_assert!(allocated <= amount);
        prop_assert_eq!(allocated, result.total_for(&token()));
        prop_assert_eq!(allocated + result.dust_for(&token()), amount);
    }

    #[test]
    fn participation_identity_is_exact(
        events in event_feed(),
        (start, end) in window_strategy(),
    ) {
        let engine = engine(config(5_000, 25_000, 2), (1_000_000, 0, 15_000), events);
        let result = engine.run_distribution(start, end, &[token()]).unwrap();
        let summed: u128 = result.metadata().values().map(|m| m.share_seconds_in_range).sum();
        prop_assert_eq!(summed, result.total_share_seconds_in_range());

        let mut ledger = engine.ledger_for(window(start, end)).unwrap();
        ledger.settle_all(1).unwrap();
        prop_assert_eq!(ledger.total_share_seconds_in_range(), result.total_share_seconds_in_range());
    }

    #[test]
    fn replay_idempotent_and_worker_independent(
        events in event_feed(),
        (start, end) in window_strategy(),
        workers in 2usize..9,
    ) {
        let log = EventLog::from_unordered(events).unwrap();
        let curve: std::sync::Arc<dyn WeightCurve> =
            std::sync::Arc::new(MultiplierCurve::linear(3_000, 10_000, 20_000).unwrap());
        let snapshot = |workers: usize| {
            let mut ledger =
                ParticipationLedger::replay(curve.clone(), window(start, end), &log, workers).unwrap();
            ledger.settle_all(workers).unwrap();
            let users: Vec<_> = ledger.users().map(|(u, p)| (u.clone(), p.clone())).collect();
            (users, ledger.total_share_seconds(), ledger.total_share_seconds_in_range())
        };
        let first = snapshot(1);
        prop_assert_eq!(&snapshot(1), &first);
        prop_assert_eq!(&snapshot(workers), &first);
    }

    #[test]
    fn fifo_queue_matches_balance(events in event_feed()) {
        let log = EventLog::from_unordered(events).unwrap();
        let ledger = ParticipationLedger::replay(flat_curve(), window(0, i64::MAX / 4), &log, 2).unwrap();
        for (user, p) in ledger.users() {
            prop_assert_eq!(p.total_staked(), log.balance(user));
            prop_assert!(p.verify_queue(user).is_ok());
            let times: Vec<_> = p.stakes().iter().map(|s| s.staked_at).collect();
            prop_assert!(times.windows(2).all(|w| w[0] <= w[1]));
        }
        ledger.verify().unwrap();
    }
}

// ---------------------------------------------------------------------------
// Curve
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn multiplier_clamped_after_ramp(
        duration in 1i64..10_000_000,
        start_bps in 0u64..100_000,
        end_bps in 0u64..100_000,
        beyond in 0i64..1_000_000_000,
    ) {
        let curve = MultiplierCurve::linear(duration, start_bps, end_bps).unwrap();
        prop_assert_eq!(
            curve.multiplier_at(duration + beyond).unwrap(),
            curve.multiplier_at(duration).unwrap()
        );
    }

    #[test]
    fn integral_additive_across_kink(
        duration in 1i64..1_000_000,
        a in 0i64..3_000_000,
        b in 0i64..3_000_000,
        c in 0i64..3_000_000,
    ) {
        let curve = MultiplierCurve::linear(duration, 10_000, 35_000).unwrap();
        let mut cuts = [a, b, c];
        cuts.sort();
        let whole = curve.integral(cuts[0], cuts[2]).unwrap();
        let split = curve
            .integral(cuts[0], cuts[1])
            .unwrap()
            .checked_add(curve.integral(cuts[1], cuts[2]).unwrap())
            .unwrap();
        prop_assert_eq!(whole, split);
    }
}
