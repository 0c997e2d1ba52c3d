//! Post-run reconciliation.
//!
//! [`verify`] re-derives everything a [`DistributionResult`] claims from its
//! inputs. Broken identities are fatal and abort the run; a vested/allocated
//! gap at or above the tolerance is only reported as a [`DustDiscrepancy`].

use tracing::{debug, error, warn};

use tally_core::{DustDiscrepancy, InvariantViolation, TallyError, VestingSource};
use tally_ledger::ParticipationLedger;

use crate::result::DistributionResult;

/// Check `result` against the vesting source and the settled `ledger` it was
/// computed from. Returns the per-token dust discrepancies.
pub fn verify(
    result: &DistributionResult,
    vesting: &dyn VestingSource,
    ledger: &ParticipationLedger,
    tolerance: u128,
) -> Result<Vec<DustDiscrepancy>, TallyError> {
    let window = result.window();

    if result.total_share_seconds_in_range() != ledger.total_share_seconds_in_range() {
        return Err(fatal(InvariantViolation::RangeTotalMismatch {
            distributed: result.total_share_seconds_in_range(),
            ledger: ledger.total_share_seconds_in_range(),
        }));
    }
    ledger.verify()?;

    let mut discrepancies = Vec::new();
    for (token, &recorded) in result.amounts() {
        let recomputed = vesting.vested_in_window(token, window.start(), window.end())?;
        if recomputed != recorded {
            return Err(fatal(InvariantViolation::VestedAmountMismatch {
                token: token.to_string(),
                recorded,
                recomputed,
            }));
        }

        let allocated = result
            .claims()
            .values()
            .filter_map(|c| c.get(token))
            .try_fold(0u128, |acc, a| acc.checked_add(*a));
        let allocated = match allocated {
            Some(a) if a <= recorded => a,
            other => {
                return Err(fatal(InvariantViolation::OverAllocation {
                    token: token.to_string(),
                    allocated: other.unwrap_or(u128::MAX),
                    available: recorded,
                }));
            }
        };

        let dust = recorded - allocated;
        if dust >= tolerance {
            let discrepancy = DustDiscrepancy {
                token: token.clone(),
                vested: recorded,
                allocated,
                dust,
                tolerance,
            };
            warn!(%discrepancy, "dust above tolerance");
            discrepancies.push(discrepancy);
        } else {
            debug!(token = %token, dust = %dust, "dust within tolerance");
        }
    }
    Ok(discrepancies)
}

fn fatal(violation: InvariantViolation) -> TallyError {
    error!(%violation, "reconciliation failed");
    violation.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tally_core::{
        Amount, MultiplierCurve, ScheduleSet, TokenId, UnlockSchedule, UserId, WeightCurve, Window,
    };

    use crate::engine::distribute;

    fn token() -> TokenId {
        TokenId::from("BADGER")
    }

    fn setup(supply: Amount) -> (ScheduleSet, ParticipationLedger) {
        let mut schedules = ScheduleSet::new();
        schedules
            .configure(token(), vec![UnlockSchedule::new(supply, 0, 100).unwrap()])
            .unwrap();
        let curve: Arc<dyn WeightCurve> = Arc::new(MultiplierCurve::constant(10_000));
        let mut ledger = ParticipationLedger::new(curve, Window::new(0, 100).unwrap());
        ledger.stake(&UserId::from("a"), 1, 0).unwrap();
        ledger.stake(&UserId::from("b"), 2, 0).unwrap();
        (schedules, ledger)
    }

    #[test]
    fn clean_run_passes() {
        let (schedules, mut ledger) = setup(300);
        let result = distribute(&schedules, &mut ledger, &[token()], 1).unwrap();
        assert!(verify(&result, &schedules, &ledger, 1).unwrap().is_empty());
    }

    #[test]
    fn dust_at_tolerance_is_reported() {
        let (schedules, mut ledger) = setup(100);
        let result = distribute(&schedules, &mut ledger, &[token()], 1).unwrap();
        // 33 + 66 allocated, 1 left over
        let found = verify(&result, &schedules, &ledger, 1).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].dust, 1);
        assert!(verify(&result, &schedules, &ledger, 2).unwrap().is_empty());
    }

    #[test]
    fn tampered_claims_are_fatal() {
        let (schedules, mut ledger) = setup(300);
        let mut result = distribute(&schedules, &mut ledger, &[token()], 1).unwrap();
        result
            .claims
            .get_mut(&UserId::from("a"))
            .unwrap()
            .insert(token(), 1_000);
        let err = verify(&result, &schedules, &ledger, 1).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            TallyError::Invariant(InvariantViolation::OverAllocation { .. })
        ));
    }

    #[test]
    fn vested_drift_is_fatal() {
        let (schedules, mut ledger) = setup(300);
        let mut result = distribute(&schedules, &mut ledger, &[token()], 1).unwrap();
        result.amounts = BTreeMap::from([(token(), 301)]);
        let err = verify(&result, &schedules, &ledger, 1).unwrap_err();
        assert_eq!(
            err,
            TallyError::Invariant(InvariantViolation::VestedAmountMismatch {
                token: "BADGER".into(),
                recorded: 301,
                recomputed: 300,
            })
        );
    }

    #[test]
    fn range_total_mismatch_is_fatal() {
        let (schedules, mut ledger) = setup(300);
        let mut result = distribute(&schedules, &mut ledger, &[token()], 1).unwrap();
        result.total_share_seconds_in_range += 1;
        let err = verify(&result, &schedules, &ledger, 1).unwrap_err();
        assert!(matches!(
            err,
            TallyError::Invariant(InvariantViolation::RangeTotalMismatch { .. })
        ));
    }
}
