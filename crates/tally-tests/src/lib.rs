//! End-to-end and property-based test suite for Tally.
//!
//! The integration tests under `tests/` drive schedules, the participation
//! ledger and the distribution engine together and check the bookkeeping
//! identities under randomized inputs.

pub mod helpers;
