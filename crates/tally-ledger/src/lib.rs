//! # tally-ledger
//! Stake event log and share-seconds participation ledger.
//!
//! Events are validated as they are recorded into an [`EventLog`]. A
//! [`ParticipationLedger`] is rebuilt from the log for each distribution
//! window and accumulates every user's weighted stake time, both lifetime and
//! gated to the window.

pub mod events;
pub mod ledger;
pub mod participation;

pub use events::{EventLog, StakeAction, StakeEvent};
pub use ledger::ParticipationLedger;
pub use participation::{Accrual, UserParticipation};
