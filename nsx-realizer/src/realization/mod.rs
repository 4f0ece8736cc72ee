//! Asynchronous realization confirmation with compensating rollback.
//!
//! A logical switch accepted by the controller is not usable until the
//! transport nodes have realized it. The [`RealizationOrchestrator`] creates
//! the switch, hands its identifier to the [`RealizationPoller`], and on any
//! poll failure runs the [`CompensatingRollback`] before returning.

pub mod error;
pub mod orchestrator;
pub mod poller;
pub mod rollback;

pub use error::{RealizationError, RollbackError};
pub use orchestrator::{RealizationOrchestrator, RealizationPhase, Verification, Verified};
pub use poller::{PollAttempt, PollReport, RealizationPoller};
pub use rollback::{CompensatingRollback, RollbackOutcome};
