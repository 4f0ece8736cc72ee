//! Realization orchestrator - create, verify, and roll back on failure.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, info};

use super::error::RealizationError;
use super::poller::RealizationPoller;
use super::rollback::CompensatingRollback;
use crate::clients::ControlPlaneClient;
use crate::config::RealizationConfig;
use crate::model::{LogicalSwitch, ResourceHandle, ResourceKind};

/// Phase of one create-and-verify flow.
///
/// ```text
/// Created --> Polling --> Verified
///    |           |
///    |           +--> RollingBack --> Failed
///    +--------------------------------^
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealizationPhase {
    Created,
    Polling,
    Verified,
    RollingBack,
    Failed,
}

impl RealizationPhase {
    pub fn can_advance_to(self, next: RealizationPhase) -> bool {
        use RealizationPhase::*;
        matches!(
            (self, next),
            (Created, Polling)
                | (Created, Verified)
                | (Created, RollingBack)
                | (Created, Failed)
                | (Polling, Verified)
                | (Polling, RollingBack)
                | (RollingBack, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RealizationPhase::Verified | RealizationPhase::Failed)
    }
}

impl fmt::Display for RealizationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RealizationPhase::Created => "created",
            RealizationPhase::Polling => "polling",
            RealizationPhase::Verified => "verified",
            RealizationPhase::RollingBack => "rolling_back",
            RealizationPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a verified handle was confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Realized { polls: usize, elapsed: Duration },
    /// Verification was disabled by configuration.
    Skipped,
}

/// A switch the controller accepted and (unless skipped) realized.
#[derive(Debug, Clone)]
pub struct Verified {
    pub handle: ResourceHandle,
    pub verification: Verification,
}

/// Tracks the phase of one flow and logs transitions.
struct PhaseTracker<'a> {
    id: Option<&'a str>,
    phase: RealizationPhase,
}

impl<'a> PhaseTracker<'a> {
    fn new() -> Self {
        Self {
            id: None,
            phase: RealizationPhase::Created,
        }
    }

    fn advance(&mut self, next: RealizationPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal realization transition {} -> {}",
            self.phase,
            next
        );
        debug!(
            id = self.id.unwrap_or("-"),
            from = %self.phase,
            to = %next,
            "Realization phase"
        );
        self.phase = next;
    }
}

/// Creates logical switches and confirms their realization.
///
/// Holds no per-flow state, so one orchestrator can drive any number of
/// concurrent creations.
pub struct RealizationOrchestrator {
    client: Arc<dyn ControlPlaneClient>,
    config: RealizationConfig,
}

impl RealizationOrchestrator {
    pub fn new(client: Arc<dyn ControlPlaneClient>, config: RealizationConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &RealizationConfig {
        &self.config
    }

    /// Create `spec` and wait until the controller reports it realized.
    ///
    /// On any failure after an identifier was assigned the switch is deleted
    /// again before this returns.
    pub async fn create_and_verify(
        &self,
        spec: &LogicalSwitch,
    ) -> Result<Verified, RealizationError> {
        self.create_and_verify_until(spec, std::future::pending::<()>()).await
    }

    /// Like [`RealizationOrchestrator::create_and_verify`], abandoning the
    /// poll loop once `cancel` resolves. Rollback is still attempted.
    pub async fn create_and_verify_until<C>(
        &self,
        spec: &LogicalSwitch,
        cancel: C,
    ) -> Result<Verified, RealizationError>
    where
        C: Future<Output = ()>,
    {
        // Nothing may be created that the poller would then refuse to verify.
        self.config.validate()?;

        let kind = ResourceKind::LogicalSwitch;
        let mut tracker = PhaseTracker::new();

        let response = match self.client.create_logical_switch(spec).await {
            Ok(response) => response,
            Err(source) => {
                tracker.advance(RealizationPhase::Failed);
                return Err(RealizationError::Transport { kind, source });
            }
        };

        let id = response
            .body
            .as_ref()
            .and_then(|s| s.assigned_id())
            .map(str::to_string);
        let revision = response
            .body
            .as_ref()
            .and_then(|s| s.revision)
            .unwrap_or_default();

        if response.status != StatusCode::CREATED {
            let err = RealizationError::UnexpectedStatus {
                kind,
                status: response.status,
                id: id.clone(),
            };
            // Only an assigned identifier can be rolled back.
            return match id.as_deref() {
                Some(id) => {
                    tracker.id = Some(id);
                    tracker.advance(RealizationPhase::RollingBack);
                    let err = self.rollback().compensate(id, err).await;
                    tracker.advance(RealizationPhase::Failed);
                    Err(err)
                }
                None => {
                    tracker.advance(RealizationPhase::Failed);
                    Err(err)
                }
            };
        }

        let Some(id) = id.as_deref() else {
            tracker.advance(RealizationPhase::Failed);
            return Err(RealizationError::MissingIdentifier { kind });
        };
        tracker.id = Some(id);
        info!(id = %id, "Logical switch accepted by controller");

        let handle = ResourceHandle::new(id, kind, revision);

        if !self.config.verify {
            tracker.advance(RealizationPhase::Verified);
            return Ok(Verified {
                handle,
                verification: Verification::Skipped,
            });
        }

        tracker.advance(RealizationPhase::Polling);
        let client = self.client.as_ref();
        let polled = RealizationPoller::new(&self.config)
            .wait_until(id, || client.get_logical_switch_state(id), cancel)
            .await;

        match polled {
            Ok(report) => {
                tracker.advance(RealizationPhase::Verified);
                info!(
                    id = %id,
                    polls = report.polls(),
                    elapsed_ms = report.elapsed.as_millis(),
                    "Logical switch realized"
                );
                Ok(Verified {
                    handle,
                    verification: Verification::Realized {
                        polls: report.polls(),
                        elapsed: report.elapsed,
                    },
                })
            }
            Err(cause) => {
                tracker.advance(RealizationPhase::RollingBack);
                let err = self.rollback().compensate(id, cause).await;
                tracker.advance(RealizationPhase::Failed);
                Err(err)
            }
        }
    }

    fn rollback(&self) -> CompensatingRollback<'_> {
        CompensatingRollback::new(self.client.as_ref(), self.config.rollback_delete)
    }
}
