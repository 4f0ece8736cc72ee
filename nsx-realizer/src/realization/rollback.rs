//! Compensating rollback of a switch that failed realization.

use reqwest::StatusCode;
use tracing::{error, info, warn};

use super::error::{RealizationError, RollbackError};
use crate::clients::ControlPlaneClient;
use crate::model::{DeleteOptions, ResourceKind};

/// Result of the compensating delete.
#[derive(Debug)]
pub enum RollbackOutcome {
    /// The delete was accepted.
    RolledBack,
    /// The controller no longer knew the resource.
    AlreadyGone,
    Failed(RollbackError),
}

impl RollbackOutcome {
    pub fn is_clean(&self) -> bool {
        !matches!(self, RollbackOutcome::Failed(_))
    }
}

/// Deletes a half-created switch and folds the outcome into the error
/// returned to the caller.
pub struct CompensatingRollback<'a> {
    client: &'a dyn ControlPlaneClient,
    options: DeleteOptions,
}

impl<'a> CompensatingRollback<'a> {
    pub fn new(client: &'a dyn ControlPlaneClient, options: DeleteOptions) -> Self {
        Self { client, options }
    }

    /// Issue the delete for `id`. Never retries.
    pub async fn delete(&self, id: &str) -> RollbackOutcome {
        match self.client.delete_logical_switch(id, &self.options).await {
            Ok(status) if status.is_success() => RollbackOutcome::RolledBack,
            Ok(StatusCode::NOT_FOUND) => RollbackOutcome::AlreadyGone,
            Ok(status) => RollbackOutcome::Failed(RollbackError::UnexpectedStatus(status)),
            Err(e) => RollbackOutcome::Failed(RollbackError::Transport(e)),
        }
    }

    /// Roll back `id` after `cause` and return the error to surface.
    ///
    /// A clean rollback returns `cause` unchanged; a failed one wraps both
    /// causes in [`RealizationError::RollbackFailed`].
    pub async fn compensate(&self, id: &str, cause: RealizationError) -> RealizationError {
        error!(
            id = %id,
            cause = %cause,
            "Rolling back logical switch creation due to unrealized state"
        );

        match self.delete(id).await {
            RollbackOutcome::RolledBack => {
                info!(id = %id, "Rolled back logical switch");
                cause
            }
            RollbackOutcome::AlreadyGone => {
                info!(id = %id, "Logical switch already gone, nothing to roll back");
                cause
            }
            RollbackOutcome::Failed(rollback) => {
                warn!(id = %id, error = %rollback, "Rollback of logical switch failed");
                RealizationError::RollbackFailed {
                    kind: ResourceKind::LogicalSwitch,
                    id: id.to_string(),
                    cause: Box::new(cause),
                    rollback,
                }
            }
        }
    }
}
