//! Realization error types.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::clients::TransportError;
use crate::config::ConfigError;
use crate::model::{RealizationState, ResourceKind};

/// Why the compensating delete failed.
#[derive(Debug, Error)]
pub enum RollbackError {
    #[error("delete request failed: {0}")]
    Transport(#[source] TransportError),

    #[error("delete returned unexpected status {0}")]
    UnexpectedStatus(StatusCode),
}

/// Errors surfaced by create-and-verify.
///
/// Every variant raised after the controller assigned an identifier carries
/// it, see [`RealizationError::resource_id`].
#[derive(Debug, Error)]
pub enum RealizationError {
    #[error("invalid realization settings: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("error during {kind} create: {source}")]
    Transport {
        kind: ResourceKind,
        #[source]
        source: TransportError,
    },

    #[error("unexpected status {status} returned during {kind} create{}", fmt_id(.id))]
    UnexpectedStatus {
        kind: ResourceKind,
        status: StatusCode,
        id: Option<String>,
    },

    #[error("{kind} create succeeded but the response carried no identifier")]
    MissingIdentifier { kind: ResourceKind },

    #[error("error while querying realization state of {id}: {source}")]
    StateQuery {
        id: String,
        #[source]
        source: TransportError,
    },

    #[error("unexpected status {status} while querying realization state of {id}")]
    StateQueryStatus { id: String, status: StatusCode },

    #[error("{id} no longer exists on the controller while waiting for realization")]
    ResourceVanished { id: String },

    #[error("unrecognized realization state '{state}' reported for {id}")]
    UnrecognizedState { id: String, state: String },

    #[error("error in realization of {id} (state {state}, code {code}): {message}")]
    Failed {
        id: String,
        state: RealizationState,
        code: i64,
        message: String,
    },

    #[error(
        "timeout waiting for realization of {id}: last state {} after {elapsed:?} (budget {timeout:?})",
        fmt_state(.last_state)
    )]
    Timeout {
        id: String,
        elapsed: Duration,
        timeout: Duration,
        last_state: Option<RealizationState>,
    },

    #[error("realization of {id} cancelled after {elapsed:?}")]
    Cancelled { id: String, elapsed: Duration },

    #[error(
        "\nWARNING:\nThere was an error during the creation of {kind} {id}:\n{cause}\n\
         Additionally, there was an error deleting the {kind} during rollback:\n{rollback}\n\
         The {kind} may still exist in tracked state. If it does, the resource must be\n\
         tainted or removed from state before trying again.\n\
         If it is not tracked, delete {id} manually on the controller to try again.\n"
    )]
    RollbackFailed {
        kind: ResourceKind,
        id: String,
        cause: Box<RealizationError>,
        rollback: RollbackError,
    },
}

fn fmt_id(id: &Option<String>) -> String {
    id.as_deref()
        .map(|id| format!(" for {}", id))
        .unwrap_or_default()
}

fn fmt_state(state: &Option<RealizationState>) -> String {
    state
        .map(|s| s.to_string())
        .unwrap_or_else(|| "none observed".to_string())
}

impl RealizationError {
    /// Identifier of the remote resource, once the controller assigned one.
    pub fn resource_id(&self) -> Option<&str> {
        match self {
            RealizationError::InvalidConfig(_)
            | RealizationError::Transport { .. }
            | RealizationError::MissingIdentifier { .. } => None,
            RealizationError::UnexpectedStatus { id, .. } => id.as_deref(),
            RealizationError::StateQuery { id, .. }
            | RealizationError::StateQueryStatus { id, .. }
            | RealizationError::ResourceVanished { id }
            | RealizationError::UnrecognizedState { id, .. }
            | RealizationError::Failed { id, .. }
            | RealizationError::Timeout { id, .. }
            | RealizationError::Cancelled { id, .. }
            | RealizationError::RollbackFailed { id, .. } => Some(id),
        }
    }

    /// True when the compensating delete failed and the half-created
    /// resource may still exist on the controller.
    pub fn orphan_may_remain(&self) -> bool {
        matches!(self, RealizationError::RollbackFailed { .. })
    }

    /// The realization failure itself, looking through a failed rollback.
    pub fn root_cause(&self) -> &RealizationError {
        match self {
            RealizationError::RollbackFailed { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}
