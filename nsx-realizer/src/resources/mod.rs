//! Create/read/update/delete glue for control-plane resources.
//!
//! Each resource maps a desired spec onto [`ControlPlaneClient`] calls. Only
//! logical switches go through realization; ports are accepted synchronously.
//!
//! [`ControlPlaneClient`]: crate::clients::ControlPlaneClient

pub mod logical_port;
pub mod logical_switch;

pub use logical_port::LogicalPortResource;
pub use logical_switch::LogicalSwitchResource;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::clients::{TransportError, is_valid_id};
use crate::model::{DeleteOptions, ResourceKind};
use crate::realization::RealizationError;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error(transparent)]
    Realization(#[from] RealizationError),

    #[error("error during {kind} {operation} of {id}: {source}")]
    Transport {
        kind: ResourceKind,
        operation: &'static str,
        id: String,
        #[source]
        source: TransportError,
    },

    #[error("unexpected status {status} during {kind} {operation} of {id}")]
    UnexpectedStatus {
        kind: ResourceKind,
        operation: &'static str,
        id: String,
        status: StatusCode,
    },

    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: String },

    #[error("{kind} {id} was modified concurrently (revision {revision} is stale)")]
    RevisionConflict {
        kind: ResourceKind,
        id: String,
        revision: i64,
    },

    #[error("error obtaining {kind} id")]
    MissingId { kind: ResourceKind },

    #[error("'{id}' is not a valid {kind} id")]
    InvalidId { kind: ResourceKind, id: String },

    #[error("{kind} {operation} of {id} returned no body")]
    MissingBody {
        kind: ResourceKind,
        operation: &'static str,
        id: String,
    },
}

pub type Result<T> = std::result::Result<T, ResourceError>;

/// Lifecycle of one kind of remote resource.
#[async_trait]
pub trait ManagedResource: Send + Sync {
    /// The desired configuration, also what the controller returns.
    type Spec: Send + Sync;

    fn kind(&self) -> ResourceKind;

    /// Create the resource and return it as the controller stores it.
    async fn create(&self, spec: &Self::Spec) -> Result<Self::Spec>;

    /// Current state, or `None` when the controller no longer has it.
    async fn read(&self, id: &str) -> Result<Option<Self::Spec>>;

    /// Replace the resource; `spec` must carry the last known revision.
    async fn update(&self, id: &str, spec: &Self::Spec) -> Result<Self::Spec>;

    /// Delete the resource. Deleting an absent resource succeeds.
    async fn delete(&self, id: &str, options: &DeleteOptions) -> Result<()>;
}

pub(crate) fn require_id(kind: ResourceKind, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(ResourceError::MissingId { kind });
    }
    if !is_valid_id(id) {
        return Err(ResourceError::InvalidId {
            kind,
            id: id.to_string(),
        });
    }
    Ok(())
}
