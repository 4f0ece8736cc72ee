//! nsx-realizer: logical switch and port lifecycle on an NSX manager.
//!
//! Creating a logical switch is only half the job: the manager accepts it
//! immediately, but the transport nodes realize it later. This crate:
//! - Creates switches and polls their realization state until terminal
//! - Deletes switches that never realize, reporting orphans when that fails
//! - Provides create/read/update/delete for switches and ports

pub mod clients;
pub mod config;
pub mod model;
pub mod realization;
pub mod resources;

#[cfg(any(test, feature = "test-util"))]
pub mod test_util;

pub use clients::{ApiResponse, ControlPlaneClient, NsxClient, NsxClientConfig, TransportError};
pub use config::{RealizationConfig, TransportErrorPolicy};
pub use model::{
    DeleteOptions, LogicalPort, LogicalSwitch, LogicalSwitchState, RealizationState,
    ResourceHandle, ResourceKind,
};
pub use realization::{RealizationError, RealizationOrchestrator, Verification, Verified};
pub use resources::{LogicalPortResource, LogicalSwitchResource, ManagedResource, ResourceError};
