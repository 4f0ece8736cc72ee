//! Clients for the remote control plane.
//!
//! The realization core and the resource glue only see the
//! [`ControlPlaneClient`] trait:
//! - [`NsxClient`]: the manager REST API over HTTPS
//! - `test_util::ScriptedControlPlane`: an in-memory double for tests

pub mod nsx;

pub use nsx::{NsxClient, NsxClientConfig};

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::model::{DeleteOptions, LogicalPort, LogicalSwitch, LogicalSwitchState};

/// A structured response from the control plane.
///
/// The body is only present for successful responses that carried one, so
/// callers must branch on `status` before looking at it.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub status: StatusCode,
    pub body: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn new(status: StatusCode, body: Option<T>) -> Self {
        Self { status, body }
    }

    pub fn ok(body: T) -> Self {
        Self::new(StatusCode::OK, Some(body))
    }

    pub fn created(body: T) -> Self {
        Self::new(StatusCode::CREATED, Some(body))
    }

    pub fn status_only(status: StatusCode) -> Self {
        Self::new(status, None)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }
}

/// The request failed before a structured response was received.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("control plane unavailable: {0}")]
    Unavailable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Whether `id` can stand in the URL path as exactly one segment.
///
/// Separators, query and fragment markers, escapes and dot segments would
/// let the request address a different resource.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(|c: char| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_control())
}

/// Operations the realization core and resource glue need from the controller.
///
/// Every call reports not-found through the returned status rather than as an
/// error, so delete can treat it as success and state queries as a hard stop.
#[async_trait]
pub trait ControlPlaneClient: Send + Sync {
    async fn create_logical_switch(
        &self,
        spec: &LogicalSwitch,
    ) -> Result<ApiResponse<LogicalSwitch>, TransportError>;

    async fn get_logical_switch(
        &self,
        id: &str,
    ) -> Result<ApiResponse<LogicalSwitch>, TransportError>;

    async fn update_logical_switch(
        &self,
        id: &str,
        spec: &LogicalSwitch,
    ) -> Result<ApiResponse<LogicalSwitch>, TransportError>;

    async fn delete_logical_switch(
        &self,
        id: &str,
        options: &DeleteOptions,
    ) -> Result<StatusCode, TransportError>;

    /// Realization state of a switch on the transport nodes.
    async fn get_logical_switch_state(
        &self,
        id: &str,
    ) -> Result<ApiResponse<LogicalSwitchState>, TransportError>;

    async fn create_logical_port(
        &self,
        spec: &LogicalPort,
    ) -> Result<ApiResponse<LogicalPort>, TransportError>;

    async fn get_logical_port(&self, id: &str)
    -> Result<ApiResponse<LogicalPort>, TransportError>;

    async fn update_logical_port(
        &self,
        id: &str,
        spec: &LogicalPort,
    ) -> Result<ApiResponse<LogicalPort>, TransportError>;

    async fn delete_logical_port(
        &self,
        id: &str,
        options: &DeleteOptions,
    ) -> Result<StatusCode, TransportError>;
}
