//! Logical port resource.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, info};

use super::{ManagedResource, ResourceError, Result, require_id};
use crate::clients::{ControlPlaneClient, TransportError};
use crate::model::{DeleteOptions, LogicalPort, ResourceKind};

const KIND: ResourceKind = ResourceKind::LogicalPort;

/// Ports are usable as soon as the controller accepts them.
pub struct LogicalPortResource {
    client: Arc<dyn ControlPlaneClient>,
}

impl LogicalPortResource {
    pub fn new(client: Arc<dyn ControlPlaneClient>) -> Self {
        Self { client }
    }
}

fn transport(operation: &'static str, id: &str, source: TransportError) -> ResourceError {
    ResourceError::Transport {
        kind: KIND,
        operation,
        id: id.to_string(),
        source,
    }
}

#[async_trait]
impl ManagedResource for LogicalPortResource {
    type Spec = LogicalPort;

    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn create(&self, spec: &Self::Spec) -> Result<Self::Spec> {
        let name = spec.display_name.as_deref().unwrap_or("<unnamed>");
        let response = self
            .client
            .create_logical_port(spec)
            .await
            .map_err(|source| transport("create", name, source))?;

        if response.status != StatusCode::CREATED {
            return Err(ResourceError::UnexpectedStatus {
                kind: KIND,
                operation: "create",
                id: name.to_string(),
                status: response.status,
            });
        }
        let Some(id) = response
            .body
            .as_ref()
            .and_then(|p| p.assigned_id())
            .map(str::to_string)
        else {
            return Err(ResourceError::MissingId { kind: KIND });
        };
        info!(id = %id, switch = %spec.logical_switch_id, "Logical port created");

        match self.read(&id).await? {
            Some(port) => Ok(port),
            None => Err(ResourceError::NotFound { kind: KIND, id }),
        }
    }

    async fn read(&self, id: &str) -> Result<Option<Self::Spec>> {
        require_id(KIND, id)?;
        let response = self
            .client
            .get_logical_port(id)
            .await
            .map_err(|source| transport("read", id, source))?;

        if response.is_not_found() {
            debug!(id = %id, "Logical port not found");
            return Ok(None);
        }
        if !response.status.is_success() {
            return Err(ResourceError::UnexpectedStatus {
                kind: KIND,
                operation: "read",
                id: id.to_string(),
                status: response.status,
            });
        }
        response.body.map(Some).ok_or_else(|| ResourceError::MissingBody {
            kind: KIND,
            operation: "read",
            id: id.to_string(),
        })
    }

    async fn update(&self, id: &str, spec: &Self::Spec) -> Result<Self::Spec> {
        require_id(KIND, id)?;
        let response = self
            .client
            .update_logical_port(id, spec)
            .await
            .map_err(|source| transport("update", id, source))?;

        match response.status {
            StatusCode::NOT_FOUND => Err(ResourceError::NotFound {
                kind: KIND,
                id: id.to_string(),
            }),
            StatusCode::PRECONDITION_FAILED => Err(ResourceError::RevisionConflict {
                kind: KIND,
                id: id.to_string(),
                revision: spec.revision.unwrap_or_default(),
            }),
            status if status.is_success() => match self.read(id).await? {
                Some(port) => Ok(port),
                None => Err(ResourceError::NotFound {
                    kind: KIND,
                    id: id.to_string(),
                }),
            },
            status => Err(ResourceError::UnexpectedStatus {
                kind: KIND,
                operation: "update",
                id: id.to_string(),
                status,
            }),
        }
    }

    async fn delete(&self, id: &str, options: &DeleteOptions) -> Result<()> {
        require_id(KIND, id)?;
        let status = self
            .client
            .delete_logical_port(id, options)
            .await
            .map_err(|source| transport("delete", id, source))?;

        if status == StatusCode::NOT_FOUND {
            debug!(id = %id, "Logical port not found");
            return Ok(());
        }
        if !status.is_success() {
            return Err(ResourceError::UnexpectedStatus {
                kind: KIND,
                operation: "delete",
                id: id.to_string(),
                status,
            });
        }
        Ok(())
    }
}
