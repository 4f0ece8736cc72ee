//! Logical switch resource - realization-verified create plus plain CRUD.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, info};

use super::{ManagedResource, ResourceError, Result, require_id};
use crate::clients::ControlPlaneClient;
use crate::config::RealizationConfig;
use crate::model::{DeleteOptions, LogicalSwitch, LogicalSwitchState, ResourceKind};
use crate::realization::RealizationOrchestrator;

const KIND: ResourceKind = ResourceKind::LogicalSwitch;

pub struct LogicalSwitchResource {
    client: Arc<dyn ControlPlaneClient>,
    orchestrator: RealizationOrchestrator,
}

impl LogicalSwitchResource {
    pub fn new(client: Arc<dyn ControlPlaneClient>, config: RealizationConfig) -> Self {
        Self {
            orchestrator: RealizationOrchestrator::new(client.clone(), config),
            client,
        }
    }

    /// Create and verify the switch, abandoning verification once `cancel`
    /// resolves. The half-created switch is rolled back in that case too.
    pub async fn create_until<C>(&self, spec: &LogicalSwitch, cancel: C) -> Result<LogicalSwitch>
    where
        C: Future<Output = ()> + Send,
    {
        let verified = self.orchestrator.create_and_verify_until(spec, cancel).await?;
        let id = verified.handle.id;

        match self.read(&id).await? {
            Some(switch) => Ok(switch),
            None => Err(ResourceError::NotFound { kind: KIND, id }),
        }
    }

    /// Realization state as reported by the controller, without waiting.
    pub async fn state(&self, id: &str) -> Result<LogicalSwitchState> {
        require_id(KIND, id)?;
        let response = self
            .client
            .get_logical_switch_state(id)
            .await
            .map_err(|source| transport("state query", id, source))?;

        match response.status {
            StatusCode::OK => response.body.ok_or_else(|| ResourceError::MissingBody {
                kind: KIND,
                operation: "state query",
                id: id.to_string(),
            }),
            StatusCode::NOT_FOUND => Err(ResourceError::NotFound {
                kind: KIND,
                id: id.to_string(),
            }),
            status => Err(unexpected("state query", id, status)),
        }
    }
}

fn transport(
    operation: &'static str,
    id: &str,
    source: crate::clients::TransportError,
) -> ResourceError {
    ResourceError::Transport {
        kind: KIND,
        operation,
        id: id.to_string(),
        source,
    }
}

fn unexpected(operation: &'static str, id: &str, status: StatusCode) -> ResourceError {
    ResourceError::UnexpectedStatus {
        kind: KIND,
        operation,
        id: id.to_string(),
        status,
    }
}

#[async_trait]
impl ManagedResource for LogicalSwitchResource {
    type Spec = LogicalSwitch;

    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn create(&self, spec: &Self::Spec) -> Result<Self::Spec> {
        self.create_until(spec, std::future::pending::<()>()).await
    }

    async fn read(&self, id: &str) -> Result<Option<Self::Spec>> {
        require_id(KIND, id)?;
        let response = self
            .client
            .get_logical_switch(id)
            .await
            .map_err(|source| transport("read", id, source))?;

        if response.is_not_found() {
            debug!(id = %id, "Logical switch not found");
            return Ok(None);
        }
        if !response.status.is_success() {
            return Err(unexpected("read", id, response.status));
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
            .update_logical_switch(id, spec)
            .await
            .map_err(|source| transport("update", id, source))?;

        match response.status {
            StatusCode::NOT_FOUND => {
                return Err(ResourceError::NotFound {
                    kind: KIND,
                    id: id.to_string(),
                });
            }
            StatusCode::PRECONDITION_FAILED => {
                return Err(ResourceError::RevisionConflict {
                    kind: KIND,
                    id: id.to_string(),
                    revision: spec.revision.unwrap_or_default(),
                });
            }
            status if !status.is_success() => return Err(unexpected("update", id, status)),
            _ => {}
        }

        info!(id = %id, "Logical switch updated");
        match self.read(id).await? {
            Some(switch) => Ok(switch),
            None => Err(ResourceError::NotFound {
                kind: KIND,
                id: id.to_string(),
            }),
        }
    }

    async fn delete(&self, id: &str, options: &DeleteOptions) -> Result<()> {
        require_id(KIND, id)?;
        let status = self
            .client
            .delete_logical_switch(id, options)
            .await
            .map_err(|source| transport("delete", id, source))?;

        if status == StatusCode::NOT_FOUND {
            debug!(id = %id, "Logical switch not found");
            return Ok(());
        }
        if !status.is_success() {
            return Err(unexpected("delete", id, status));
        }
        info!(id = %id, "Logical switch deleted");
        Ok(())
    }
}
