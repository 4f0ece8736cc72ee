//! Scripted control plane for tests.
//!
//! [`ScriptedControlPlane`] keeps switches and ports in memory, replays a
//! script of realization-state responses and records every call so tests can
//! assert on counts, ordering and spacing of state queries.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::time::Instant;
use uuid::Uuid;

use crate::clients::{ApiResponse, ControlPlaneClient, TransportError};
use crate::model::{DeleteOptions, LogicalPort, LogicalSwitch, LogicalSwitchState};

/// How the switch create call responds.
#[derive(Debug, Clone, Copy)]
pub enum CreateBehavior {
    /// 201 with the switch body, identifier assigned.
    Created,
    /// 201 with a body that lacks an identifier.
    CreatedWithoutId,
    /// Given status, no body.
    Status(StatusCode),
    /// Given status with the switch body; the switch exists afterwards.
    StatusWithBody(StatusCode),
    Unavailable,
}

/// One realization-state response.
#[derive(Debug, Clone)]
pub enum StateStep {
    State(String),
    Failure { code: i64, message: String },
    Status(StatusCode),
    Unavailable,
    /// Never answers.
    Hang,
}

impl StateStep {
    pub fn state(state: &str) -> Self {
        StateStep::State(state.to_string())
    }

    pub fn failure(code: i64, message: &str) -> Self {
        StateStep::Failure {
            code,
            message: message.to_string(),
        }
    }
}

/// How delete calls respond.
#[derive(Debug, Clone, Copy)]
pub enum DeleteBehavior {
    Ok,
    NotFound,
    Status(StatusCode),
    Unavailable,
}

#[derive(Default)]
struct Calls {
    switches: HashMap<String, LogicalSwitch>,
    ports: HashMap<String, LogicalPort>,
    states: VecDeque<StateStep>,
    switch_creates: u32,
    state_queries: Vec<Instant>,
    switch_deletes: Vec<String>,
    port_deletes: Vec<String>,
    last_delete_options: Option<DeleteOptions>,
}

/// In-memory stand-in for the manager.
pub struct ScriptedControlPlane {
    switch_id: String,
    create: CreateBehavior,
    delete: DeleteBehavior,
    fallback: StateStep,
    calls: Mutex<Calls>,
}

impl ScriptedControlPlane {
    /// A control plane that assigns `switch_id` to the next created switch
    /// and reports `success` for every state query.
    pub fn new(switch_id: impl Into<String>) -> Self {
        Self {
            switch_id: switch_id.into(),
            create: CreateBehavior::Created,
            delete: DeleteBehavior::Ok,
            fallback: StateStep::state("success"),
            calls: Mutex::new(Calls::default()),
        }
    }

    pub fn create_behavior(mut self, behavior: CreateBehavior) -> Self {
        self.create = behavior;
        self
    }

    pub fn delete_behavior(mut self, behavior: DeleteBehavior) -> Self {
        self.delete = behavior;
        self
    }

    /// Responses for the first state queries, in order.
    pub fn states(self, steps: impl IntoIterator<Item = StateStep>) -> Self {
        self.lock().states.extend(steps);
        self
    }

    /// Response once the scripted states are used up.
    pub fn then_forever(mut self, step: StateStep) -> Self {
        self.fallback = step;
        self
    }

    /// Seed an existing switch.
    pub fn with_switch(self, switch: LogicalSwitch) -> Self {
        if let Some(id) = switch.assigned_id().map(str::to_string) {
            self.lock().switches.insert(id, switch);
        }
        self
    }

    pub fn switch_creates(&self) -> u32 {
        self.lock().switch_creates
    }

    pub fn state_queries(&self) -> usize {
        self.lock().state_queries.len()
    }

    pub fn state_query_times(&self) -> Vec<Instant> {
        self.lock().state_queries.clone()
    }

    pub fn switch_deletes(&self) -> Vec<String> {
        self.lock().switch_deletes.clone()
    }

    pub fn port_deletes(&self) -> Vec<String> {
        self.lock().port_deletes.clone()
    }

    pub fn last_delete_options(&self) -> Option<DeleteOptions> {
        self.lock().last_delete_options
    }

    pub fn switch(&self, id: &str) -> Option<LogicalSwitch> {
        self.lock().switches.get(id).cloned()
    }

    pub fn port(&self, id: &str) -> Option<LogicalPort> {
        self.lock().ports.get(id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Calls> {
        self.calls.lock().expect("scripted control plane lock poisoned")
    }

    fn accept_switch(&self, spec: &LogicalSwitch, with_id: bool) -> LogicalSwitch {
        let mut created = spec.clone();
        created.revision = Some(0);
        if with_id {
            created.id = Some(self.switch_id.clone());
            self.lock()
                .switches
                .insert(self.switch_id.clone(), created.clone());
        } else {
            created.id = None;
        }
        created
    }

    fn unavailable() -> TransportError {
        TransportError::Unavailable("connection reset by peer".to_string())
    }

    fn delete_status(&self, existed: bool) -> Result<StatusCode, TransportError> {
        match self.delete {
            DeleteBehavior::Ok if existed => Ok(StatusCode::OK),
            DeleteBehavior::Ok | DeleteBehavior::NotFound => Ok(StatusCode::NOT_FOUND),
            DeleteBehavior::Status(status) => Ok(status),
            DeleteBehavior::Unavailable => Err(Self::unavailable()),
        }
    }
}

#[async_trait]
impl ControlPlaneClient for ScriptedControlPlane {
    async fn create_logical_switch(
        &self,
        spec: &LogicalSwitch,
    ) -> Result<ApiResponse<LogicalSwitch>, TransportError> {
        self.lock().switch_creates += 1;
        match self.create {
            CreateBehavior::Created => Ok(ApiResponse::created(self.accept_switch(spec, true))),
            CreateBehavior::CreatedWithoutId => {
                Ok(ApiResponse::created(self.accept_switch(spec, false)))
            }
            CreateBehavior::Status(status) => Ok(ApiResponse::status_only(status)),
            CreateBehavior::StatusWithBody(status) => Ok(ApiResponse::new(
                status,
                Some(self.accept_switch(spec, true)),
            )),
            CreateBehavior::Unavailable => Err(Self::unavailable()),
        }
    }

    async fn get_logical_switch(
        &self,
        id: &str,
    ) -> Result<ApiResponse<LogicalSwitch>, TransportError> {
        Ok(match self.lock().switches.get(id) {
            Some(switch) => ApiResponse::ok(switch.clone()),
            None => ApiResponse::status_only(StatusCode::NOT_FOUND),
        })
    }

    async fn update_logical_switch(
        &self,
        id: &str,
        spec: &LogicalSwitch,
    ) -> Result<ApiResponse<LogicalSwitch>, TransportError> {
        let mut calls = self.lock();
        let Some(current) = calls.switches.get(id) else {
            return Ok(ApiResponse::status_only(StatusCode::NOT_FOUND));
        };
        if spec.revision != current.revision {
            return Ok(ApiResponse::status_only(StatusCode::PRECONDITION_FAILED));
        }
        let mut updated = spec.clone();
        updated.id = Some(id.to_string());
        updated.revision = current.revision.map(|r| r + 1);
        calls.switches.insert(id.to_string(), updated.clone());
        Ok(ApiResponse::ok(updated))
    }

    async fn delete_logical_switch(
        &self,
        id: &str,
        options: &DeleteOptions,
    ) -> Result<StatusCode, TransportError> {
        let existed = {
            let mut calls = self.lock();
            calls.switch_deletes.push(id.to_string());
            calls.last_delete_options = Some(*options);
            let existed = calls.switches.contains_key(id);
            if existed && matches!(self.delete, DeleteBehavior::Ok) {
                calls.switches.remove(id);
            }
            existed
        };
        self.delete_status(existed)
    }

    async fn get_logical_switch_state(
        &self,
        id: &str,
    ) -> Result<ApiResponse<LogicalSwitchState>, TransportError> {
        let step = {
            let mut calls = self.lock();
            calls.state_queries.push(Instant::now());
            calls
                .states
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        };

        let mut report = match step {
            StateStep::State(state) => LogicalSwitchState::new(state),
            StateStep::Failure { code, message } => LogicalSwitchState::failed(code, message),
            StateStep::Status(status) => return Ok(ApiResponse::status_only(status)),
            StateStep::Unavailable => return Err(Self::unavailable()),
            StateStep::Hang => std::future::pending().await,
        };
        report.logical_switch_id = Some(id.to_string());
        Ok(ApiResponse::ok(report))
    }

    async fn create_logical_port(
        &self,
        spec: &LogicalPort,
    ) -> Result<ApiResponse<LogicalPort>, TransportError> {
        let mut calls = self.lock();
        if !calls.switches.contains_key(&spec.logical_switch_id) {
            return Ok(ApiResponse::status_only(StatusCode::BAD_REQUEST));
        }
        let id = format!("lp-{}", Uuid::new_v4().as_simple());
        let mut created = spec.clone();
        created.id = Some(id.clone());
        created.revision = Some(0);
        calls.ports.insert(id, created.clone());
        Ok(ApiResponse::created(created))
    }

    async fn get_logical_port(
        &self,
        id: &str,
    ) -> Result<ApiResponse<LogicalPort>, TransportError> {
        Ok(match self.lock().ports.get(id) {
            Some(port) => ApiResponse::ok(port.clone()),
            None => ApiResponse::status_only(StatusCode::NOT_FOUND),
        })
    }

    async fn update_logical_port(
        &self,
        id: &str,
        spec: &LogicalPort,
    ) -> Result<ApiResponse<LogicalPort>, TransportError> {
        let mut calls = self.lock();
        let Some(current) = calls.ports.get(id) else {
            return Ok(ApiResponse::status_only(StatusCode::NOT_FOUND));
        };
        if spec.revision != current.revision {
            return Ok(ApiResponse::status_only(StatusCode::PRECONDITION_FAILED));
        }
        let mut updated = spec.clone();
        updated.id = Some(id.to_string());
        updated.revision = current.revision.map(|r| r + 1);
        calls.ports.insert(id.to_string(), updated.clone());
        Ok(ApiResponse::ok(updated))
    }

    async fn delete_logical_port(
        &self,
        id: &str,
        options: &DeleteOptions,
    ) -> Result<StatusCode, TransportError> {
        let existed = {
            let mut calls = self.lock();
            calls.port_deletes.push(id.to_string());
            calls.last_delete_options = Some(*options);
            let existed = calls.ports.contains_key(id);
            if existed && matches!(self.delete, DeleteBehavior::Ok) {
                calls.ports.remove(id);
            }
            existed
        };
        self.delete_status(existed)
    }
}
