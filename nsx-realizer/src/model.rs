//! Manager API data model for logical switches and logical ports.
//!
//! Field names follow the manager's JSON representation, so these types are
//! sent and received as-is by [`crate::clients::NsxClient`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Semantic type of a resource managed through the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    LogicalSwitch,
    LogicalPort,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::LogicalSwitch => write!(f, "logical switch"),
            ResourceKind::LogicalPort => write!(f, "logical port"),
        }
    }
}

/// Handle to a resource accepted by the control plane.
///
/// The identifier and kind never change once assigned. The revision is the
/// controller's optimistic-concurrency counter and is refreshed after every
/// successful read or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    pub id: String,
    pub kind: ResourceKind,
    pub revision: i64,
}

impl ResourceHandle {
    pub fn new(id: impl Into<String>, kind: ResourceKind, revision: i64) -> Self {
        Self {
            id: id.into(),
            kind,
            revision,
        }
    }

    /// Record the revision returned by a later read or update.
    pub fn refresh_revision(&mut self, revision: i64) {
        self.revision = revision;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdminState {
    #[default]
    Up,
    Down,
}

impl FromStr for AdminState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UP" => Ok(AdminState::Up),
            "DOWN" => Ok(AdminState::Down),
            other => Err(format!("invalid admin state '{}', expected UP or DOWN", other)),
        }
    }
}

/// BUM traffic replication mode of an overlay switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplicationMode {
    #[default]
    Mtep,
    Source,
}

impl FromStr for ReplicationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MTEP" => Ok(ReplicationMode::Mtep),
            "SOURCE" => Ok(ReplicationMode::Source),
            other => Err(format!(
                "invalid replication mode '{}', expected MTEP or SOURCE",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub tag: String,
}

impl FromStr for Tag {
    type Err = String;

    /// Parses `scope=tag`; a bare value becomes a tag with an empty scope.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((scope, tag)) => Ok(Tag {
                scope: scope.to_string(),
                tag: tag.to_string(),
            }),
            None => Ok(Tag {
                scope: String::new(),
                tag: s.to_string(),
            }),
        }
    }
}

/// Switching profile reference (`key` is the profile type, `value` its id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchingProfileId {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBinding {
    pub ip_address: String,
    pub mac_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<i64>,
}

/// Logical switch as sent to and returned by the manager.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogicalSwitch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub transport_zone_id: String,
    #[serde(default)]
    pub admin_state: AdminState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_mode: Option<ReplicationMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vni: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_pool_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_pool_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub switching_profile_ids: Vec<SwitchingProfileId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub address_bindings: Vec<AddressBinding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(rename = "_revision", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,
}

impl LogicalSwitch {
    /// Identifier assigned by the manager, if any. Empty strings count as absent.
    pub fn assigned_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Logical port as sent to and returned by the manager.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogicalPort {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub logical_switch_id: String,
    #[serde(default)]
    pub admin_state: AdminState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub switching_profile_ids: Vec<SwitchingProfileId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub system_owned: bool,
    #[serde(rename = "_revision", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,
}

impl LogicalPort {
    pub fn assigned_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Body of `GET /logical-switches/{id}/state`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogicalSwitchState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_switch_id: Option<String>,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
}

impl LogicalSwitchState {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            ..Default::default()
        }
    }

    pub fn failed(code: i64, message: impl Into<String>) -> Self {
        Self {
            state: "failed".to_string(),
            failure_code: Some(code),
            failure_message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Failure reported alongside the state; a zero code means no failure.
    pub fn failure(&self) -> Option<(i64, &str)> {
        match self.failure_code {
            Some(code) if code != 0 => Some((code, self.failure_message.as_deref().unwrap_or(""))),
            _ => None,
        }
    }
}

/// Whether polling should continue, succeed or stop on a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    Pending,
    Success,
    Failure,
}

/// Realization state code reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealizationState {
    Pending,
    InProgress,
    PartialSuccess,
    Success,
    Failed,
    Error,
    Orphaned,
    Unknown,
}

impl RealizationState {
    pub fn class(self) -> StateClass {
        match self {
            RealizationState::Pending
            | RealizationState::InProgress
            | RealizationState::PartialSuccess => StateClass::Pending,
            RealizationState::Success => StateClass::Success,
            RealizationState::Failed
            | RealizationState::Error
            | RealizationState::Orphaned
            | RealizationState::Unknown => StateClass::Failure,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RealizationState::Pending => "pending",
            RealizationState::InProgress => "in_progress",
            RealizationState::PartialSuccess => "partial_success",
            RealizationState::Success => "success",
            RealizationState::Failed => "failed",
            RealizationState::Error => "error",
            RealizationState::Orphaned => "orphaned",
            RealizationState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RealizationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RealizationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RealizationState::Pending),
            "in_progress" => Ok(RealizationState::InProgress),
            "partial_success" => Ok(RealizationState::PartialSuccess),
            "success" => Ok(RealizationState::Success),
            "failed" => Ok(RealizationState::Failed),
            "error" => Ok(RealizationState::Error),
            "orphaned" => Ok(RealizationState::Orphaned),
            "unknown" => Ok(RealizationState::Unknown),
            other => Err(other.to_string()),
        }
    }
}

/// Query flags for deleting a switch or port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteOptions {
    /// Delete ports attached to the switch as well.
    pub cascade: bool,
    /// Force detach attachments before deletion.
    pub detach: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_classification() {
        for s in ["pending", "in_progress", "partial_success"] {
            let state: RealizationState = s.parse().unwrap();
            assert_eq!(state.class(), StateClass::Pending, "{}", s);
        }
        assert_eq!(
            "success".parse::<RealizationState>().unwrap().class(),
            StateClass::Success
        );
        for s in ["failed", "error", "orphaned", "unknown"] {
            let state: RealizationState = s.parse().unwrap();
            assert_eq!(state.class(), StateClass::Failure, "{}", s);
        }
    }

    #[test]
    fn test_unrecognized_state_is_rejected() {
        assert_eq!(
            "half_baked".parse::<RealizationState>().unwrap_err(),
            "half_baked"
        );
    }

    #[test]
    fn test_zero_failure_code_is_not_a_failure() {
        let mut state = LogicalSwitchState::new("in_progress");
        state.failure_code = Some(0);
        assert!(state.failure().is_none());

        let failed = LogicalSwitchState::failed(5, "vlan conflict");
        assert_eq!(failed.failure(), Some((5, "vlan conflict")));
    }

    #[test]
    fn test_logical_switch_wire_format() {
        let switch = LogicalSwitch {
            display_name: Some("web".to_string()),
            transport_zone_id: "tz-1".to_string(),
            replication_mode: Some(ReplicationMode::Mtep),
            tags: vec!["env=prod".parse().unwrap()],
            revision: Some(3),
            ..Default::default()
        };

        let value = serde_json::to_value(&switch).unwrap();
        assert_eq!(
            value,
            json!({
                "display_name": "web",
                "transport_zone_id": "tz-1",
                "admin_state": "UP",
                "replication_mode": "MTEP",
                "tags": [{"scope": "env", "tag": "prod"}],
                "_revision": 3
            })
        );
    }

    #[test]
    fn test_assigned_id_ignores_empty() {
        let mut switch = LogicalSwitch {
            id: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(switch.assigned_id(), None);
        switch.id = Some("ls-1".to_string());
        assert_eq!(switch.assigned_id(), Some("ls-1"));
    }
}
