//! End-to-end tests of the manager client, realization and resources
//! against an in-process mock manager.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{StateReply, TestServer};
use nsx_realizer::model::{AdminState, Tag};
use nsx_realizer::{
    ControlPlaneClient, DeleteOptions, LogicalPort, LogicalPortResource, LogicalSwitch,
    LogicalSwitchResource, LogicalSwitchState, ManagedResource, NsxClient, NsxClientConfig,
    RealizationConfig, RealizationError, RealizationOrchestrator, RealizationState,
    ResourceError, TransportError, Verification,
};
use reqwest::StatusCode;

fn fast_config() -> RealizationConfig {
    RealizationConfig::new(Duration::from_secs(5))
        .with_initial_delay(Duration::from_millis(5))
        .with_min_interval(Duration::from_millis(10))
}

fn switch_spec() -> LogicalSwitch {
    LogicalSwitch {
        display_name: Some("web".to_string()),
        transport_zone_id: "tz-overlay".to_string(),
        tags: vec![Tag {
            scope: "env".to_string(),
            tag: "test".to_string(),
        }],
        ..Default::default()
    }
}

fn orchestrator(server: &TestServer, config: RealizationConfig) -> RealizationOrchestrator {
    RealizationOrchestrator::new(Arc::new(server.client()), config)
}

#[tokio::test]
async fn test_client_round_trips_switch_crud() {
    let server = TestServer::spawn().await;
    let client = server.client();

    let created = client.create_logical_switch(&switch_spec()).await.unwrap();
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.body.unwrap().id.unwrap();

    let fetched = client.get_logical_switch(&id).await.unwrap();
    assert_eq!(fetched.status, StatusCode::OK);
    let mut switch = fetched.body.unwrap();
    assert_eq!(switch.display_name.as_deref(), Some("web"));
    assert_eq!(switch.tags[0].scope, "env");
    assert_eq!(switch.revision, Some(0));

    switch.description = Some("frontend".to_string());
    let updated = client.update_logical_switch(&id, &switch).await.unwrap();
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body.unwrap().revision, Some(1));

    let status = client
        .delete_logical_switch(&id, &DeleteOptions::default())
        .await
        .unwrap();
    assert_eq!(status, StatusCode::OK);

    let missing = client.get_logical_switch(&id).await.unwrap();
    assert!(missing.is_not_found());
    assert!(missing.body.is_none());
}

#[tokio::test]
async fn test_client_uses_api_prefix_and_delete_flags() {
    let server = TestServer::spawn().await;
    let client = server.client();
    let id = client
        .create_logical_switch(&switch_spec())
        .await
        .unwrap()
        .body
        .unwrap()
        .id
        .unwrap();

    client
        .delete_logical_switch(
            &id,
            &DeleteOptions {
                cascade: true,
                detach: false,
            },
        )
        .await
        .unwrap();

    let path = format!("/api/v1/logical-switches/{}", id);
    let deletes = server.manager.requests_to("DELETE", &path);
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].query.as_deref(), Some("cascade=true&detach=false"));
    assert_eq!(
        server
            .manager
            .requests_to("POST", "/api/v1/logical-switches")
            .len(),
        1
    );
}

#[tokio::test]
async fn test_client_trailing_slash_in_base_url() {
    let server = TestServer::spawn().await;
    let client = NsxClient::new(NsxClientConfig::new(
        format!("{}/", server.base_url()),
        common::USERNAME,
        common::PASSWORD,
    ))
    .unwrap();

    let response = client.create_logical_switch(&switch_spec()).await.unwrap();
    assert_eq!(response.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_identifier_cannot_escape_its_collection() {
    let server = TestServer::spawn().await;
    let client = server.client();
    let switch_id = client
        .create_logical_switch(&switch_spec())
        .await
        .unwrap()
        .body
        .unwrap()
        .id
        .unwrap();
    let port_id = client
        .create_logical_port(&LogicalPort {
            logical_switch_id: switch_id.clone(),
            ..Default::default()
        })
        .await
        .unwrap()
        .body
        .unwrap()
        .id
        .unwrap();

    let crafted = format!("../logical-ports/{}", port_id);
    let err = client
        .delete_logical_switch(&crafted, &DeleteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::InvalidRequest(_)));

    let switches = LogicalSwitchResource::new(Arc::new(server.client()), fast_config());
    let err = switches
        .delete(&crafted, &DeleteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ResourceError::InvalidId { .. }));

    assert!(server.manager.requests().iter().all(|r| r.method != "DELETE"));
    assert!(server.manager.port(&port_id).is_some());
    assert!(server.manager.switch(&switch_id).is_some());
}

#[tokio::test]
async fn test_identifier_is_sent_as_one_encoded_segment() {
    let server = TestServer::spawn().await;
    let client = server.client();

    let response = client.get_logical_switch("web tier").await.unwrap();

    assert!(response.is_not_found());
    let requests = server.manager.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/api/v1/logical-switches/web%20tier");
}

#[tokio::test]
async fn test_wrong_credentials_fail_create_without_rollback() {
    let server = TestServer::spawn().await;
    let orchestrator = RealizationOrchestrator::new(
        Arc::new(server.client_with_password("wrong")),
        fast_config(),
    );

    let err = orchestrator
        .create_and_verify(&switch_spec())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RealizationError::UnexpectedStatus {
            status: StatusCode::FORBIDDEN,
            id: None,
            ..
        }
    ));
    let requests = server.manager.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
}

#[tokio::test]
async fn test_unreachable_manager_is_a_transport_error() {
    let server = TestServer::spawn().await;
    let addr = server.addr;
    drop(server);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = NsxClient::new(NsxClientConfig::new(
        format!("http://{}", addr),
        common::USERNAME,
        common::PASSWORD,
    ))
    .unwrap();
    let orchestrator = RealizationOrchestrator::new(Arc::new(client), fast_config());

    let err = orchestrator
        .create_and_verify(&switch_spec())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RealizationError::Transport {
            source: TransportError::Request(_),
            ..
        }
    ));
    assert!(err.resource_id().is_none());
}

#[tokio::test]
async fn test_switch_realizes_after_pending_states() {
    let server = TestServer::spawn().await;
    server.manager.script_states([
        StateReply::state("pending"),
        StateReply::state("in_progress"),
        StateReply::state("partial_success"),
        StateReply::state("success"),
    ]);

    let verified = orchestrator(&server, fast_config())
        .create_and_verify(&switch_spec())
        .await
        .unwrap();

    let id = verified.handle.id.clone();
    match verified.verification {
        Verification::Realized { polls, .. } => assert_eq!(polls, 4),
        Verification::Skipped => panic!("verification was skipped"),
    }
    let state_path = format!("/api/v1/logical-switches/{}/state", id);
    assert_eq!(server.manager.requests_to("GET", &state_path).len(), 4);
    assert!(server.manager.switch(&id).is_some());
}

#[tokio::test]
async fn test_failure_code_rolls_back_switch() {
    let server = TestServer::spawn().await;
    server.manager.script_states([
        StateReply::state("in_progress"),
        StateReply::State(LogicalSwitchState::failed(5, "transport zone unavailable")),
    ]);

    let err = orchestrator(&server, fast_config())
        .create_and_verify(&switch_spec())
        .await
        .unwrap_err();

    let id = err.resource_id().unwrap().to_string();
    assert!(matches!(
        err,
        RealizationError::Failed {
            code: 5,
            state: RealizationState::Failed,
            ..
        }
    ));
    assert!(err.to_string().contains("transport zone unavailable"));
    assert!(server.manager.switch(&id).is_none());

    let path = format!("/api/v1/logical-switches/{}", id);
    let deletes = server.manager.requests_to("DELETE", &path);
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].query.as_deref(), Some("cascade=false&detach=false"));
}

#[tokio::test]
async fn test_undecodable_state_body_rolls_back() {
    let server = TestServer::spawn().await;
    server.manager.script_states([StateReply::Garbage]);

    let err = orchestrator(&server, fast_config())
        .create_and_verify(&switch_spec())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RealizationError::StateQuery {
            source: TransportError::Decode(_),
            ..
        }
    ));
    assert!(server.manager.switch(err.resource_id().unwrap()).is_none());
}

#[tokio::test]
async fn test_state_query_error_status_rolls_back() {
    let server = TestServer::spawn().await;
    server
        .manager
        .script_states([StateReply::Status(StatusCode::INTERNAL_SERVER_ERROR)]);

    let err = orchestrator(&server, fast_config())
        .create_and_verify(&switch_spec())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RealizationError::StateQueryStatus {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            ..
        }
    ));
    assert!(server.manager.switch(err.resource_id().unwrap()).is_none());
}

#[tokio::test]
async fn test_timeout_rolls_back_and_reports_last_state() {
    let server = TestServer::spawn().await;
    server.manager.set_fallback(StateReply::state("in_progress"));
    let config = RealizationConfig::new(Duration::from_millis(150))
        .with_initial_delay(Duration::from_millis(5))
        .with_min_interval(Duration::from_millis(10));

    let err = orchestrator(&server, config)
        .create_and_verify(&switch_spec())
        .await
        .unwrap_err();

    match &err {
        RealizationError::Timeout {
            last_state,
            timeout,
            ..
        } => {
            assert_eq!(*last_state, Some(RealizationState::InProgress));
            assert_eq!(*timeout, Duration::from_millis(150));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(server.manager.switch(err.resource_id().unwrap()).is_none());
}

#[tokio::test]
async fn test_failed_rollback_warns_about_orphan() {
    let server = TestServer::spawn().await;
    server.manager.script_states([StateReply::state("error")]);
    server
        .manager
        .fail_deletes_with(StatusCode::SERVICE_UNAVAILABLE);

    let err = orchestrator(&server, fast_config())
        .create_and_verify(&switch_spec())
        .await
        .unwrap_err();

    assert!(err.orphan_may_remain());
    let id = err.resource_id().unwrap().to_string();
    assert!(server.manager.switch(&id).is_some());

    let message = err.to_string();
    assert!(message.contains("WARNING"));
    assert!(message.contains(&id));
    assert!(message.contains("503"));
}

#[tokio::test]
async fn test_rejected_create_surfaces_status() {
    let server = TestServer::spawn().await;
    server.manager.fail_creates_with(StatusCode::BAD_REQUEST);

    let err = orchestrator(&server, fast_config())
        .create_and_verify(&switch_spec())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RealizationError::UnexpectedStatus {
            status: StatusCode::BAD_REQUEST,
            ..
        }
    ));
    assert!(server.manager.requests().iter().all(|r| r.method != "DELETE"));
}

#[tokio::test]
async fn test_switch_resource_lifecycle() {
    let server = TestServer::spawn().await;
    server.manager.script_states([StateReply::state("in_progress")]);
    let switches = LogicalSwitchResource::new(Arc::new(server.client()), fast_config());

    let mut switch = switches.create(&switch_spec()).await.unwrap();
    let id = switch.id.clone().unwrap();
    assert_eq!(switches.state(&id).await.unwrap().state, "success");

    switch.admin_state = AdminState::Down;
    let updated = switches.update(&id, &switch).await.unwrap();
    assert_eq!(updated.admin_state, AdminState::Down);

    let stale = switches.update(&id, &switch).await.unwrap_err();
    assert!(matches!(stale, ResourceError::RevisionConflict { .. }));

    switches
        .delete(
            &id,
            &DeleteOptions {
                cascade: true,
                detach: true,
            },
        )
        .await
        .unwrap();
    assert!(switches.read(&id).await.unwrap().is_none());
    assert!(matches!(
        switches.state(&id).await,
        Err(ResourceError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_port_resource_lifecycle() {
    let server = TestServer::spawn().await;
    let client: Arc<dyn ControlPlaneClient> = Arc::new(server.client());
    let switches = LogicalSwitchResource::new(client.clone(), fast_config());
    let ports = LogicalPortResource::new(client);

    let switch = switches.create(&switch_spec()).await.unwrap();
    let switch_id = switch.id.unwrap();

    let port = ports
        .create(&LogicalPort {
            display_name: Some("vm-1-eth0".to_string()),
            logical_switch_id: switch_id.clone(),
            ..Default::default()
        })
        .await
        .unwrap();
    let port_id = port.id.clone().unwrap();
    assert_eq!(server.manager.port(&port_id), Some(port.clone()));

    ports
        .delete(
            &port_id,
            &DeleteOptions {
                cascade: true,
                detach: true,
            },
        )
        .await
        .unwrap();
    let path = format!("/api/v1/logical-ports/{}", port_id);
    let deletes = server.manager.requests_to("DELETE", &path);
    assert_eq!(deletes[0].query.as_deref(), Some("detach=true"));
    assert!(ports.read(&port_id).await.unwrap().is_none());

    let err = ports
        .create(&LogicalPort {
            logical_switch_id: "ls-unknown".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ResourceError::UnexpectedStatus {
            status: StatusCode::BAD_REQUEST,
            ..
        }
    ));
}
