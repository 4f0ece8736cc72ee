//! Client for the NSX manager REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{ApiResponse, ControlPlaneClient, TransportError, is_valid_id};
use crate::model::{DeleteOptions, LogicalPort, LogicalSwitch, LogicalSwitchState};

const API_PREFIX: [&str; 2] = ["api", "v1"];
const SWITCHES: &str = "logical-switches";
const PORTS: &str = "logical-ports";

/// Connection settings for [`NsxClient`].
#[derive(Debug, Clone)]
pub struct NsxClientConfig {
    /// Manager base URL, e.g. `https://nsx.example.com`.
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Accept self-signed manager certificates.
    pub insecure: bool,
    pub request_timeout: Duration,
}

impl NsxClientConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            insecure: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Client for interacting with the NSX manager.
pub struct NsxClient {
    http: Client,
    base_url: Url,
    username: String,
    password: String,
}

impl NsxClient {
    pub fn new(config: NsxClientConfig) -> Result<Self, TransportError> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
            TransportError::InvalidRequest(format!("manager URL '{}': {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidRequest(format!(
                "manager URL '{}' cannot carry a path",
                config.base_url
            )));
        }

        let http = Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url,
            username: config.username,
            password: config.password,
        })
    }

    /// URL of `segments` below the API prefix. Each segment is
    /// percent-encoded on its own, so it can never add or drop path levels.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                TransportError::InvalidRequest(format!("{} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(API_PREFIX)
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(%method, %url, "Manager request");
        self.http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send_json<B, T>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<ApiResponse<T>, TransportError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let mut request = self.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        decode(response).await
    }

    async fn send_delete(
        &self,
        url: Url,
        query: &[(&str, bool)],
    ) -> Result<StatusCode, TransportError> {
        let response = self.request(Method::DELETE, url).query(query).send().await?;
        Ok(response.status())
    }
}

/// Reject identifiers that would not stay a single path segment.
fn checked_id(id: &str) -> Result<&str, TransportError> {
    if is_valid_id(id) {
        Ok(id)
    } else {
        Err(TransportError::InvalidRequest(format!(
            "invalid resource identifier '{}'",
            id
        )))
    }
}

/// Decode the body of a 2xx response; other statuses are returned without one.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<ApiResponse<T>, TransportError> {
    let status = response.status();
    if !status.is_success() {
        return Ok(ApiResponse::status_only(status));
    }

    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Ok(ApiResponse::status_only(status));
    }
    let body = serde_json::from_slice(&bytes)
        .map_err(|e| TransportError::Decode(format!("{} (status {})", e, status)))?;
    Ok(ApiResponse::new(status, Some(body)))
}

#[async_trait]
impl ControlPlaneClient for NsxClient {
    async fn create_logical_switch(
        &self,
        spec: &LogicalSwitch,
    ) -> Result<ApiResponse<LogicalSwitch>, TransportError> {
        let url = self.endpoint(&[SWITCHES])?;
        self.send_json(Method::POST, url, Some(spec)).await
    }

    async fn get_logical_switch(
        &self,
        id: &str,
    ) -> Result<ApiResponse<LogicalSwitch>, TransportError> {
        let url = self.endpoint(&[SWITCHES, checked_id(id)?])?;
        self.send_json::<(), _>(Method::GET, url, None).await
    }

    async fn update_logical_switch(
        &self,
        id: &str,
        spec: &LogicalSwitch,
    ) -> Result<ApiResponse<LogicalSwitch>, TransportError> {
        let url = self.endpoint(&[SWITCHES, checked_id(id)?])?;
        self.send_json(Method::PUT, url, Some(spec)).await
    }

    async fn delete_logical_switch(
        &self,
        id: &str,
        options: &DeleteOptions,
    ) -> Result<StatusCode, TransportError> {
        let url = self.endpoint(&[SWITCHES, checked_id(id)?])?;
        self.send_delete(
            url,
            &[("cascade", options.cascade), ("detach", options.detach)],
        )
        .await
    }

    async fn get_logical_switch_state(
        &self,
        id: &str,
    ) -> Result<ApiResponse<LogicalSwitchState>, TransportError> {
        let url = self.endpoint(&[SWITCHES, checked_id(id)?, "state"])?;
        self.send_json::<(), _>(Method::GET, url, None).await
    }

    async fn create_logical_port(
        &self,
        spec: &LogicalPort,
    ) -> Result<ApiResponse<LogicalPort>, TransportError> {
        let url = self.endpoint(&[PORTS])?;
        self.send_json(Method::POST, url, Some(spec)).await
    }

    async fn get_logical_port(&self, id: &str) -> Result<ApiResponse<LogicalPort>, TransportError> {
        let url = self.endpoint(&[PORTS, checked_id(id)?])?;
        self.send_json::<(), _>(Method::GET, url, None).await
    }

    async fn update_logical_port(
        &self,
        id: &str,
        spec: &LogicalPort,
    ) -> Result<ApiResponse<LogicalPort>, TransportError> {
        let url = self.endpoint(&[PORTS, checked_id(id)?])?;
        self.send_json(Method::PUT, url, Some(spec)).await
    }

    async fn delete_logical_port(
        &self,
        id: &str,
        options: &DeleteOptions,
    ) -> Result<StatusCode, TransportError> {
        let url = self.endpoint(&[PORTS, checked_id(id)?])?;
        self.send_delete(url, &[("detach", options.detach)]).await
    }
}
