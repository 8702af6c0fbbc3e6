//! HTTP transport for the inventory REST API.
//!
//! `ApiRequest` describes one of the six operations the API supports;
//! `HttpTransport` sends it with reqwest and classifies the outcome.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use futures::future::BoxFuture;
use reqwest::{header, Client, Method};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::AuthGate;
use crate::models::{ResourceId, ResourceKind};
use crate::pagination::PageRequest;

use super::ApiError;

/// HTTP request timeout in seconds.
/// Keeps a stalled request from leaving a cache entry loading forever.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// One request against the inventory API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    fn new(method: Method, path: String) -> Self {
        Self {
            method,
            path,
            query: Vec::new(),
            body: None,
        }
    }

    fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// `GET /{resource}?pageNumber=&pageSize=`
    pub fn list(kind: ResourceKind, page: PageRequest) -> Self {
        let mut request = Self::new(Method::GET, format!("/{}", kind.path()));
        request.query = page.to_query();
        request
    }

    /// `GET /{resource}/{id}`
    pub fn get(kind: ResourceKind, id: &ResourceId) -> Self {
        Self::new(Method::GET, item_path(kind, id))
    }

    /// `POST /{resource}`
    pub fn create(kind: ResourceKind, body: Value) -> Self {
        Self::new(Method::POST, format!("/{}", kind.path())).with_body(body)
    }

    /// `PUT /{resource}/{id}` with the full entity.
    pub fn replace(kind: ResourceKind, id: &ResourceId, body: Value) -> Self {
        Self::new(Method::PUT, item_path(kind, id)).with_body(body)
    }

    /// `PATCH /{resource}/{id}` with only the changed fields.
    pub fn patch(kind: ResourceKind, id: &ResourceId, body: Value) -> Self {
        Self::new(Method::PATCH, item_path(kind, id)).with_body(body)
    }

    /// `DELETE /{resource}/{id}`
    pub fn delete(kind: ResourceKind, id: &ResourceId) -> Self {
        Self::new(Method::DELETE, item_path(kind, id))
    }
}

fn item_path(kind: ResourceKind, id: &ResourceId) -> String {
    format!("/{}/{}", kind.path(), id)
}

/// The seam between the cache layer and the network.
///
/// Returns the decoded JSON body (`Value::Null` for empty bodies) or a
/// classified error.
pub trait Transport: Send + Sync {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<Value, ApiError>>;
}

/// Transport over HTTPS using reqwest.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    gate: AuthGate,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration, gate: AuthGate) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            gate,
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Build the outgoing request, attaching the bearer token if the gate
    /// still holds a usable one.
    fn build(&self, request: &ApiRequest) -> reqwest::Result<reqwest::Request> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url_for(&request.path))
            .header(header::ACCEPT, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = self.gate.bearer(Utc::now()) {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        builder.build()
    }

    async fn execute(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let url = self.url_for(&request.path);
        let outgoing = self.build(&request)?;

        debug!(method = %request.method, url = %url, "Sending request");
        let response = self.client.execute(outgoing).await.map_err(|e| {
            warn!(method = %request.method, url = %url, error = %e, "Request failed");
            ApiError::from(e)
        })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            debug!(method = %request.method, url = %url, status = status.as_u16(), "Request rejected");
            return Err(ApiError::from_status(status.as_u16(), &text));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON from {}: {}", url, e)))
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<Value, ApiError>> {
        Box::pin(self.execute(request))
    }
}
