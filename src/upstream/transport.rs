//! Transport seam between the upstream client and the network.
//!
//! [`ReqwestTransport`] is the production implementation; [`ScriptedTransport`]
//! replays canned outcomes for deterministic offline tests.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

/// One GET against the upstream feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub timeout: Duration,
}

impl UpstreamRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Failure below the HTTP status level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The attempt exceeded its deadline.
    #[error("{0}")]
    Timeout(String),

    /// Connection, TLS, protocol or body-read failure.
    #[error("{0}")]
    Connection(String),
}

#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    async fn get(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, TransportError>;
}

/// Production transport using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else {
        TransportError::Connection(e.to_string())
    }
}

#[async_trait]
impl UpstreamTransport for ReqwestTransport {
    async fn get(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        let response = self
            .client
            .get(&request.url)
            .query(&request.query)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify)?;
        Ok(UpstreamResponse { status, body })
    }
}

/// Replays a fixed script of outcomes, one per call.
///
/// Once the script runs out every call fails with a connection error.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<UpstreamResponse, TransportError>>>,
    requests: Mutex<Vec<UpstreamRequest>>,
}

impl ScriptedTransport {
    pub fn new(script: impl IntoIterator<Item = Result<UpstreamResponse, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, outcome: Result<UpstreamResponse, TransportError>) {
        self.script.lock().push_back(outcome);
    }

    /// Number of calls made so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> Option<UpstreamRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl UpstreamTransport for ScriptedTransport {
    async fn get(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        self.requests.lock().push(request.clone());
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connection("script exhausted".to_string())))
    }
}
