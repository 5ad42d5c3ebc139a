//! HTTP seam.
//!
//! The orchestrator only talks to a [`Transport`]. [`HttpTransport`] is the
//! real one: a blocking `ureq` agent run on tokio's blocking pool, with a
//! cookie store so the session survives between calls.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ControlError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: Method::Get, url: url.into(), query: Vec::new(), headers: Vec::new(), body: Body::Empty }
    }
    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self { method: Method::Post, url: url.into(), query: Vec::new(), headers: Vec::new(), body: Body::Json(body) }
    }
    pub fn post_form(url: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self { method: Method::Post, url: url.into(), query: Vec::new(), headers: Vec::new(), body: Body::Form(fields) }
    }
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
    pub fn queries(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }
    pub fn bearer(mut self, token: Option<&str>) -> Self {
        if let Some(token) = token {
            self.headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        self
    }
    /// Looks up a query parameter, mostly for tests and logging.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response>;

    /// Sends and parses a JSON body; non-2xx is an error.
    async fn fetch_json(&self, request: Request) -> Result<Value> {
        let url = request.url.clone();
        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(ControlError::Http { status: response.status, url });
        }
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        response.json()
    }
}

pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(timeout: Option<Duration>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(timeout)
            .http_status_as_error(false)
            .build();
        Self { agent: ureq::Agent::new_with_config(config) }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

fn execute(agent: &ureq::Agent, request: Request) -> Result<Response> {
    let failed = |e: ureq::Error| ControlError::Transport(format!("{} {}: {}", method_name(request.method), request.url, e));
    let mut response = match request.method {
        Method::Get => {
            let mut builder = agent.get(&request.url);
            for (k, v) in &request.query {
                builder = builder.query(k, v);
            }
            for (k, v) in &request.headers {
                builder = builder.header(k.as_str(), v.as_str());
            }
            builder.call().map_err(failed)?
        }
        Method::Post => {
            let mut builder = agent.post(&request.url);
            for (k, v) in &request.query {
                builder = builder.query(k, v);
            }
            for (k, v) in &request.headers {
                builder = builder.header(k.as_str(), v.as_str());
            }
            match &request.body {
                Body::Empty => builder.send_empty().map_err(failed)?,
                Body::Json(value) => {
                    let bytes = serde_json::to_vec(value)?;
                    builder.header("Content-Type", "application/json").send(&bytes[..]).map_err(failed)?
                }
                Body::Form(fields) => builder
                    .send_form(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                    .map_err(failed)?,
            }
        }
    };
    let status = response.status().as_u16();
    let body = response.body_mut().read_to_string().map_err(failed)?;
    Ok(Response { status, body })
}

fn method_name(method: Method) -> &'static str {
    match method {
        Method::Get => "GET",
        Method::Post => "POST",
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        let agent = self.agent.clone();
        let started = std::time::Instant::now();
        let label = format!("{} {}", method_name(request.method), request.url);
        let response = tokio::task::spawn_blocking(move || execute(&agent, request))
            .await
            .map_err(|e| {
                warn!(error = %e, "join error");
                ControlError::Transport(format!("join error: {e}"))
            })??;
        debug!(request = label.as_str(), status = response.status, ms = started.elapsed().as_secs_f64() * 1000.0, "http round trip");
        Ok(response)
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: Request) -> Result<Response> {
        (**self).send(request).await
    }
}
