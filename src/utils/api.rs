use async_trait::async_trait;
use reqwest::{header::HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Could not reach the server")]
    RequestNotSent,
    #[error("{}", status_message(.status, .message))]
    UnexpectedStatus {
        status: StatusCode,
        message: Option<String>,
    },
    #[error("Received an unreadable response from the server")]
    FailedToDecodeResponse,
}

fn status_message(status: &StatusCode, message: &Option<String>) -> String {
    message
        .clone()
        .unwrap_or_else(|| format!("Server responded with {}", status))
}

impl Error {
    /// Message the server attached to a failed response, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::UnexpectedStatus {
                message: Some(message),
                ..
            } => Some(message.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub route: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Request {
    pub fn get(route: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            route: route.into(),
            query: vec![],
            body: None,
        }
    }

    pub fn post(route: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            route: route.into(),
            query: vec![],
            body: Some(body),
        }
    }

    pub fn patch(route: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::PATCH,
            route: route.into(),
            query: vec![],
            body: Some(body),
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
}

/// Transport seam for every remote call the checkout makes.
///
/// Repositories only speak JSON through this trait so they can run against
/// the HTTP backend or an in-memory double.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Value, Error>;
}

pub async fn send<R: DeserializeOwned>(e: &dyn Executor, request: Request) -> Result<R, Error> {
    let route = request.route.clone();
    let data = e.execute(request).await?;

    serde_json::from_value::<R>(data).map_err(|err| {
        tracing::error!("Failed to decode response from {}: {}", route, err);
        Error::FailedToDecodeResponse
    })
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

fn extract_server_message(data: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(data)
        .ok()
        .and_then(|body| body.message.or(body.error))
}

#[derive(Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpExecutor {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| {
                tracing::error!("Failed to build http client: {}", err);
                Error::RequestNotSent
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.token {
            match format!("Bearer {}", token).try_into() {
                Ok(value) => {
                    headers.insert("Authorization", value);
                }
                Err(_) => tracing::warn!("Ignoring api token that is not a valid header value"),
            }
        }
        headers
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    async fn execute(&self, request: Request) -> Result<Value, Error> {
        let url = format!("{}/{}", self.base_url, request.route.trim_start_matches('/'));
        let mut req = self
            .client
            .request(request.method.clone(), url)
            .headers(self.headers());

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }

        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let res = req.send().await.map_err(|err| {
            tracing::error!("Failed to send {} {}: {}", request.method, request.route, err);
            Error::RequestNotSent
        })?;

        let status = res.status();

        let data = res.text().await.map_err(|err| {
            tracing::error!("Failed to read response of {}: {}", request.route, err);
            Error::FailedToDecodeResponse
        })?;

        tracing::trace!("Response received from {}: {}", request.route, data);

        if !status.is_success() {
            tracing::error!(
                "Got unexpected http response status {} from {}",
                status,
                request.route
            );
            return Err(Error::UnexpectedStatus {
                status,
                message: extract_server_message(&data),
            });
        }

        if data.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str::<Value>(&data).map_err(|err| {
            tracing::error!("Failed to decode response from {}: {}", request.route, err);
            Error::FailedToDecodeResponse
        })
    }
}
