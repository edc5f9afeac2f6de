//! The `HttpTransport` trait, the only way the engine reaches the network.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::ClientError;

/// HTTP verbs used against the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
        }
    }
}

/// A fully built request, ready to hand to a transport.
///
/// Built fresh per item; nothing in it is shared with other requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSpec {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Query pairs in insertion order.
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestSpec {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Value of a query key, if present.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Join `base` and `path` and check that the result parses as a URL.
pub fn endpoint(base: &str, path: &str) -> Result<String, ClientError> {
    let joined = format!("{}{}", base.trim_end_matches('/'), path);
    url::Url::parse(&joined).map_err(|e| ClientError::InvalidUrl(format!("{joined}: {e}")))?;
    Ok(joined)
}

/// Status plus parsed JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The error text the API put in the body, if any.
    pub fn error_message(&self) -> Option<String> {
        ["errorMessage", "message", "error"]
            .iter()
            .find_map(|key| self.body.get(*key).and_then(Value::as_str))
            .filter(|msg| !msg.is_empty())
            .map(str::to_owned)
    }

    /// Return the body on a 2xx status, otherwise an `Upstream` error.
    pub fn into_success(self) -> Result<Value, ClientError> {
        if self.is_success() {
            return Ok(self.body);
        }
        let message = self
            .error_message()
            .unwrap_or_else(|| format!("request failed with status {}", self.status));
        Err(ClientError::Upstream {
            status: self.status,
            message,
        })
    }
}

/// Performs one HTTP round trip.
///
/// Implementations own timeouts and connection reuse; the engine never
/// retries, so one call here is one attempt.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send `request` and return the status with the parsed JSON body.
    async fn send(&self, request: &RequestSpec) -> Result<HttpResponse, ClientError>;
}
