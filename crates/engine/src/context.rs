//! Per-batch request context: everything an operation needs to build and
//! send requests, injected explicitly instead of read from ambient state.

use client::{
    endpoint, Credentials, HttpMethod, HttpTransport, RequestSpec, Session, API_KEY_HEADER,
    API_TOKEN_HEADER,
};
use serde_json::Value;

use crate::EngineError;

/// Versioned path segment placed before every resource path.
pub const DEFAULT_API_PREFIX: &str = "/v3";

/// Borrowed view over the transport, credentials and session of one batch.
#[derive(Clone, Copy)]
pub struct RequestContext<'a> {
    pub transport: &'a dyn HttpTransport,
    pub credentials: &'a Credentials,
    pub session: &'a Session,
    pub api_prefix: &'a str,
}

impl<'a> RequestContext<'a> {
    /// Start a request to `path` with the auth headers already attached.
    pub fn request(&self, method: HttpMethod, path: &str) -> Result<RequestSpec, EngineError> {
        let url = endpoint(
            self.credentials.base_url(),
            &format!("{}{}", self.api_prefix, path),
        )?;
        Ok(RequestSpec::new(method, url)
            .header(API_KEY_HEADER, self.credentials.api_key.as_str())
            .header(API_TOKEN_HEADER, self.session.token())
            .header("content-type", "application/json"))
    }

    /// Send and return the body of a 2xx response.
    pub async fn send(&self, request: &RequestSpec) -> Result<Value, EngineError> {
        let response = self.transport.send(request).await?;
        Ok(response.into_success()?)
    }

    /// GET an entity and return its `data` object, or `NotFound` when the
    /// API reports nothing there.
    pub async fn fetch_entity(&self, path: &str, label: &str) -> Result<Value, EngineError> {
        let request = self.request(HttpMethod::Get, path)?;
        let body = self.send(&request).await?;
        entity_data(&body)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(label.to_owned()))
    }
}

/// The entity in a read response: `data` when it is a non-empty object,
/// otherwise the first object of a `data` array.
pub fn entity_data(body: &Value) -> Option<&Value> {
    let data = body.get("data")?;
    match data {
        Value::Object(map) if !map.is_empty() => Some(data),
        Value::Array(rows) => rows.first().filter(|row| row.is_object()),
        _ => None,
    }
}
