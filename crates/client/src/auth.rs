//! Login call that turns credentials into a [`Session`].

use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::credentials::{Credentials, Session};
use crate::transport::{endpoint, HttpMethod, HttpTransport, RequestSpec};
use crate::ClientError;

/// Header carrying the account API key on every request.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Header carrying the session token on every request after login.
pub const API_TOKEN_HEADER: &str = "api-token";

/// Build the login request for `credentials`.
pub fn login_request(credentials: &Credentials) -> Result<RequestSpec, ClientError> {
    let url = endpoint(credentials.base_url(), "/login")?;
    Ok(RequestSpec::new(HttpMethod::Post, url)
        .header(API_KEY_HEADER, credentials.api_key.as_str())
        .header("content-type", "application/json")
        .json(json!({
            "email": credentials.email,
            "password": credentials.password,
        })))
}

/// Log in once. A single attempt; any failure is terminal.
///
/// # Errors
/// Always [`ClientError::Authentication`], carrying the upstream message when
/// the API supplied one.
#[instrument(skip_all, fields(email = %credentials.email))]
pub async fn login(
    transport: &dyn HttpTransport,
    credentials: &Credentials,
) -> Result<Session, ClientError> {
    let request = login_request(credentials).map_err(|e| ClientError::Authentication(e.to_string()))?;

    let response = transport
        .send(&request)
        .await
        .map_err(|e| ClientError::Authentication(e.to_string()))?;

    let body_status = response.body.get("status").and_then(Value::as_u64);
    let token = response
        .body
        .get("api_token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty());

    match token {
        Some(token) if response.status == 200 && body_status.map_or(true, |s| s == 200) => {
            info!("login succeeded");
            Ok(Session::new(token))
        }
        _ => Err(ClientError::Authentication(
            response
                .error_message()
                .unwrap_or_else(|| format!("login rejected with status {}", response.status)),
        )),
    }
}
