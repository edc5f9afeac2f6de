//! Credentials and the per-batch session token.

use serde::Deserialize;
use std::fmt;

/// Account credentials supplied for one invocation.
///
/// Never persisted. `Debug` redacts the secrets so the struct can sit inside
/// tracing fields without leaking them.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub api_key: String,
    pub email: String,
    pub password: String,
    pub api_url: String,
}

impl Credentials {
    pub fn new(
        api_key: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            email: email.into(),
            password: password.into(),
            api_url: api_url.into(),
        }
    }

    /// Base URL with any trailing `/` removed.
    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Short-lived token returned by the login call.
///
/// Lives for one batch and is shared read-only by every request in it.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Session(<redacted>)")
    }
}
