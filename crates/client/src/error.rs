//! Wire-level error type.

use thiserror::Error;

/// Errors returned by a transport or by the authenticator.
///
/// The engine wraps these unchanged, so the variant tells a caller which
/// leg of the round trip failed:
/// - `Transport`: the request never produced a response.
/// - `Authentication`: the login call did not yield a session token.
/// - `Upstream`: the API answered with a non-success status.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClientError {
    /// Network-level failure (connect, TLS, body read).
    #[error("transport error: {0}")]
    Transport(String),

    /// Login failed; carries the upstream message when there was one.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The API answered outside the 2xx range.
    #[error("upstream error (status {status}): {message}")]
    Upstream { status: u16, message: String },

    /// The response body was not JSON.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The configured base URL plus path did not form a valid URL.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}
