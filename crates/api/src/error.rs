//! API error type and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// A signing secret is configured but the request carried no signature.
    #[error("missing signature header")]
    MissingSignature,

    /// The signature did not match the body.
    #[error("signature mismatch")]
    BadSignature,

    /// The body was not a JSON object with an `event` field.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The event name is not one this receiver knows.
    #[error("unknown event '{0}'")]
    UnknownEvent(String),

    /// Binding or serving failed.
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingSignature | Self::BadSignature => StatusCode::UNAUTHORIZED,
            Self::InvalidPayload(_) | Self::UnknownEvent(_) => StatusCode::BAD_REQUEST,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
