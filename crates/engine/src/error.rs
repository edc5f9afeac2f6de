//! Engine-level error types.

use client::ClientError;
use thiserror::Error;

/// Errors produced while validating, building or executing an operation.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Pre-flight errors ------

    /// Bad or missing user input; raised before any network call.
    #[error("invalid '{field}': {message}")]
    Validation {
        field: String,
        message: String,
    },

    // ------ Execution errors ------

    /// A referenced entity (contact, catalog item, address) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Login, transport or upstream failure from the client crate.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// An item failed and the batch was not configured to continue.
    #[error("item {index} failed: {source}")]
    ItemFailed {
        index: usize,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Coarse category used in logs and by callers that branch on failure type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::NotFound(_) => "not_found",
            Self::Client(ClientError::Authentication(_)) => "authentication",
            Self::Client(ClientError::Upstream { .. })
            | Self::Client(ClientError::MalformedResponse(_)) => "upstream",
            Self::Client(ClientError::Transport(_)) | Self::Client(ClientError::InvalidUrl(_)) => {
                "transport"
            }
            Self::ItemFailed { source, .. } => source.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_the_wrapped_error() {
        let err = EngineError::ItemFailed {
            index: 2,
            source: Box::new(EngineError::Client(ClientError::Upstream {
                status: 500,
                message: "boom".into(),
            })),
        };
        assert_eq!(err.kind(), "upstream");
        assert_eq!(err.to_string(), "item 2 failed: upstream error (status 500): boom");
        assert_eq!(EngineError::validation("price", "x").kind(), "validation");
    }
}
