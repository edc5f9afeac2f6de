use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use tracing::{info, warn};

use crate::events::WebhookEvent;
use crate::signature::{verify, SIGNATURE_HEADER};
use crate::{ApiError, AppState};

pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookEvent>), ApiError> {
    // 1. Check the signature against the raw body
    let signature_verified = match &state.signing_secret {
        Some(secret) => {
            let signature = headers
                .get(SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .ok_or(ApiError::MissingSignature)?;
            if !verify(secret.as_bytes(), &body, signature) {
                warn!("rejecting webhook with bad signature");
                return Err(ApiError::BadSignature);
            }
            true
        }
        None => {
            warn!("no webhook secret configured; accepting unsigned delivery");
            false
        }
    };

    // 2. Reshape into an event-tagged record
    let record = WebhookEvent::from_body(&body, signature_verified)?;
    info!(event = record.event.as_str(), id = %record.id, "webhook accepted");

    // 3. Hand off to the consumer
    if state.events.send(record.clone()).await.is_err() {
        warn!("event consumer has gone away; dropping record {}", record.id);
    }

    Ok((StatusCode::ACCEPTED, Json(record)))
}
