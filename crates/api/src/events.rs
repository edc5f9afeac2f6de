//! Inbound webhook payloads and the event-tagged record they become.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::ApiError;

/// Events the accounting API can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventName {
    #[serde(rename = "contact.created")]
    ContactCreated,
    #[serde(rename = "contact.updated")]
    ContactUpdated,
    #[serde(rename = "catalog.created")]
    CatalogCreated,
    #[serde(rename = "catalog.updated")]
    CatalogUpdated,
    #[serde(rename = "invoice.created")]
    InvoiceCreated,
    #[serde(rename = "invoice.updated")]
    InvoiceUpdated,
    #[serde(rename = "estimate.created")]
    EstimateCreated,
    #[serde(rename = "receipt.created")]
    ReceiptCreated,
}

impl EventName {
    pub const ALL: [EventName; 8] = [
        Self::ContactCreated,
        Self::ContactUpdated,
        Self::CatalogCreated,
        Self::CatalogUpdated,
        Self::InvoiceCreated,
        Self::InvoiceUpdated,
        Self::EstimateCreated,
        Self::ReceiptCreated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContactCreated => "contact.created",
            Self::ContactUpdated => "contact.updated",
            Self::CatalogCreated => "catalog.created",
            Self::CatalogUpdated => "catalog.updated",
            Self::InvoiceCreated => "invoice.created",
            Self::InvoiceUpdated => "invoice.updated",
            Self::EstimateCreated => "estimate.created",
            Self::ReceiptCreated => "receipt.created",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == name)
    }

    /// Resource the event is about, e.g. `"invoice"`.
    pub fn resource(&self) -> &'static str {
        self.as_str().split('.').next().unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct InboundPayload {
    event: String,
    #[serde(default)]
    data: Value,
}

/// The reshaped record handed to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub event: EventName,
    pub resource: String,
    pub data: Value,
    pub received_at: DateTime<Utc>,
    pub signature_verified: bool,
}

impl WebhookEvent {
    /// Parse a raw body into a record.
    ///
    /// # Errors
    /// [`ApiError::InvalidPayload`] when the body is not `{event, data}`,
    /// [`ApiError::UnknownEvent`] when the event name is not recognised.
    pub fn from_body(body: &[u8], signature_verified: bool) -> Result<Self, ApiError> {
        let payload: InboundPayload =
            serde_json::from_slice(body).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;
        let event = EventName::parse(&payload.event)
            .ok_or_else(|| ApiError::UnknownEvent(payload.event.clone()))?;

        Ok(Self {
            id: Uuid::new_v4(),
            event,
            resource: event.resource().to_owned(),
            data: payload.data,
            received_at: Utc::now(),
            signature_verified,
        })
    }
}
