//! Option providers: small lists of valid values for UI-bound parameters.
//!
//! Each load logs in, performs one GET and maps the rows to
//! [`OptionItem`]s. Failures degrade to an empty list so the caller can fall
//! back to free-text input, unless the provider was told to propagate them.

use serde::Serialize;
use serde_json::Value;
use tracing::{instrument, warn};

use client::{login, Credentials, HttpMethod, HttpTransport};

use crate::context::{entity_data, RequestContext, DEFAULT_API_PREFIX};
use crate::models::AddressKind;
use crate::transforms::{address_label, value_as_text, AccountRef};
use crate::EngineError;

/// One selectable choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionItem {
    pub name: String,
    pub value: String,
}

impl OptionItem {
    fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Which list to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionSource {
    /// Addresses of one kind on a contact; value is the array position.
    ContactAddresses { contact_id: u64, kind: AddressKind },
    /// Variants of a catalog item; value is the variant id.
    CatalogVariants { catalog_id: u64 },
    /// Chart of accounts; value is an encoded [`AccountRef`].
    ChartOfAccounts,
    /// Configured payment modes; value is the mode name.
    PaymentModes,
}

impl OptionSource {
    fn path(&self) -> String {
        match self {
            Self::ContactAddresses { contact_id, .. } => format!("/contact/{contact_id}"),
            Self::CatalogVariants { catalog_id } => format!("/catalog/{catalog_id}"),
            Self::ChartOfAccounts => "/coa".to_owned(),
            Self::PaymentModes => "/settings/paymentsmode".to_owned(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::ContactAddresses { .. } => "contact_addresses",
            Self::CatalogVariants { .. } => "catalog_variants",
            Self::ChartOfAccounts => "chart_of_accounts",
            Self::PaymentModes => "payment_modes",
        }
    }

    /// Turn the response body into options.
    fn map(&self, body: &Value) -> Vec<OptionItem> {
        let data = body.get("data").unwrap_or(&Value::Null);
        let entity = entity_data(body);
        match self {
            Self::ContactAddresses { kind, .. } => rows(entity.and_then(|e| e.get(kind.field())))
                .iter()
                .enumerate()
                .map(|(position, address)| {
                    OptionItem::new(address_label(address), position.to_string())
                })
                .collect(),
            Self::CatalogVariants { .. } => rows(entity.and_then(|e| e.get("variants")))
                .iter()
                .filter_map(|variant| {
                    let id = variant.get("id").and_then(value_as_text)?;
                    let name = variant
                        .get("name")
                        .and_then(value_as_text)
                        .unwrap_or_else(|| format!("Variant {id}"));
                    let label = match variant.get("sku").and_then(value_as_text) {
                        Some(sku) if !sku.is_empty() => format!("{name} ({sku})"),
                        _ => name,
                    };
                    Some(OptionItem::new(label, id))
                })
                .collect(),
            Self::ChartOfAccounts => rows(Some(data))
                .iter()
                .filter_map(|row| {
                    let account = AccountRef {
                        id: row.get("id").and_then(Value::as_u64)?,
                        name: row.get("name").and_then(value_as_text)?,
                        group: row.get("group").and_then(value_as_text).unwrap_or_default(),
                    };
                    Some(OptionItem::new(account.name.clone(), account.encode()))
                })
                .collect(),
            Self::PaymentModes => rows(Some(data))
                .iter()
                .filter_map(|row| row.get("name").and_then(value_as_text))
                .filter(|name| !name.is_empty())
                .map(|name| OptionItem::new(name.clone(), name))
                .collect(),
        }
    }
}

fn rows(value: Option<&Value>) -> &[Value] {
    match value {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

/// Loads option lists. Each load is an independent login plus one read.
pub struct OptionProvider<T> {
    transport: T,
    credentials: Credentials,
    api_prefix: String,
    propagate_errors: bool,
}

impl<T: HttpTransport> OptionProvider<T> {
    pub fn new(transport: T, credentials: Credentials) -> Self {
        Self {
            transport,
            credentials,
            api_prefix: DEFAULT_API_PREFIX.to_owned(),
            propagate_errors: false,
        }
    }

    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    /// Return errors from [`load`](Self::load) instead of an empty list.
    pub fn propagate_errors(mut self, propagate: bool) -> Self {
        self.propagate_errors = propagate;
        self
    }

    /// Load one list. With error propagation off this never fails.
    #[instrument(skip_all, fields(source = source.name()))]
    pub async fn load(&self, source: OptionSource) -> Result<Vec<OptionItem>, EngineError> {
        match self.fetch(source).await {
            Ok(options) => Ok(options),
            Err(e) if !self.propagate_errors => {
                warn!(kind = e.kind(), "option lookup failed, returning empty list: {e}");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch(&self, source: OptionSource) -> Result<Vec<OptionItem>, EngineError> {
        let session = login(&self.transport, &self.credentials).await?;
        let ctx = RequestContext {
            transport: &self.transport,
            credentials: &self.credentials,
            session: &session,
            api_prefix: &self.api_prefix,
        };
        let request = ctx.request(HttpMethod::Get, &source.path())?;
        let body = ctx.send(&request).await?;
        Ok(source.map(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client::mock::{MockReply, MockTransport};
    use serde_json::json;

    fn creds() -> Credentials {
        Credentials::new("key", "owner@acme.in", "pw", "https://api.test")
    }

    fn logged_in() -> MockTransport {
        MockTransport::new().on(
            HttpMethod::Post,
            "/login",
            MockReply::json(200, json!({ "status": 200, "api_token": "tok" })),
        )
    }

    #[tokio::test]
    async fn contact_addresses_are_labelled_by_position() {
        let transport = logged_in().on(
            HttpMethod::Get,
            "/v3/contact/5",
            MockReply::json(200, json!({ "status": 200, "data": {
                "billing_address": [
                    { "address1": "12 MG Road", "city": "Bengaluru" },
                    { "address1": "4 Park St", "city": "Kolkata", "pincode": "700016" }
                ]
            }})),
        );
        let provider = OptionProvider::new(transport.clone(), creds());
        let options = provider
            .load(OptionSource::ContactAddresses { contact_id: 5, kind: AddressKind::Billing })
            .await
            .unwrap();
        assert_eq!(
            options,
            vec![
                OptionItem::new("12 MG Road, Bengaluru", "0"),
                OptionItem::new("4 Park St, Kolkata, 700016", "1"),
            ]
        );
        assert_eq!(transport.call_count(), 2);
        assert_eq!(transport.calls()[1].headers["api-token"], "tok");
    }

    #[tokio::test]
    async fn variants_include_sku_in_label() {
        let transport = logged_in().on(
            HttpMethod::Get,
            "/v3/catalog/9",
            MockReply::json(200, json!({ "data": { "variants": [
                { "id": 31, "name": "Small", "sku": "W-S" },
                { "id": 32, "name": "Large" },
                { "name": "no id" }
            ]}})),
        );
        let options = OptionProvider::new(transport, creds())
            .load(OptionSource::CatalogVariants { catalog_id: 9 })
            .await
            .unwrap();
        assert_eq!(
            options,
            vec![OptionItem::new("Small (W-S)", "31"), OptionItem::new("Large", "32")]
        );
    }

    #[tokio::test]
    async fn entity_wrapped_in_an_array_still_yields_options() {
        let transport = logged_in()
            .on(
                HttpMethod::Get,
                "/v3/contact/5",
                MockReply::json(200, json!({ "data": [{
                    "shipping_address": [{ "address1": "4 Park St", "city": "Kolkata" }]
                }]})),
            )
            .on(
                HttpMethod::Get,
                "/v3/catalog/9",
                MockReply::json(200, json!({ "data": [{ "variants": [{ "id": 31, "name": "Small" }] }] })),
            );

        let addresses = OptionProvider::new(transport.clone(), creds())
            .load(OptionSource::ContactAddresses { contact_id: 5, kind: AddressKind::Shipping })
            .await
            .unwrap();
        assert_eq!(addresses, vec![OptionItem::new("4 Park St, Kolkata", "0")]);

        let variants = OptionProvider::new(transport, creds())
            .load(OptionSource::CatalogVariants { catalog_id: 9 })
            .await
            .unwrap();
        assert_eq!(variants, vec![OptionItem::new("Small", "31")]);
    }

    #[tokio::test]
    async fn accounts_encode_a_compound_reference() {
        let transport = logged_in().on(
            HttpMethod::Get,
            "/v3/coa",
            MockReply::json(200, json!({ "data": [
                { "id": 41, "name": "HDFC Current", "group": "bank" }
            ]})),
        );
        let options = OptionProvider::new(transport, creds())
            .load(OptionSource::ChartOfAccounts)
            .await
            .unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].name, "HDFC Current");
        let account = AccountRef::parse(&options[0].value).unwrap();
        assert_eq!(account.id, 41);
        assert_eq!(account.group, "bank");
    }

    #[tokio::test]
    async fn payment_modes_use_the_name_as_value() {
        let transport = logged_in().on(
            HttpMethod::Get,
            "/v3/settings/paymentsmode",
            MockReply::json(200, json!({ "data": [{ "name": "Cash" }, { "name": "UPI" }, { "name": "" }] })),
        );
        let options = OptionProvider::new(transport, creds())
            .load(OptionSource::PaymentModes)
            .await
            .unwrap();
        assert_eq!(options, vec![OptionItem::new("Cash", "Cash"), OptionItem::new("UPI", "UPI")]);
    }

    #[tokio::test]
    async fn failures_degrade_to_an_empty_list() {
        let transport = logged_in().on(
            HttpMethod::Get,
            "/v3/coa",
            MockReply::json(500, json!({ "errorMessage": "down" })),
        );
        let options = OptionProvider::new(transport, creds())
            .load(OptionSource::ChartOfAccounts)
            .await
            .unwrap();
        assert!(options.is_empty());
    }

    #[tokio::test]
    async fn failures_propagate_when_asked() {
        let transport = MockTransport::new().on(
            HttpMethod::Post,
            "/login",
            MockReply::json(401, json!({ "status": 401, "errorMessage": "bad key" })),
        );
        let err = OptionProvider::new(transport.clone(), creds())
            .propagate_errors(true)
            .load(OptionSource::PaymentModes)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "authentication");
        assert_eq!(transport.call_count(), 1);
    }
}
