//! Operation registry.
//!
//! Every [`Operation`] maps to a validate step, [`prepare`], which turns raw
//! params into a [`Prepared`] value without touching the network, and an
//! execute step, [`Prepared::execute`], which builds the request(s) and sends
//! them. The `match` in `prepare` is exhaustive, so adding an operation
//! without wiring it up fails to compile.

pub mod catalog;
pub mod contact;
pub mod documents;

use client::HttpMethod;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::context::RequestContext;
use crate::models::{lenient_id, lenient_text, AddressKind, InputItem, Operation, Params};
use crate::EngineError;

pub use contact::AddressEdit;

/// Upper bound for `perPage` on list operations.
pub const MAX_PER_PAGE: u64 = 100;
/// Page size used when `perPage` is absent.
pub const DEFAULT_PER_PAGE: u64 = 25;

// ---------------------------------------------------------------------------
// RequestPlan
// ---------------------------------------------------------------------------

/// Method, path, query and body of a single request, before the context
/// adds the base URL and auth headers.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPlan {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestPlan {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Map<String, Value>) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(Value::Object(body)),
        }
    }

    pub fn put(path: impl Into<String>, body: Map<String, Value>) -> Self {
        Self {
            method: HttpMethod::Put,
            path: path.into(),
            query: Vec::new(),
            body: Some(Value::Object(body)),
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// Value of a query key, if present.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub async fn send(&self, ctx: &RequestContext<'_>) -> Result<Value, EngineError> {
        let mut request = ctx.request(self.method, &self.path)?;
        request.query = self.query.clone();
        request.body = self.body.clone();
        ctx.send(&request).await
    }
}

// ---------------------------------------------------------------------------
// Prepared
// ---------------------------------------------------------------------------

/// A validated operation, ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum Prepared {
    /// One request, one response.
    Single(RequestPlan),
    /// Read the contact, edit one address array, write it back.
    Address {
        contact_id: u64,
        kind: AddressKind,
        edit: AddressEdit,
    },
    /// Read the catalog item, append a variant, write the list back.
    Variant {
        catalog_id: u64,
        variant: Map<String, Value>,
    },
    /// Best-effort branch lookup, then create the receipt.
    Receipt {
        branch_id: u64,
        body: Map<String, Value>,
    },
}

impl Prepared {
    /// Run the request(s) and return the upstream response unchanged.
    pub async fn execute(self, ctx: &RequestContext<'_>) -> Result<Value, EngineError> {
        match self {
            Self::Single(plan) => plan.send(ctx).await,
            Self::Address {
                contact_id,
                kind,
                edit,
            } => contact::edit_address(ctx, contact_id, kind, edit).await,
            Self::Variant {
                catalog_id,
                variant,
            } => catalog::append_variant(ctx, catalog_id, variant).await,
            Self::Receipt { branch_id, body } => {
                documents::create_receipt(ctx, branch_id, body).await
            }
        }
    }
}

/// Validate an item and resolve it to a [`Prepared`] value.
///
/// # Errors
/// [`EngineError::Validation`] naming the offending field. No network call
/// happens here.
pub fn prepare(item: &InputItem) -> Result<Prepared, EngineError> {
    use documents::DocumentKind::{Estimate, Invoice, Receipt};

    let params = &item.params;
    match item.operation {
        Operation::CreateContact => contact::create(params),
        Operation::UpdateContact => contact::update(params),
        Operation::GetContact => contact::get(params),
        Operation::ListContacts => contact::list(params),
        Operation::AddAddress => contact::add_address(params),
        Operation::UpdateAddress => contact::update_address(params),
        Operation::DeleteAddress => contact::delete_address(params),

        Operation::CreateCatalog => catalog::create(params),
        Operation::UpdateCatalog => catalog::update(params),
        Operation::GetCatalog => catalog::get(params),
        Operation::ListCatalogs => catalog::list(params),
        Operation::AddVariant => catalog::add_variant(params),

        Operation::CreateInvoice => documents::create(Invoice, params),
        Operation::GetInvoice => documents::get(Invoice, params),
        Operation::ListInvoices => documents::list(Invoice, params),
        Operation::CreateEstimate => documents::create(Estimate, params),
        Operation::GetEstimate => documents::get(Estimate, params),
        Operation::ListEstimates => documents::list(Estimate, params),
        Operation::CreateReceipt => documents::create_receipt_plan(params),
        Operation::GetReceipt => documents::get(Receipt, params),
        Operation::ListReceipts => documents::list(Receipt, params),
    }
}

// ---------------------------------------------------------------------------
// Shared list paging
// ---------------------------------------------------------------------------

/// Paging and search knobs shared by the contact and catalog lists.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Paging {
    #[serde(default, deserialize_with = "lenient_id")]
    pub page: Option<u64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub per_page: Option<u64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub search_term: Option<String>,
}

impl Params for Paging {
    const KEYS: &'static [&'static str] = &["page", "perPage", "searchTerm"];
}

impl Paging {
    /// `page` and `perpage` pairs, validated.
    pub fn query(&self) -> Result<Vec<(String, String)>, EngineError> {
        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err(EngineError::validation("page", "page must be at least 1"));
        }
        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE);
        if per_page == 0 || per_page > MAX_PER_PAGE {
            return Err(EngineError::validation(
                "perPage",
                format!("perPage must be between 1 and {MAX_PER_PAGE}"),
            ));
        }
        Ok(vec![
            ("page".into(), page.to_string()),
            ("perpage".into(), per_page.to_string()),
        ])
    }

    /// Paging plus free-text search and the fixed newest-first sort.
    pub fn search_query(&self) -> Result<Vec<(String, String)>, EngineError> {
        let mut query = self.query()?;
        query.push((
            "search_term".into(),
            self.search_term.clone().unwrap_or_default(),
        ));
        query.push(("sort".into(), "desc".into()));
        query.push(("field".into(), "id".into()));
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn paging_defaults_and_bounds() {
        let paging = Paging::default();
        let query = paging.search_query().unwrap();
        assert_eq!(
            query,
            vec![
                ("page".to_string(), "1".to_string()),
                ("perpage".to_string(), "25".to_string()),
                ("search_term".to_string(), String::new()),
                ("sort".to_string(), "desc".to_string()),
                ("field".to_string(), "id".to_string()),
            ]
        );

        let too_big = Paging {
            per_page: Some(500),
            ..Paging::default()
        };
        assert!(too_big.query().is_err());
        let zero_page = Paging {
            page: Some(0),
            ..Paging::default()
        };
        assert!(zero_page.query().is_err());
    }

    #[test]
    fn every_get_uses_the_id_in_the_path() {
        let cases = [
            (Operation::GetContact, json!({ "contactId": 5 }), "/contact/5"),
            (Operation::GetCatalog, json!({ "catalogId": "6" }), "/catalog/6"),
            (Operation::GetInvoice, json!({ "invoiceId": 7 }), "/invoice/7"),
            (Operation::GetEstimate, json!({ "estimateId": 8 }), "/estimate/8"),
            (Operation::GetReceipt, json!({ "receiptId": 9 }), "/receipt/9"),
        ];
        for (op, params, path) in cases {
            match prepare(&InputItem::new(op, params)).unwrap() {
                Prepared::Single(plan) => {
                    assert_eq!(plan.method, HttpMethod::Get);
                    assert_eq!(plan.path, path);
                }
                other => panic!("{op}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn get_without_id_is_a_validation_error() {
        let err = prepare(&InputItem::new(Operation::GetInvoice, json!({}))).unwrap_err();
        assert!(matches!(err, EngineError::Validation { ref field, .. } if field == "invoiceId"));
    }
}
