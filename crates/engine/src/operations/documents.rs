//! Financial documents: invoices, estimates and receipts.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{Paging, Prepared, RequestPlan};
use crate::context::RequestContext;
use crate::models::{
    lenient_id, lenient_number, lenient_text, parse_params, reject_unknown, require_id,
    require_text, Params,
};
use crate::transforms::{sanitize, AccountRef};
use crate::EngineError;

/// Accepted values for the `paymentStatus` list filter.
pub const PAYMENT_STATUSES: &[&str] = &["paid", "unpaid", "partially_paid"];

/// Which document endpoint an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Invoice,
    Estimate,
    Receipt,
}

impl DocumentKind {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Invoice => "/invoice",
            Self::Estimate => "/estimate",
            Self::Receipt => "/receipt",
        }
    }

    /// Name of the id parameter for get operations.
    pub fn id_param(&self) -> &'static str {
        match self {
            Self::Invoice => "invoiceId",
            Self::Estimate => "estimateId",
            Self::Receipt => "receiptId",
        }
    }

    /// Body key for the closing date of an invoice or estimate.
    fn due_key(&self) -> &'static str {
        match self {
            Self::Estimate => "expiry_date",
            _ => "due_date",
        }
    }
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| EngineError::validation(field, format!("{field} must be a YYYY-MM-DD date")))
}

// ---------------------------------------------------------------------------
// Get / list
// ---------------------------------------------------------------------------

pub(crate) fn get(kind: DocumentKind, params: &Value) -> Result<Prepared, EngineError> {
    reject_unknown(params, &[kind.id_param()])?;
    let id = match params.get(kind.id_param()) {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    let id = require_id(kind.id_param(), id)?;
    Ok(Prepared::Single(RequestPlan::get(format!("{}/{id}", kind.path()))))
}

/// Optional list filters, given next to the paging keys. Absent filters are
/// still sent, as empty strings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DocumentFilters {
    #[serde(default, deserialize_with = "lenient_text")]
    pub date_from: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub date_to: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub payment_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub contact_id: Option<u64>,
}

impl DocumentFilters {
    pub fn query(&self) -> Result<Vec<(String, String)>, EngineError> {
        match (&self.date_from, &self.date_to) {
            (Some(from), Some(to)) => {
                let from_date = parse_date("dateFrom", from)?;
                let to_date = parse_date("dateTo", to)?;
                if from_date > to_date {
                    return Err(EngineError::validation(
                        "dateFrom",
                        "dateFrom must not be after dateTo",
                    ));
                }
            }
            (None, None) => {}
            (Some(_), None) => {
                return Err(EngineError::validation(
                    "dateTo",
                    "dateFrom and dateTo must be given together",
                ))
            }
            (None, Some(_)) => {
                return Err(EngineError::validation(
                    "dateFrom",
                    "dateFrom and dateTo must be given together",
                ))
            }
        }
        if let Some(status) = &self.payment_status {
            if !PAYMENT_STATUSES.contains(&status.as_str()) {
                return Err(EngineError::validation(
                    "paymentStatus",
                    format!("paymentStatus must be one of {}", PAYMENT_STATUSES.join(", ")),
                ));
            }
        }

        Ok(vec![
            ("date_from".into(), self.date_from.clone().unwrap_or_default()),
            ("date_to".into(), self.date_to.clone().unwrap_or_default()),
            ("payment_status".into(), self.payment_status.clone().unwrap_or_default()),
            (
                "contact_id".into(),
                self.contact_id.map(|id| id.to_string()).unwrap_or_default(),
            ),
        ])
    }
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(flatten)]
    paging: Paging,
    #[serde(flatten)]
    filters: DocumentFilters,
}

impl Params for ListParams {
    const KEYS: &'static [&'static str] = &[
        "page",
        "perPage",
        "dateFrom",
        "dateTo",
        "paymentStatus",
        "contactId",
    ];
}

pub(crate) fn list(kind: DocumentKind, params: &Value) -> Result<Prepared, EngineError> {
    let params: ListParams = parse_params(params)?;
    let mut query = params.paging.query()?;
    query.extend(params.filters.query()?);
    Ok(Prepared::Single(RequestPlan::get(kind.path()).with_query(query)))
}

// ---------------------------------------------------------------------------
// Invoice / estimate create
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineItemParams {
    #[serde(default, deserialize_with = "lenient_id")]
    catalog_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_id")]
    variant_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_number")]
    quantity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    non_taxable: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    discount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    description: Option<String>,
}

impl LineItemParams {
    fn into_body(self, index: usize) -> Result<Value, EngineError> {
        let field = |name: &str| format!("lineItems[{index}].{name}");

        let catalog_id = require_id(&field("catalogId"), self.catalog_id)?;
        let variant_id = require_id(&field("variantId"), self.variant_id)?;
        let quantity = self
            .quantity
            .filter(|q| *q > 0.0 && q.is_finite())
            .ok_or_else(|| EngineError::validation(field("quantity"), "quantity must be greater than zero"))?;
        let rate = self
            .rate
            .filter(|r| *r >= 0.0 && r.is_finite())
            .ok_or_else(|| EngineError::validation(field("rate"), "rate must be zero or more"))?;
        let non_taxable = self.non_taxable.unwrap_or(0.0);
        if non_taxable < 0.0 {
            return Err(EngineError::validation(
                field("nonTaxable"),
                "nonTaxable must not be negative",
            ));
        }
        if rate < non_taxable {
            return Err(EngineError::validation(
                field("rate"),
                "Rate must not be less than the non-taxable amount",
            ));
        }
        let discount = self.discount.unwrap_or(0.0);
        if !(0.0..=100.0).contains(&discount) {
            return Err(EngineError::validation(
                field("discount"),
                "discount must be between 0 and 100",
            ));
        }

        let mut line = Map::new();
        line.insert("catalog_id".into(), Value::from(catalog_id));
        line.insert("variant_id".into(), Value::from(variant_id));
        line.insert("quantity".into(), Value::from(quantity));
        line.insert("rate".into(), Value::from(rate));
        line.insert("non_taxable".into(), Value::from(non_taxable));
        line.insert("discount".into(), Value::from(discount));
        if let Some(description) = self.description {
            line.insert("description".into(), Value::from(description));
        }
        Ok(Value::Object(line))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateParams {
    #[serde(default, deserialize_with = "lenient_id")]
    contact_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_text")]
    date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    due_date: Option<String>,
    #[serde(default)]
    line_items: Vec<LineItemParams>,
    #[serde(default)]
    additional_fields: Map<String, Value>,
}

impl Params for CreateParams {
    const KEYS: &'static [&'static str] =
        &["contactId", "date", "dueDate", "lineItems", "additionalFields"];
}

pub(crate) fn create(kind: DocumentKind, params: &Value) -> Result<Prepared, EngineError> {
    let params: CreateParams = parse_params(params)?;
    let contact_id = require_id("contactId", params.contact_id)?;
    let date_text = require_text("date", params.date.as_deref())?;
    let date = parse_date("date", &date_text)?;
    if let Some(due) = &params.due_date {
        if parse_date("dueDate", due)? < date {
            return Err(EngineError::validation("dueDate", "dueDate must not be before date"));
        }
    }
    if params.line_items.is_empty() {
        return Err(EngineError::validation(
            "lineItems",
            "at least one line item is required",
        ));
    }
    let items = params
        .line_items
        .into_iter()
        .enumerate()
        .map(|(i, line)| line.into_body(i))
        .collect::<Result<Vec<_>, _>>()?;

    let mut body = sanitize(params.additional_fields);
    body.insert("contact_id".into(), Value::from(contact_id));
    body.insert("date".into(), Value::from(date_text));
    if let Some(due) = params.due_date {
        body.insert(kind.due_key().into(), Value::from(due));
    }
    body.insert("items".into(), Value::Array(items));
    Ok(Prepared::Single(RequestPlan::post(kind.path(), body)))
}

// ---------------------------------------------------------------------------
// Receipt create
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptParams {
    #[serde(default, deserialize_with = "lenient_id")]
    contact_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_id")]
    branch_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_number")]
    amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    payment_mode: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    account: Option<String>,
    #[serde(default)]
    additional_fields: Map<String, Value>,
}

impl Params for ReceiptParams {
    const KEYS: &'static [&'static str] = &[
        "contactId",
        "branchId",
        "amount",
        "date",
        "paymentMode",
        "account",
        "additionalFields",
    ];
}

pub(crate) fn create_receipt_plan(params: &Value) -> Result<Prepared, EngineError> {
    let params: ReceiptParams = parse_params(params)?;
    let contact_id = require_id("contactId", params.contact_id)?;
    let branch_id = require_id("branchId", params.branch_id)?;
    let amount = params
        .amount
        .filter(|a| *a > 0.0 && a.is_finite())
        .ok_or_else(|| EngineError::validation("amount", "Amount must be a number greater than zero"))?;
    let date = require_text("date", params.date.as_deref())?;
    parse_date("date", &date)?;
    let payment_mode = require_text("paymentMode", params.payment_mode.as_deref())?;
    let account = AccountRef::parse(&require_text("account", params.account.as_deref())?)?;

    let mut body = sanitize(params.additional_fields);
    body.insert("contact_id".into(), Value::from(contact_id));
    body.insert("branch_id".into(), Value::from(branch_id));
    body.insert("amount".into(), Value::from(amount));
    body.insert("date".into(), Value::from(date));
    body.insert("payment_mode".into(), Value::from(payment_mode));
    account.apply(&mut body);

    Ok(Prepared::Receipt { branch_id, body })
}

/// Look up the branch (best effort), then create the receipt.
///
/// A failed lookup is logged and the `branch_details` field is left out; it
/// never fails the item.
pub(crate) async fn create_receipt(
    ctx: &RequestContext<'_>,
    branch_id: u64,
    mut body: Map<String, Value>,
) -> Result<Value, EngineError> {
    match ctx
        .fetch_entity(&format!("/business/branch/{branch_id}"), &format!("branch {branch_id}"))
        .await
    {
        Ok(branch) => {
            debug!(branch_id, "attached branch details");
            body.insert("branch_details".into(), branch);
        }
        Err(e) => warn!(branch_id, error = %e, "branch lookup failed; creating receipt without branch details"),
    }

    RequestPlan::post(DocumentKind::Receipt.path(), body)
        .send(ctx)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan(prepared: Prepared) -> RequestPlan {
        match prepared {
            Prepared::Single(plan) => plan,
            other => panic!("expected a single request, got {other:?}"),
        }
    }

    #[test]
    fn one_sided_date_range_is_rejected() {
        for filters in [json!({ "dateFrom": "2024-04-01" }), json!({ "dateTo": "2024-04-30" })] {
            let err = list(DocumentKind::Invoice, &filters).unwrap_err();
            assert_eq!(err.kind(), "validation");
        }
    }

    #[test]
    fn both_or_neither_dates_proceed() {
        let plan_both = plan(
            list(
                DocumentKind::Invoice,
                &json!({ "dateFrom": "2024-04-01", "dateTo": "2024-04-30" }),
            )
            .unwrap(),
        );
        assert_eq!(plan_both.query_value("date_from"), Some("2024-04-01"));
        assert_eq!(plan_both.query_value("date_to"), Some("2024-04-30"));

        let plan_none = plan(list(DocumentKind::Estimate, &json!({})).unwrap());
        assert_eq!(plan_none.path, "/estimate");
        assert_eq!(plan_none.query_value("date_from"), Some(""));
        assert_eq!(plan_none.query_value("date_to"), Some(""));
        assert_eq!(plan_none.query_value("payment_status"), Some(""));
        assert_eq!(plan_none.query_value("contact_id"), Some(""));
        assert_eq!(plan_none.query_value("page"), Some("1"));
    }

    #[test]
    fn reversed_range_and_bad_status_are_rejected() {
        assert!(list(
            DocumentKind::Receipt,
            &json!({ "dateFrom": "2024-05-01", "dateTo": "2024-04-01" })
        )
        .is_err());
        assert!(list(DocumentKind::Invoice, &json!({ "paymentStatus": "overdue" })).is_err());
        let plan = plan(
            list(
                DocumentKind::Invoice,
                &json!({ "perPage": 10, "paymentStatus": "paid", "contactId": 8 }),
            )
            .unwrap(),
        );
        assert_eq!(plan.query_value("payment_status"), Some("paid"));
        assert_eq!(plan.query_value("contact_id"), Some("8"));
        assert_eq!(plan.query_value("perpage"), Some("10"));
    }

    #[test]
    fn filters_outside_the_accepted_keys_are_rejected() {
        let err = list(DocumentKind::Invoice, &json!({ "filters": { "dateFrom": "2024-04-01" } }))
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation { ref field, .. } if field == "filters"));

        let err = list(DocumentKind::Receipt, &json!({ "searchTerm": "acme" })).unwrap_err();
        assert!(matches!(err, EngineError::Validation { ref field, .. } if field == "searchTerm"));

        let err = get(DocumentKind::Invoice, &json!({ "invoiceId": 4, "estimateId": 5 })).unwrap_err();
        assert!(matches!(err, EngineError::Validation { ref field, .. } if field == "estimateId"));
    }

    #[test]
    fn invoice_body_carries_line_items() {
        let plan = plan(
            create(
                DocumentKind::Invoice,
                &json!({
                    "contactId": 5,
                    "date": "2024-04-01",
                    "dueDate": "2024-04-15",
                    "lineItems": [
                        { "catalogId": 2, "variantId": 3, "quantity": 2, "rate": 100, "description": "Widget" }
                    ],
                    "additionalFields": { "reference": "PO-9", "notes": "" }
                }),
            )
            .unwrap(),
        );
        assert_eq!(plan.path, "/invoice");
        let body = plan.body.unwrap();
        assert_eq!(body["contact_id"], 5);
        assert_eq!(body["due_date"], "2024-04-15");
        assert_eq!(body["reference"], "PO-9");
        assert!(body.get("notes").is_none());
        assert_eq!(body["items"][0]["catalog_id"], 2);
        assert_eq!(body["items"][0]["quantity"], 2.0);
        assert_eq!(body["items"][0]["non_taxable"], 0.0);
    }

    #[test]
    fn estimate_uses_expiry_date() {
        let body = plan(
            create(
                DocumentKind::Estimate,
                &json!({
                    "contactId": 5, "date": "2024-04-01", "dueDate": "2024-05-01",
                    "lineItems": [{ "catalogId": 2, "variantId": 3, "quantity": 1, "rate": 10 }]
                }),
            )
            .unwrap(),
        )
        .body
        .unwrap();
        assert_eq!(body["expiry_date"], "2024-05-01");
        assert!(body.get("due_date").is_none());
    }

    #[test]
    fn line_item_rules_name_the_offending_field() {
        let base = |line: Value| {
            json!({ "contactId": 5, "date": "2024-04-01", "lineItems": [line] })
        };
        let cases = [
            (json!({ "variantId": 3, "quantity": 1, "rate": 10 }), "lineItems[0].catalogId"),
            (json!({ "catalogId": 2, "variantId": 3, "quantity": 0, "rate": 10 }), "lineItems[0].quantity"),
            (json!({ "catalogId": 2, "variantId": 3, "quantity": 1, "rate": 10, "nonTaxable": 20 }), "lineItems[0].rate"),
            (json!({ "catalogId": 2, "variantId": 3, "quantity": 1, "rate": 10, "discount": 120 }), "lineItems[0].discount"),
        ];
        for bad in ["NaN", "inf"] {
            let line = json!({ "catalogId": 2, "variantId": 3, "quantity": 1, "rate": 10, "nonTaxable": bad });
            assert!(matches!(
                create(DocumentKind::Invoice, &base(line)),
                Err(EngineError::Validation { .. })
            ));
        }
        for (line, expected) in cases {
            match create(DocumentKind::Invoice, &base(line)) {
                Err(EngineError::Validation { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected validation error on {expected}, got {other:?}"),
            }
        }
        assert!(create(DocumentKind::Invoice, &json!({ "contactId": 5, "date": "2024-04-01" })).is_err());
        assert!(create(
            DocumentKind::Invoice,
            &json!({ "contactId": 5, "date": "01/04/2024", "lineItems": [] })
        )
        .is_err());
    }

    #[test]
    fn receipt_normalises_the_account_reference() {
        let prepared = create_receipt_plan(&json!({
            "contactId": 5,
            "branchId": 2,
            "amount": "1500",
            "date": "2024-04-01",
            "paymentMode": "Bank Transfer",
            "account": "{\"id\": 41, \"name\": \"HDFC Current\", \"group\": \"bank\"}"
        }))
        .unwrap();
        let Prepared::Receipt { branch_id, body } = prepared else {
            panic!("expected a receipt plan");
        };
        assert_eq!(branch_id, 2);
        assert_eq!(body["account_id"], 41);
        assert_eq!(body["account_name"], "HDFC Current");
        assert_eq!(body["account_group"], "bank");
        assert_eq!(body["amount"], 1500.0);
    }

    #[test]
    fn receipt_requires_positive_amount_and_valid_account() {
        let base = json!({
            "contactId": 5, "branchId": 2, "date": "2024-04-01", "paymentMode": "Cash",
            "account": "{\"id\": 1, \"name\": \"Cash\"}"
        });
        let mut zero = base.clone();
        zero["amount"] = json!(0);
        assert!(matches!(
            create_receipt_plan(&zero),
            Err(EngineError::Validation { ref field, .. }) if field == "amount"
        ));

        let mut bad_account = base;
        bad_account["amount"] = json!(10);
        bad_account["account"] = json!("Cash");
        assert!(matches!(
            create_receipt_plan(&bad_account),
            Err(EngineError::Validation { ref field, .. }) if field == "account"
        ));
    }
}
