//! Batch input/output records and the closed set of operations.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

use crate::EngineError;

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// Every action the dispatcher knows how to perform.
///
/// The wire name is the camelCase variant name, e.g. `"createContact"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    CreateContact,
    UpdateContact,
    GetContact,
    ListContacts,
    AddAddress,
    UpdateAddress,
    DeleteAddress,

    CreateCatalog,
    UpdateCatalog,
    GetCatalog,
    ListCatalogs,
    AddVariant,

    CreateInvoice,
    GetInvoice,
    ListInvoices,
    CreateEstimate,
    GetEstimate,
    ListEstimates,
    CreateReceipt,
    GetReceipt,
    ListReceipts,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateContact => "createContact",
            Self::UpdateContact => "updateContact",
            Self::GetContact => "getContact",
            Self::ListContacts => "listContacts",
            Self::AddAddress => "addAddress",
            Self::UpdateAddress => "updateAddress",
            Self::DeleteAddress => "deleteAddress",
            Self::CreateCatalog => "createCatalog",
            Self::UpdateCatalog => "updateCatalog",
            Self::GetCatalog => "getCatalog",
            Self::ListCatalogs => "listCatalogs",
            Self::AddVariant => "addVariant",
            Self::CreateInvoice => "createInvoice",
            Self::GetInvoice => "getInvoice",
            Self::ListInvoices => "listInvoices",
            Self::CreateEstimate => "createEstimate",
            Self::GetEstimate => "getEstimate",
            Self::ListEstimates => "listEstimates",
            Self::CreateReceipt => "createReceipt",
            Self::GetReceipt => "getReceipt",
            Self::ListReceipts => "listReceipts",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Batch records
// ---------------------------------------------------------------------------

/// One unit of work: an operation plus its parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputItem {
    pub operation: Operation,
    #[serde(default)]
    pub params: Value,
}

impl InputItem {
    pub fn new(operation: Operation, params: Value) -> Self {
        Self { operation, params }
    }
}

/// One record per processed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputItem {
    pub json: Value,
}

impl OutputItem {
    /// Wrap the raw upstream response.
    pub fn success(json: Value) -> Self {
        Self { json }
    }

    /// Record a tolerated per-item failure.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            json: json!({ "error": message.into() }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.json.get("error").is_some()
    }
}

/// Which address array on a contact an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    Billing,
    Shipping,
}

impl AddressKind {
    /// Body key holding this kind's address array.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Billing => "billing_address",
            Self::Shipping => "shipping_address",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Billing => "billing",
            Self::Shipping => "shipping",
        }
    }
}

// ---------------------------------------------------------------------------
// Parameter parsing helpers
// ---------------------------------------------------------------------------

/// Typed parameters of one operation.
pub(crate) trait Params: DeserializeOwned {
    /// Every top-level key the operation accepts.
    const KEYS: &'static [&'static str];
}

/// Fail on the first top-level key not in `known`.
pub(crate) fn reject_unknown(params: &Value, known: &[&str]) -> Result<(), EngineError> {
    if let Value::Object(map) = params {
        if let Some(key) = map.keys().find(|k| !known.contains(&k.as_str())) {
            return Err(EngineError::validation(
                key.as_str(),
                format!("unknown parameter '{key}'"),
            ));
        }
    }
    Ok(())
}

/// Deserialize an item's `params` into a typed struct.
///
/// `null` params are treated as an empty object so operations whose fields
/// are all optional still parse. Unknown top-level keys are rejected.
pub(crate) fn parse_params<T: Params>(params: &Value) -> Result<T, EngineError> {
    reject_unknown(params, T::KEYS)?;
    let params = match params {
        Value::Null => Value::Object(Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(params).map_err(|e| EngineError::validation("params", e.to_string()))
}

/// Accept a finite number, a numeric string, or nothing.
pub(crate) fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => Some(
            s.trim()
                .parse::<f64>()
                .map_err(|_| D::Error::custom(format!("'{s}' is not a number")))?,
        ),
        Some(other) => return Err(D::Error::custom(format!("expected a number, got {other}"))),
    };
    match number {
        Some(n) if !n.is_finite() => Err(D::Error::custom(format!("'{n}' is not a finite number"))),
        other => Ok(other),
    }
}

/// Accept a non-negative integer id as a number or numeric string.
pub(crate) fn lenient_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("'{n}' is not a valid id"))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("'{s}' is not a valid id"))),
        Some(other) => Err(D::Error::custom(format!("expected an id, got {other}"))),
    }
}

/// Accept a string or a number as text. Blank strings become `None`.
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_owned())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!("expected text, got {other}"))),
    }
}

/// Require a positive id.
pub(crate) fn require_id(field: &str, value: Option<u64>) -> Result<u64, EngineError> {
    match value {
        Some(id) if id > 0 => Ok(id),
        _ => Err(EngineError::validation(field, format!("{field} must be a positive id"))),
    }
}

/// Require a non-blank string.
pub(crate) fn require_text(field: &str, value: Option<&str>) -> Result<String, EngineError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_owned()),
        _ => Err(EngineError::validation(field, format!("{field} is required"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "lenient_number")]
        price: Option<f64>,
        #[serde(default, deserialize_with = "lenient_id")]
        id: Option<u64>,
    }

    impl Params for Probe {
        const KEYS: &'static [&'static str] = &["price", "id"];
    }

    #[test]
    fn operation_uses_camel_case_wire_names() {
        let op: Operation = serde_json::from_value(json!("createContact")).unwrap();
        assert_eq!(op, Operation::CreateContact);
        assert_eq!(serde_json::to_value(Operation::ListReceipts).unwrap(), json!("listReceipts"));
        assert_eq!(Operation::AddVariant.to_string(), "addVariant");
        assert!(serde_json::from_value::<Operation>(json!("deleteEverything")).is_err());
    }

    #[test]
    fn numbers_may_arrive_as_strings() {
        let p: Probe = parse_params(&json!({ "price": "12.5", "id": "42" })).unwrap();
        assert_eq!(p.price, Some(12.5));
        assert_eq!(p.id, Some(42));

        let p: Probe = parse_params(&Value::Null).unwrap();
        assert_eq!(p.price, None);
        assert_eq!(p.id, None);

        let err = parse_params::<Probe>(&json!({ "price": "abc" })).err().unwrap();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        for bad in ["NaN", "inf", "-infinity"] {
            let err = parse_params::<Probe>(&json!({ "price": bad })).err().unwrap();
            assert!(matches!(err, EngineError::Validation { ref field, .. } if field == "params"));
        }
    }

    #[test]
    fn unknown_top_level_keys_are_named() {
        let err = parse_params::<Probe>(&json!({ "price": 1, "colour": "red" })).err().unwrap();
        match err {
            EngineError::Validation { field, message } => {
                assert_eq!(field, "colour");
                assert_eq!(message, "unknown parameter 'colour'");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn zero_id_is_rejected() {
        assert!(require_id("contactId", Some(0)).is_err());
        assert!(require_id("contactId", None).is_err());
        assert_eq!(require_id("contactId", Some(9)).unwrap(), 9);
    }

    #[test]
    fn output_error_record_shape() {
        let out = OutputItem::error("boom");
        assert_eq!(out.json, json!({ "error": "boom" }));
        assert!(out.is_error());
        assert!(!OutputItem::success(json!({ "status": 200 })).is_error());
    }
}
