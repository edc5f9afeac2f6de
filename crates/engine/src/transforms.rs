//! Field-level transforms applied while building request bodies.
//!
//! All functions here are pure; they never touch the network.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::EngineError;

/// Dial code to ISO 3166 alpha-2 country code.
pub const DIAL_CODES: &[(&str, &str)] = &[
    ("+91", "in"),
    ("+1", "us"),
    ("+44", "gb"),
    ("+65", "sg"),
    ("+971", "ae"),
];

/// Used when a phone number arrives without a country code.
pub const DEFAULT_DIAL_CODE: &str = "+91";

/// Fields of one address object.
pub const ADDRESS_FIELDS: &[&str] = &["address1", "address2", "city", "state", "country", "pincode"];

static PAN_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").expect("PAN pattern is valid"));

// ---------------------------------------------------------------------------
// Generic helpers
// ---------------------------------------------------------------------------

/// Render a scalar as text. Numbers are accepted so `9999999999` and
/// `"9999999999"` behave the same.
pub fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Drop `null`, empty strings, empty arrays and empty objects.
pub fn sanitize(fields: Map<String, Value>) -> Map<String, Value> {
    fields.into_iter().filter(|(_, v)| !is_blank(v)).collect()
}

// ---------------------------------------------------------------------------
// Phone numbers
// ---------------------------------------------------------------------------

pub fn iso_for_dial_code(dial_code: &str) -> Option<&'static str> {
    let code = dial_code.trim();
    let code = if code.starts_with('+') {
        code.to_owned()
    } else {
        format!("+{code}")
    };
    DIAL_CODES
        .iter()
        .find(|(dial, _)| *dial == code)
        .map(|(_, iso)| *iso)
}

/// Turn a local number plus dial code into the API's `"<digits>|<iso>"` form.
pub fn format_phone(number: &str, dial_code: &str) -> Result<String, EngineError> {
    let digits: String = number
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    if digits.len() < 6 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(EngineError::validation(
            "mobile",
            "mobile must contain 6 to 15 digits",
        ));
    }
    let iso = iso_for_dial_code(dial_code).ok_or_else(|| {
        EngineError::validation(
            "mobile_country_code",
            format!("unsupported dial code '{dial_code}'"),
        )
    })?;
    Ok(format!("{digits}|{iso}"))
}

/// Inverse of [`format_phone`]: drop the `|<iso>` suffix.
pub fn strip_country_suffix(formatted: &str) -> &str {
    formatted.split('|').next().unwrap_or(formatted)
}

/// Format an optional mobile number. The dial code defaults to
/// [`DEFAULT_DIAL_CODE`].
pub fn phone_field(mobile: Option<&str>, dial_code: Option<&str>) -> Result<Option<String>, EngineError> {
    let dial_code = dial_code.filter(|c| !c.trim().is_empty()).unwrap_or(DEFAULT_DIAL_CODE);
    mobile
        .filter(|m| !m.trim().is_empty())
        .map(|m| format_phone(m, dial_code))
        .transpose()
}

// ---------------------------------------------------------------------------
// Tax identifiers
// ---------------------------------------------------------------------------

/// Extract the PAN embedded in a 15-character GSTIN (characters 2..12).
pub fn derive_pan(gstin: &str) -> Option<String> {
    let gstin = gstin.trim().to_ascii_uppercase();
    if gstin.len() != 15 || !gstin.is_ascii() {
        return None;
    }
    let candidate = &gstin[2..12];
    PAN_SHAPE.is_match(candidate).then(|| candidate.to_owned())
}

/// The PAN to send: the explicit one when given, otherwise one derived from
/// `gstin`. An explicit PAN is never overwritten.
pub fn resolve_pan(gstin: Option<&str>, pan: Option<&str>) -> Option<String> {
    match pan.map(str::trim).filter(|p| !p.is_empty()) {
        Some(explicit) => Some(explicit.to_owned()),
        None => gstin.and_then(derive_pan),
    }
}

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

/// Fold flat `billing_*` / `shipping_*` keys into `billing_address: [{...}]`.
pub fn nest_address_fields(fields: &mut Map<String, Value>) {
    for prefix in ["billing", "shipping"] {
        let mut address = Map::new();
        for name in ADDRESS_FIELDS {
            let key = format!("{prefix}_{name}");
            if let Some(value) = fields.remove(&key) {
                if !is_blank(&value) {
                    address.insert((*name).to_owned(), value);
                }
            }
        }
        if !address.is_empty() {
            fields.insert(
                format!("{prefix}_address"),
                Value::Array(vec![Value::Object(address)]),
            );
        }
    }
}

/// Merge `changes` into the address at `position`. Keys not in `changes`
/// keep their current value, so empty `changes` leaves the list unchanged.
pub fn merge_address(
    mut addresses: Vec<Value>,
    position: usize,
    changes: &Map<String, Value>,
    label: &str,
) -> Result<Vec<Value>, EngineError> {
    let slot = addresses
        .get_mut(position)
        .ok_or_else(|| EngineError::NotFound(format!("{label} at position {position}")))?;
    if let Value::Object(existing) = slot {
        for (key, value) in changes {
            existing.insert(key.clone(), value.clone());
        }
    } else {
        *slot = Value::Object(changes.clone());
    }
    Ok(addresses)
}

/// Remove the address at `position`.
pub fn remove_address(
    mut addresses: Vec<Value>,
    position: usize,
    label: &str,
) -> Result<Vec<Value>, EngineError> {
    if position >= addresses.len() {
        return Err(EngineError::NotFound(format!("{label} at position {position}")));
    }
    addresses.remove(position);
    Ok(addresses)
}

/// One-line label for an address object.
pub fn address_label(address: &Value) -> String {
    ["address1", "address2", "city", "state", "pincode"]
        .iter()
        .filter_map(|k| address.get(*k).and_then(value_as_text))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Chart-of-accounts references
// ---------------------------------------------------------------------------

/// Account selected from the chart of accounts, carried as a JSON string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRef {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub group: String,
}

impl AccountRef {
    pub fn parse(encoded: &str) -> Result<Self, EngineError> {
        let account: AccountRef = serde_json::from_str(encoded).map_err(|e| {
            EngineError::validation("account", format!("not a valid account reference: {e}"))
        })?;
        if account.id == 0 {
            return Err(EngineError::validation("account", "account id must be positive"));
        }
        Ok(account)
    }

    /// Encoding used for option values.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Write the component fields into a request body.
    pub fn apply(&self, body: &mut Map<String, Value>) {
        body.insert("account_id".into(), Value::from(self.id));
        body.insert("account_name".into(), Value::from(self.name.clone()));
        body.insert("account_group".into(), Value::from(self.group.clone()));
    }
}
