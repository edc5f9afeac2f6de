//! Contact operations, including the address read-modify-write paths.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use super::{Paging, Prepared, RequestPlan};
use crate::context::RequestContext;
use crate::models::{
    lenient_id, lenient_text, parse_params, require_id, require_text, AddressKind, Params,
};
use crate::transforms::{
    merge_address, nest_address_fields, phone_field, remove_address, resolve_pan, sanitize,
    ADDRESS_FIELDS,
};
use crate::EngineError;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Optional contact fields. Keys the engine transforms are named; anything
/// else lands in `extra` and is passed through after sanitizing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactFields {
    #[serde(default, deserialize_with = "lenient_text")]
    pub contact_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub mobile: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub mobile_country_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub gstin: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub pan: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContactFields {
    /// Apply the contact transforms and produce the request body.
    pub fn into_body(self) -> Result<Map<String, Value>, EngineError> {
        let mut body = sanitize(self.extra);
        nest_address_fields(&mut body);

        if let Some(name) = self.contact_name {
            body.insert("contact_name".into(), Value::String(name));
        }
        if let Some(email) = self.email {
            if !email.contains('@') {
                return Err(EngineError::validation("email", "email must contain '@'"));
            }
            body.insert("email".into(), Value::String(email));
        }
        if let Some(mobile) = phone_field(
            self.mobile.as_deref(),
            self.mobile_country_code.as_deref(),
        )? {
            body.insert("mobile".into(), Value::String(mobile));
        }
        if let Some(pan) = resolve_pan(self.gstin.as_deref(), self.pan.as_deref()) {
            body.insert("pan".into(), Value::String(pan));
        }
        if let Some(gstin) = self.gstin {
            body.insert("gstin".into(), Value::String(gstin.to_ascii_uppercase()));
        }
        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateParams {
    #[serde(default, deserialize_with = "lenient_text")]
    contact_name: Option<String>,
    #[serde(default)]
    additional_fields: ContactFields,
}

impl Params for CreateParams {
    const KEYS: &'static [&'static str] = &["contactName", "additionalFields"];
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateParams {
    #[serde(default, deserialize_with = "lenient_id")]
    contact_id: Option<u64>,
    #[serde(default)]
    additional_fields: ContactFields,
}

impl Params for UpdateParams {
    const KEYS: &'static [&'static str] = &["contactId", "additionalFields"];
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdParams {
    #[serde(default, deserialize_with = "lenient_id")]
    contact_id: Option<u64>,
}

impl Params for IdParams {
    const KEYS: &'static [&'static str] = &["contactId"];
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddressParams {
    #[serde(default, deserialize_with = "lenient_id")]
    contact_id: Option<u64>,
    address_type: Option<AddressKind>,
    #[serde(default, deserialize_with = "lenient_id")]
    position: Option<u64>,
    #[serde(default)]
    address: Map<String, Value>,
}

impl Params for AddressParams {
    const KEYS: &'static [&'static str] = &["contactId", "addressType", "position", "address"];
}

impl AddressParams {
    fn contact_and_kind(&self) -> Result<(u64, AddressKind), EngineError> {
        let contact_id = require_id("contactId", self.contact_id)?;
        let kind = self.address_type.ok_or_else(|| {
            EngineError::validation("addressType", "addressType must be 'billing' or 'shipping'")
        })?;
        Ok((contact_id, kind))
    }

    fn position(&self) -> Result<usize, EngineError> {
        self.position
            .map(|p| p as usize)
            .ok_or_else(|| EngineError::validation("position", "position is required"))
    }

    /// Only the known address keys, blank values dropped.
    fn address_fields(&self) -> Result<Map<String, Value>, EngineError> {
        let fields = sanitize(self.address.clone());
        if let Some(unknown) = fields.keys().find(|k| !ADDRESS_FIELDS.contains(&k.as_str())) {
            return Err(EngineError::validation(
                format!("address.{unknown}"),
                format!("unknown address field '{unknown}'"),
            ));
        }
        Ok(fields)
    }
}

// ---------------------------------------------------------------------------
// Validate + build
// ---------------------------------------------------------------------------

pub(crate) fn create(params: &Value) -> Result<Prepared, EngineError> {
    let params: CreateParams = parse_params(params)?;
    let name = require_text("contactName", params.contact_name.as_deref())?;

    let mut fields = params.additional_fields;
    fields.contact_name = Some(name);
    Ok(Prepared::Single(RequestPlan::post("/contact", fields.into_body()?)))
}

pub(crate) fn update(params: &Value) -> Result<Prepared, EngineError> {
    let params: UpdateParams = parse_params(params)?;
    let id = require_id("contactId", params.contact_id)?;
    let body = params.additional_fields.into_body()?;
    Ok(Prepared::Single(RequestPlan::put(format!("/contact/{id}"), body)))
}

pub(crate) fn get(params: &Value) -> Result<Prepared, EngineError> {
    let params: IdParams = parse_params(params)?;
    let id = require_id("contactId", params.contact_id)?;
    Ok(Prepared::Single(RequestPlan::get(format!("/contact/{id}"))))
}

pub(crate) fn list(params: &Value) -> Result<Prepared, EngineError> {
    let paging: Paging = parse_params(params)?;
    Ok(Prepared::Single(
        RequestPlan::get("/contact").with_query(paging.search_query()?),
    ))
}

pub(crate) fn add_address(params: &Value) -> Result<Prepared, EngineError> {
    let params: AddressParams = parse_params(params)?;
    let (contact_id, kind) = params.contact_and_kind()?;
    let address = params.address_fields()?;
    require_text("address.address1", address.get("address1").and_then(Value::as_str))?;
    Ok(Prepared::Address {
        contact_id,
        kind,
        edit: AddressEdit::Append(address),
    })
}

pub(crate) fn update_address(params: &Value) -> Result<Prepared, EngineError> {
    let params: AddressParams = parse_params(params)?;
    let (contact_id, kind) = params.contact_and_kind()?;
    Ok(Prepared::Address {
        contact_id,
        kind,
        edit: AddressEdit::Merge {
            position: params.position()?,
            changes: params.address_fields()?,
        },
    })
}

pub(crate) fn delete_address(params: &Value) -> Result<Prepared, EngineError> {
    let params: AddressParams = parse_params(params)?;
    let (contact_id, kind) = params.contact_and_kind()?;
    Ok(Prepared::Address {
        contact_id,
        kind,
        edit: AddressEdit::Remove {
            position: params.position()?,
        },
    })
}

// ---------------------------------------------------------------------------
// Address read-modify-write
// ---------------------------------------------------------------------------

/// One change to a contact's address array.
#[derive(Debug, Clone, PartialEq)]
pub enum AddressEdit {
    Append(Map<String, Value>),
    Merge {
        position: usize,
        changes: Map<String, Value>,
    },
    Remove {
        position: usize,
    },
}

impl AddressEdit {
    /// Apply the edit to the array as read from the API.
    pub fn apply(&self, addresses: Vec<Value>, kind: AddressKind) -> Result<Vec<Value>, EngineError> {
        let label = format!("{} address", kind.as_str());
        match self {
            Self::Append(address) => {
                let mut addresses = addresses;
                addresses.push(Value::Object(address.clone()));
                Ok(addresses)
            }
            Self::Merge { position, changes } => merge_address(addresses, *position, changes, &label),
            Self::Remove { position } => remove_address(addresses, *position, &label),
        }
    }
}

/// GET the contact, edit one address array, PUT the whole array back.
///
/// No version check is made: if two writers race, the last PUT wins.
pub(crate) async fn edit_address(
    ctx: &RequestContext<'_>,
    contact_id: u64,
    kind: AddressKind,
    edit: AddressEdit,
) -> Result<Value, EngineError> {
    let contact = ctx
        .fetch_entity(&format!("/contact/{contact_id}"), &format!("contact {contact_id}"))
        .await?;

    let current = match contact.get(kind.field()) {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    let updated = edit.apply(current, kind)?;
    info!(contact_id, kind = kind.as_str(), count = updated.len(), "writing address list");

    let mut body = Map::new();
    body.insert(kind.field().into(), Value::Array(updated));
    RequestPlan::put(format!("/contact/{contact_id}"), body)
        .send(ctx)
        .await
}
