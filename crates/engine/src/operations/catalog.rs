//! Catalog operations and the variant-append read-modify-write.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use super::{Paging, Prepared, RequestPlan};
use crate::context::RequestContext;
use crate::models::{
    lenient_id, lenient_number, lenient_text, parse_params, require_id, require_text, Params,
};
use crate::transforms::{resolve_pan, sanitize};
use crate::EngineError;

/// Tax classifications accepted for `gst_rate`, in percent.
pub const GST_RATES: &[f64] = &[0.0, 0.1, 0.25, 1.0, 1.5, 3.0, 5.0, 6.0, 7.5, 12.0, 18.0, 28.0];

pub const PRICE_MESSAGE: &str = "Price must be a number greater than zero";
pub const NON_TAXABLE_MESSAGE: &str = "Rate must not be less than the non-taxable amount";

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Pricing and tax fields shared by catalog items and their variants.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pricing {
    #[serde(default, deserialize_with = "lenient_number")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub gst_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub non_taxable: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub sku: Option<String>,
}

impl Pricing {
    /// Check the pricing rules. `price_required` is false only for updates.
    fn validate(&self, price_required: bool) -> Result<(), EngineError> {
        match self.price {
            Some(p) if p > 0.0 && p.is_finite() => {}
            None if !price_required => {}
            _ => return Err(EngineError::validation("price", PRICE_MESSAGE)),
        }
        if let Some(rate) = self.gst_rate {
            if !GST_RATES.iter().any(|r| (r - rate).abs() < f64::EPSILON) {
                return Err(EngineError::validation(
                    "gst_rate",
                    format!("unsupported GST rate {rate}"),
                ));
            }
        }
        if let Some(non_taxable) = self.non_taxable {
            if non_taxable < 0.0 {
                return Err(EngineError::validation(
                    "non_taxable",
                    "non_taxable must not be negative",
                ));
            }
            if self.price.is_some_and(|p| p < non_taxable) {
                return Err(EngineError::validation("non_taxable", NON_TAXABLE_MESSAGE));
            }
        }
        Ok(())
    }

    /// Variant object as the API expects it.
    fn variant(&self, name: &str) -> Map<String, Value> {
        let mut variant = Map::new();
        variant.insert("name".into(), Value::from(name));
        if let Some(price) = self.price {
            variant.insert("price".into(), Value::from(price));
        }
        if let Some(sku) = &self.sku {
            variant.insert("sku".into(), Value::from(sku.as_str()));
        }
        if let Some(rate) = self.gst_rate {
            variant.insert("gst_rate".into(), Value::from(rate));
        }
        if let Some(non_taxable) = self.non_taxable {
            variant.insert("non_taxable".into(), Value::from(non_taxable));
        }
        variant
    }
}

/// Optional catalog fields plus passthrough keys.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogFields {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub item_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub gstin: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub pan: Option<String>,
    #[serde(flatten)]
    pub pricing: Pricing,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CatalogFields {
    fn into_body(self, price_required: bool) -> Result<Map<String, Value>, EngineError> {
        self.pricing.validate(price_required)?;

        let mut body = sanitize(self.extra);
        if let Some(item_type) = &self.item_type {
            if item_type != "product" && item_type != "service" {
                return Err(EngineError::validation(
                    "item_type",
                    "item_type must be 'product' or 'service'",
                ));
            }
        }
        if price_required {
            body.insert(
                "item_type".into(),
                Value::from(self.item_type.as_deref().unwrap_or("product")),
            );
        } else if let Some(item_type) = self.item_type {
            body.insert("item_type".into(), Value::from(item_type));
        }

        if let Some(pan) = resolve_pan(self.gstin.as_deref(), self.pan.as_deref()) {
            body.insert("pan".into(), Value::String(pan));
        }
        if let Some(gstin) = self.gstin {
            body.insert("gstin".into(), Value::String(gstin.to_ascii_uppercase()));
        }
        if let Some(price) = self.pricing.price {
            body.insert("price".into(), Value::from(price));
        }
        if let Some(name) = &self.name {
            body.insert("name".into(), Value::from(name.as_str()));
            if price_required {
                body.insert(
                    "variants".into(),
                    Value::Array(vec![Value::Object(self.pricing.variant(name))]),
                );
            }
        }
        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateParams {
    #[serde(default, deserialize_with = "lenient_text")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    price: Option<f64>,
    #[serde(default)]
    additional_fields: CatalogFields,
}

impl Params for CreateParams {
    const KEYS: &'static [&'static str] = &["name", "price", "additionalFields"];
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateParams {
    #[serde(default, deserialize_with = "lenient_id")]
    catalog_id: Option<u64>,
    #[serde(default)]
    additional_fields: CatalogFields,
}

impl Params for UpdateParams {
    const KEYS: &'static [&'static str] = &["catalogId", "additionalFields"];
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdParams {
    #[serde(default, deserialize_with = "lenient_id")]
    catalog_id: Option<u64>,
}

impl Params for IdParams {
    const KEYS: &'static [&'static str] = &["catalogId"];
}

#[derive(Debug, Default, Deserialize)]
struct VariantFields {
    #[serde(default, deserialize_with = "lenient_text")]
    name: Option<String>,
    #[serde(flatten)]
    pricing: Pricing,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariantParams {
    #[serde(default, deserialize_with = "lenient_id")]
    catalog_id: Option<u64>,
    #[serde(default)]
    variant: VariantFields,
}

impl Params for VariantParams {
    const KEYS: &'static [&'static str] = &["catalogId", "variant"];
}

// ---------------------------------------------------------------------------
// Validate + build
// ---------------------------------------------------------------------------

pub(crate) fn create(params: &Value) -> Result<Prepared, EngineError> {
    let params: CreateParams = parse_params(params)?;
    let name = require_text("name", params.name.as_deref())?;
    let price = params.price.filter(|p| *p > 0.0 && p.is_finite());
    let Some(price) = price else {
        return Err(EngineError::validation("price", PRICE_MESSAGE));
    };

    let mut fields = params.additional_fields;
    fields.name = Some(name);
    fields.pricing.price = Some(price);
    Ok(Prepared::Single(RequestPlan::post("/catalog", fields.into_body(true)?)))
}

pub(crate) fn update(params: &Value) -> Result<Prepared, EngineError> {
    let params: UpdateParams = parse_params(params)?;
    let id = require_id("catalogId", params.catalog_id)?;
    let body = params.additional_fields.into_body(false)?;
    Ok(Prepared::Single(RequestPlan::put(format!("/catalog/{id}"), body)))
}

pub(crate) fn get(params: &Value) -> Result<Prepared, EngineError> {
    let params: IdParams = parse_params(params)?;
    let id = require_id("catalogId", params.catalog_id)?;
    Ok(Prepared::Single(RequestPlan::get(format!("/catalog/{id}"))))
}

pub(crate) fn list(params: &Value) -> Result<Prepared, EngineError> {
    let paging: Paging = parse_params(params)?;
    Ok(Prepared::Single(
        RequestPlan::get("/catalog").with_query(paging.search_query()?),
    ))
}

pub(crate) fn add_variant(params: &Value) -> Result<Prepared, EngineError> {
    let params: VariantParams = parse_params(params)?;
    let catalog_id = require_id("catalogId", params.catalog_id)?;
    let name = require_text("variant.name", params.variant.name.as_deref())?;
    params.variant.pricing.validate(true)?;

    let mut variant = sanitize(params.variant.extra);
    variant.extend(params.variant.pricing.variant(&name));
    Ok(Prepared::Variant {
        catalog_id,
        variant,
    })
}

/// GET the catalog item, append `variant` to its list, PUT the list back.
pub(crate) async fn append_variant(
    ctx: &RequestContext<'_>,
    catalog_id: u64,
    variant: Map<String, Value>,
) -> Result<Value, EngineError> {
    let item = ctx
        .fetch_entity(&format!("/catalog/{catalog_id}"), &format!("catalog item {catalog_id}"))
        .await?;

    let mut variants = match item.get("variants") {
        Some(Value::Array(existing)) => existing.clone(),
        _ => Vec::new(),
    };
    variants.push(Value::Object(variant));
    info!(catalog_id, count = variants.len(), "writing variant list");

    let mut body = Map::new();
    body.insert("variants".into(), Value::Array(variants));
    RequestPlan::put(format!("/catalog/{catalog_id}"), body)
        .send(ctx)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use client::HttpMethod;
    use serde_json::json;

    fn body_of(prepared: Prepared) -> Value {
        match prepared {
            Prepared::Single(plan) => plan.body.unwrap_or(Value::Null),
            other => panic!("expected a single request, got {other:?}"),
        }
    }

    #[test]
    fn zero_price_is_rejected_with_exact_message() {
        let err = create(&json!({ "name": "Widget", "price": 0 })).unwrap_err();
        match err {
            EngineError::Validation { field, message } => {
                assert_eq!(field, "price");
                assert_eq!(message, PRICE_MESSAGE);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(create(&json!({ "name": "Widget" })).is_err());
        assert!(create(&json!({ "name": "Widget", "price": "-4" })).is_err());
    }

    #[test]
    fn create_catalog_derives_pan_from_gstin() {
        let body = body_of(
            create(&json!({
                "name": "Widget",
                "price": 250,
                "additionalFields": { "gstin": "27AAPFU0939F1ZV", "hsn_sac": "8471" }
            }))
            .unwrap(),
        );
        assert_eq!(body["pan"], "AAPFU0939F");
        assert_eq!(body["hsn_sac"], "8471");
        assert_eq!(body["item_type"], "product");
        assert_eq!(body["variants"][0]["price"], 250.0);
        assert_eq!(body["variants"][0]["name"], "Widget");
    }

    #[test]
    fn explicit_pan_survives() {
        let body = body_of(
            create(&json!({
                "name": "Widget",
                "price": 10,
                "additionalFields": { "gstin": "27AAPFU0939F1ZV", "pan": "BBBBB1111B" }
            }))
            .unwrap(),
        );
        assert_eq!(body["pan"], "BBBBB1111B");
    }

    #[test]
    fn pricing_rules() {
        let err = create(&json!({
            "name": "W", "price": 10, "additionalFields": { "non_taxable": 20 }
        }))
        .unwrap_err();
        assert!(matches!(err, EngineError::Validation { ref message, .. } if message == NON_TAXABLE_MESSAGE));

        assert!(create(&json!({
            "name": "W", "price": 10, "additionalFields": { "gst_rate": 13 }
        }))
        .is_err());
        assert!(create(&json!({
            "name": "W", "price": 10, "additionalFields": { "non_taxable": "NaN" }
        }))
        .is_err());
        assert!(create(&json!({ "name": "W", "price": "inf" })).is_err());
        assert!(create(&json!({
            "name": "W", "price": 10, "additionalFields": { "item_type": "bundle" }
        }))
        .is_err());

        let body = body_of(
            create(&json!({
                "name": "W", "price": "10", "additionalFields": { "gst_rate": "18", "sku": "W-1" }
            }))
            .unwrap(),
        );
        assert_eq!(body["variants"][0]["gst_rate"], 18.0);
        assert_eq!(body["variants"][0]["sku"], "W-1");
    }

    #[test]
    fn update_allows_missing_price_but_not_zero() {
        let prepared = update(&json!({ "catalogId": 4, "additionalFields": { "name": "Renamed" } })).unwrap();
        match &prepared {
            Prepared::Single(plan) => {
                assert_eq!(plan.method, HttpMethod::Put);
                assert_eq!(plan.path, "/catalog/4");
            }
            other => panic!("unexpected {other:?}"),
        }
        let body = body_of(prepared);
        assert_eq!(body["name"], "Renamed");
        assert!(body.get("variants").is_none());

        assert!(update(&json!({ "catalogId": 4, "additionalFields": { "price": 0 } })).is_err());
    }

    #[test]
    fn add_variant_validates_before_reading() {
        assert!(add_variant(&json!({ "catalogId": 4, "variant": { "price": 10 } })).is_err());
        assert!(add_variant(&json!({ "catalogId": 4, "variant": { "name": "L", "price": 0 } })).is_err());

        let prepared = add_variant(&json!({
            "catalogId": 4, "variant": { "name": "Large", "price": 12.5, "sku": "W-L", "color": "red" }
        }))
        .unwrap();
        let Prepared::Variant { catalog_id, variant } = prepared else {
            panic!("expected a variant append");
        };
        assert_eq!(catalog_id, 4);
        assert_eq!(variant["name"], "Large");
        assert_eq!(variant["sku"], "W-L");
        assert_eq!(variant["color"], "red");
    }
}
