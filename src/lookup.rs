//! Barcode to product lookup against an Open Food Facts style catalogue.
//!
//! The crate parses catalogue responses but does not make HTTP requests;
//! the host supplies a [`NutritionLookup`] that fetches
//! [`product_api_url`] and hands the body to
//! [`ProductRecord::from_open_food_facts`].

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::LookupError;
use crate::log_info;
use crate::models::{NutrientKind, ProductRecord};

const ENABLE_LOGS: bool = true;

const CATALOGUE_BASE: &str = "https://world.openfoodfacts.org";

#[async_trait]
pub trait NutritionLookup: Send + Sync {
    /// `barcode` has already passed [`validate_barcode`].
    async fn lookup(&self, barcode: &str) -> Result<ProductRecord, LookupError>;
}

/// Accepts EAN-8, EAN-13 and GTIN-14 style codes: 8 to 14 ASCII digits.
pub fn validate_barcode(raw: &str) -> Result<String, LookupError> {
    let barcode = raw.trim();
    let digits_only = barcode.chars().all(|c| c.is_ascii_digit());
    if !digits_only || !(8..=14).contains(&barcode.len()) {
        return Err(LookupError::InvalidBarcode(raw.to_string()));
    }
    Ok(barcode.to_string())
}

pub fn product_api_url(barcode: &str) -> String {
    format!("{CATALOGUE_BASE}/api/v0/product/{barcode}.json")
}

pub fn product_page_url(barcode: &str) -> String {
    format!("{CATALOGUE_BASE}/product/{barcode}")
}

/// Validates `raw` and queries `lookup`. An invalid barcode never reaches the
/// adapter.
pub async fn lookup_barcode(
    lookup: &dyn NutritionLookup,
    raw: &str,
) -> Result<ProductRecord, LookupError> {
    let barcode = validate_barcode(raw)?;
    log_info!("Looking up barcode {barcode}");
    lookup.lookup(&barcode).await
}

fn text(product: &Map<String, Value>, field: &str) -> Option<String> {
    product
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn integer(product: &Map<String, Value>, field: &str) -> Option<i64> {
    match product.get(field)? {
        Value::Number(number) => number.as_i64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

/// Nutriment values show up both as numbers and as numeric strings.
fn nutriment(nutriments: &Map<String, Value>, field: &str) -> Option<f64> {
    let value: Option<f64> = match nutriments.get(field)? {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    };
    value.filter(|value| value.is_finite())
}

impl ProductRecord {
    /// Parses a v0 product response. Anything but `status == 1` means the
    /// catalogue has no such product.
    pub fn from_open_food_facts(barcode: &str, response: &Value) -> Result<Self, LookupError> {
        let status = response.get("status").and_then(Value::as_i64);
        if status != Some(1) {
            return Err(LookupError::NotFound {
                barcode: barcode.to_string(),
            });
        }

        let product = response
            .get("product")
            .and_then(Value::as_object)
            .ok_or_else(|| LookupError::Malformed("response has no product object".into()))?;

        let mut nutrients = std::collections::BTreeMap::new();
        if let Some(nutriments) = product.get("nutriments").and_then(Value::as_object) {
            for kind in NutrientKind::ALL {
                let value = nutriment(nutriments, kind.off_key())
                    .or_else(|| nutriment(nutriments, kind.off_key().trim_end_matches("_100g")));
                if let Some(value) = value {
                    nutrients.insert(kind, value);
                }
            }
        }

        Ok(ProductRecord {
            name: text(product, "product_name").unwrap_or_default(),
            image: text(product, "image_url"),
            allergens: text(product, "allergens_from_ingredients"),
            ingredients: text(product, "ingredients_text"),
            countries: text(product, "countries"),
            image_nutrition: text(product, "image_nutrition_url"),
            nutriscore_score: integer(product, "nutriscore_score"),
            nutriscore_grade: text(product, "nutriscore_grade"),
            nova_score: integer(product, "nova_group"),
            product_url: product_page_url(barcode),
            api_url: product_api_url(barcode),
            ean_barcode: barcode.to_string(),
            nutrients,
        })
    }
}
