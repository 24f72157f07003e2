//! Normalization of raw vendor records into the stable domain shapes.
//!
//! The remote API is a generic record store, so field names are vendor
//! choices (`title`, `short_description`, `name_ru`, ...). Every function
//! here is total: missing or mistyped fields degrade to defaults, and a
//! non-object record yields an all-defaults value rather than an error.

use serde_json::{Map, Value};

use super::types::{Category, Service, Subcategory};

fn str_field(obj: &Map<String, Value>, key: &str) -> String {
  obj
    .get(key)
    .and_then(Value::as_str)
    .unwrap_or_default()
    .to_string()
}

fn opt_str_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
  obj
    .get(key)
    .and_then(Value::as_str)
    .filter(|s| !s.is_empty())
    .map(String::from)
}

/// Localized name: `name_ru` preferred, `name_en` as fallback.
fn localized_name(obj: &Map<String, Value>) -> String {
  obj
    .get("name_ru")
    .and_then(Value::as_str)
    .or_else(|| obj.get("name_en").and_then(Value::as_str))
    .unwrap_or_default()
    .to_string()
}

/// Remaining raw fields after the listed keys were lifted or overlaid.
fn leftover(mut obj: Map<String, Value>, consumed: &[&str]) -> Map<String, Value> {
  for key in consumed {
    obj.remove(*key);
  }
  obj
}

/// Normalize a raw service record.
///
/// Union semantics: the output is the raw record with the derived fields
/// overlaid on top. Source fields for overlaid keys are replaced; anything
/// else survives in `extra`.
pub fn normalize_service(raw: &Value) -> Service {
  let obj = raw.as_object().cloned().unwrap_or_default();

  Service {
    id: str_field(&obj, "id"),
    name: str_field(&obj, "title"),
    description: str_field(&obj, "short_description"),
    category_id: str_field(&obj, "category"),
    subcategory: str_field(&obj, "subcategory"),
    // Price is never negative; bad input clamps to zero.
    price: obj.get("price").and_then(Value::as_i64).unwrap_or(0).max(0),
    price_max: obj.get("price_max").and_then(Value::as_i64),
    price_unit: opt_str_field(&obj, "price_unit"),
    price_note: opt_str_field(&obj, "price_note"),
    is_active: obj.get("status").and_then(Value::as_str) == Some("published"),
    currency: opt_str_field(&obj, "currency").unwrap_or_else(|| "RUB".to_string()),
    duration: obj.get("duration_min").and_then(Value::as_i64),
    extra: leftover(
      obj,
      &[
        "id",
        "subcategory",
        "price",
        "price_max",
        "price_unit",
        "price_note",
        "currency",
        // Overlaid by derived fields.
        "name",
        "description",
        "category_id",
        "duration",
        "is_active",
      ],
    ),
  }
}

/// Normalize a raw category record.
pub fn normalize_category(raw: &Value) -> Category {
  let obj = raw.as_object().cloned().unwrap_or_default();

  Category {
    id: str_field(&obj, "id"),
    name: localized_name(&obj),
    extra: leftover(obj, &["id", "name"]),
  }
}

/// Normalize a raw subcategory record. The category reference is copied
/// as-is, without checking that the category exists.
pub fn normalize_subcategory(raw: &Value) -> Subcategory {
  let obj = raw.as_object().cloned().unwrap_or_default();

  Subcategory {
    id: str_field(&obj, "id"),
    name: localized_name(&obj),
    category_id: str_field(&obj, "category"),
    extra: leftover(obj, &["id", "name", "category_id"]),
  }
}
