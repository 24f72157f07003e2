//! Normalized catalog domain types.
//!
//! These are the stable shapes consumers see, independent of the vendor
//! field names the remote API uses. Unrecognized raw fields are carried
//! along in the flattened `extra` map so nothing is lost in translation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn default_currency() -> String {
  "RUB".to_string()
}

/// A single priced service from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
  #[serde(default)]
  pub id: String,
  /// Display name (from the vendor `title` field).
  #[serde(default)]
  pub name: String,
  /// Short description (from the vendor `short_description` field).
  #[serde(default)]
  pub description: String,
  /// Category reference. May dangle; consumers treat that as "uncategorized".
  #[serde(default)]
  pub category_id: String,
  /// Subcategory reference, same dangling rule as `category_id`.
  #[serde(default)]
  pub subcategory: String,
  /// Price in whole currency units. Never negative.
  #[serde(default)]
  pub price: i64,
  /// Upper bound when the price is a range.
  #[serde(default)]
  pub price_max: Option<i64>,
  /// Free-text unit override, e.g. "per km".
  #[serde(default)]
  pub price_unit: Option<String>,
  /// Free-text note replacing the numeric price entirely.
  #[serde(default)]
  pub price_note: Option<String>,
  /// Derived from vendor `status == "published"`.
  #[serde(default)]
  pub is_active: bool,
  #[serde(default = "default_currency")]
  pub currency: String,
  /// Duration in minutes, when the service has one.
  #[serde(default)]
  pub duration: Option<i64>,
  /// Vendor fields with no dedicated slot above, preserved verbatim.
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// A catalog category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
  #[serde(default)]
  pub id: String,
  /// Localized name: `name_ru` falling back to `name_en`.
  #[serde(default)]
  pub name: String,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// A catalog subcategory. Its `category_id` is not validated at ingest
/// and may reference a category that no longer exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subcategory {
  #[serde(default)]
  pub id: String,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub category_id: String,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// How a service's price should be presented.
///
/// Classification only; actual markup/wording belongs to the rendering
/// collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PriceDisplay {
  /// Inactive or zero-priced services are quoted on request.
  OnRequest,
  /// Free-text note replaces any numeric price.
  Note { note: String },
  /// Numeric price with a custom unit, e.g. "150 per km".
  PerUnit { amount: i64, unit: String },
  /// A from-to range.
  Range { min: i64, max: i64, currency: String },
  Fixed { amount: i64, currency: String },
}

impl Service {
  /// Classify this service's price for display.
  ///
  /// An inactive service never exposes a numeric price, whatever its
  /// `price`/`price_max` say. `price_note` takes precedence over all
  /// numeric fields, `price_unit` over the currency code.
  pub fn price_display(&self) -> PriceDisplay {
    if !self.is_active || (self.price == 0 && self.price_max.unwrap_or(0) == 0) {
      return PriceDisplay::OnRequest;
    }

    if let Some(note) = self.price_note.as_deref().filter(|n| !n.is_empty()) {
      return PriceDisplay::Note {
        note: note.to_string(),
      };
    }

    if let Some(unit) = self.price_unit.as_deref().filter(|u| !u.is_empty()) {
      return PriceDisplay::PerUnit {
        amount: self.price,
        unit: unit.to_string(),
      };
    }

    match self.price_max {
      Some(max) if max > self.price => PriceDisplay::Range {
        min: self.price,
        max,
        currency: self.currency.clone(),
      },
      _ => PriceDisplay::Fixed {
        amount: self.price,
        currency: self.currency.clone(),
      },
    }
  }
}

/// Counts reported after a full resync, mirroring the sync endpoint the
/// visual editor consumes.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
  pub services_count: usize,
  pub categories_count: usize,
}
