//! Product schema and per-attempt snapshots.
//!
//! `ProductFields` is the fixed schema an extractor fills in. Extractors hand
//! back loosely typed JSON (prices like `"$1,299.99"`, counts like
//! `"12,345 ratings"`), so numeric fields deserialize leniently.

use crate::types::ItemId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The 23 observed product fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductFields {
    /// Product title
    pub title: Option<String>,
    /// Long-form description
    pub product_description: Option<String>,
    /// Technical details table
    pub product_information: Option<JsonValue>,
    /// "About this item" bullets
    pub about_this_item: Option<JsonValue>,
    /// Number of gallery images
    #[serde(deserialize_with = "lenient::count")]
    pub image_count: Option<u64>,
    /// Gallery image URLs
    #[serde(deserialize_with = "lenient::string_list")]
    pub image_urls: Vec<String>,
    /// Number of videos
    #[serde(deserialize_with = "lenient::count")]
    pub video_count: Option<u64>,
    /// Video URLs
    #[serde(deserialize_with = "lenient::string_list")]
    pub video_urls: Vec<String>,
    /// Image URLs embedded in the rich description section
    #[serde(deserialize_with = "lenient::string_list")]
    pub product_description_images: Vec<String>,
    /// Current sale price
    #[serde(deserialize_with = "lenient::number")]
    pub sale_price: Option<f64>,
    /// List (strike-through) price
    #[serde(deserialize_with = "lenient::number")]
    pub list_price: Option<f64>,
    /// Discount percentage
    #[serde(deserialize_with = "lenient::number")]
    pub sale_percentage: Option<f64>,
    /// Deal badge text
    pub best_deal: Option<String>,
    /// Lightning deal progress text
    pub lightning_deal: Option<String>,
    /// Coupon text
    pub coupon: Option<String>,
    /// "Bought in past month" style text
    pub bag_sale: Option<String>,
    /// Average rating
    #[serde(deserialize_with = "lenient::number")]
    pub rating: Option<f64>,
    /// Number of ratings
    #[serde(deserialize_with = "lenient::count")]
    pub rating_count: Option<u64>,
    /// Brand store link
    pub brand_store_link: Option<String>,
    /// Seller link
    pub sold_by_link: Option<String>,
    /// Sponsored item identifiers shown on the page
    #[serde(deserialize_with = "lenient::string_list")]
    pub advertised_asins: Vec<String>,
    /// Choice badge present
    #[serde(deserialize_with = "lenient::flag")]
    pub amazon_choice: Option<bool>,
    /// Stock status text
    pub inventory: Option<String>,
}

/// An immutable observation of one item from one crawl attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unique identifier for this snapshot
    pub id: String,
    /// Item this snapshot observes
    pub item_id: ItemId,
    /// When the attempt completed
    pub captured_at: DateTime<Utc>,
    /// Whether extraction succeeded
    pub success: bool,
    /// Error message if the attempt failed
    pub error: Option<String>,
    /// Extracted fields (empty on failure)
    pub fields: ProductFields,
}

impl Snapshot {
    /// A successful observation captured now.
    #[must_use]
    pub fn success(item_id: ItemId, fields: ProductFields) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            item_id,
            captured_at: Utc::now(),
            success: true,
            error: None,
            fields,
        }
    }

    /// A failed attempt captured now.
    #[must_use]
    pub fn failure(item_id: ItemId, error: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            item_id,
            captured_at: Utc::now(),
            success: false,
            error: Some(error.into()),
            fields: ProductFields::default(),
        }
    }

    /// Override the capture time.
    #[must_use]
    pub fn captured_at(mut self, ts: DateTime<Utc>) -> Self {
        self.captured_at = ts;
        self
    }
}

/// Lenient deserializers for extractor output.
pub mod lenient {
    use regex::Regex;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use std::sync::OnceLock;

    /// Pull the first number out of free text: `"$1,299.99"` → 1299.99,
    /// `"4.5 out of 5 stars"` → 4.5.
    #[must_use]
    pub fn parse_number(text: &str) -> Option<f64> {
        static NUMBER_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = NUMBER_REGEX
            .get_or_init(|| Regex::new(r"-?\d[\d,]*(?:\.\d+)?").expect("valid regex"));

        let token = regex.find(text)?.as_str().replace(',', "");
        token.parse().ok()
    }

    fn value_to_number(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_number(s),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Optional float from a number or numeric text.
    pub fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(value_to_number))
    }

    /// Optional non-negative integer from a number or numeric text.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value
            .as_ref()
            .and_then(value_to_number)
            .filter(|n| *n >= 0.0)
            .map(|n| n.round() as u64))
    }

    /// Optional flag from a bool, 0/1, or `"true"`/`"yes"` text.
    pub fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Bool(b)) => Some(b),
            Some(Value::Number(n)) => n.as_f64().map(|n| n != 0.0),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "" => None,
                "1" | "true" | "yes" => Some(true),
                _ => Some(false),
            },
            _ => None,
        })
    }

    /// List of strings from an array (non-string members stringified), a
    /// JSON-encoded array string, or null.
    pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.into_iter().map(stringify).collect(),
            Some(Value::String(s)) => match serde_json::from_str::<Value>(&s) {
                Ok(Value::Array(items)) => items.into_iter().map(stringify).collect(),
                _ if s.trim().is_empty() => Vec::new(),
                _ => vec![s],
            },
            Some(other) => vec![stringify(other)],
        })
    }

    fn stringify(value: Value) -> String {
        match value {
            Value::String(s) => s,
            other => other.to_string(),
        }
    }
}
