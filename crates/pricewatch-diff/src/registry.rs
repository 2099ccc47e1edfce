//! Field-kind registry.
//!
//! Maps every product field to its kind, optional numeric threshold, and an
//! accessor producing its normalized value. The diff engine is driven
//! entirely by this table.

use crate::error::{DiffError, Result};
use crate::normalize::FieldValue;
use pricewatch_core::ProductFields;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Values closer than this are treated as equal when applying thresholds.
const EPSILON: f64 = 1e-9;

/// How a field is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Whitespace-normalized text
    Text,
    /// Number with an optional minimum difference
    Numeric,
    /// Set of strings
    List,
    /// JSON document
    Structured,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Numeric => "numeric",
            Self::List => "list",
            Self::Structured => "structured",
        })
    }
}

/// One registry row.
#[derive(Clone, Copy)]
pub struct FieldSpec {
    /// Field name as stored and reported
    pub name: &'static str,
    /// Comparison kind
    pub kind: FieldKind,
    /// Minimum absolute difference for numeric fields
    pub threshold: Option<f64>,
    accessor: fn(&ProductFields) -> FieldValue,
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

impl FieldSpec {
    fn new(
        name: &'static str,
        kind: FieldKind,
        threshold: Option<f64>,
        accessor: fn(&ProductFields) -> FieldValue,
    ) -> Self {
        Self {
            name,
            kind,
            threshold,
            accessor,
        }
    }

    /// Normalized value of this field in `fields`.
    pub fn value(&self, fields: &ProductFields) -> FieldValue {
        (self.accessor)(fields)
    }

    /// Whether two normalized values count as different for this field.
    pub fn differs(&self, old: &FieldValue, new: &FieldValue) -> bool {
        match (old, new) {
            (FieldValue::Number(a), FieldValue::Number(b)) => {
                let delta = (a - b).abs();
                match self.threshold {
                    Some(threshold) => delta + EPSILON >= threshold,
                    None => delta > EPSILON,
                }
            }
            _ => old != new,
        }
    }
}

/// The ordered set of compared fields.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    specs: Vec<FieldSpec>,
}

impl Default for FieldRegistry {
    fn default() -> Self {
        use FieldKind::{List, Numeric, Structured, Text};

        Self {
            specs: vec![
                FieldSpec::new("title", Text, None, |f| FieldValue::text(f.title.as_deref())),
                FieldSpec::new("product_description", Text, None, |f| {
                    FieldValue::text(f.product_description.as_deref())
                }),
                FieldSpec::new("product_information", Structured, None, |f| {
                    FieldValue::structured(f.product_information.as_ref())
                }),
                FieldSpec::new("about_this_item", Structured, None, |f| {
                    FieldValue::structured(f.about_this_item.as_ref())
                }),
                FieldSpec::new("image_count", Numeric, Some(1.0), |f| {
                    FieldValue::count(f.image_count)
                }),
                FieldSpec::new("image_urls", List, None, |f| FieldValue::list(&f.image_urls)),
                FieldSpec::new("video_count", Numeric, Some(1.0), |f| {
                    FieldValue::count(f.video_count)
                }),
                FieldSpec::new("video_urls", List, None, |f| FieldValue::list(&f.video_urls)),
                FieldSpec::new("product_description_images", List, None, |f| {
                    FieldValue::list(&f.product_description_images)
                }),
                FieldSpec::new("sale_price", Numeric, Some(0.01), |f| {
                    FieldValue::number(f.sale_price)
                }),
                FieldSpec::new("list_price", Numeric, Some(0.01), |f| {
                    FieldValue::number(f.list_price)
                }),
                FieldSpec::new("sale_percentage", Numeric, Some(0.1), |f| {
                    FieldValue::number(f.sale_percentage)
                }),
                FieldSpec::new("best_deal", Text, None, |f| {
                    FieldValue::text(f.best_deal.as_deref())
                }),
                FieldSpec::new("lightning_deal", Text, None, |f| {
                    FieldValue::text(f.lightning_deal.as_deref())
                }),
                FieldSpec::new("coupon", Text, None, |f| FieldValue::text(f.coupon.as_deref())),
                FieldSpec::new("bag_sale", Text, None, |f| {
                    FieldValue::text(f.bag_sale.as_deref())
                }),
                FieldSpec::new("rating", Numeric, Some(0.1), |f| FieldValue::number(f.rating)),
                FieldSpec::new("rating_count", Numeric, Some(1.0), |f| {
                    FieldValue::count(f.rating_count)
                }),
                FieldSpec::new("brand_store_link", Text, None, |f| {
                    FieldValue::text(f.brand_store_link.as_deref())
                }),
                FieldSpec::new("sold_by_link", Text, None, |f| {
                    FieldValue::text(f.sold_by_link.as_deref())
                }),
                FieldSpec::new("advertised_asins", List, None, |f| {
                    FieldValue::list(&f.advertised_asins)
                }),
                FieldSpec::new("amazon_choice", Numeric, Some(1.0), |f| {
                    FieldValue::flag(f.amazon_choice)
                }),
                FieldSpec::new("inventory", Text, None, |f| {
                    FieldValue::text(f.inventory.as_deref())
                }),
            ],
        }
    }
}

impl FieldRegistry {
    /// The default registry with threshold overrides applied.
    ///
    /// # Errors
    /// Rejects unknown field names, non-numeric fields, and negative or
    /// non-finite thresholds.
    pub fn with_thresholds(overrides: &BTreeMap<String, f64>) -> Result<Self> {
        let mut registry = Self::default();
        for (field, threshold) in overrides {
            registry.set_threshold(field, *threshold)?;
        }
        Ok(registry)
    }

    /// Override one numeric field's threshold.
    pub fn set_threshold(&mut self, field: &str, threshold: f64) -> Result<()> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(DiffError::InvalidThreshold {
                field: field.to_string(),
                value: threshold,
            });
        }
        let spec = self
            .specs
            .iter_mut()
            .find(|spec| spec.name == field)
            .ok_or_else(|| DiffError::UnknownField(field.to_string()))?;
        if spec.kind != FieldKind::Numeric {
            return Err(DiffError::NotNumeric {
                field: field.to_string(),
            });
        }
        spec.threshold = Some(threshold);
        Ok(())
    }

    /// Look up a field by name.
    pub fn get(&self, field: &str) -> Option<&FieldSpec> {
        self.specs.iter().find(|spec| spec.name == field)
    }

    /// All fields in report order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.specs.iter()
    }

    /// Number of registered fields.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_covers_every_field() {
        let registry = FieldRegistry::default();
        assert_eq!(registry.len(), 23);

        let serialized = serde_json::to_value(ProductFields::default()).unwrap();
        let names: Vec<&str> = serialized
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        for name in names {
            assert!(registry.get(name).is_some(), "{name} missing from registry");
        }
    }

    #[test]
    fn test_description_images_compare_as_set() {
        let registry = FieldRegistry::default();
        let spec = registry.get("product_description_images").unwrap();
        assert_eq!(spec.kind, FieldKind::List);

        let before = ProductFields {
            product_description_images: vec!["a.jpg".into(), "b.jpg".into()],
            ..ProductFields::default()
        };
        let reordered = ProductFields {
            product_description_images: vec!["b.jpg".into(), "a.jpg".into()],
            ..ProductFields::default()
        };
        let replaced = ProductFields {
            product_description_images: vec!["a.jpg".into(), "c.jpg".into()],
            ..ProductFields::default()
        };
        assert!(!spec.differs(&spec.value(&before), &spec.value(&reordered)));
        assert!(spec.differs(&spec.value(&before), &spec.value(&replaced)));
    }

    #[test]
    fn test_price_threshold_boundary() {
        let registry = FieldRegistry::default();
        let price = registry.get("sale_price").unwrap();

        let old = FieldValue::Number(10.00);
        assert!(!price.differs(&old, &FieldValue::Number(10.004)));
        assert!(price.differs(&old, &FieldValue::Number(10.01)));
    }

    #[test]
    fn test_missing_to_present_differs() {
        let registry = FieldRegistry::default();
        let coupon = registry.get("coupon").unwrap();
        assert!(coupon.differs(&FieldValue::Missing, &FieldValue::Text("5% off".into())));
        assert!(!coupon.differs(&FieldValue::Missing, &FieldValue::Missing));
    }

    #[test]
    fn test_threshold_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert("rating_count".to_string(), 10.0);
        let registry = FieldRegistry::with_thresholds(&overrides).unwrap();
        let spec = registry.get("rating_count").unwrap();
        assert!(!spec.differs(&FieldValue::Number(100.0), &FieldValue::Number(109.0)));
        assert!(spec.differs(&FieldValue::Number(100.0), &FieldValue::Number(110.0)));

        let mut bad = BTreeMap::new();
        bad.insert("title".to_string(), 1.0);
        assert!(matches!(
            FieldRegistry::with_thresholds(&bad),
            Err(DiffError::NotNumeric { .. })
        ));

        let mut unknown = BTreeMap::new();
        unknown.insert("colour".to_string(), 1.0);
        assert!(matches!(
            FieldRegistry::with_thresholds(&unknown),
            Err(DiffError::UnknownField(_))
        ));
    }
}
