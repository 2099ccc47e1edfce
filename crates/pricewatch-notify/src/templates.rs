//! Plain-text rendering of change-sets.
//!
//! Each changed field becomes one numbered line. Prices carry a direction
//! marker and a percentage, counts are thousands-grouped, and deal fields
//! are worded as started/ended rather than old/new pairs.

use pricewatch_core::Snapshot;
use pricewatch_diff::{ChangeSet, FieldChange, FieldValue};
use std::collections::BTreeSet;

const TITLE_MAX_CHARS: usize = 80;

/// Display order: prices and deal state first, page content last.
const DISPLAY_ORDER: &[&str] = &[
    "sale_price",
    "list_price",
    "sale_percentage",
    "rating",
    "rating_count",
    "inventory",
    "coupon",
    "lightning_deal",
    "best_deal",
    "bag_sale",
    "amazon_choice",
    "image_urls",
    "video_urls",
    "product_description_images",
    "image_count",
    "video_count",
    "brand_store_link",
    "sold_by_link",
    "advertised_asins",
    "title",
    "product_description",
    "about_this_item",
    "product_information",
];

/// A rendered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeMessage {
    /// One-line summary
    pub subject: String,
    /// Full multi-line text
    pub body: String,
}

/// Render a change-set against the latest snapshot of the item.
///
/// `link` is appended as the last line when given.
pub fn render_change_message(
    changes: &ChangeSet,
    latest: &Snapshot,
    link: Option<&str>,
) -> ChangeMessage {
    let count = changes.len();
    let noun = if count == 1 { "change" } else { "changes" };
    let subject = format!("{}: {count} {noun} detected", changes.item_id);

    let mut lines = vec![
        "PRODUCT CHANGE DETECTED".to_string(),
        format!("Item: {}", changes.item_id),
    ];
    if let Some(title) = latest.fields.title.as_deref() {
        lines.push(format!("Product: {}", truncate(title, TITLE_MAX_CHARS)));
    }
    lines.push(String::new());
    lines.push(format!("{count} {noun}:"));

    for (index, change) in ordered(changes).into_iter().enumerate() {
        lines.push(format!("{}. {}", index + 1, describe(change)));
    }

    lines.push(String::new());
    lines.push(format!(
        "Captured: {}",
        latest.captured_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(link) = link {
        lines.push(link.to_string());
    }

    ChangeMessage {
        subject,
        body: lines.join("\n"),
    }
}

fn ordered(changes: &ChangeSet) -> Vec<&FieldChange> {
    let mut out: Vec<&FieldChange> = DISPLAY_ORDER
        .iter()
        .filter_map(|name| changes.get(name))
        .collect();
    // Anything registered outside the known schema goes last, by name.
    out.extend(
        changes
            .changes
            .values()
            .filter(|c| !DISPLAY_ORDER.contains(&c.field.as_str())),
    );
    out
}

/// One line describing a single field change.
pub fn describe(change: &FieldChange) -> String {
    let (old, new) = (&change.old, &change.new);
    match change.field.as_str() {
        "sale_price" => {
            let marker = match change.delta() {
                Some(d) if d > 0.0 => "↑ ",
                Some(d) if d < 0.0 => "↓ ",
                _ => "",
            };
            let pct = change
                .percent_change()
                .map(|p| format!(" ({p:+.1}%)"))
                .unwrap_or_default();
            format!("{marker}Sale price: {} → {}{pct}", price(old), price(new))
        }
        "list_price" => format!("List price: {} → {}", price(old), price(new)),
        "sale_percentage" => format!("Discount: {}% → {}%", plain(old), plain(new)),
        "rating" => {
            let marker = match change.delta() {
                Some(d) if d > 0.0 => "↑ ",
                Some(d) if d < 0.0 => "↓ ",
                _ => "",
            };
            format!("{marker}Rating: {} → {}", plain(old), plain(new))
        }
        "rating_count" => format!("Ratings: {} → {}", grouped(old), grouped(new)),
        "image_count" => format!("Image count: {} → {}", grouped(old), grouped(new)),
        "video_count" => format!("Video count: {} → {}", grouped(old), grouped(new)),
        "inventory" => {
            let status = match new {
                FieldValue::Text(t) if t.to_lowercase().contains("in stock") => "[in stock] ",
                _ => "[unavailable] ",
            };
            format!("{status}Stock: {} → {}", plain(old), plain(new))
        }
        "coupon" => match (old, new) {
            (FieldValue::Missing, FieldValue::Text(t)) => format!("New coupon: {t}"),
            (_, FieldValue::Missing) => "Coupon expired".to_string(),
            _ => format!("Coupon changed: {} → {}", plain(old), plain(new)),
        },
        "lightning_deal" => deal_line("Lightning deal", new),
        "best_deal" => deal_line("Best deal", new),
        "bag_sale" => match new {
            FieldValue::Text(t) => format!("Recent sales: {t}"),
            _ => "Recent sales badge removed".to_string(),
        },
        "amazon_choice" => {
            if new.as_number().is_some_and(|n| n > 0.0) {
                "Gained Amazon's Choice badge".to_string()
            } else {
                "Lost Amazon's Choice badge".to_string()
            }
        }
        "image_urls" => list_line("Image links", old, new),
        "video_urls" => list_line("Video links", old, new),
        "product_description_images" => list_line("Description images", old, new),
        "advertised_asins" => list_line("Sponsored items", old, new),
        "brand_store_link" => "Brand store link changed".to_string(),
        "sold_by_link" => "Seller link changed".to_string(),
        "title" => "Title changed".to_string(),
        "product_description" => "Description changed".to_string(),
        "about_this_item" => "Feature bullets changed".to_string(),
        "product_information" => "Product information changed".to_string(),
        other => format!("{other}: {} → {}", plain(old), plain(new)),
    }
}

fn deal_line(label: &str, new: &FieldValue) -> String {
    match new {
        FieldValue::Text(t) => format!("{label} active: {t}"),
        _ => format!("{label} ended"),
    }
}

fn list_line(label: &str, old: &FieldValue, new: &FieldValue) -> String {
    let empty = BTreeSet::new();
    let old_set = match old {
        FieldValue::List(set) => set,
        _ => &empty,
    };
    let new_set = match new {
        FieldValue::List(set) => set,
        _ => &empty,
    };
    let added = new_set.difference(old_set).count();
    let removed = old_set.difference(new_set).count();

    match (added, removed) {
        (0, 0) => format!("{label} changed"),
        (a, 0) => format!("{label}: +{a} added"),
        (0, r) => format!("{label}: -{r} removed"),
        (a, r) => format!("{label}: +{a} added, -{r} removed"),
    }
}

fn price(value: &FieldValue) -> String {
    match value {
        FieldValue::Number(n) => format!("${n:.2}"),
        _ => "n/a".to_string(),
    }
}

fn plain(value: &FieldValue) -> String {
    match value {
        FieldValue::Missing => "n/a".to_string(),
        FieldValue::Text(t) => t.clone(),
        FieldValue::Number(n) => n.to_string(),
        FieldValue::List(items) => items.iter().cloned().collect::<Vec<_>>().join(", "),
        FieldValue::Structured(json) => json.to_string(),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn grouped(value: &FieldValue) -> String {
    let Some(n) = value.as_number() else {
        return "n/a".to_string();
    };
    let rounded = n.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if rounded < 0 {
        out.insert(0, '-');
    }
    out
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pricewatch_core::{ItemId, ProductFields};
    use pricewatch_diff::FieldKind;
    use std::collections::BTreeMap;

    fn change(field: &str, kind: FieldKind, old: FieldValue, new: FieldValue) -> FieldChange {
        FieldChange {
            field: field.to_string(),
            kind,
            old,
            new,
        }
    }

    fn list(items: &[&str]) -> FieldValue {
        FieldValue::List(items.iter().map(|s| (*s).to_string()).collect())
    }

    #[test]
    fn test_price_drop_line() {
        let line = describe(&change(
            "sale_price",
            FieldKind::Numeric,
            FieldValue::Number(20.0),
            FieldValue::Number(15.0),
        ));
        assert_eq!(line, "↓ Sale price: $20.00 → $15.00 (-25.0%)");
    }

    #[test]
    fn test_coupon_wording() {
        let appeared = describe(&change(
            "coupon",
            FieldKind::Text,
            FieldValue::Missing,
            FieldValue::Text("Save 10%".to_string()),
        ));
        assert_eq!(appeared, "New coupon: Save 10%");

        let expired = describe(&change(
            "coupon",
            FieldKind::Text,
            FieldValue::Text("Save 10%".to_string()),
            FieldValue::Missing,
        ));
        assert_eq!(expired, "Coupon expired");
    }

    #[test]
    fn test_list_added_removed_counts() {
        let line = describe(&change(
            "image_urls",
            FieldKind::List,
            list(&["a.jpg", "b.jpg"]),
            list(&["b.jpg", "c.jpg", "d.jpg"]),
        ));
        assert_eq!(line, "Image links: +2 added, -1 removed");
    }

    #[test]
    fn test_description_images_line() {
        let line = describe(&change(
            "product_description_images",
            FieldKind::List,
            list(&["aplus-1.jpg"]),
            list(&["aplus-2.jpg", "aplus-3.jpg"]),
        ));
        assert_eq!(line, "Description images: +2 added, -1 removed");
    }

    #[test]
    fn test_grouped_counts() {
        let line = describe(&change(
            "rating_count",
            FieldKind::Numeric,
            FieldValue::Number(1204.0),
            FieldValue::Number(1_250_000.0),
        ));
        assert_eq!(line, "Ratings: 1,204 → 1,250,000");
    }

    #[test]
    fn test_message_orders_prices_first() {
        let item = ItemId::new("B019QZBS10").unwrap();
        let captured = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
        let mut changes = BTreeMap::new();
        changes.insert(
            "coupon".to_string(),
            change(
                "coupon",
                FieldKind::Text,
                FieldValue::Missing,
                FieldValue::Text("Save $2".to_string()),
            ),
        );
        changes.insert(
            "sale_price".to_string(),
            change(
                "sale_price",
                FieldKind::Numeric,
                FieldValue::Number(10.0),
                FieldValue::Number(11.0),
            ),
        );
        let set = ChangeSet {
            item_id: item.clone(),
            previous_at: captured - chrono::Duration::days(1),
            current_at: captured,
            changes,
        };
        let latest = Snapshot::success(
            item,
            ProductFields {
                title: Some("x".repeat(100)),
                ..ProductFields::default()
            },
        )
        .captured_at(captured);

        let message = render_change_message(&set, &latest, Some("https://example.com/dp/B019QZBS10"));
        assert_eq!(message.subject, "B019QZBS10: 2 changes detected");

        let lines: Vec<&str> = message.body.lines().collect();
        assert_eq!(lines[2], format!("Product: {}...", "x".repeat(80)));
        assert_eq!(lines[4], "2 changes:");
        assert!(lines[5].starts_with("1. ↑ Sale price"));
        assert_eq!(lines[6], "2. New coupon: Save $2");
        assert_eq!(lines[8], "Captured: 2026-03-10 09:00:00 UTC");
        assert_eq!(lines[9], "https://example.com/dp/B019QZBS10");
    }
}
