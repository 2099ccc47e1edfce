use chrono::{Duration, TimeZone, Utc};
use pricewatch_core::{
    DiffConfig, ItemId, PriorWindow, ProductFields, Snapshot, SnapshotStore, TimeWindow,
};
use pricewatch_db::Database;
use pricewatch_diff::{ChangeResult, DiffEngine, FieldValue, MagnitudeFilter};
use serde_json::json;
use std::sync::Arc;

async fn setup() -> (Arc<Database>, DiffEngine) {
    let db = Arc::new(Database::open(":memory:").await.expect("open database"));
    let engine = DiffEngine::new(db.clone());
    (db, engine)
}

fn item() -> ItemId {
    ItemId::new("B019QZBS10").expect("valid item ID")
}

async fn store(db: &Database, fields: ProductFields, at: chrono::DateTime<Utc>) {
    db.save_snapshot(&Snapshot::success(item(), fields).captured_at(at))
        .await
        .expect("save snapshot");
}

fn priced(price: f64) -> ProductFields {
    ProductFields {
        title: Some("Bottle".to_string()),
        sale_price: Some(price),
        ..ProductFields::default()
    }
}

#[tokio::test]
async fn test_first_observation_without_prior_day() {
    let (db, engine) = setup().await;
    let now = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
    store(&db, priced(10.0), now - Duration::minutes(5)).await;

    let result = engine.diff_at(&item(), now).await.expect("diff");
    assert_eq!(result, ChangeResult::FirstObservation);
}

#[tokio::test]
async fn test_price_threshold_boundary() {
    let now = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
    let yesterday = now - Duration::days(1);

    let (db, engine) = setup().await;
    store(&db, priced(10.00), yesterday).await;
    store(&db, priced(10.004), now - Duration::minutes(1)).await;
    assert_eq!(
        engine.diff_at(&item(), now).await.expect("diff"),
        ChangeResult::NoChange
    );

    let (db, engine) = setup().await;
    store(&db, priced(10.00), yesterday).await;
    store(&db, priced(10.01), now - Duration::minutes(1)).await;
    let result = engine.diff_at(&item(), now).await.expect("diff");
    let changes = result.changes().expect("price changed");
    assert_eq!(changes.fields().collect::<Vec<_>>(), vec!["sale_price"]);
    let change = changes.get("sale_price").unwrap();
    assert_eq!(change.old, FieldValue::Number(10.0));
    assert_eq!(change.new, FieldValue::Number(10.01));
}

#[tokio::test]
async fn test_normalization_hides_presentation_noise() {
    let now = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
    let (db, engine) = setup().await;

    store(
        &db,
        ProductFields {
            title: Some("Steel  Bottle".to_string()),
            image_urls: vec!["a".to_string(), "b".to_string()],
            product_information: Some(json!({})),
            ..ProductFields::default()
        },
        now - Duration::days(1),
    )
    .await;
    store(
        &db,
        ProductFields {
            title: Some(" Steel Bottle\n".to_string()),
            image_urls: vec!["b".to_string(), "a".to_string()],
            product_information: Some(json!({"k": ""})),
            ..ProductFields::default()
        },
        now,
    )
    .await;

    assert_eq!(
        engine.diff_at(&item(), now + Duration::seconds(1)).await.expect("diff"),
        ChangeResult::NoChange
    );
}

#[tokio::test]
async fn test_diff_is_repeatable() {
    let now = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
    let (db, engine) = setup().await;
    store(&db, priced(20.0), now - Duration::days(1)).await;
    store(
        &db,
        ProductFields {
            coupon: Some("Save 5%".to_string()),
            ..priced(18.0)
        },
        now - Duration::hours(1),
    )
    .await;

    let first = engine.diff_at(&item(), now).await.expect("diff");
    let second = engine.diff_at(&item(), now).await.expect("diff");
    assert_eq!(first, second);
    assert_eq!(first.changes().map(|c| c.len()), Some(2));
}

#[tokio::test]
async fn test_lookback_window_from_config() {
    let now = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
    let db = Arc::new(Database::open(":memory:").await.expect("open database"));
    let config = DiffConfig {
        prior_window: PriorWindow::Lookback,
        lookback_hours: 6,
        ..DiffConfig::default()
    };
    let engine = DiffEngine::from_config(db.clone(), &config).expect("engine");

    store(&db, priced(10.0), now - Duration::hours(3)).await;
    store(&db, priced(12.0), now).await;

    // The newest snapshot is at `now`, outside the half-open lookback window.
    let result = engine.diff_at(&item(), now).await.expect("diff");
    assert!(result.changes().is_some_and(|c| c.get("sale_price").is_some()));
}

#[tokio::test]
async fn test_magnitude_filter_is_pluggable() {
    let now = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
    let db = Arc::new(Database::open(":memory:").await.expect("open database"));
    let engine = DiffEngine::new(db.clone()).with_filter(MagnitudeFilter::default());

    store(&db, priced(100.0), now - Duration::days(1)).await;
    store(&db, priced(100.5), now - Duration::hours(1)).await;

    assert_eq!(
        engine.diff_at(&item(), now).await.expect("diff"),
        ChangeResult::NoChange
    );
}

#[tokio::test]
async fn test_history_pairs_newest_first() {
    let (db, engine) = setup().await;
    let base = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();

    store(&db, priced(10.0), base).await;
    store(&db, priced(10.0), base + Duration::days(1)).await;
    store(&db, priced(12.0), base + Duration::days(2)).await;
    db.save_snapshot(
        &Snapshot::failure(item(), "timeout").captured_at(base + Duration::days(3)),
    )
    .await
    .expect("save failure");
    store(&db, priced(11.0), base + Duration::days(4)).await;

    let history = engine
        .get_history(&item(), &TimeWindow::all())
        .await
        .expect("history");
    let times: Vec<_> = history.iter().map(|h| h.captured_at).collect();
    assert_eq!(times, vec![base + Duration::days(4), base + Duration::days(2)]);

    let again = engine
        .get_history(&item(), &TimeWindow::all())
        .await
        .expect("history");
    assert_eq!(history, again);

    let recent = engine
        .get_history(&item(), &TimeWindow::since(base + Duration::days(2)))
        .await
        .expect("history");
    assert_eq!(recent.len(), 1);
}
