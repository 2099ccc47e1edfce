use pricewatch_browser::{ChromiumExtractor, Extractor};
use pricewatch_core::{BrowserConfig, ItemId};

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_open_and_close_session() {
    let extractor = ChromiumExtractor::new(BrowserConfig::default()).unwrap();
    let session = extractor.open_session(9333).await;
    assert!(session.is_ok(), "Failed to launch Chromium");
    extractor.close_session(session.unwrap()).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium and network access
async fn test_navigation() {
    let config = BrowserConfig {
        url_template: "https://example.com/?q={item}".to_string(),
        settle_delay_ms: 0,
        ..BrowserConfig::default()
    };
    let extractor = ChromiumExtractor::new(config).unwrap();
    let mut session = extractor.open_session(9334).await.unwrap();

    let item = ItemId::new("B019QZBS10").unwrap();
    let result = extractor.navigate(&mut session, &item).await;
    assert!(result.is_ok(), "Navigation failed");

    extractor.close_session(session).await.unwrap();
}
