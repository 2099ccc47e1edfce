//! Webhook delivery against a local one-shot HTTP listener.

use pricewatch_core::{ItemId, NotificationConfig, ProductFields, Snapshot};
use pricewatch_diff::{ChangeSet, FieldChange, FieldKind, FieldValue};
use pricewatch_notify::{dispatcher_from_config, NotificationDispatcher, NotifyError, WebhookDispatcher};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Accept one request, answer with `status`, and hand back the request body.
async fn one_shot_server(status: u16) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let addr = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let header_end = loop {
            let n = socket.read(&mut chunk).await.expect("read");
            assert!(n > 0, "connection closed before headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
        let content_length: usize = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .map(|v| v.trim().parse().expect("content length"))
            .unwrap_or(0);

        while buf.len() < header_end + content_length {
            let n = socket.read(&mut chunk).await.expect("read body");
            assert!(n > 0, "connection closed before body");
            buf.extend_from_slice(&chunk[..n]);
        }

        let response = format!("HTTP/1.1 {status} Status\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok");
        socket.write_all(response.as_bytes()).await.expect("write");
        socket.shutdown().await.ok();

        String::from_utf8_lossy(&buf[header_end..header_end + content_length]).into_owned()
    });

    (format!("http://{addr}/hook"), handle)
}

fn sample() -> (ItemId, ChangeSet, Snapshot) {
    let item = ItemId::new("B019QZBS10").unwrap();
    let latest = Snapshot::success(
        item.clone(),
        ProductFields {
            title: Some("Stainless Steel Bottle".to_string()),
            sale_price: Some(9.99),
            ..ProductFields::default()
        },
    );
    let mut set = ChangeSet::between(&latest, &latest);
    set.changes.insert(
        "sale_price".to_string(),
        FieldChange {
            field: "sale_price".to_string(),
            kind: FieldKind::Numeric,
            old: FieldValue::Number(12.99),
            new: FieldValue::Number(9.99),
        },
    );
    (item, set, latest)
}

#[tokio::test]
async fn test_webhook_posts_json_payload() {
    let (url, server) = one_shot_server(200).await;
    let dispatcher = WebhookDispatcher::new(url)
        .unwrap()
        .with_link_template("https://www.amazon.com/dp/{item}");
    let (item, set, latest) = sample();

    dispatcher
        .notify(&item, &set, &latest)
        .await
        .expect("webhook delivery");

    let body = server.await.expect("server task");
    let json: serde_json::Value = serde_json::from_str(&body).expect("json body");
    assert_eq!(json["item_id"], "B019QZBS10");
    assert_eq!(json["subject"], "B019QZBS10: 1 change detected");
    assert!(json["text"]
        .as_str()
        .unwrap()
        .contains("Sale price: $12.99 → $9.99"));
    assert!(json["text"]
        .as_str()
        .unwrap()
        .ends_with("https://www.amazon.com/dp/B019QZBS10"));
    assert_eq!(json["changes"]["changes"]["sale_price"]["new"]["value"], 9.99);
}

#[tokio::test]
async fn test_webhook_error_status_is_reported() {
    let (url, server) = one_shot_server(500).await;
    let dispatcher = WebhookDispatcher::new(url).unwrap();
    let (item, set, latest) = sample();

    let err = dispatcher
        .notify(&item, &set, &latest)
        .await
        .expect_err("500 should fail");
    assert!(matches!(err, NotifyError::Status { status: 500, .. }));
    server.await.expect("server task");
}

#[tokio::test]
async fn test_disabled_config_drops_notifications() {
    let config = NotificationConfig {
        enabled: false,
        webhook_url: Some("http://127.0.0.1:9/unreachable".to_string()),
    };
    let dispatcher = dispatcher_from_config(&config, "https://www.amazon.com/dp/{item}").unwrap();
    let (item, set, latest) = sample();

    dispatcher
        .notify(&item, &set, &latest)
        .await
        .expect("disabled dispatcher never fails");
}
