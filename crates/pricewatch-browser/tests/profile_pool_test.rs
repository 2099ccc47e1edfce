use pricewatch_browser::{BrowserError, Extractor, PortAllocator, ProfilePool, Result};
use pricewatch_core::{ItemId, ProductFields};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records live sessions so tests can check port uniqueness.
#[derive(Default)]
struct MockExtractor {
    live_ports: Mutex<HashSet<u16>>,
    max_live: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
    fail_open: bool,
}

struct MockSession {
    port: u16,
}

#[async_trait::async_trait]
impl Extractor for MockExtractor {
    type Session = MockSession;

    async fn open_session(&self, port: u16) -> Result<MockSession> {
        if self.fail_open {
            return Err(BrowserError::ChromiumError("launch failed".to_string()));
        }
        let mut live = self.live_ports.lock().unwrap();
        assert!(live.insert(port), "port {port} bound to two live sessions");
        self.max_live.fetch_max(live.len(), Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockSession { port })
    }

    async fn close_session(&self, session: MockSession) -> Result<()> {
        self.live_ports.lock().unwrap().remove(&session.port);
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn navigate(&self, _session: &mut MockSession, _item_id: &ItemId) -> Result<()> {
        Ok(())
    }

    async fn one_time_setup(&self, _session: &mut MockSession) -> Result<()> {
        Ok(())
    }

    async fn extract(&self, _session: &mut MockSession) -> Result<ProductFields> {
        Ok(ProductFields::default())
    }
}

fn pool(extractor: Arc<MockExtractor>, capacity: usize) -> ProfilePool<MockExtractor> {
    ProfilePool::new(extractor, Arc::new(PortAllocator::new(9222, 9999)), capacity)
}

#[tokio::test]
async fn test_reuse_returns_same_session() {
    let extractor = Arc::new(MockExtractor::default());
    let pool = pool(Arc::clone(&extractor), 3);

    let port = {
        let mut lease = pool.get_or_create(0).await.unwrap();
        assert!(!lease.setup_done);
        lease.setup_done = true;
        lease.port
    };

    let lease = pool.get_or_create(0).await.unwrap();
    assert_eq!(lease.port, port);
    assert!(lease.setup_done, "setup flag survives reuse");
    drop(lease);

    assert_eq!(extractor.opened.load(Ordering::SeqCst), 1);
    pool.cleanup_all().await;
}

#[tokio::test]
async fn test_capacity_evicts_oldest() {
    let extractor = Arc::new(MockExtractor::default());
    let pool = pool(Arc::clone(&extractor), 3);

    for id in 0..10 {
        drop(pool.get_or_create(id).await.unwrap());
        assert!(pool.resident_count() <= 3);
        if id == 3 {
            assert_eq!(pool.resident_ids(), vec![1, 2, 3], "4th request evicts the oldest");
        }
    }

    assert_eq!(pool.resident_ids(), vec![7, 8, 9]);
    assert_eq!(extractor.max_live.load(Ordering::SeqCst), 3);
    assert_eq!(pool.ports().in_use(), 3);

    assert_eq!(pool.cleanup_all().await, 3);
    assert_eq!(pool.resident_count(), 0);
    assert_eq!(pool.ports().in_use(), 0);
    assert_eq!(
        extractor.opened.load(Ordering::SeqCst),
        extractor.closed.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn test_busy_profile_is_not_shared() {
    let extractor = Arc::new(MockExtractor::default());
    let pool = Arc::new(pool(Arc::clone(&extractor), 2));

    let lease = pool.get_or_create(0).await.unwrap();

    let waiter = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.get_or_create(0).await.map(|lease| lease.port) })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished(), "second lease must wait for the first");

    let port = lease.port;
    drop(lease);
    assert_eq!(waiter.await.unwrap().unwrap(), port);
    assert_eq!(extractor.opened.load(Ordering::SeqCst), 1);

    pool.cleanup_all().await;
}

#[tokio::test]
async fn test_release_closes_profile() {
    let extractor = Arc::new(MockExtractor::default());
    let pool = pool(Arc::clone(&extractor), 2);

    drop(pool.get_or_create(5).await.unwrap());
    assert!(pool.release(5).await);
    assert!(!pool.release(5).await);
    assert_eq!(pool.resident_count(), 0);
    assert_eq!(extractor.closed.load(Ordering::SeqCst), 1);
    assert_eq!(pool.ports().in_use(), 0);
}

#[tokio::test]
async fn test_open_failure_leaves_no_resident() {
    let extractor = Arc::new(MockExtractor {
        fail_open: true,
        ..MockExtractor::default()
    });
    let pool = pool(Arc::clone(&extractor), 2);

    assert!(pool.get_or_create(0).await.is_err());
    assert_eq!(pool.resident_count(), 0);
    assert_eq!(pool.ports().in_use(), 0);
}

#[tokio::test]
async fn test_concurrent_distinct_profiles_get_distinct_ports() {
    let extractor = Arc::new(MockExtractor::default());
    let pool = Arc::new(pool(Arc::clone(&extractor), 8));

    let handles: Vec<_> = (0..8)
        .map(|id| {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                let lease = pool.get_or_create(id).await.unwrap();
                tokio::time::sleep(Duration::from_millis(10)).await;
                lease.port
            })
        })
        .collect();

    let mut ports = HashSet::new();
    for handle in handles {
        assert!(ports.insert(handle.await.unwrap()));
    }
    assert_eq!(pool.cleanup_all().await, 8);
}

#[tokio::test]
async fn test_capacity_clamped_to_port_range() {
    let extractor = Arc::new(MockExtractor::default());
    let pool = Arc::new(ProfilePool::new(
        Arc::clone(&extractor),
        Arc::new(PortAllocator::new(9222, 9223)),
        3,
    ));
    assert_eq!(pool.capacity(), 2);

    for id in 0..3 {
        drop(pool.get_or_create(id).await.unwrap());
        assert!(pool.resident_count() <= 2);
    }
    assert_eq!(pool.resident_ids(), vec![1, 2]);

    // Concurrent leases on more profiles than ports still never share one.
    let handles: Vec<_> = (3..6)
        .map(|id| {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                let lease = pool.get_or_create(id).await.unwrap();
                tokio::time::sleep(Duration::from_millis(10)).await;
                lease.port
            })
        })
        .collect();
    for handle in handles {
        assert!((9222..=9223).contains(&handle.await.unwrap()));
    }

    assert!(extractor.max_live.load(Ordering::SeqCst) <= 2);
    pool.cleanup_all().await;
    assert_eq!(pool.ports().in_use(), 0);
}
