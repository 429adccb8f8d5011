//! HttpCache against a mock cache server
//!
//! The cache uses a blocking client, so every cache call runs on a blocking
//! thread while the mock server lives on the test runtime.

use blobio_cache::{Cache, CacheState, HttpCache, HttpCacheConfig, HttpConnectionPool};
use blobio_utils::resilience::RetryConfig;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_bytes, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn blocking<T, F>(f: F) -> tokio::task::JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
}

fn quick_config(url: &str) -> HttpCacheConfig {
    HttpCacheConfig::new(url)
        .with_retries(0)
        .with_timeouts(Duration::from_millis(500), Duration::from_secs(2))
}

#[tokio::test(flavor = "multi_thread")]
async fn put_then_get() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/3"))
        .and(body_bytes(b"payload".to_vec()))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = quick_config(&server.uri());
    blocking(move || {
        let cache = HttpCache::new(8, &config).unwrap();
        assert!(cache.multiprocess_safe());
        assert!(cache.multithread_safe());
        assert!(cache.put(3, b"payload").unwrap());
        assert_eq!(cache.get(3).unwrap().unwrap(), &b"payload"[..]);
        assert_eq!(cache.get(4).unwrap(), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn unexpected_statuses_are_misses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = quick_config(&server.uri());
    blocking(move || {
        let cache = HttpCache::new(2, &config).unwrap();
        assert_eq!(cache.get(0).unwrap(), None);
        // Only 201 means stored
        assert!(!cache.put(0, b"x").unwrap());
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn bearer_token_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/0"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/0"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let token_dir = tempfile::TempDir::new().unwrap();
    let token_path = token_dir.path().join("token");
    std::fs::write(&token_path, "s3cret\n").unwrap();

    let config = quick_config(&server.uri()).with_bearer_token_path(&token_path);
    blocking(move || {
        let cache = HttpCache::new(1, &config).unwrap();
        assert_eq!(cache.get(0).unwrap().unwrap(), &b"ok"[..]);
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"second try".to_vec()))
        .mount(&server)
        .await;

    let config = quick_config(&server.uri());
    blocking(move || {
        let pool = HttpConnectionPool::new(&config).unwrap().with_retry(
            RetryConfig::default()
                .with_max_retries(2)
                .with_base_delay(Duration::from_millis(1)),
        );
        let cache = HttpCache::with_pool(4, &config, Arc::new(pool)).unwrap();
        assert_eq!(cache.get(1).unwrap().unwrap(), &b"second try"[..]);
    })
    .await
    .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_server_degrades_to_misses() {
    // Bind then release a port so nothing is listening on it
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let config = quick_config(&format!("http://{addr}"));

    blocking(move || {
        let cache = HttpCache::new(4, &config).unwrap();
        assert_eq!(cache.get(0).unwrap(), None);
        assert!(!cache.put(0, b"lost").unwrap());
        assert_eq!(cache.state(), CacheState::Open);
    })
    .await
    .unwrap();
}

#[test]
fn invalid_url_is_rejected() {
    let config = HttpCacheConfig::new("not a url");
    assert!(HttpCache::new(1, &config).is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn shared_pool_serves_several_caches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;

    let config = quick_config(&server.uri());
    blocking(move || {
        let pool = Arc::new(HttpConnectionPool::new(&config).unwrap());
        let first = HttpCache::with_pool(2, &config, Arc::clone(&pool)).unwrap();
        let second = HttpCache::with_pool(2, &config, Arc::clone(&pool)).unwrap();
        assert!(Arc::ptr_eq(first.pool(), second.pool()));
        assert_eq!(first.get(0).unwrap(), None);
        assert_eq!(second.get(1).unwrap(), None);
        assert!(!pool.reset_if_forked().unwrap());
    })
    .await
    .unwrap();
}
