//! HTTP-based tests for the MyDoge name resolver.

use std::sync::Arc;

use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

use doge_donation_relayer::domain::{Cache, NameResolver};
use doge_donation_relayer::infra::{InMemoryCache, MydogeConfig, MydogeNameResolver};
use doge_donation_relayer::infra::names::mydoge::profile_cache_key;

const DONOR: &str = "DDonor111";

fn resolver_for(server: &MockServer, cache: &Arc<InMemoryCache>) -> MydogeNameResolver {
    MydogeNameResolver::new(
        MydogeConfig {
            base_url: server.uri(),
            ..Default::default()
        },
        Arc::clone(cache) as _,
    )
    .unwrap()
}

#[tokio::test]
async fn test_refresh_caches_profile_name() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/wallet/{}/profile", DONOR).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "Such Donor" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let cache = Arc::new(InMemoryCache::new());
    resolver_for(&mock_server, &cache)
        .refresh_cached_name(DONOR)
        .await
        .unwrap();

    assert_eq!(
        cache.get(&profile_cache_key(DONOR)).await.unwrap().as_deref(),
        Some("Such Donor")
    );
}

#[tokio::test]
async fn test_missing_profile_cached_as_empty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let cache = Arc::new(InMemoryCache::new());
    resolver_for(&mock_server, &cache)
        .refresh_cached_name(DONOR)
        .await
        .unwrap();

    assert_eq!(
        cache.get(&profile_cache_key(DONOR)).await.unwrap().as_deref(),
        Some("")
    );
}

#[tokio::test]
async fn test_server_error_is_reported_and_not_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let cache = Arc::new(InMemoryCache::new());
    let result = resolver_for(&mock_server, &cache)
        .refresh_cached_name(DONOR)
        .await;

    assert!(result.is_err());
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_empty_address_is_skipped() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let cache = Arc::new(InMemoryCache::new());
    resolver_for(&mock_server, &cache)
        .refresh_cached_name("")
        .await
        .unwrap();
    assert!(cache.is_empty());
}
