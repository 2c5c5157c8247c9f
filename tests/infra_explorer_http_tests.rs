//! HTTP-based integration tests for the BlockCypher explorer client.
//!
//! Uses `wiremock` to serve paged address listings, hook endpoints, and
//! error responses.

use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param, query_param_is_missing},
};

use doge_donation_relayer::domain::{
    AppError, CreateHookRequest, ExplorerClient, ExternalServiceError,
};
use doge_donation_relayer::infra::{BlockcypherClient, BlockcypherConfig};

const ADDRESS: &str = "DNk1wuxV4DqiPMvqnwXU6R1AirdB7YZh32";

fn client_for(server: &MockServer) -> BlockcypherClient {
    BlockcypherClient::new(BlockcypherConfig {
        base_url: server.uri(),
        page_delay: Duration::from_millis(5),
        ..Default::default()
    })
    .unwrap()
}

fn tx(hash: &str, block_height: i64) -> Value {
    json!({
        "hash": hash,
        "block_height": block_height,
        "received": "2023-05-01T00:00:00Z",
        "inputs": [{ "addresses": ["DDonor"], "output_value": 200_000_000u64 }],
        "outputs": [{ "addresses": [ADDRESS], "value": 100_000_000u64 }]
    })
}

fn page(txs: Vec<Value>, has_more: bool) -> Value {
    json!({ "address": ADDRESS, "txs": txs, "hasMore": has_more })
}

// ============================================================================
// PAGINATION TESTS
// ============================================================================

mod pagination_tests {
    use super::*;

    #[tokio::test]
    async fn test_full_sync_follows_pages() {
        let mock_server = MockServer::start().await;
        let full_path = format!("/addrs/{}/full", ADDRESS);

        Mock::given(method("GET"))
            .and(path(full_path.as_str()))
            .and(query_param_is_missing("before"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(page(vec![tx("c", 120), tx("b", 105)], true)),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path(full_path.as_str()))
            .and(query_param("before", "105"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![tx("a", 100)], false)))
            .expect(1)
            .mount(&mock_server)
            .await;

        let txs = client_for(&mock_server)
            .fetch_transactions(ADDRESS, None)
            .await
            .unwrap();

        let hashes: Vec<&str> = txs.iter().map(|t| t.hash.as_str()).collect();
        assert_eq!(hashes, vec!["c", "b", "a"]);

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(
            requests
                .iter()
                .all(|r| !r.url.query_pairs().any(|(k, _)| k == "after"))
        );
    }

    #[tokio::test]
    async fn test_incremental_sync_keeps_cursor_on_every_page() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("after", "110"))
            .and(query_param_is_missing("before"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(page(vec![tx("e", 130), tx("d", 125)], true)),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(query_param("after", "110"))
            .and(query_param("before", "125"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![tx("c", 111)], false)))
            .expect(1)
            .mount(&mock_server)
            .await;

        let txs = client_for(&mock_server)
            .fetch_transactions(ADDRESS, Some(110))
            .await
            .unwrap();
        assert_eq!(txs.len(), 3);
        assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_single_page_makes_one_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![tx("a", 1)], false)))
            .expect(1)
            .mount(&mock_server)
            .await;

        let txs = client_for(&mock_server)
            .fetch_transactions(ADDRESS, None)
            .await
            .unwrap();
        assert_eq!(txs.len(), 1);

        let requests = mock_server.received_requests().await.unwrap();
        let query: Vec<(String, String)> = requests[0]
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(query.contains(&("limit".to_string(), "50".to_string())));
        assert!(query.contains(&("txlimit".to_string(), "1000".to_string())));
    }

    #[tokio::test]
    async fn test_empty_history() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![], false)))
            .mount(&mock_server)
            .await;

        let txs = client_for(&mock_server)
            .fetch_transactions(ADDRESS, Some(500))
            .await
            .unwrap();
        assert!(txs.is_empty());
    }

    #[tokio::test]
    async fn test_token_sent_as_query_parameter() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("token", "secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![], false)))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = BlockcypherClient::new(BlockcypherConfig {
            base_url: mock_server.uri(),
            token: Some(SecretString::from("secret-token")),
            page_delay: Duration::ZERO,
            ..Default::default()
        })
        .unwrap();

        assert!(client.fetch_transactions(ADDRESS, None).await.is_ok());
    }
}

// ============================================================================
// ERROR HANDLING TESTS
// ============================================================================

mod error_tests {
    use super::*;

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&mock_server)
            .await;

        let result = client_for(&mock_server)
            .fetch_transactions(ADDRESS, None)
            .await;
        assert!(matches!(
            result,
            Err(AppError::ExternalService(ExternalServiceError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_failure_on_second_page_aborts() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param_is_missing("before"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![tx("b", 50)], true)))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(query_param("before", "50"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Limits reached"))
            .mount(&mock_server)
            .await;

        let result = client_for(&mock_server)
            .fetch_transactions(ADDRESS, None)
            .await;
        assert!(matches!(
            result,
            Err(AppError::ExternalService(ExternalServiceError::RateLimited(ref m)))
                if m.contains("Limits reached")
        ));
        assert!(result.unwrap_err().is_upstream_unavailable());
    }

    #[tokio::test]
    async fn test_slow_response_is_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(page(vec![], false))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&mock_server)
            .await;

        let client = BlockcypherClient::new(BlockcypherConfig {
            base_url: mock_server.uri(),
            request_timeout: Duration::from_millis(200),
            ..Default::default()
        })
        .unwrap();

        let result = client.fetch_transactions(ADDRESS, None).await;
        assert!(matches!(
            result,
            Err(AppError::ExternalService(ExternalServiceError::Timeout(_)))
        ));
        assert!(result.unwrap_err().is_upstream_unavailable());
    }

    #[tokio::test]
    async fn test_invalid_json_is_parse_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let result = client_for(&mock_server).get_address(ADDRESS).await;
        assert!(matches!(
            result,
            Err(AppError::ExternalService(ExternalServiceError::ParseError(_)))
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unavailable() {
        let client = BlockcypherClient::new(BlockcypherConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            request_timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap();

        let result = client.health_check().await;
        assert!(matches!(
            result,
            Err(AppError::ExternalService(ExternalServiceError::Unavailable(_)))
        ));
    }
}

// ============================================================================
// ADDRESS & HOOK TESTS
// ============================================================================

mod address_and_hook_tests {
    use super::*;

    #[tokio::test]
    async fn test_get_address_summary() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/addrs/{}", ADDRESS).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "address": ADDRESS,
                "total_received": 123_456_789_000u64,
                "total_sent": 0,
                "balance": 123_456_789_000u64,
                "unconfirmed_balance": 0,
                "final_balance": 123_456_789_000u64,
                "n_tx": 12
            })))
            .mount(&mock_server)
            .await;

        let summary = client_for(&mock_server).get_address(ADDRESS).await.unwrap();
        assert_eq!(summary.total_received, 123_456_789_000);
        assert_eq!(summary.n_tx, 12);
    }

    #[tokio::test]
    async fn test_get_balance_in_whole_units() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/addrs/{}/balance", ADDRESS).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "address": ADDRESS,
                "final_balance": 4_200_000_000u64
            })))
            .mount(&mock_server)
            .await;

        let balance = client_for(&mock_server).get_balance(ADDRESS).await.unwrap();
        assert_eq!(balance, Decimal::new(42, 0));
    }

    #[tokio::test]
    async fn test_create_hook_posts_confirmed_tx_subscription() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hooks"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "hook-1",
                "event": "confirmed-tx",
                "address": ADDRESS,
                "url": "https://relayer.example.com/webhooks/blockcypher",
                "confirmations": 6,
                "signKey": "preset"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let request = CreateHookRequest {
            url: "https://relayer.example.com/webhooks/blockcypher".to_string(),
        };
        let hook = client_for(&mock_server)
            .create_hook(ADDRESS, &request)
            .await
            .unwrap();
        assert_eq!(hook.id.as_deref(), Some("hook-1"));

        let requests = mock_server.received_requests().await.unwrap();
        let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(sent["event"], "confirmed-tx");
        assert_eq!(sent["address"], ADDRESS);
        assert_eq!(sent["confirmations"], 6);
        assert_eq!(sent["signKey"], "preset");
        assert!(sent.get("id").is_none());
    }

    #[tokio::test]
    async fn test_list_and_delete_hooks() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/hooks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "hook-1", "event": "confirmed-tx", "address": ADDRESS, "url": "https://a.example.com" },
                { "id": "hook-2", "event": "confirmed-tx", "address": ADDRESS, "url": "https://b.example.com" }
            ])))
            .mount(&mock_server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/hooks/hook-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let hooks = client.list_hooks().await.unwrap();
        assert_eq!(hooks.len(), 2);
        client.delete_hook("hook-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_get_missing_hook_fails() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/hooks/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "Hook not found" })))
            .mount(&mock_server)
            .await;

        assert!(client_for(&mock_server).get_hook("missing").await.is_err());
    }
}
