//! Outbound donation webhook tests.
//!
//! Uses `wiremock` as the downstream consumer and the in-memory delivery log
//! to check that every attempt leaves exactly one audit record.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

use doge_donation_relayer::app::{
    AppService, TESTNET_DOGE_ADDRESS, WebhookDispatcher, WebhookDispatcherConfig,
};
use doge_donation_relayer::domain::{
    Blockchain, Campaign, DOGE_CURRENCY_SYMBOL, DeliveryOutcome, Donation, Transaction,
};
use doge_donation_relayer::test_utils::{
    MockCache, MockDeliveryLog, MockDonationRepository, MockExplorerClient, MockNameResolver,
    RecordingErrorReporter,
};

const API_KEY: &str = "downstream-key";

fn donation(id: i64) -> Donation {
    let at = Utc.with_ymd_and_hms(2023, 4, 20, 16, 20, 0).unwrap();
    Donation {
        id,
        tx_hash: format!("tx-{}", id),
        amount: Decimal::new(42069, 2),
        from_address: "DDonor".to_string(),
        to_address: TESTNET_DOGE_ADDRESS.to_string(),
        blockchain: Blockchain::Dogecoin,
        campaign: Campaign::Ph,
        currency: DOGE_CURRENCY_SYMBOL.to_string(),
        block_created_at: at,
        block_number: Some(4_700_000),
        created_at: at,
        updated_at: at,
    }
}

fn dispatcher(
    url: String,
    log: &Arc<MockDeliveryLog>,
    reporter: &Arc<RecordingErrorReporter>,
) -> WebhookDispatcher {
    WebhookDispatcher::new(
        WebhookDispatcherConfig::new(url, SecretString::from(API_KEY)),
        Arc::clone(log) as _,
        Arc::clone(reporter) as _,
    )
    .unwrap()
}

fn incoming(hash: &str, block_height: i64) -> Transaction {
    serde_json::from_value(json!({
        "hash": hash,
        "block_height": block_height,
        "received": "2023-04-20T16:20:00Z",
        "inputs": [{ "addresses": ["DDonor"] }],
        "outputs": [{ "addresses": [TESTNET_DOGE_ADDRESS], "value": 100_000_000u64 }]
    }))
    .unwrap()
}

// ============================================================================
// DELIVERY TESTS
// ============================================================================

mod delivery_tests {
    use super::*;

    #[tokio::test]
    async fn test_success_records_one_successful_attempt() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/webhooks/donations"))
            .and(header("X-API-Key", API_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let log = Arc::new(MockDeliveryLog::new());
        let reporter = Arc::new(RecordingErrorReporter::new());
        let url = format!("{}/api/webhooks/donations", mock_server.uri());
        let outcome = dispatcher(url.clone(), &log, &reporter)
            .deliver(&donation(7))
            .await;

        assert_eq!(outcome, DeliveryOutcome::Delivered { status_code: 200 });

        let records = log.get_records();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_successful);
        assert_eq!(records[0].donation_id, 7);
        assert_eq!(records[0].url, url);
        assert_eq!(records[0].response_code, Some(200));
        assert_eq!(records[0].response.as_deref(), Some(r#"{"ok":true}"#));
        assert!(reporter.get_captured().is_empty());

        let requests = mock_server.received_requests().await.unwrap();
        let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(sent["txHash"], "tx-7");
        assert_eq!(sent["amount"], "420.69");
    }

    #[tokio::test]
    async fn test_error_status_records_one_failed_attempt() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let log = Arc::new(MockDeliveryLog::new());
        let reporter = Arc::new(RecordingErrorReporter::new());
        let outcome = dispatcher(mock_server.uri(), &log, &reporter)
            .deliver(&donation(8))
            .await;

        assert!(matches!(
            outcome,
            DeliveryOutcome::Failed {
                status_code: Some(500),
                ..
            }
        ));

        let records = log.get_records();
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_successful);
        assert_eq!(records[0].response_code, Some(500));
        assert_eq!(records[0].response.as_deref(), Some("boom"));
        assert_eq!(reporter.get_captured().len(), 1);
    }

    #[tokio::test]
    async fn test_connection_failure_records_one_failed_attempt() {
        let log = Arc::new(MockDeliveryLog::new());
        let reporter = Arc::new(RecordingErrorReporter::new());
        let outcome = dispatcher("http://127.0.0.1:1/hook".to_string(), &log, &reporter)
            .deliver(&donation(9))
            .await;

        assert!(matches!(
            outcome,
            DeliveryOutcome::Failed {
                status_code: None,
                ..
            }
        ));

        let records = log.get_records();
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_successful);
        assert_eq!(records[0].response_code, None);
        let body: Value = serde_json::from_str(records[0].response.as_deref().unwrap()).unwrap();
        assert!(body["error"].is_string());

        let captured = reporter.get_captured();
        assert_eq!(captured.len(), 1);
        assert!(captured[0].0.contains("donation 9"));
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_change_outcome() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&mock_server)
            .await;

        let log = Arc::new(MockDeliveryLog::failing("audit table unavailable"));
        let reporter = Arc::new(RecordingErrorReporter::new());
        let outcome = dispatcher(mock_server.uri(), &log, &reporter)
            .deliver(&donation(10))
            .await;

        assert_eq!(outcome, DeliveryOutcome::Delivered { status_code: 202 });
        assert!(log.get_records().is_empty());
    }

    #[tokio::test]
    async fn test_no_retry_after_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&mock_server)
            .await;

        let log = Arc::new(MockDeliveryLog::new());
        let reporter = Arc::new(RecordingErrorReporter::new());
        dispatcher(mock_server.uri(), &log, &reporter)
            .deliver(&donation(11))
            .await;

        assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);
        assert_eq!(log.get_records().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_delivery_records_abandoned_attempt() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&mock_server)
            .await;

        let log = Arc::new(MockDeliveryLog::new());
        let reporter = Arc::new(RecordingErrorReporter::new());
        let d = dispatcher(mock_server.uri(), &log, &reporter);

        let cancelled = tokio::time::timeout(Duration::from_millis(200), d.deliver(&donation(12))).await;
        assert!(cancelled.is_err());

        // the audit write is spawned from Drop
        for _ in 0..50 {
            if !log.get_records().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let records = log.get_records();
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_successful);
        assert_eq!(records[0].donation_id, 12);
        assert_eq!(records[0].response_code, None);
        assert!(
            records[0]
                .response
                .as_deref()
                .unwrap()
                .contains("delivery attempt abandoned")
        );
    }
}

// ============================================================================
// SERVICE WIRING TESTS
// ============================================================================

mod service_dispatch_tests {
    use super::*;

    struct Wired {
        service: AppService,
        repository: Arc<MockDonationRepository>,
        explorer: Arc<MockExplorerClient>,
        log: Arc<MockDeliveryLog>,
    }

    fn wired(url: String) -> Wired {
        let repository = Arc::new(MockDonationRepository::new());
        let explorer = Arc::new(MockExplorerClient::new());
        let log = Arc::new(MockDeliveryLog::new());
        let reporter = Arc::new(RecordingErrorReporter::new());
        let service = AppService::new(
            Arc::clone(&repository) as _,
            Arc::clone(&log) as _,
            Arc::clone(&explorer) as _,
            Arc::new(MockCache::new()),
            Arc::new(MockNameResolver::new()),
            TESTNET_DOGE_ADDRESS,
        )
        .with_dispatcher(dispatcher(url, &log, &reporter));
        Wired {
            service,
            repository,
            explorer,
            log,
        }
    }

    #[tokio::test]
    async fn test_webhook_donation_is_dispatched() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let w = wired(mock_server.uri());
        let donation = w
            .service
            .process_webhook(&incoming("pushed", 50))
            .await
            .unwrap()
            .unwrap();

        let records = w.log.get_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].donation_id, donation.id);
    }

    #[tokio::test]
    async fn test_bulk_sync_never_dispatches() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let w = wired(mock_server.uri());
        w.explorer.push_transaction(incoming("synced-1", 60));
        w.explorer.push_transaction(incoming("synced-2", 61));

        let report = w.service.sync_donations().await.unwrap();
        assert_eq!(report.ingested, 2);
        assert_eq!(w.repository.get_all_items().len(), 2);
        assert!(w.log.get_records().is_empty());
    }

    #[tokio::test]
    async fn test_manual_dispatch_and_delivery_listing() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let w = wired(mock_server.uri());
        w.explorer.push_transaction(incoming("stored", 70));
        w.service.sync_donations().await.unwrap();
        let id = w.repository.get_all_items()[0].id;

        let outcome = w.service.dispatch_donation(id).await.unwrap();
        assert!(!outcome.is_success());

        let deliveries = w.service.list_deliveries(10).await.unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].donation_id, id);
        assert!(!deliveries[0].is_successful);
    }

    #[tokio::test]
    async fn test_manual_dispatch_of_unknown_donation() {
        let w = wired("http://127.0.0.1:1".to_string());
        assert!(w.service.dispatch_donation(404).await.is_err());
        assert!(w.log.get_records().is_empty());
    }
}
