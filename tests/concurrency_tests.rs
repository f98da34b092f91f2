//! Concurrency and timing tests on a paused clock
//!
//! Uses the scripted in-memory transport so that backoff waits, refresh
//! latency and hung connections are driven by virtual time.

use condo_client::auth::SignOutReason;
use condo_client::testing::{request_path, MockReply, MockTransport};
use condo_client::types::Method;
use condo_client::{ApiClient, ClientConfig, CredentialRecord, Error, RequestDescriptor};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

type SignOuts = Arc<Mutex<Vec<SignOutReason>>>;

fn connect(transport: Arc<MockTransport>) -> (ApiClient, SignOuts) {
    let sign_outs: SignOuts = Arc::new(Mutex::new(Vec::new()));
    let recorded = sign_outs.clone();
    let config = ClientConfig::builder()
        .base_url("https://condo.test/api")
        .build();
    let client = ApiClient::builder(config)
        .transport(transport)
        .on_sign_out(move |reason| recorded.lock().unwrap().push(reason))
        .build()
        .unwrap();
    client.login(CredentialRecord::new("access-1", Some("refresh-1".to_string())));
    (client, sign_outs)
}

#[tokio::test(start_paused = true)]
async fn concurrent_401s_share_a_single_refresh() {
    let transport = Arc::new(MockTransport::with_handler(|req| {
        if request_path(req) == "/api/auth/refresh" {
            return MockReply::ok_json(json!({"accessToken": "access-2"}))
                .delay(Duration::from_millis(300));
        }
        match req.bearer_token() {
            Some("access-2") => MockReply::ok_json(json!({"ok": true})),
            _ => MockReply::status(401).delay(Duration::from_millis(10)),
        }
    }));
    let (client, _) = connect(transport.clone());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move { client.get(&format!("/units/{i}")).await })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().unwrap().is_success());
    }

    assert_eq!(transport.count(Method::POST, "/api/auth/refresh"), 1);
    assert_eq!(client.refresh_count(), 1);
    let replays = transport
        .requests()
        .into_iter()
        .filter(|r| r.bearer_token() == Some("access-2"))
        .count();
    assert_eq!(replays, 8);
}

#[tokio::test(start_paused = true)]
async fn server_error_then_success_waits_one_backoff() {
    let transport = Arc::new(MockTransport::new());
    transport
        .enqueue(Method::GET, "/api/notices", MockReply::status(500))
        .route(Method::GET, "/api/notices", MockReply::ok_json(json!([])));
    let (client, _) = connect(transport.clone());

    let start = Instant::now();
    let response = client.get("/notices").await.unwrap();

    assert!(response.is_success());
    assert_eq!(transport.count(Method::GET, "/api/notices"), 2);
    assert!(start.elapsed() >= Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn persistent_503_gives_up_after_max_retries() {
    let transport = Arc::new(MockTransport::new());
    transport.route(Method::GET, "/api/invoices", MockReply::status(503));
    let (client, _) = connect(transport.clone());

    let err = client.get("/invoices").await.unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 503, .. }));
    assert_eq!(transport.count(Method::GET, "/api/invoices"), 4);
}

#[tokio::test(start_paused = true)]
async fn rejected_refresh_signs_out_exactly_once() {
    let transport = Arc::new(MockTransport::new());
    transport
        .route(Method::GET, "/api/units", MockReply::status(401))
        .route(Method::GET, "/api/tickets", MockReply::status(401))
        .route(
            Method::POST,
            "/api/auth/refresh",
            MockReply::status(401).delay(Duration::from_millis(50)),
        );
    let (client, sign_outs) = connect(transport.clone());

    let (units, tickets) = tokio::join!(client.get("/units"), client.get("/tickets"));

    assert!(matches!(units, Err(Error::AuthExpired { .. })));
    assert!(matches!(tickets, Err(Error::AuthExpired { .. })));
    assert_eq!(transport.count(Method::POST, "/api/auth/refresh"), 1);
    assert_eq!(
        *sign_outs.lock().unwrap(),
        vec![SignOutReason::RefreshRejected]
    );

    // The session is gone; later 401s do not refresh or notify again
    let err = client.get("/units").await.unwrap_err();
    assert!(matches!(err, Error::AuthExpired { .. }));
    assert_eq!(transport.count(Method::POST, "/api/auth/refresh"), 1);
    assert_eq!(sign_outs.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn aborting_a_group_settles_in_flight_and_backoff() {
    let transport = Arc::new(MockTransport::new());
    transport
        .route(Method::GET, "/api/reports/annual", MockReply::hang())
        .route(Method::GET, "/api/reports/monthly", MockReply::hang())
        .route(Method::GET, "/api/reports/summary", MockReply::status(503));
    let (client, _) = connect(transport.clone());
    let group = client.create_cancellation_group("reports-page");

    let handles: Vec<_> = ["/reports/annual", "/reports/monthly", "/reports/summary"]
        .into_iter()
        .map(|path| {
            let client = client.clone();
            let signal = group.signal();
            tokio::spawn(async move {
                client
                    .request(RequestDescriptor::get(path).with_signal(signal))
                    .await
            })
        })
        .collect();

    // Summary is now sleeping in its first backoff, the others are in flight
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(transport.requests().len(), 3);
    group.abort("left reports page");

    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert!(
            matches!(err, Error::Aborted { ref reason } if reason == "left reports page"),
            "got {err:?}"
        );
    }

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.requests().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn retry_after_sets_the_backoff() {
    let transport = Arc::new(MockTransport::new());
    transport
        .enqueue(
            Method::GET,
            "/api/parking",
            MockReply::status(429).header("Retry-After", "2"),
        )
        .route(Method::GET, "/api/parking", MockReply::ok_json(json!([])));
    let (client, _) = connect(transport.clone());

    let start = Instant::now();
    client.get("/parking").await.unwrap();
    let waited = start.elapsed();

    assert!(waited >= Duration::from_millis(2000), "{waited:?}");
    assert!(waited <= Duration::from_millis(2001), "{waited:?}");
    assert_eq!(transport.count(Method::GET, "/api/parking"), 2);
}

#[tokio::test(start_paused = true)]
async fn independent_clients_do_not_share_refresh_state() {
    let backend = || {
        Arc::new(MockTransport::with_handler(|req| {
            if request_path(req) == "/api/auth/refresh" {
                return MockReply::ok_json(json!({"accessToken": "access-2"}));
            }
            match req.bearer_token() {
                Some("access-2") => MockReply::status(200),
                _ => MockReply::status(401),
            }
        }))
    };
    let (first, _) = connect(backend());
    let (second, _) = connect(backend());

    first.get("/units").await.unwrap();

    assert_eq!(first.refresh_count(), 1);
    assert_eq!(second.refresh_count(), 0);
    assert_eq!(
        second.credentials().access_token.as_deref(),
        Some("access-1")
    );
}
