mod utils;

use std::collections::BTreeMap;
use std::time::Duration;

use erp_events::{EventType, MAX_RESPONSE_CHARS};
use erp_webhooks::domain::ports::SubscriptionStore;
use erp_webhooks::outbound::webhook::{
    DispatchSummary, EVENT_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER, WebhookSecret,
    WebhookSubscription, sign, verify,
};
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn subscription(server: &MockServer, route: &str, event: EventType, secret: &str) -> WebhookSubscription {
    WebhookSubscription::new(
        format!("hook {route}"),
        event,
        Url::parse(&format!("{}{route}", server.uri())).unwrap(),
        WebhookSecret::new(secret),
    )
}

#[tokio::test]
async fn test_no_subscribers_dispatches_nothing() {
    let harness = utils::harness(Duration::from_secs(5));

    let summary = harness
        .dispatcher
        .dispatch(EventType::PayrollProcessed, json!({ "runId": 7 }))
        .await;

    assert_eq!(summary, DispatchSummary::default());
    assert!(harness.log.snapshot().is_empty());
}

#[tokio::test]
async fn test_mixed_outcomes_are_all_counted_and_logged() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/error"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let harness = utils::harness(Duration::from_millis(500));
    for route in ["/ok", "/error", "/slow"] {
        harness
            .store
            .insert(subscription(&server, route, EventType::VendorCreated, "s3cret"))
            .await
            .unwrap();
    }

    let summary = harness
        .dispatcher
        .dispatch(EventType::VendorCreated, json!({ "vendorId": "V-1" }))
        .await;

    assert_eq!(summary.dispatched, 3);
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.failed, 2);
    assert!(summary.error.is_none());

    let attempts = harness.log.snapshot();
    assert_eq!(attempts.len(), 3);

    let mut statuses: Vec<u16> = attempts.iter().map(|a| a.status_code).collect();
    statuses.sort_unstable();
    assert_eq!(statuses, vec![0, 200, 500]);

    let timed_out = attempts.iter().find(|a| a.status_code == 0).unwrap();
    assert!(!timed_out.success);
    assert!(timed_out.error_message.is_some());

    let rejected = attempts.iter().find(|a| a.status_code == 500).unwrap();
    assert!(!rejected.success);
    assert_eq!(rejected.response, "boom");
    assert!(rejected.error_message.is_none());

    // One envelope per dispatch, shared by every subscriber
    assert!(attempts.iter().all(|a| a.payload == attempts[0].payload));
}

#[tokio::test]
async fn test_invoice_paid_is_signed_with_subscription_secret() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let harness = utils::harness(Duration::from_secs(5));
    let secret = "whsec-invoice";
    let sub = subscription(&server, "/hook", EventType::InvoicePaid, secret)
        .with_headers(BTreeMap::from([("X-Tenant".to_string(), "acme".to_string())]));
    harness.store.insert(sub).await.unwrap();

    let summary = harness
        .dispatcher
        .dispatch(
            EventType::InvoicePaid,
            json!({ "invoiceId": "INV-1001", "amount": 250.5 }),
        )
        .await;
    assert_eq!(
        summary,
        DispatchSummary {
            dispatched: 1,
            successful: 1,
            failed: 0,
            error: None
        }
    );

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    let signature = request.headers.get(SIGNATURE_HEADER).unwrap().to_str().unwrap();
    assert_eq!(signature, sign(&request.body, secret));
    assert!(verify(&request.body, secret, signature).is_ok());
    assert!(verify(&request.body, "other-secret", signature).is_err());

    assert_eq!(request.headers.get(EVENT_HEADER).unwrap(), "invoice.paid");
    assert_eq!(request.headers.get("content-type").unwrap(), "application/json");
    assert_eq!(request.headers.get("x-tenant").unwrap(), "acme");

    let envelope: Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(envelope["event"], "invoice.paid");
    assert_eq!(envelope["data"]["invoiceId"], "INV-1001");
    assert_eq!(
        request.headers.get(TIMESTAMP_HEADER).unwrap().to_str().unwrap(),
        envelope["timestamp"].as_str().unwrap()
    );

    let attempts = harness.log.snapshot();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].payload.as_bytes(), request.body.as_slice());
}

#[tokio::test]
async fn test_long_responses_are_truncated_in_log() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/long"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(1500)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/short"))
        .respond_with(ResponseTemplate::new(200).set_body_string("thanks"))
        .mount(&server)
        .await;

    let harness = utils::harness(Duration::from_secs(5));
    let long = subscription(&server, "/long", EventType::ExportCompleted, "a");
    let short = subscription(&server, "/short", EventType::ExportCompleted, "b");
    let (long_id, short_id) = (long.id, short.id);
    harness.store.insert(long).await.unwrap();
    harness.store.insert(short).await.unwrap();

    let summary = harness
        .dispatcher
        .dispatch(EventType::ExportCompleted, json!({ "file": "ledger.csv" }))
        .await;
    assert_eq!(summary.successful, 2);

    let attempts = harness.log.snapshot();
    let long_attempt = attempts.iter().find(|a| a.subscription_id == long_id).unwrap();
    let short_attempt = attempts.iter().find(|a| a.subscription_id == short_id).unwrap();
    assert_eq!(long_attempt.response.chars().count(), MAX_RESPONSE_CHARS);
    assert_eq!(short_attempt.response, "thanks");
}

#[tokio::test]
async fn test_toggled_subscription_is_skipped_but_keeps_logs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let harness = utils::harness(Duration::from_secs(5));
    let sub = subscription(&server, "/hook", EventType::EmployeeCreated, "secret");
    let id = sub.id;
    harness.store.insert(sub).await.unwrap();

    let first = harness
        .dispatcher
        .dispatch(EventType::EmployeeCreated, json!({ "employeeId": 1 }))
        .await;
    assert_eq!(first.successful, 1);

    harness.store.toggle(id).await.unwrap();

    let second = harness
        .dispatcher
        .dispatch(EventType::EmployeeCreated, json!({ "employeeId": 2 }))
        .await;
    assert_eq!(second.dispatched, 0);

    let attempts = harness.log.snapshot();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].subscription_id, id);
    assert_eq!(attempts[0].status_code, 204);
}

#[tokio::test]
async fn test_other_event_types_are_not_delivered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let harness = utils::harness(Duration::from_secs(5));
    harness
        .store
        .insert(subscription(&server, "/hook", EventType::InvoiceSent, "secret"))
        .await
        .unwrap();

    let summary = harness
        .dispatcher
        .dispatch(EventType::InvoiceOverdue, json!({}))
        .await;
    assert_eq!(summary.dispatched, 0);
}
