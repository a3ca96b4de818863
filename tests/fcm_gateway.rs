//! Wire-level contract tests for the FCM gateway.
//!
//! A mock HTTP server stands in for the push service so these verify
//! the exact request shape (auth header, `to` vs `registration_ids`)
//! and the mapping from `results` entries back to per-address
//! outcomes.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use dinnerbell::config::PushConfig;
use dinnerbell::push::PushAddress;
use dinnerbell::{DispatchError, FcmGateway, PushGateway, PushMessage, SendOutcome};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway_for(server: &MockServer) -> FcmGateway {
    FcmGateway::new(&PushConfig {
        endpoint: format!("{}/fcm/send", server.uri()),
        server_key: "test-key".to_owned(),
        multicast_limit: 500,
        timeout_seconds: 5,
    })
    .unwrap()
}

fn message() -> PushMessage {
    PushMessage {
        title: "Dinner tomorrow: Tapas Night".to_owned(),
        body: "You're booked for Tapas Night at 19:00.".to_owned(),
    }
}

#[tokio::test]
async fn single_send_posts_to_field_and_delivers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fcm/send"))
        .and(header("authorization", "key=test-key"))
        .and(body_partial_json(json!({
            "to": "tok-1",
            "notification": {
                "title": "Dinner tomorrow: Tapas Night",
                "body": "You're booked for Tapas Night at 19:00.",
            },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "multicast_id": 216,
            "success": 1,
            "failure": 0,
            "results": [{ "message_id": "1:0408" }],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = gateway_for(&server).send("tok-1", &message()).await.unwrap();
    assert_eq!(outcome, SendOutcome::Delivered);
}

#[tokio::test]
async fn multicast_maps_results_back_to_addresses_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fcm/send"))
        .and(header("authorization", "key=test-key"))
        .and(body_partial_json(json!({
            "registration_ids": ["tok-1", "tok-2", "tok-3"],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "multicast_id": 217,
            "success": 1,
            "failure": 2,
            "results": [
                { "message_id": "1:0410" },
                { "error": "NotRegistered" },
                { "error": "Unavailable" },
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let addresses: Vec<PushAddress> =
        vec!["tok-1".to_owned(), "tok-2".to_owned(), "tok-3".to_owned()];
    let report = gateway_for(&server)
        .send_multicast(&addresses, &message())
        .await
        .unwrap();

    assert_eq!(
        report.results,
        vec![
            SendOutcome::Delivered,
            SendOutcome::Unregistered,
            SendOutcome::Failed("Unavailable".to_owned()),
        ]
    );
    assert_eq!(report.delivered(), 1);
    assert_eq!(report.failed(), 2);
}

#[tokio::test]
async fn server_error_surfaces_as_push_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fcm/send"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = gateway_for(&server)
        .send("tok-1", &message())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Push(_)));
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn result_count_mismatch_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fcm/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": 1,
            "failure": 0,
            "results": [{ "message_id": "1:0411" }],
        })))
        .mount(&server)
        .await;

    let addresses: Vec<PushAddress> = vec!["tok-1".to_owned(), "tok-2".to_owned()];
    let err = gateway_for(&server)
        .send_multicast(&addresses, &message())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Push(_)));
}

#[tokio::test]
async fn oversized_multicast_never_reaches_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let gateway = FcmGateway::new(&PushConfig {
        endpoint: format!("{}/fcm/send", server.uri()),
        server_key: "test-key".to_owned(),
        multicast_limit: 2,
        timeout_seconds: 5,
    })
    .unwrap();

    let addresses: Vec<PushAddress> = (0..3).map(|i| format!("tok-{i}")).collect();
    let err = gateway
        .send_multicast(&addresses, &message())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Push(_)));
}
