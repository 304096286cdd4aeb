//! Event append, subscription lookup, and health endpoints.

mod common;

use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn health_check_returns_ok() {
    let t = common::setup();

    let (status, body) = t.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn append_event_assigns_sequence() {
    let t = common::setup();

    let (status, body) = t
        .post(
            "/api/events",
            json!({
                "initiatorType": "participant",
                "initiatorId": "p-1",
                "type": "VAULT_SECRET_ROTATED",
                "payload": { "version": 2 },
                "vaultSecretId": "vs-3"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sequence"], 1);
    assert_eq!(body["type"], "VAULT_SECRET_ROTATED");
    assert_eq!(body["vaultSecretId"], "vs-3");
    assert_eq!(body["payload"]["version"], 2);

    let (_, body) = t
        .post(
            "/api/events",
            json!({ "initiatorType": "agent", "initiatorId": "a-1", "type": "AGENT_CREATED" }),
        )
        .await;
    assert_eq!(body["sequence"], 2);

    // Appended events are what a consumer leases.
    let (_, lease) = t.lease("s1", "i1").await;
    assert_eq!(lease["events"][0]["vaultSecretId"], "vs-3");
    assert_eq!(lease["events"][1]["initiatorId"], "a-1");
}

#[tokio::test]
async fn append_event_rejects_blank_type() {
    let t = common::setup();

    let (status, body) = t
        .post(
            "/api/events",
            json!({ "initiatorType": "agent", "initiatorId": "a-1", "type": " " }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid-input");
}

#[tokio::test]
async fn subscription_lookup() {
    let t = common::setup();

    let (status, body) = t.get("/api/events/subscriptions/s1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not-found");

    t.lease("s1", "i1").await;
    t.ack("s1", "i1", 3).await;

    let (status, body) = t.get("/api/events/subscriptions/s1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subscriberId"], "s1");
    assert_eq!(body["lastEventSequenceProcessed"], 3);
    assert_eq!(body["leaseOwnerInstanceId"], "i1");
    assert_eq!(body["isActive"], true);

    t.expire_lease("s1");
    let (_, body) = t.get("/api/events/subscriptions/s1").await;
    assert_eq!(body["isActive"], false);
    assert_eq!(body["leaseOwnerInstanceId"], "i1");
}
