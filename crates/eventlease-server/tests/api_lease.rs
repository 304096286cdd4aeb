//! End-to-end lease and acknowledgment protocol over HTTP.

mod common;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde_json::json;

fn expires_in_secs(body: &serde_json::Value) -> i64 {
    let expires: DateTime<Utc> = body["leaseExpiresAt"]
        .as_str()
        .expect("leaseExpiresAt should be a string")
        .parse()
        .expect("leaseExpiresAt should be RFC 3339");
    (expires - Utc::now()).num_seconds()
}

#[tokio::test]
async fn lease_protocol_walkthrough() {
    let t = common::setup();
    t.seed_events(20);

    // Unseen subscriber gets a lease at cursor 0.
    let (status, body) = t.lease("s1", "i1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lastEventSequenceProcessed"], 0);
    assert_eq!(body["latestSequence"], 20);
    assert_eq!(body["events"].as_array().unwrap().len(), 20);
    assert_eq!(t.owner("s1").as_deref(), Some("i1"));

    // Owner acknowledges.
    let (status, body) = t.ack("s1", "i1", 10).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lastEventSequenceProcessed"], 10);

    // Competitor is turned away with the holder named.
    let (status, body) = t.lease("s1", "i2").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");
    assert_eq!(body["currentOwner"], "i1");
    assert!(body["error"].as_str().unwrap().contains("i1"));
    assert_eq!(t.cursor("s1"), 10);
    assert_eq!(t.owner("s1").as_deref(), Some("i1"));

    // Once the lease lapses the competitor takes over and resumes after 10.
    t.expire_lease("s1");
    let (status, body) = t.lease("s1", "i2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lastEventSequenceProcessed"], 10);
    let sequences: Vec<i64> = body["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["sequence"].as_i64().unwrap())
        .collect();
    assert_eq!(sequences, (11..=20).collect::<Vec<_>>());
    assert_eq!(t.owner("s1").as_deref(), Some("i2"));

    // Regression is refused with the current cursor in the body.
    let (status, body) = t.ack("s1", "i2", 5).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["currentSequence"], 10);
    assert_eq!(t.cursor("s1"), 10);

    // The displaced instance can no longer acknowledge.
    let (status, body) = t.ack("s1", "i1", 11).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["currentOwner"], "i2");
    assert_eq!(t.cursor("s1"), 10);
}

#[tokio::test]
async fn renewal_by_owner_succeeds_and_keeps_cursor() {
    let t = common::setup();
    t.seed_events(3);

    t.lease("s1", "i1").await;
    t.ack("s1", "i1", 2).await;

    let (status, body) = t.lease("s1", "i1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lastEventSequenceProcessed"], 2);
    assert_eq!(body["events"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn lease_duration_defaults_and_clamps() {
    let t = common::setup();

    let (_, body) = t.lease("default", "i1").await;
    let secs = expires_in_secs(&body);
    assert!((298..=300).contains(&secs), "default lease should be ~300s, got {secs}");

    let (_, body) = t
        .post(
            "/api/events/lease",
            json!({ "subscriberId": "short", "instanceId": "i1", "leaseDurationSeconds": 1 }),
        )
        .await;
    let secs = expires_in_secs(&body);
    assert!((28..=30).contains(&secs), "lease should clamp up to 30s, got {secs}");

    let (_, body) = t
        .post(
            "/api/events/lease",
            json!({ "subscriberId": "long", "instanceId": "i1", "leaseDurationSeconds": 999_999 }),
        )
        .await;
    let secs = expires_in_secs(&body);
    assert!((3598..=3600).contains(&secs), "lease should clamp down to 3600s, got {secs}");
}

#[tokio::test]
async fn fetch_limit_defaults_and_clamps() {
    let t = common::setup();
    t.seed_events(1_050);

    let (_, body) = t.lease("default", "i1").await;
    assert_eq!(body["events"].as_array().unwrap().len(), 100);

    let (_, body) = t
        .post(
            "/api/events/lease",
            json!({ "subscriberId": "big", "instanceId": "i1", "limit": 5000 }),
        )
        .await;
    assert_eq!(body["events"].as_array().unwrap().len(), 1000);

    let (_, body) = t
        .post(
            "/api/events/lease",
            json!({ "subscriberId": "tiny", "instanceId": "i1", "limit": 0 }),
        )
        .await;
    assert_eq!(body["events"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn lease_rejects_missing_fields() {
    let t = common::setup();

    for body in [
        json!({ "instanceId": "i1" }),
        json!({ "subscriberId": "s1" }),
        json!({ "subscriberId": "", "instanceId": "i1" }),
        json!({ "subscriberId": "s1", "instanceId": "   " }),
    ] {
        let (status, resp) = t.post("/api/events/lease", body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(resp["kind"], "invalid-input");
    }

    let conn = t.pool.get().unwrap();
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM event_subscriptions", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 0, "invalid requests must not create subscriptions");
}

#[tokio::test]
async fn malformed_json_is_invalid_input() {
    let t = common::setup();

    let (status, body) = t
        .post_raw("/api/events/lease", "{\"subscriberId\": ".to_string())
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid-input");
}

#[tokio::test]
async fn concurrent_http_lease_requests_have_single_winner() {
    let t = common::setup();

    let mut handles = Vec::new();
    for n in 0..10 {
        let app = t.app.clone();
        handles.push(tokio::spawn(async move {
            use tower::ServiceExt;
            let request = axum::http::Request::builder()
                .uri("/api/events/lease")
                .method("POST")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(
                    json!({ "subscriberId": "race", "instanceId": format!("i{n}") }).to_string(),
                ))
                .unwrap();
            app.oneshot(request).await.unwrap().status()
        }));
    }

    let mut ok = 0;
    let mut conflict = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => ok += 1,
            StatusCode::CONFLICT => conflict += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(conflict, 9);
}
