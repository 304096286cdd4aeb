//! Shared harness for server integration tests.
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use eventlease_db::{create_pool, run_migrations, DbPool, DbRuntimeSettings};
use eventlease_log::{append_event, NewEvent};
use eventlease_server::{app, AppState, LeaseBounds};
use serde_json::{json, Value};
use tower::ServiceExt;

pub struct TestApp {
    pub app: Router,
    pub pool: DbPool,
    // Keeps the database file alive for the duration of the test.
    _dir: tempfile::TempDir,
}

/// Builds a router over a fresh file-backed database with default bounds.
pub fn setup() -> TestApp {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("eventlease.db");
    let pool = create_pool(
        path.to_str().expect("temp path should be utf-8"),
        DbRuntimeSettings::default(),
    )
    .expect("pool creation should succeed");
    {
        let conn = pool.get().expect("should get a connection");
        run_migrations(&conn).expect("migrations should succeed");
    }

    let state = AppState {
        pool: pool.clone(),
        leases: LeaseBounds::default(),
    };

    TestApp {
        app: app(state),
        pool,
        _dir: dir,
    }
}

impl TestApp {
    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.post_raw(uri, body.to_string()).await
    }

    pub async fn post_raw(&self, uri: &str, body: String) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn lease(&self, subscriber_id: &str, instance_id: &str) -> (StatusCode, Value) {
        self.post(
            "/api/events/lease",
            json!({ "subscriberId": subscriber_id, "instanceId": instance_id }),
        )
        .await
    }

    pub async fn ack(&self, subscriber_id: &str, instance_id: &str, seq: i64) -> (StatusCode, Value) {
        self.post(
            "/api/events/ack",
            json!({
                "subscriberId": subscriber_id,
                "instanceId": instance_id,
                "lastEventSequenceProcessed": seq
            }),
        )
        .await
    }

    /// Appends `count` events directly to the log.
    pub fn seed_events(&self, count: usize) {
        let conn = self.pool.get().unwrap();
        let tx = conn.unchecked_transaction().unwrap();
        for i in 0..count {
            append_event(
                &tx,
                &NewEvent::new("participant", "p-1", "PARTICIPANT_UPDATED", json!({ "n": i })),
            )
            .unwrap();
        }
        tx.commit().unwrap();
    }

    /// Moves the subscriber's lease expiry into the past.
    pub fn expire_lease(&self, subscriber_id: &str) {
        let conn = self.pool.get().unwrap();
        let changed = conn
            .execute(
                "UPDATE event_subscriptions SET lease_expires_at_ms = 0 WHERE subscriber_id = ?1",
                [subscriber_id],
            )
            .unwrap();
        assert_eq!(changed, 1, "subscription should exist");
    }

    pub fn cursor(&self, subscriber_id: &str) -> i64 {
        let conn = self.pool.get().unwrap();
        conn.query_row(
            "SELECT last_event_sequence_processed FROM event_subscriptions WHERE subscriber_id = ?1",
            [subscriber_id],
            |row| row.get(0),
        )
        .unwrap()
    }

    pub fn owner(&self, subscriber_id: &str) -> Option<String> {
        let conn = self.pool.get().unwrap();
        conn.query_row(
            "SELECT lease_owner_instance_id FROM event_subscriptions WHERE subscriber_id = ?1",
            [subscriber_id],
            |row| row.get(0),
        )
        .unwrap()
    }
}
