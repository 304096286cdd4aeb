//! HTTP handlers for the lease, acknowledgment, and event log endpoints.
//!
//! Handlers validate request shape, apply the configured clamps, and run the
//! blocking SQLite work on the blocking pool. Failures are mapped to status
//! codes by [`ErrorKind`] alone.

use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Extension, Json, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use eventlease_lease::{
    acknowledge_events, acquire_lease, get_subscription, EventSubscription, LeaseError,
};
use eventlease_log::{append_event, fetch_since, latest_sequence, Event, LogError, NewEvent};
use eventlease_types::{ErrorBody, ErrorKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Request body for `POST /api/events/lease`.
#[derive(Debug, Deserialize)]
pub struct LeaseRequest {
    /// Logical consumer group.
    #[serde(rename = "subscriberId")]
    pub subscriber_id: Option<String>,
    /// Calling process.
    #[serde(rename = "instanceId")]
    pub instance_id: Option<String>,
    /// Requested lease length; clamped to the configured range.
    #[serde(rename = "leaseDurationSeconds")]
    pub lease_duration_seconds: Option<i64>,
    /// Maximum events to return; clamped to the configured range.
    pub limit: Option<i64>,
}

/// Response body for a granted lease.
#[derive(Debug, Serialize, Deserialize)]
pub struct LeaseResponse {
    /// Events after the cursor, ascending by sequence.
    pub events: Vec<Event>,
    /// When the lease expires unless renewed.
    #[serde(rename = "leaseExpiresAt")]
    pub lease_expires_at: DateTime<Utc>,
    /// Cursor the batch starts after.
    #[serde(rename = "lastEventSequenceProcessed")]
    pub last_event_sequence_processed: i64,
    /// Highest sequence in the log at fetch time.
    #[serde(rename = "latestSequence")]
    pub latest_sequence: i64,
}

/// Request body for `POST /api/events/ack`.
#[derive(Debug, Deserialize)]
pub struct AckRequest {
    /// Logical consumer group.
    #[serde(rename = "subscriberId")]
    pub subscriber_id: Option<String>,
    /// Calling process; must hold the lease.
    #[serde(rename = "instanceId")]
    pub instance_id: Option<String>,
    /// New cursor value; must exceed the current one.
    #[serde(rename = "lastEventSequenceProcessed")]
    pub last_event_sequence_processed: Option<i64>,
}

/// Response body for a successful acknowledgment.
#[derive(Debug, Serialize, Deserialize)]
pub struct AckResponse {
    /// Cursor after the acknowledgment.
    #[serde(rename = "lastEventSequenceProcessed")]
    pub last_event_sequence_processed: i64,
}

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Lease(#[from] LeaseError),
    #[error(transparent)]
    Log(#[from] LogError),
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl ApiError {
    /// Structured body for this error.
    pub fn body(&self) -> ErrorBody {
        match self {
            ApiError::Lease(e) => e.to_body(),
            ApiError::Log(e) => ErrorBody::new(e.kind(), e.to_string()),
            ApiError::BadRequest(_) => ErrorBody::new(ErrorKind::InvalidInput, self.to_string()),
            ApiError::InternalServerError(_) => {
                ErrorBody::new(ErrorKind::Internal, self.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.body();
        let status = match body.kind {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::LeaseConflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %body.error, "request failed");
        }

        (status, Json(body)).into_response()
    }
}

fn required(field: &str, value: Option<String>) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::BadRequest(format!("{field} is required"))),
    }
}

/// Runs `f` with a pooled connection on the blocking thread pool.
async fn with_conn<T, F>(state: Arc<AppState>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&mut rusqlite::Connection) -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut conn = state
            .pool
            .get()
            .map_err(|e| ApiError::InternalServerError(format!("db connection failed: {}", e)))?;
        f(&mut *conn)
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("task join error: {}", e)))?
}

/// Handler for `POST /api/events/lease`.
///
/// Acquires or renews the lease, then returns the next batch after the
/// subscriber's cursor.
pub async fn lease_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<LeaseRequest>, JsonRejection>,
) -> Result<Json<LeaseResponse>, ApiError> {
    let Json(req) = payload?;
    let subscriber_id = required("subscriberId", req.subscriber_id)?;
    let instance_id = required("instanceId", req.instance_id)?;
    let duration = Duration::seconds(state.leases.duration.apply(req.lease_duration_seconds));
    let limit = state.leases.fetch_limit.apply(req.limit);

    let response = with_conn(state, move |conn| {
        let grant = acquire_lease(conn, &subscriber_id, &instance_id, duration, Utc::now())?;
        let events = fetch_since(conn, grant.last_event_sequence_processed, limit)?;
        let latest = latest_sequence(conn)?;
        Ok(LeaseResponse {
            events,
            lease_expires_at: grant.lease_expires_at,
            last_event_sequence_processed: grant.last_event_sequence_processed,
            latest_sequence: latest,
        })
    })
    .await?;

    Ok(Json(response))
}

/// Handler for `POST /api/events/ack`.
pub async fn ack_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<AckRequest>, JsonRejection>,
) -> Result<Json<AckResponse>, ApiError> {
    let Json(req) = payload?;
    let subscriber_id = required("subscriberId", req.subscriber_id)?;
    let instance_id = required("instanceId", req.instance_id)?;
    let sequence = match req.last_event_sequence_processed {
        Some(seq) if seq > 0 => seq,
        Some(seq) => {
            return Err(ApiError::BadRequest(format!(
                "lastEventSequenceProcessed must be positive, got {seq}"
            )))
        }
        None => {
            return Err(ApiError::BadRequest(
                "lastEventSequenceProcessed is required".to_string(),
            ))
        }
    };

    let sub = with_conn(state, move |conn| {
        Ok(acknowledge_events(
            conn,
            &subscriber_id,
            &instance_id,
            sequence,
            Utc::now(),
        )?)
    })
    .await?;

    Ok(Json(AckResponse {
        last_event_sequence_processed: sub.last_event_sequence_processed,
    }))
}

/// Handler for `GET /api/events/subscriptions/{subscriberId}`.
pub async fn get_subscription_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(subscriber_id): Path<String>,
) -> Result<Json<EventSubscription>, ApiError> {
    let sub = with_conn(state, move |conn| {
        Ok(get_subscription(conn, &subscriber_id, Utc::now())?)
    })
    .await?;
    Ok(Json(sub))
}

/// Handler for `POST /api/events`.
///
/// Appends an event to the log. Producers normally write to the log
/// directly; this exists so a standalone deployment can be fed over HTTP.
pub async fn append_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<NewEvent>, JsonRejection>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    let Json(new_event) = payload?;
    let event = with_conn(state, move |conn| Ok(append_event(conn, &new_event)?)).await?;
    Ok((StatusCode::CREATED, Json(event)))
}
