//! Subscription registry: the durable per-subscriber cursor and lease row.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::{LeaseConflict, LeaseError};

pub(crate) const SUBSCRIPTION_COLUMNS: &str = "subscriber_id, last_event_sequence_processed,
     lease_owner_instance_id, lease_expires_at_ms, is_active, created_at, updated_at";

/// A subscriber's durable checkpoint and current lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSubscription {
    /// Logical consumer group name.
    #[serde(rename = "subscriberId")]
    pub subscriber_id: String,
    /// All events with `sequence <= this` have been processed.
    #[serde(rename = "lastEventSequenceProcessed")]
    pub last_event_sequence_processed: i64,
    /// Instance holding (or last holding) the lease.
    #[serde(rename = "leaseOwnerInstanceId")]
    pub lease_owner_instance_id: Option<String>,
    /// When that lease expires (or expired).
    #[serde(rename = "leaseExpiresAt")]
    pub lease_expires_at: Option<DateTime<Utc>>,
    /// Persisted activity flag. Refreshed against the clock by
    /// [`get_subscription`]; may lag behind expiry in raw rows until the
    /// next sweep.
    #[serde(rename = "isActive")]
    pub is_active: bool,
    /// ISO 8601 creation timestamp.
    #[serde(rename = "createdAt")]
    pub created_at: String,
    /// ISO 8601 timestamp of the last mutation.
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

/// Lease state of a subscription at a given instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseState {
    /// No owner, or the last lease has expired.
    Unleased,
    /// An unexpired lease.
    Leased {
        /// Holding instance.
        owner: String,
        /// Expiry instant, strictly after the evaluation time.
        expires_at: DateTime<Utc>,
    },
}

impl LeaseState {
    /// Decides whether `instance_id` may take the lease.
    ///
    /// Granted when unleased or when `instance_id` already owns it. An
    /// unexpired lease held by anyone else is a conflict.
    pub fn check_acquire(&self, instance_id: &str) -> Result<(), LeaseConflict> {
        match self {
            Self::Unleased => Ok(()),
            Self::Leased { owner, .. } if owner == instance_id => Ok(()),
            Self::Leased { owner, expires_at } => Err(LeaseConflict::HeldByOther {
                current_owner: owner.clone(),
                expires_at: *expires_at,
            }),
        }
    }

    /// Decides whether `instance_id` may acknowledge up to `sequence` given
    /// the current `cursor`.
    ///
    /// Checks run in order: active lease, ownership, then monotonicity.
    pub fn check_acknowledge(
        &self,
        instance_id: &str,
        cursor: i64,
        sequence: i64,
    ) -> Result<(), LeaseConflict> {
        match self {
            Self::Unleased => Err(LeaseConflict::NoActiveLease),
            Self::Leased { owner, .. } if owner != instance_id => Err(LeaseConflict::NotOwner {
                instance_id: instance_id.to_string(),
                current_owner: owner.clone(),
            }),
            Self::Leased { .. } if sequence <= cursor => Err(LeaseConflict::SequenceRegression {
                current_sequence: cursor,
                requested: sequence,
            }),
            Self::Leased { .. } => Ok(()),
        }
    }

    /// Returns `true` for an unexpired lease.
    pub fn is_leased(&self) -> bool {
        matches!(self, Self::Leased { .. })
    }
}

impl EventSubscription {
    /// Evaluates the lease against `now`. A lease whose expiry is at or
    /// before `now` counts as unleased.
    pub fn lease_state(&self, now: DateTime<Utc>) -> LeaseState {
        match (&self.lease_owner_instance_id, self.lease_expires_at) {
            (Some(owner), Some(expires_at)) if expires_at > now => LeaseState::Leased {
                owner: owner.clone(),
                expires_at,
            },
            _ => LeaseState::Unleased,
        }
    }
}

pub(crate) fn subscription_from_row(row: &Row<'_>) -> rusqlite::Result<EventSubscription> {
    let expires_ms: Option<i64> = row.get(3)?;
    let lease_expires_at = match expires_ms {
        Some(ms) => Some(DateTime::from_timestamp_millis(ms).ok_or(
            rusqlite::Error::IntegralValueOutOfRange(3, ms),
        )?),
        None => None,
    };

    Ok(EventSubscription {
        subscriber_id: row.get(0)?,
        last_event_sequence_processed: row.get(1)?,
        lease_owner_instance_id: row.get(2)?,
        lease_expires_at,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Reads a subscription row as stored, without re-evaluating expiry.
///
/// # Errors
///
/// Returns `LeaseError::Database` on SQL failure.
pub fn load_subscription(
    conn: &Connection,
    subscriber_id: &str,
) -> Result<Option<EventSubscription>, LeaseError> {
    let sql = format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM event_subscriptions WHERE subscriber_id = ?1"
    );
    let sub = conn
        .query_row(&sql, params![subscriber_id], subscription_from_row)
        .optional()?;
    Ok(sub)
}

/// Returns a subscription snapshot with `is_active` evaluated against `now`.
///
/// # Errors
///
/// Returns `LeaseError::InvalidInput` for a blank id, `LeaseError::NotFound`
/// if the subscriber has never acquired a lease, or `LeaseError::Database`.
pub fn get_subscription(
    conn: &Connection,
    subscriber_id: &str,
    now: DateTime<Utc>,
) -> Result<EventSubscription, LeaseError> {
    require_non_blank("subscriberId", subscriber_id)?;

    let mut sub = load_subscription(conn, subscriber_id)?
        .ok_or_else(|| LeaseError::NotFound(subscriber_id.to_string()))?;
    sub.is_active = sub.lease_state(now).is_leased();
    Ok(sub)
}

/// Clears the persisted `is_active` flag on every lease that has expired by
/// `now`. Owner and expiry stay in place. Returns the number of rows
/// changed.
///
/// # Errors
///
/// Returns `LeaseError::Database` on SQL failure.
pub fn sweep_expired_leases(conn: &Connection, now: DateTime<Utc>) -> Result<usize, LeaseError> {
    let changed = conn.execute(
        "UPDATE event_subscriptions
         SET is_active = 0, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE is_active = 1 AND lease_expires_at_ms <= ?1",
        params![now.timestamp_millis()],
    )?;
    Ok(changed)
}

pub(crate) fn require_non_blank(field: &str, value: &str) -> Result<(), LeaseError> {
    if value.trim().is_empty() {
        return Err(LeaseError::InvalidInput(format!("{field} is required")));
    }
    Ok(())
}
