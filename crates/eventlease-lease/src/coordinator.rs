//! Lease coordinator: grants, renews, and arbitrates subscriber leases.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::error::{LeaseConflict, LeaseError};
use crate::subscription::{load_subscription, require_non_blank, LeaseState};

/// How a granted lease relates to the previous state of the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    /// The subscriber was unseen; its row was created with cursor 0.
    Created,
    /// The caller already held an unexpired lease and extended it.
    Renewed,
    /// The lease was free, or had lapsed while held by the caller.
    Acquired,
    /// The lease had expired while held by another instance.
    TakenOver,
}

impl GrantOutcome {
    /// Returns a short label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Renewed => "renewed",
            Self::Acquired => "acquired",
            Self::TakenOver => "taken_over",
        }
    }
}

/// Result of a successful [`acquire_lease`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseGrant {
    /// Subscriber the lease is for.
    pub subscriber_id: String,
    /// Instance now holding the lease.
    pub instance_id: String,
    /// Cursor to resume from; fetch events strictly after it.
    pub last_event_sequence_processed: i64,
    /// When the lease expires unless renewed.
    pub lease_expires_at: DateTime<Utc>,
    /// How the grant came about.
    pub outcome: GrantOutcome,
}

/// Acquires or renews the lease on `subscriber_id` for `instance_id`.
///
/// Creates the subscription with cursor 0 if it does not exist. Grants when
/// the lease is free, expired, or already held by `instance_id`, setting the
/// expiry to `now + duration`. The cursor is never modified.
///
/// # Errors
///
/// - `LeaseError::InvalidInput` for blank ids or a non-positive duration.
/// - `LeaseError::Conflict` with [`LeaseConflict::HeldByOther`] when another
///   instance holds an unexpired lease. Nothing is written.
/// - `LeaseError::Database` on SQL failure.
pub fn acquire_lease(
    conn: &mut Connection,
    subscriber_id: &str,
    instance_id: &str,
    duration: Duration,
    now: DateTime<Utc>,
) -> Result<LeaseGrant, LeaseError> {
    require_non_blank("subscriberId", subscriber_id)?;
    require_non_blank("instanceId", instance_id)?;
    if duration <= Duration::zero() {
        return Err(LeaseError::InvalidInput(format!(
            "lease duration must be positive, got {}s",
            duration.num_seconds()
        )));
    }
    // Expiry is persisted at millisecond precision; truncate here so the
    // returned grant matches what a later read observes.
    let expires_at = now
        .checked_add_signed(duration)
        .and_then(|t| DateTime::from_timestamp_millis(t.timestamp_millis()))
        .ok_or_else(|| {
            LeaseError::InvalidInput(format!(
                "lease duration of {}s overflows the clock",
                duration.num_seconds()
            ))
        })?;

    // IMMEDIATE takes the write lock up front, so the read below cannot be
    // invalidated by a competing acquirer before our write lands.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let previous = load_subscription(&tx, subscriber_id)?;
    let state = previous
        .as_ref()
        .map_or(LeaseState::Unleased, |sub| sub.lease_state(now));

    if let Err(conflict) = state.check_acquire(instance_id) {
        tracing::warn!(
            subscriber_id,
            instance_id,
            current_owner = conflict.current_owner().unwrap_or_default(),
            "lease acquisition rejected"
        );
        return Err(conflict.into());
    }

    let outcome = match (&previous, &state) {
        (None, _) => GrantOutcome::Created,
        (Some(_), LeaseState::Leased { .. }) => GrantOutcome::Renewed,
        (Some(sub), LeaseState::Unleased) => match sub.lease_owner_instance_id.as_deref() {
            Some(prev) if prev != instance_id => GrantOutcome::TakenOver,
            _ => GrantOutcome::Acquired,
        },
    };

    // The WHERE clause restates the grant rule so the write is conditional
    // on the row still being acquirable, independent of the lock mode.
    let cursor: Option<i64> = tx
        .query_row(
            "INSERT INTO event_subscriptions
                (subscriber_id, last_event_sequence_processed, lease_owner_instance_id,
                 lease_expires_at_ms, is_active)
             VALUES (?1, 0, ?2, ?3, 1)
             ON CONFLICT (subscriber_id) DO UPDATE SET
                lease_owner_instance_id = excluded.lease_owner_instance_id,
                lease_expires_at_ms = excluded.lease_expires_at_ms,
                is_active = 1,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE event_subscriptions.lease_owner_instance_id IS NULL
                OR event_subscriptions.lease_expires_at_ms <= ?4
                OR event_subscriptions.lease_owner_instance_id = ?2
             RETURNING last_event_sequence_processed",
            params![
                subscriber_id,
                instance_id,
                expires_at.timestamp_millis(),
                now.timestamp_millis(),
            ],
            |row| row.get(0),
        )
        .optional()?;

    let Some(cursor) = cursor else {
        let current = load_subscription(&tx, subscriber_id)?;
        let conflict = current
            .map(|sub| sub.lease_state(now).check_acquire(instance_id))
            .and_then(Result::err)
            .unwrap_or(LeaseConflict::NoActiveLease);
        return Err(conflict.into());
    };

    tx.commit()?;

    match outcome {
        GrantOutcome::Renewed => tracing::debug!(
            subscriber_id,
            instance_id,
            %expires_at,
            "lease renewed"
        ),
        _ => tracing::info!(
            subscriber_id,
            instance_id,
            outcome = outcome.as_str(),
            previous_owner = previous
                .as_ref()
                .and_then(|s| s.lease_owner_instance_id.as_deref())
                .unwrap_or_default(),
            cursor,
            %expires_at,
            "lease granted"
        ),
    }

    Ok(LeaseGrant {
        subscriber_id: subscriber_id.to_string(),
        instance_id: instance_id.to_string(),
        last_event_sequence_processed: cursor,
        lease_expires_at: expires_at,
        outcome,
    })
}
