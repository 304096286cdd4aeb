//! Acknowledgment processor: advances a subscriber's cursor under lease.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::error::{LeaseConflict, LeaseError};
use crate::subscription::{
    load_subscription, require_non_blank, subscription_from_row, EventSubscription,
    SUBSCRIPTION_COLUMNS,
};

/// Advances the cursor of `subscriber_id` to `new_sequence`.
///
/// Succeeds only while `instance_id` holds an unexpired lease and
/// `new_sequence` is strictly greater than the current cursor. The lease
/// owner and expiry are left untouched; acknowledging does not renew.
///
/// # Errors
///
/// - `LeaseError::InvalidInput` for blank ids or `new_sequence <= 0`.
/// - `LeaseError::Conflict` with [`LeaseConflict::NoActiveLease`],
///   [`LeaseConflict::NotOwner`], or [`LeaseConflict::SequenceRegression`],
///   checked in that order. Nothing is written.
/// - `LeaseError::Database` on SQL failure.
pub fn acknowledge_events(
    conn: &mut Connection,
    subscriber_id: &str,
    instance_id: &str,
    new_sequence: i64,
    now: DateTime<Utc>,
) -> Result<EventSubscription, LeaseError> {
    require_non_blank("subscriberId", subscriber_id)?;
    require_non_blank("instanceId", instance_id)?;
    if new_sequence <= 0 {
        return Err(LeaseError::InvalidInput(format!(
            "lastEventSequenceProcessed must be positive, got {new_sequence}"
        )));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let sql = format!(
        "UPDATE event_subscriptions
         SET last_event_sequence_processed = ?3,
             updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE subscriber_id = ?1
           AND lease_owner_instance_id = ?2
           AND lease_expires_at_ms > ?4
           AND last_event_sequence_processed < ?3
         RETURNING {SUBSCRIPTION_COLUMNS}"
    );
    let updated = tx
        .query_row(
            &sql,
            params![
                subscriber_id,
                instance_id,
                new_sequence,
                now.timestamp_millis()
            ],
            subscription_from_row,
        )
        .optional()?;

    let Some(updated) = updated else {
        // Nothing matched. Re-read inside the same transaction to report
        // which precondition failed.
        let conflict = match load_subscription(&tx, subscriber_id)? {
            None => LeaseConflict::NoActiveLease,
            Some(sub) => sub
                .lease_state(now)
                .check_acknowledge(instance_id, sub.last_event_sequence_processed, new_sequence)
                .err()
                .unwrap_or(LeaseConflict::NoActiveLease),
        };
        tracing::warn!(
            subscriber_id,
            instance_id,
            sequence = new_sequence,
            %conflict,
            "acknowledgment rejected"
        );
        return Err(conflict.into());
    };

    tx.commit()?;

    tracing::debug!(
        subscriber_id,
        instance_id,
        sequence = new_sequence,
        "acknowledged events"
    );

    Ok(updated)
}
