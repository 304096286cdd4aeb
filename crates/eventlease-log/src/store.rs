//! Persistence operations for the event log.
//!
//! Writes go through [`append_event`], which assigns the next sequence
//! number inside the INSERT itself. Reads go through [`fetch_since`], which
//! returns the batch following a cursor in ascending sequence order.

use rusqlite::{params, Connection, Row};

use crate::error::LogError;
use crate::event::{Event, EventReferences, NewEvent};

const EVENT_COLUMNS: &str = "id, sequence, initiator_type, initiator_id, event_type, payload_json,
     participant_id, agent_id, service_group_id, token_id, service_pool_id, vault_secret_id,
     created_at, updated_at";

/// Appends an event to the log and returns the stored record.
///
/// # Errors
///
/// Returns `LogError::InvalidInput` if the initiator or event type is blank,
/// `LogError::Serialization` if the payload cannot be encoded, or
/// `LogError::Database` on SQL failure.
pub fn append_event(conn: &Connection, event: &NewEvent) -> Result<Event, LogError> {
    require_non_blank("initiatorType", &event.initiator_type)?;
    require_non_blank("initiatorId", &event.initiator_id)?;
    require_non_blank("type", &event.event_type)?;

    let id = uuid::Uuid::new_v4().to_string();
    let payload_json = serde_json::to_string(&event.payload)?;
    let refs = &event.references;

    // Computing MAX(sequence) + 1 inside the INSERT keeps assignment and
    // write under one write lock, so two appenders cannot share a number.
    let (sequence, created_at, updated_at) = conn.query_row(
        "INSERT INTO event_log
            (id, sequence, initiator_type, initiator_id, event_type, payload_json,
             participant_id, agent_id, service_group_id, token_id, service_pool_id, vault_secret_id)
         VALUES (
            ?1,
            (SELECT COALESCE(MAX(sequence), 0) + 1 FROM event_log),
            ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11
         )
         RETURNING sequence, created_at, updated_at",
        params![
            id,
            event.initiator_type,
            event.initiator_id,
            event.event_type,
            payload_json,
            refs.participant_id,
            refs.agent_id,
            refs.service_group_id,
            refs.token_id,
            refs.service_pool_id,
            refs.vault_secret_id,
        ],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        },
    )?;

    tracing::debug!(sequence, event_type = %event.event_type, "appended event");

    Ok(Event {
        id,
        sequence,
        initiator_type: event.initiator_type.clone(),
        initiator_id: event.initiator_id.clone(),
        event_type: event.event_type.clone(),
        payload: event.payload.clone(),
        references: refs.clone(),
        created_at,
        updated_at,
    })
}

/// Returns up to `limit` events with `sequence > cursor_exclusive`, in
/// ascending sequence order.
///
/// # Errors
///
/// Returns `LogError::InvalidInput` for a negative cursor or non-positive
/// limit, or `LogError::Database` on SQL failure.
pub fn fetch_since(
    conn: &Connection,
    cursor_exclusive: i64,
    limit: i64,
) -> Result<Vec<Event>, LogError> {
    if cursor_exclusive < 0 {
        return Err(LogError::InvalidInput(format!(
            "cursor must be non-negative, got {cursor_exclusive}"
        )));
    }
    if limit <= 0 {
        return Err(LogError::InvalidInput(format!(
            "limit must be positive, got {limit}"
        )));
    }

    let sql = format!(
        "SELECT {EVENT_COLUMNS}
         FROM event_log
         WHERE sequence > ?1
         ORDER BY sequence ASC
         LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![cursor_exclusive, limit], event_from_row)?;

    let mut events = Vec::new();
    for row in rows {
        events.push(row?);
    }

    Ok(events)
}

/// Returns the highest assigned sequence number, or 0 for an empty log.
///
/// # Errors
///
/// Returns `LogError::Database` on SQL failure.
pub fn latest_sequence(conn: &Connection) -> Result<i64, LogError> {
    let max_seq: Option<i64> =
        conn.query_row("SELECT MAX(sequence) FROM event_log", [], |row| row.get(0))?;
    Ok(max_seq.unwrap_or(0))
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    let payload_json: String = row.get(5)?;
    let payload = serde_json::from_str(&payload_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Event {
        id: row.get(0)?,
        sequence: row.get(1)?,
        initiator_type: row.get(2)?,
        initiator_id: row.get(3)?,
        event_type: row.get(4)?,
        payload,
        references: EventReferences {
            participant_id: row.get(6)?,
            agent_id: row.get(7)?,
            service_group_id: row.get(8)?,
            token_id: row.get(9)?,
            service_pool_id: row.get(10)?,
            vault_secret_id: row.get(11)?,
        },
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn require_non_blank(field: &str, value: &str) -> Result<(), LogError> {
    if value.trim().is_empty() {
        return Err(LogError::InvalidInput(format!("{field} is required")));
    }
    Ok(())
}
