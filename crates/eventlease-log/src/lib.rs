//! Event log store and fetcher.
//!
//! The event log is append-only and strictly ordered: every event receives a
//! sequence number at insert time that is never reused or reordered. A
//! subscriber's cursor `S` means every event with `sequence <= S` has been
//! processed, so the next batch is always [`fetch_since`]`(S, limit)`.
//!
//! Fetches are plain reads. They are not tied to the lease that produced the
//! cursor, which makes delivery at-least-once: an instance that crashes
//! between fetch and acknowledgment will see the same events re-delivered to
//! whichever instance takes over.
//!
//! # Usage
//!
//! ```rust,ignore
//! use eventlease_log::{append_event, fetch_since, NewEvent};
//!
//! let stored = append_event(&conn, &NewEvent::new("participant", "p-1", "PARTICIPANT_CREATED", payload))?;
//! let batch = fetch_since(&conn, cursor, 100)?;
//! ```

mod error;
mod event;
mod store;

pub use error::LogError;
pub use event::{Event, EventReferences, NewEvent};
pub use store::{append_event, fetch_since, latest_sequence};
