//! Lease coordination and acknowledgment for event log subscribers.
//!
//! A *subscriber* is a named consumer group with one durable cursor. Any
//! number of *instances* (processes) of that group may run; at most one of
//! them holds the subscriber's lease at a time, and only the holder may
//! advance the cursor.
//!
//! The protocol is:
//!
//! 1. [`acquire_lease`] grants or renews a time-boxed lease and returns the
//!    cursor to resume from.
//! 2. The caller fetches and processes events after that cursor.
//! 3. [`acknowledge_events`] advances the cursor, provided the caller still
//!    holds an unexpired lease and the new sequence is strictly greater.
//!
//! There is no release call. A lease becomes acquirable again only once it
//! expires, and expiry is evaluated lazily against the `now` passed into
//! each operation. [`sweep_expired_leases`] clears the persisted `is_active`
//! flag for listing purposes but is never needed for correctness.
//!
//! # Atomicity
//!
//! Each operation is one `IMMEDIATE` transaction on the subscriber's row:
//! read, decide, conditional write, commit. A dropped or failed transaction
//! rolls back, so a cancelled call leaves no partial state. Rows for
//! different subscribers never interact.

mod ack;
mod coordinator;
mod error;
mod subscription;

pub use ack::acknowledge_events;
pub use coordinator::{acquire_lease, GrantOutcome, LeaseGrant};
pub use error::{LeaseConflict, LeaseError};
pub use subscription::{
    get_subscription, load_subscription, sweep_expired_leases, EventSubscription, LeaseState,
};
