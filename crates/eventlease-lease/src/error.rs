//! Error types for lease coordination and acknowledgment.

use chrono::{DateTime, Utc};
use eventlease_types::{ErrorBody, ErrorKind};

/// A lease ownership or cursor precondition that did not hold.
///
/// These reflect contention between well-formed requests, not malformed
/// input. Each variant carries the context an operator needs to diagnose
/// the conflict without a second lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LeaseConflict {
    /// An unexpired lease is held by a different instance.
    #[error("lease is held by instance '{current_owner}' until {expires_at}")]
    HeldByOther {
        /// Instance holding the lease.
        current_owner: String,
        /// When that lease expires.
        expires_at: DateTime<Utc>,
    },

    /// The subscription does not exist, or its lease is absent or expired.
    #[error("no active lease")]
    NoActiveLease,

    /// The caller is not the holder of the unexpired lease.
    #[error("instance '{instance_id}' is not the lease owner; current owner is '{current_owner}'")]
    NotOwner {
        /// Instance that attempted the operation.
        instance_id: String,
        /// Instance holding the lease.
        current_owner: String,
    },

    /// The acknowledged sequence does not advance the cursor.
    #[error(
        "sequence regression: {requested} must be greater than the current cursor {current_sequence}"
    )]
    SequenceRegression {
        /// Cursor value at the time of the call.
        current_sequence: i64,
        /// Sequence the caller tried to acknowledge.
        requested: i64,
    },
}

impl LeaseConflict {
    /// Instance holding the lease, for ownership conflicts.
    pub fn current_owner(&self) -> Option<&str> {
        match self {
            Self::HeldByOther { current_owner, .. } | Self::NotOwner { current_owner, .. } => {
                Some(current_owner.as_str())
            }
            Self::NoActiveLease | Self::SequenceRegression { .. } => None,
        }
    }

    /// Cursor value, for sequence regressions.
    pub fn current_sequence(&self) -> Option<i64> {
        match self {
            Self::SequenceRegression {
                current_sequence, ..
            } => Some(*current_sequence),
            _ => None,
        }
    }
}

/// Errors returned by lease and acknowledgment operations.
#[derive(Debug, thiserror::Error)]
pub enum LeaseError {
    /// A required field was missing or a value was out of range.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A lease or cursor precondition failed.
    #[error("lease conflict: {0}")]
    Conflict(#[from] LeaseConflict),

    /// The subscription does not exist.
    #[error("subscription not found: {0}")]
    NotFound(String),

    /// A database operation failed.
    #[error("lease database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl LeaseError {
    /// Classifies this error for the boundary layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Conflict(_) => ErrorKind::LeaseConflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Database(_) => ErrorKind::Internal,
        }
    }

    /// Returns the conflict detail, if this is a conflict.
    pub fn conflict(&self) -> Option<&LeaseConflict> {
        match self {
            Self::Conflict(c) => Some(c),
            _ => None,
        }
    }

    /// Builds the structured error body carrying the kind tag and any
    /// conflict context.
    pub fn to_body(&self) -> ErrorBody {
        let mut body = ErrorBody::new(self.kind(), self.to_string());
        if let Some(conflict) = self.conflict() {
            body.current_owner = conflict.current_owner().map(str::to_string);
            body.current_sequence = conflict.current_sequence();
        }
        body
    }
}
