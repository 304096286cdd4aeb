//! Shared wire-level types for the eventlease workspace.
//!
//! Holds the error kind tag that every layer classifies failures into, the
//! structured error body the HTTP boundary emits, and the operational clamps
//! applied to lease durations and fetch limits before they reach the core.
//!
//! Only `serde` is pulled in here so that every other crate can depend on
//! this one without dragging in storage or runtime dependencies.

use serde::{Deserialize, Serialize};

/// Coarse classification of a failure.
///
/// The boundary layer switches on this tag to pick a status code. It never
/// inspects message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed or missing input. Rejected before any state is touched.
    #[serde(rename = "invalid-input")]
    InvalidInput,
    /// A lease ownership or cursor monotonicity precondition failed.
    #[serde(rename = "conflict")]
    LeaseConflict,
    /// The referenced record does not exist.
    #[serde(rename = "not-found")]
    NotFound,
    /// Store failure or other unexpected condition.
    #[serde(rename = "internal")]
    Internal,
}

impl ErrorKind {
    /// Returns the canonical string label for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid-input",
            Self::LeaseConflict => "conflict",
            Self::NotFound => "not-found",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON body returned for every failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable description, naming the competing owner or sequence
    /// where one applies.
    pub error: String,
    /// Structured classification.
    pub kind: ErrorKind,
    /// Instance currently holding the lease, for ownership conflicts.
    #[serde(rename = "currentOwner", skip_serializing_if = "Option::is_none", default)]
    pub current_owner: Option<String>,
    /// Cursor value at the time of a sequence regression.
    #[serde(
        rename = "currentSequence",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub current_sequence: Option<i64>,
}

impl ErrorBody {
    /// Creates a body with no conflict context.
    pub fn new(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind,
            current_owner: None,
            current_sequence: None,
        }
    }
}

/// Default lease duration when the request omits one, in seconds.
pub const DEFAULT_LEASE_DURATION_SECS: i64 = 300;
/// Shortest lease the boundary will grant, in seconds.
pub const MIN_LEASE_DURATION_SECS: i64 = 30;
/// Longest lease the boundary will grant, in seconds.
pub const MAX_LEASE_DURATION_SECS: i64 = 3600;

/// Default number of events returned per lease call.
pub const DEFAULT_FETCH_LIMIT: i64 = 100;
/// Upper bound on events returned per lease call.
pub const MAX_FETCH_LIMIT: i64 = 1000;

/// Inclusive range applied to an optional request value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clamp {
    /// Value used when the request omits the field.
    pub default: i64,
    /// Lower bound.
    pub min: i64,
    /// Upper bound.
    pub max: i64,
}

impl Clamp {
    /// Range for `leaseDurationSeconds`.
    pub const LEASE_DURATION: Clamp = Clamp {
        default: DEFAULT_LEASE_DURATION_SECS,
        min: MIN_LEASE_DURATION_SECS,
        max: MAX_LEASE_DURATION_SECS,
    };

    /// Range for the lease call's `limit`.
    pub const FETCH_LIMIT: Clamp = Clamp {
        default: DEFAULT_FETCH_LIMIT,
        min: 1,
        max: MAX_FETCH_LIMIT,
    };

    /// Resolves an optional request value against this range.
    pub fn apply(&self, value: Option<i64>) -> i64 {
        value.unwrap_or(self.default).clamp(self.min, self.max)
    }

    /// Returns `true` if `min <= default <= max`.
    pub fn is_consistent(&self) -> bool {
        self.min <= self.default && self.default <= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_duration_defaults_and_clamps() {
        let c = Clamp::LEASE_DURATION;
        assert_eq!(c.apply(None), 300);
        assert_eq!(c.apply(Some(5)), 30);
        assert_eq!(c.apply(Some(-10)), 30);
        assert_eq!(c.apply(Some(600)), 600);
        assert_eq!(c.apply(Some(86_400)), 3600);
    }

    #[test]
    fn fetch_limit_defaults_and_clamps() {
        let c = Clamp::FETCH_LIMIT;
        assert_eq!(c.apply(None), 100);
        assert_eq!(c.apply(Some(0)), 1);
        assert_eq!(c.apply(Some(5000)), 1000);
    }

    #[test]
    fn error_body_omits_absent_context() {
        let body = ErrorBody::new(ErrorKind::InvalidInput, "subscriberId is required");
        let json = serde_json::to_value(&body).expect("should serialize");
        assert_eq!(json["kind"], "invalid-input");
        assert!(json.get("currentOwner").is_none());
        assert!(json.get("currentSequence").is_none());
    }

    #[test]
    fn conflict_kind_serializes_as_conflict_tag() {
        let json = serde_json::to_value(ErrorKind::LeaseConflict).expect("should serialize");
        assert_eq!(json, ErrorKind::LeaseConflict.as_str());
        assert_eq!(json, "conflict");
    }
}
