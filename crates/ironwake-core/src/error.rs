//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An aggregate (character, crew, clock) was not found.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// Bad operation shape or arguments: segment overflow, invalid clock
    /// size, illegal state transition, multi-transition batch.
    #[error("validation error: {0}")]
    Validation(String),

    /// A per-owner capacity limit was hit and no replacement policy applies.
    #[error("capacity error: {0}")]
    Capacity(String),

    /// The authority could not be reached before the channel timed out.
    #[error("authority unreachable: {0}")]
    AuthorityUnreachable(String),

    /// The persistence collaborator holds a newer snapshot than the one being
    /// saved.
    #[error("concurrency conflict: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The version being written.
        expected: i64,
        /// The latest version already stored.
        actual: i64,
    },

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Machine-readable code used on the wire.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AggregateNotFound(_) => "aggregate_not_found",
            Self::Validation(_) => "validation_error",
            Self::Capacity(_) => "capacity_error",
            Self::AuthorityUnreachable(_) => "authority_unreachable",
            Self::ConcurrencyConflict { .. } => "concurrency_conflict",
            Self::Infrastructure(_) => "infrastructure_error",
        }
    }

    /// Whether the caller may retry the same request unchanged.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::AuthorityUnreachable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unreachable_is_recoverable() {
        assert!(DomainError::AuthorityUnreachable("timeout".into()).is_recoverable());
        assert!(!DomainError::Validation("bad".into()).is_recoverable());
        assert!(!DomainError::Capacity("full".into()).is_recoverable());
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(DomainError::Capacity(String::new()).code(), "capacity_error");
        assert_eq!(
            DomainError::AggregateNotFound(Uuid::nil()).code(),
            "aggregate_not_found"
        );
    }
}
