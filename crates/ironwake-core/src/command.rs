//! Command abstractions.

use crate::history::AggregateRef;

/// Trait that all store mutations implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging/audit).
    fn command_type(&self) -> &'static str;

    /// The aggregate this command mutates.
    fn aggregate(&self) -> AggregateRef;

    /// Whether the command changes the shape of the store (entities created
    /// or removed) rather than just values, so views need a full re-render.
    fn is_structural(&self) -> bool {
        false
    }
}
