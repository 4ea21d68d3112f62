//! Domain error types.
//!
//! These errors represent validation failures and data inconsistencies
//! in the domain layer. They are distinct from storage and HTTP errors.

use super::NodeId;

/// Domain-level errors for validation and data consistency.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// Missing required time data for an operation
    #[error("missing required time data: {0}")]
    MissingTime(String),

    /// Route stop sequence violates an invariant
    #[error("invalid route: {0}")]
    InvalidRoute(&'static str),

    /// Invalid leg construction (e.g., alight before board)
    #[error("invalid leg: {0}")]
    InvalidLeg(&'static str),

    /// Consecutive legs don't meet at the same node
    #[error("legs do not connect: alight at node {0}, board at node {1}")]
    LegsNotConnected(NodeId, NodeId),

    /// Next leg departs before the previous one arrives
    #[error("transfer at node {0} departs before arrival")]
    MissedTransfer(NodeId),

    /// Chain has no legs
    #[error("route chain must have at least one leg")]
    EmptyChain,

    /// Minute offset outside `0..=MAX_OFFSET_MINUTES`
    #[error("{field} must be between 0 and {} minutes, got {value}", super::MAX_OFFSET_MINUTES)]
    OutOfRange { field: &'static str, value: i64 },

    /// Chain deeper than primary/secondary/tertiary
    #[error("route chain has {0} legs, at most 3 are allowed")]
    TooManyLegs(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DomainError::MissingTime("boarding departure".into());
        assert_eq!(err.to_string(), "missing required time data: boarding departure");

        let err = DomainError::InvalidRoute("ranks must be strictly increasing");
        assert_eq!(err.to_string(), "invalid route: ranks must be strictly increasing");

        let err = DomainError::LegsNotConnected(NodeId(1), NodeId(2));
        assert_eq!(
            err.to_string(),
            "legs do not connect: alight at node 1, board at node 2"
        );

        let err = DomainError::TooManyLegs(4);
        assert_eq!(err.to_string(), "route chain has 4 legs, at most 3 are allowed");

        let err = DomainError::OutOfRange {
            field: "departure flexibility",
            value: -5,
        };
        assert_eq!(
            err.to_string(),
            "departure flexibility must be between 0 and 1440 minutes, got -5"
        );

        let err = DomainError::EmptyChain;
        assert_eq!(err.to_string(), "route chain must have at least one leg");
    }
}
