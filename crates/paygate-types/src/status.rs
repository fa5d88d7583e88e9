//! Canonical status vocabulary and the transaction state machine's legal
//! transition table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The internal payment status vocabulary to which every adapter maps its
/// upstream provider's status codes. Unknown upstream codes default to
/// `Pending` in each adapter's status map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CanonicalStatus::Pending => "pending",
            CanonicalStatus::Processing => "processing",
            CanonicalStatus::Completed => "completed",
            CanonicalStatus::Failed => "failed",
            CanonicalStatus::Refunded => "refunded",
        };
        write!(f, "{s}")
    }
}

/// The durable status of a [`crate::Transaction`].
///
/// This is the same vocabulary as [`CanonicalStatus`] (every value here has a
/// one-to-one counterpart there), kept as a distinct type because the legal
/// transition table only makes sense over a `Transaction`'s lifecycle, not
/// over an arbitrary adapter response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

impl TransactionStatus {
    /// Whether this status is terminal: no further `verify` calls mutate it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Refunded)
    }

    /// Checks a proposed transition against the legal-transitions DAG:
    /// `PENDING→PROCESSING`, `PENDING→FAILED`,
    /// `PROCESSING→COMPLETED`, `PROCESSING→FAILED`, `COMPLETED→REFUNDED`.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Pending, Failed) | (Processing, Completed) | (Processing, Failed) | (Completed, Refunded)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Processing => "PROCESSING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Refunded => "REFUNDED",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = InvalidTransactionStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "PROCESSING" => Ok(TransactionStatus::Processing),
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "FAILED" => Ok(TransactionStatus::Failed),
            "REFUNDED" => Ok(TransactionStatus::Refunded),
            other => Err(InvalidTransactionStatus(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid transaction status: {0}")]
pub struct InvalidTransactionStatus(String);

impl From<CanonicalStatus> for TransactionStatus {
    fn from(value: CanonicalStatus) -> Self {
        match value {
            CanonicalStatus::Pending => TransactionStatus::Pending,
            CanonicalStatus::Processing => TransactionStatus::Processing,
            CanonicalStatus::Completed => TransactionStatus::Completed,
            CanonicalStatus::Failed => TransactionStatus::Failed,
            CanonicalStatus::Refunded => TransactionStatus::Refunded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions() {
        assert!(TransactionStatus::Pending.can_transition_to(TransactionStatus::Processing));
        assert!(TransactionStatus::Pending.can_transition_to(TransactionStatus::Failed));
        assert!(TransactionStatus::Processing.can_transition_to(TransactionStatus::Completed));
        assert!(TransactionStatus::Processing.can_transition_to(TransactionStatus::Failed));
        assert!(TransactionStatus::Completed.can_transition_to(TransactionStatus::Refunded));
    }

    #[test]
    fn illegal_transitions_rejected() {
        assert!(!TransactionStatus::Pending.can_transition_to(TransactionStatus::Completed));
        assert!(!TransactionStatus::Completed.can_transition_to(TransactionStatus::Processing));
        assert!(!TransactionStatus::Refunded.can_transition_to(TransactionStatus::Pending));
        assert!(!TransactionStatus::Failed.can_transition_to(TransactionStatus::Processing));
    }

    #[test]
    fn terminal_statuses() {
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Refunded.is_terminal());
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(!TransactionStatus::Processing.is_terminal());
        assert!(!TransactionStatus::Failed.is_terminal());
    }
}
