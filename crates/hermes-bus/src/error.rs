//! Bus errors.

use thiserror::Error;

/// Result alias for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Transport-level bus failures.
///
/// Dispatch failures are not errors here: they travel back as structured
/// reply payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// Nobody is subscribed.
    #[error("no subscribers for {target}")]
    NoSubscribers {
        /// `unit.operation` the message was addressed to.
        target: String,
    },
    /// The reply channel closed before a reply arrived.
    #[error("reply for {target} was lost")]
    ReplyLost {
        /// `unit.operation` the message was addressed to.
        target: String,
    },
}
