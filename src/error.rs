//! # Error types used by the cellmesh runtime.
//!
//! Every failure the runtime can surface is a [`CellError`] kind. The enum is
//! `Clone` because reply channels carry `Result<Value, CellError>` back to
//! requesters, and `#[non_exhaustive]` so kinds can be added without breaking
//! downstream matches.
//!
//! Behaviors return `CellError` from their hooks as well; [`CellError::failure`]
//! is the carrier for behavior-defined failure messages.

use thiserror::Error;

/// Errors produced by the cells runtime.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum CellError {
    /// Starting a cell failed because its behavior could not initialize.
    #[error("cannot init cell '{id}': {reason}")]
    CellInit {
        /// The cell that failed to start.
        id: String,
        /// The behavior's init failure, stringified.
        reason: String,
    },

    /// Attempted to start a cell with an id that already exists.
    #[error("cell '{id}' is already started")]
    DuplicateCell {
        /// The duplicate cell id.
        id: String,
    },

    /// A topology or emission operation referenced a cell that does not exist.
    #[error("cell '{id}' does not exist")]
    CellNotFound {
        /// The missing cell id.
        id: String,
    },

    /// An event could not be constructed.
    #[error("cannot create event: {reason}")]
    InvalidEvent {
        /// Why the event was rejected.
        reason: String,
    },

    /// A bounded mailbox is saturated; the event was not enqueued.
    #[error("event queue is full")]
    QueueFull,

    /// The mailbox was stopped; no further events are accepted.
    #[error("event queue is already stopped")]
    QueueStopped,

    /// A request did not receive its reply within the caller's deadline.
    #[error("requesting '{topic}' from '{id}' timed out")]
    Timeout {
        /// The cell the request was addressed to.
        id: String,
        /// The request topic.
        topic: String,
    },

    /// A behavior's recover hook rejected a caught panic.
    #[error("cannot recover cell: {reason}")]
    EventRecovering {
        /// The recover hook's failure, stringified.
        reason: String,
    },

    /// A cell exceeded its recovery budget and was terminated.
    #[error("cell recovered too often, last reason: {reason}")]
    RecoveredTooOften {
        /// The reason of the last caught panic.
        reason: String,
    },

    /// Stopping the environment completed with per-cell failures.
    #[error("environment stopped with failures: {failures:?}")]
    Stopped {
        /// One entry per cell that failed to stop cleanly, as `id: error`.
        failures: Vec<String>,
    },

    /// A behavior-defined failure.
    #[error("{reason}")]
    Failure {
        /// The failure message.
        reason: String,
    },
}

impl CellError {
    /// Creates a behavior-defined failure from any displayable message.
    pub fn failure(reason: impl Into<String>) -> Self {
        CellError::Failure {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CellError::CellInit { .. } => "cell_init",
            CellError::DuplicateCell { .. } => "duplicate_cell",
            CellError::CellNotFound { .. } => "cell_not_found",
            CellError::InvalidEvent { .. } => "invalid_event",
            CellError::QueueFull => "queue_full",
            CellError::QueueStopped => "queue_stopped",
            CellError::Timeout { .. } => "timeout",
            CellError::EventRecovering { .. } => "event_recovering",
            CellError::RecoveredTooOften { .. } => "recovered_too_often",
            CellError::Stopped { .. } => "stopped",
            CellError::Failure { .. } => "failure",
        }
    }

    /// Indicates whether the error came from a mailbox push.
    ///
    /// Useful for emitters that want to retry or drop on backpressure.
    pub fn is_queue_error(&self) -> bool {
        matches!(self, CellError::QueueFull | CellError::QueueStopped)
    }
}
