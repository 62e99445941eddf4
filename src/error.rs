//! Error types for the historian

use thiserror::Error;

/// Main error type for history operations
///
/// Whole-call errors abort an operation before any mutation. Per-item errors
/// inside a batched update/delete are reported through [`ItemResults`] and
/// never affect sibling items.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// The handle does not resolve to a registered record.
    #[error("Unknown entity: no history record registered for this node")]
    UnknownEntity,

    /// A handle of the wrong kind was presented.
    #[error("Unsupported handle type presented to the historian")]
    UnsupportedHandleType,

    /// A continuation point did not match the operation or entity it was
    /// supplied to. The point is discarded.
    #[error("Continuation point does not belong to this operation")]
    OperationUnsupported,

    /// Insert precondition violated: an entry already exists.
    #[error("An entry already exists at the requested position")]
    EntryExists,

    /// Replace precondition violated: no entry exists.
    #[error("No entry exists for the requested timestamp or identifier")]
    NoEntryExists,

    /// Malformed request, e.g. missing mandatory select-clause fields.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A lookup that prior validation should have made infallible failed.
    #[error("Internal error: {0}")]
    InternalError(String),

    /// Event history support is configured out.
    #[error("Event history support is not available in this build")]
    NotImplemented,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Per-item outcomes of a batched update or delete
///
/// One slot per input item, in input order. A failed item carries the error
/// for that item alone; the batch as a whole still succeeds.
pub type ItemResults = Vec<std::result::Result<(), HistoryError>>;
