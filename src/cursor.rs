//! Continuation points for resumable range scans
//!
//! A range read that stops early because it hit its `max` count returns a
//! [`ContinuationPoint`] alongside the partial result. Supplying that point
//! to the next call resumes the scan exactly where it left off.
//!
//! Points are single-use by construction: validation consumes the value, so
//! a point can never be replayed. A point supplied to the wrong operation
//! kind or to a different entity is discarded and the call fails with
//! [`HistoryError::OperationUnsupported`]. A point that is never supplied
//! again is simply dropped; there is no server-side cursor storage.

use crate::error::{HistoryError, Result};
use crate::types::{EntityId, EventId, Timestamp};

/// The operation family a continuation point belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    /// Raw data range read.
    ReadRaw,
    /// Event history range read.
    ReadEvents,
}

/// Where a resumed scan picks up.
#[derive(Debug, Clone, PartialEq)]
enum Resume {
    /// Resume a raw read at the first unread sample's source timestamp.
    RawData(Timestamp),
    /// Resume an event read at the first unread record's event identifier.
    Events(EventId),
}

/// Opaque token resuming a truncated range scan
///
/// Bound to the entity and operation kind that issued it; any mismatch on
/// the next call invalidates it.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuationPoint {
    entity: EntityId,
    resume: Resume,
}

impl ContinuationPoint {
    /// Issue a raw-data point carrying the next unread sample's timestamp.
    pub fn raw_data(entity: EntityId, next_timestamp: Timestamp) -> Self {
        Self {
            entity,
            resume: Resume::RawData(next_timestamp),
        }
    }

    /// Issue an event point carrying the next unread record's identifier.
    pub fn events(entity: EntityId, next_event_id: EventId) -> Self {
        Self {
            entity,
            resume: Resume::Events(next_event_id),
        }
    }

    /// The operation family this point resumes.
    pub fn kind(&self) -> TransactionKind {
        match self.resume {
            Resume::RawData(_) => TransactionKind::ReadRaw,
            Resume::Events(_) => TransactionKind::ReadEvents,
        }
    }

    /// The entity this point is bound to.
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Consume the point for a raw read on `entity`.
    ///
    /// Returns the resume timestamp, or `OperationUnsupported` if the point
    /// was issued for a different operation kind or entity. Either way the
    /// point is gone.
    pub(crate) fn into_raw_resume(self, entity: EntityId) -> Result<Timestamp> {
        match self.resume {
            Resume::RawData(ts) if self.entity == entity => Ok(ts),
            _ => {
                tracing::warn!(
                    entity = %entity,
                    "discarding continuation point: kind or entity mismatch"
                );
                Err(HistoryError::OperationUnsupported)
            }
        }
    }

    /// Consume the point for an event read on `entity`.
    ///
    /// Returns the resume event id, or `OperationUnsupported` on kind or
    /// entity mismatch. Either way the point is gone.
    pub(crate) fn into_event_resume(self, entity: EntityId) -> Result<EventId> {
        match self.resume {
            Resume::Events(id) if self.entity == entity => Ok(id),
            _ => {
                tracing::warn!(
                    entity = %entity,
                    "discarding continuation point: kind or entity mismatch"
                );
                Err(HistoryError::OperationUnsupported)
            }
        }
    }
}
