//! Core data types used throughout the historian
//!
//! This module defines the fundamental data structures shared across the
//! system:
//!
//! # Key Types
//!
//! - **`DataSample`**: A single historized measurement (timestamps + value + status)
//! - **`EntityId`**: Unique identifier for a historized entity (128-bit integer)
//! - **`EventId`**: Opaque byte-string identifier of one historized event
//! - **`Value`**: Variant value carried by samples and event fields
//! - **`TimestampMask`**: Which timestamps to keep on samples returned by a read
//! - **`UpdateMode`**: Insert / Replace / Update semantics for history mutation
//!
//! # Example
//!
//! ```rust
//! use memhist::types::{DataSample, StatusCode, TimestampMask, Value};
//!
//! let mut sample = DataSample::new(1_000, 1_002, Value::Float(42.5), StatusCode::GOOD);
//! assert_eq!(sample.source_timestamp, 1_000);
//!
//! // A read with server-only timestamps nulls the source timestamp out.
//! TimestampMask::Server.apply(&mut sample);
//! assert_eq!(sample.source_timestamp, memhist::types::TIMESTAMP_NULL);
//! assert_eq!(sample.server_timestamp, 1_002);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp in milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// The "null" timestamp written into masked-out sample fields.
pub const TIMESTAMP_NULL: Timestamp = 0;

/// Unique identifier for a historized entity (variable or event notifier)
///
/// A 128-bit unsigned integer that uniquely identifies an entity across the
/// system. Handed out by the address space; the historian never interprets it.
pub type EntityId = u128;

/// Stable global identifier of an event field, as assigned by the field
/// resolver (see [`crate::fields`]).
pub type FieldId = u32;

/// Quality/status code attached to every stored sample
///
/// `0` is the all-good code; any non-zero value is carried through reads and
/// updates untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusCode(pub u32);

impl StatusCode {
    /// The all-good status code.
    pub const GOOD: StatusCode = StatusCode(0);

    /// Whether this code reports a good value.
    pub fn is_good(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Variant value carried by data samples and event fields
///
/// The historian stores and returns values opaquely. Only two conversions
/// participate in its own logic: event time fields must read as [`Value::Time`]
/// and event identifier fields as [`Value::Bytes`]; everything else passes
/// through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// No value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Opaque byte string.
    Bytes(Vec<u8>),
    /// Timestamp (milliseconds since the Unix epoch).
    Time(Timestamp),
}

impl Value {
    /// Read this value as a timestamp, if it is one.
    pub fn as_time(&self) -> Option<Timestamp> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// Read this value as a byte string, if it is one.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Whether this is the null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// A single historized measurement
///
/// Samples are immutable once stored; the only way to change history is
/// through the explicit update operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSample {
    /// Timestamp assigned by the data source. Ordering key of the history.
    pub source_timestamp: Timestamp,
    /// Timestamp assigned when the server observed the value.
    pub server_timestamp: Timestamp,
    /// The measured value.
    pub value: Value,
    /// Quality of the measurement.
    pub status: StatusCode,
}

impl DataSample {
    /// Create a new sample.
    pub fn new(
        source_timestamp: Timestamp,
        server_timestamp: Timestamp,
        value: Value,
        status: StatusCode,
    ) -> Self {
        Self {
            source_timestamp,
            server_timestamp,
            value,
            status,
        }
    }

    /// Create a good-quality sample with matching source and server timestamps.
    pub fn good(timestamp: Timestamp, value: Value) -> Self {
        Self::new(timestamp, timestamp, value, StatusCode::GOOD)
    }
}

/// Selects which timestamps are kept on samples returned by a raw read
///
/// The mask affects only the emitted copies. It never changes ordering or
/// range filtering, which always use the stored source timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampMask {
    /// Keep the source timestamp, null the server timestamp.
    Source,
    /// Keep the server timestamp, null the source timestamp.
    Server,
    /// Keep both timestamps.
    Both,
    /// Null both timestamps.
    Neither,
}

impl TimestampMask {
    /// Null out the de-selected timestamps on an emitted sample.
    pub fn apply(&self, sample: &mut DataSample) {
        if matches!(self, TimestampMask::Server | TimestampMask::Neither) {
            sample.source_timestamp = TIMESTAMP_NULL;
        }
        if matches!(self, TimestampMask::Source | TimestampMask::Neither) {
            sample.server_timestamp = TIMESTAMP_NULL;
        }
    }
}

/// Mutation semantics for the batched history update operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateMode {
    /// Fail an item with `EntryExists` if an entry is already present.
    Insert,
    /// Fail an item with `NoEntryExists` unless an entry is already present.
    Replace,
    /// Replace when present, insert when absent. Always succeeds.
    Update,
}

/// Opaque identifier of one historized event
///
/// Assigned by the event source, or synthesized by the historian when an
/// insert supplies none.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Vec<u8>);

impl EventId {
    /// Wrap an existing identifier.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Synthesize a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().into_bytes().to_vec())
    }

    /// The raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert into the value stored in an event's identifier field.
    pub fn to_value(&self) -> Value {
        Value::Bytes(self.0.clone())
    }
}

impl From<&[u8]> for EventId {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

/// A caller-supplied event field selector
///
/// Select clauses name the event fields a read should project and, for the
/// mandatory `Time` / `EventId` / `EventType` fields, drive the matching and
/// ordering logic of event history operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectClause {
    /// Field name, e.g. `"Time"` or `"Message"`.
    pub name: String,
}

impl SelectClause {
    /// Create a clause selecting the named field.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Kind tag of a request handle presented to the historian
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleKind {
    /// A handle resolved against the address space. The only kind this
    /// historian serves.
    EntityNode,
    /// A handle owned by some other history backend.
    External,
}

/// Opaque per-request handle, resolved by the request router before a history
/// operation reaches the historian
///
/// The historian validates the kind and uses the entity id; it never
/// interprets the handle beyond that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHandle {
    /// What produced this handle.
    pub kind: HandleKind,
    /// The entity the request addresses.
    pub entity: EntityId,
}

impl RequestHandle {
    /// Create a node-backed handle for an entity.
    pub fn node(entity: EntityId) -> Self {
        Self {
            kind: HandleKind::EntityNode,
            entity,
        }
    }
}
