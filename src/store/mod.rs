//! Per-entity history stores
//!
//! One store per historized entity, each behind its own lock: sample
//! buffers for variables, event-record buffers for notifiers.

pub mod variable;

#[cfg(feature = "events")]
pub mod event;

pub use variable::{HistorizedVariable, VariableHistory};

#[cfg(feature = "events")]
pub use event::{EventRecord, HistorizedNotifier, NotifierHistory};
