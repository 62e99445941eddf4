//! Live-ingestion collaborator boundary
//!
//! The historian does not sample anything itself. While logging is active it
//! asks an external [`SubscriptionProvider`] (the server's monitored-item
//! machinery) for one subscription per registered entity; the provider then
//! pushes new samples and events into the matching record through the sink
//! traits here. Stores implement the sinks; providers are implemented by the
//! embedding server (and by mocks in the tests).
//!
//! Sink callbacks take the record's own lock and nothing else, so a provider
//! may deliver from any thread, including synchronously from inside
//! `start_*_subscription`.

use std::sync::Arc;

use crate::error::Result;
use crate::types::{DataSample, EntityId, Value};

/// Handle identifying one live subscription at the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

/// Receiver of live data samples for one historized variable.
pub trait DataSink: Send + Sync {
    /// Deliver one new sample. Must not block on external I/O.
    fn data_change(&self, sample: DataSample);
}

/// Receiver of live event records for one historized notifier.
///
/// `fields` is the event's field values in the notifier's dense local slot
/// layout, i.e. ordered like the select clauses the notifier was registered
/// with (unresolvable clauses omitted).
pub trait EventSink: Send + Sync {
    /// Deliver one new event.
    fn new_event(&self, fields: Vec<Value>);
}

/// External provider of live subscriptions
///
/// One subscription per entity; the provider delivers data by calling the
/// sink passed at start. Stopping a subscription must guarantee no further
/// sink calls once `stop_subscription` returns.
pub trait SubscriptionProvider: Send + Sync {
    /// Start sampling a variable, delivering to `sink` at roughly
    /// `sampling_interval_ms`.
    fn start_data_subscription(
        &self,
        entity: EntityId,
        sampling_interval_ms: u64,
        sink: Arc<dyn DataSink>,
    ) -> Result<SubscriptionHandle>;

    /// Start monitoring an event notifier, delivering to `sink`.
    fn start_event_subscription(
        &self,
        entity: EntityId,
        sink: Arc<dyn EventSink>,
    ) -> Result<SubscriptionHandle>;

    /// Tear one subscription down.
    fn stop_subscription(&self, handle: SubscriptionHandle);
}
