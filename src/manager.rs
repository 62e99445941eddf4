//! Top-level history cache manager
//!
//! [`HistoryCacheManager`] owns the registry mapping entity ids to their
//! history records, orchestrates live ingestion against the external
//! [`SubscriptionProvider`], and routes the six exposed history operations
//! to the right record.
//!
//! # Locking
//!
//! Three tiers, always taken in this order and never reversed:
//!
//! 1. the lifecycle lock (`logging_active`), serializing register /
//!    unregister / start / stop / shutdown against each other,
//! 2. the registry maps (sharded `DashMap` guards, held only long enough to
//!    find or create an entry and clone its `Arc`),
//! 3. the record's own lock, under which every read and mutation runs.
//!
//! Routed operations skip tier 1 entirely, so queries on different entities
//! proceed fully in parallel and never wait on lifecycle changes beyond the
//! brief registry access.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use memhist::config::HistorianConfig;
//! use memhist::fields::FieldRegistry;
//! use memhist::manager::HistoryCacheManager;
//! use memhist::subscription::{DataSink, EventSink, SubscriptionHandle, SubscriptionProvider};
//! use memhist::types::{DataSample, EntityId, RequestHandle, TimestampMask, UpdateMode, Value};
//!
//! struct Disconnected;
//! impl SubscriptionProvider for Disconnected {
//!     fn start_data_subscription(
//!         &self,
//!         _entity: EntityId,
//!         _sampling_interval_ms: u64,
//!         _sink: Arc<dyn DataSink>,
//!     ) -> memhist::Result<SubscriptionHandle> {
//!         Ok(SubscriptionHandle(1))
//!     }
//!     fn start_event_subscription(
//!         &self,
//!         _entity: EntityId,
//!         _sink: Arc<dyn EventSink>,
//!     ) -> memhist::Result<SubscriptionHandle> {
//!         Ok(SubscriptionHandle(2))
//!     }
//!     fn stop_subscription(&self, _handle: SubscriptionHandle) {}
//! }
//!
//! let manager = HistoryCacheManager::new(
//!     HistorianConfig::default(),
//!     Arc::new(Disconnected),
//!     Arc::new(FieldRegistry::new()),
//! );
//!
//! manager.register_variable(42);
//! let handle = RequestHandle::node(42);
//! manager
//!     .update_data(&handle, UpdateMode::Insert, &[DataSample::good(5, Value::Float(1.5))])
//!     .unwrap();
//! let (samples, cursor) = manager
//!     .read_raw(&handle, None, TimestampMask::Both, 0, 0, 10, false)
//!     .unwrap();
//! assert_eq!(samples.len(), 1);
//! assert!(cursor.is_none());
//! ```

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::HistorianConfig;
use crate::cursor::ContinuationPoint;
use crate::error::{HistoryError, ItemResults, Result};
use crate::fields::FieldResolver;
use crate::store::variable::HistorizedVariable;
use crate::subscription::{DataSink, SubscriptionProvider};
use crate::types::{
    DataSample, EntityId, HandleKind, RequestHandle, Timestamp, TimestampMask, UpdateMode,
};

#[cfg(feature = "events")]
use crate::fields::{FieldIndexMap, FIELD_EVENT_ID, FIELD_TIME};
#[cfg(feature = "events")]
use crate::store::event::HistorizedNotifier;
#[cfg(feature = "events")]
use crate::subscription::EventSink;
#[cfg(feature = "events")]
use crate::types::{EventId, SelectClause, Value};

/// Registry and request router of the in-memory historian
///
/// See the [module documentation](self) for the locking discipline and a
/// usage example.
pub struct HistoryCacheManager {
    config: HistorianConfig,
    provider: Arc<dyn SubscriptionProvider>,
    resolver: Arc<dyn FieldResolver>,
    variables: DashMap<EntityId, Arc<HistorizedVariable>>,
    #[cfg(feature = "events")]
    notifiers: DashMap<EntityId, Arc<HistorizedNotifier>>,
    /// Lifecycle lock; the flag tells registration whether to subscribe
    /// newly added entities immediately.
    logging_active: Mutex<bool>,
}

impl HistoryCacheManager {
    /// Create a manager with fixed configuration and collaborators.
    pub fn new(
        config: HistorianConfig,
        provider: Arc<dyn SubscriptionProvider>,
        resolver: Arc<dyn FieldResolver>,
    ) -> Self {
        Self {
            config,
            provider,
            resolver,
            variables: DashMap::new(),
            #[cfg(feature = "events")]
            notifiers: DashMap::new(),
            logging_active: Mutex::new(false),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Register a variable for historization
    ///
    /// Idempotent. While logging is active the live subscription is started
    /// immediately; otherwise the record just waits for [`start_logging`].
    ///
    /// [`start_logging`]: Self::start_logging
    pub fn register_variable(&self, entity: EntityId) {
        let active = self.logging_active.lock();
        let record = Arc::clone(
            self.variables
                .entry(entity)
                .or_insert_with(|| {
                    Arc::new(HistorizedVariable::new(entity, self.config.buffer_capacity))
                })
                .value(),
        );
        if *active {
            self.start_variable_subscription(&record);
        }
    }

    /// Register an event notifier for historization
    ///
    /// The select clauses define which event fields the notifier stores;
    /// they must include `Time` and `EventId` or the registration is
    /// rejected with `InvalidArgument`. Idempotent for an already
    /// registered entity (the existing field map is kept).
    #[cfg(feature = "events")]
    pub fn register_event_source(
        &self,
        entity: EntityId,
        select_clauses: &[SelectClause],
    ) -> Result<()> {
        let has = |name: &str| select_clauses.iter().any(|c| c.name == name);
        if !(has(FIELD_TIME) && has(FIELD_EVENT_ID)) {
            return Err(HistoryError::InvalidArgument(
                "event select clauses must include the Time and EventId fields".to_string(),
            ));
        }

        let active = self.logging_active.lock();
        let record = Arc::clone(
            self.notifiers
                .entry(entity)
                .or_insert_with(|| {
                    let fields = FieldIndexMap::from_clauses(select_clauses, self.resolver.as_ref());
                    Arc::new(HistorizedNotifier::new(
                        entity,
                        fields,
                        self.config.buffer_capacity,
                    ))
                })
                .value(),
        );
        if *active {
            self.start_notifier_subscription(&record);
        }
        Ok(())
    }

    /// Stub kept when event support is configured out.
    #[cfg(not(feature = "events"))]
    pub fn register_event_source(
        &self,
        _entity: EntityId,
        _select_clauses: &[crate::types::SelectClause],
    ) -> Result<()> {
        Err(HistoryError::NotImplemented)
    }

    /// Remove an entity from historization
    ///
    /// A live subscription is torn down before the record and its buffered
    /// history are discarded. Unknown entities are ignored.
    pub fn unregister(&self, entity: EntityId) {
        let _active = self.logging_active.lock();

        if let Some((_, record)) = self.variables.remove(&entity) {
            let handle = record.lock().clear_live();
            if let Some(handle) = handle {
                self.provider.stop_subscription(handle);
            }
            debug!(entity = %entity, "variable unregistered");
            return;
        }

        #[cfg(feature = "events")]
        if let Some((_, record)) = self.notifiers.remove(&entity) {
            let handle = record.lock().clear_live();
            if let Some(handle) = handle {
                self.provider.stop_subscription(handle);
            }
            debug!(entity = %entity, "event notifier unregistered");
        }
    }

    /// Start live ingestion for every registered entity
    ///
    /// One subscription per entity. A per-entity failure leaves that entity
    /// not-live and is logged; the others proceed.
    pub fn start_logging(&self) {
        let mut active = self.logging_active.lock();
        if *active {
            return;
        }

        for entry in self.variables.iter() {
            self.start_variable_subscription(entry.value());
        }
        #[cfg(feature = "events")]
        for entry in self.notifiers.iter() {
            self.start_notifier_subscription(entry.value());
        }

        *active = true;
        debug!("history logging started");
    }

    /// Stop live ingestion, keeping all buffered history.
    pub fn stop_logging(&self) {
        let mut active = self.logging_active.lock();

        for entry in self.variables.iter() {
            let handle = entry.value().lock().clear_live();
            if let Some(handle) = handle {
                self.provider.stop_subscription(handle);
            }
        }
        #[cfg(feature = "events")]
        for entry in self.notifiers.iter() {
            let handle = entry.value().lock().clear_live();
            if let Some(handle) = handle {
                self.provider.stop_subscription(handle);
            }
        }

        *active = false;
        debug!("history logging stopped");
    }

    /// Tear everything down: subscriptions first, then all records
    ///
    /// The manager stays usable; entities have to be registered again.
    pub fn shutdown(&self) {
        let mut active = self.logging_active.lock();

        for entry in self.variables.iter() {
            let handle = entry.value().lock().clear_live();
            if let Some(handle) = handle {
                self.provider.stop_subscription(handle);
            }
        }
        self.variables.clear();

        #[cfg(feature = "events")]
        {
            for entry in self.notifiers.iter() {
                let handle = entry.value().lock().clear_live();
                if let Some(handle) = handle {
                    self.provider.stop_subscription(handle);
                }
            }
            self.notifiers.clear();
        }

        *active = false;
        debug!("historian shut down");
    }

    fn start_variable_subscription(&self, record: &Arc<HistorizedVariable>) {
        if record.lock().is_live() {
            return;
        }
        let entity = record.entity();
        let sink: Arc<dyn DataSink> = record.clone();
        match self
            .provider
            .start_data_subscription(entity, self.config.sampling_interval_ms, sink)
        {
            Ok(handle) => {
                record.lock().set_live(handle);
                debug!(entity = %entity, "variable logging started");
            }
            Err(e) => {
                warn!(entity = %entity, error = %e, "failed to start variable subscription");
            }
        }
    }

    #[cfg(feature = "events")]
    fn start_notifier_subscription(&self, record: &Arc<HistorizedNotifier>) {
        if record.lock().is_live() {
            return;
        }
        let entity = record.entity();
        let sink: Arc<dyn EventSink> = record.clone();
        match self.provider.start_event_subscription(entity, sink) {
            Ok(handle) => {
                record.lock().set_live(handle);
                debug!(entity = %entity, "event logging started");
            }
            Err(e) => {
                warn!(entity = %entity, error = %e, "failed to start event subscription");
            }
        }
    }

    // ------------------------------------------------------------------
    // Routed operations
    // ------------------------------------------------------------------

    fn check_handle(handle: &RequestHandle) -> Result<()> {
        if handle.kind != HandleKind::EntityNode {
            return Err(HistoryError::UnsupportedHandleType);
        }
        Ok(())
    }

    fn lookup_variable(&self, entity: EntityId) -> Result<Arc<HistorizedVariable>> {
        self.variables
            .get(&entity)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(HistoryError::UnknownEntity)
    }

    #[cfg(feature = "events")]
    fn lookup_notifier(&self, entity: EntityId) -> Result<Arc<HistorizedNotifier>> {
        self.notifiers
            .get(&entity)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(HistoryError::UnknownEntity)
    }

    /// Read raw sample history in a time range
    ///
    /// Scan direction follows the sign of `end - start`; `max_values == 0`
    /// means unbounded. A supplied continuation point is consumed whether or
    /// not it validates. The returned point, if any, resumes the scan on the
    /// next call.
    #[allow(clippy::too_many_arguments)]
    pub fn read_raw(
        &self,
        handle: &RequestHandle,
        continuation: Option<ContinuationPoint>,
        mask: TimestampMask,
        max_values: u32,
        start: Timestamp,
        end: Timestamp,
        return_bounds: bool,
    ) -> Result<(Vec<DataSample>, Option<ContinuationPoint>)> {
        Self::check_handle(handle)?;
        let resume = continuation
            .map(|point| point.into_raw_resume(handle.entity))
            .transpose()?;
        let record = self.lookup_variable(handle.entity)?;

        let history = record.lock();
        let (samples, next) =
            history.read_range(start, end, max_values, return_bounds, mask, resume);
        let continuation = next.map(|ts| ContinuationPoint::raw_data(handle.entity, ts));
        Ok((samples, continuation))
    }

    /// Read event history in a time range, projected through `select_clauses`.
    #[cfg(feature = "events")]
    pub fn read_events(
        &self,
        handle: &RequestHandle,
        continuation: Option<ContinuationPoint>,
        max_records: u32,
        start: Timestamp,
        end: Timestamp,
        select_clauses: &[SelectClause],
    ) -> Result<(Vec<Vec<Value>>, Option<ContinuationPoint>)> {
        Self::check_handle(handle)?;
        let resume = continuation
            .map(|point| point.into_event_resume(handle.entity))
            .transpose()?;
        let record = self.lookup_notifier(handle.entity)?;

        let history = record.lock();
        let (events, next) = history.read_range(
            start,
            end,
            max_records,
            select_clauses,
            self.resolver.as_ref(),
            resume,
        )?;
        let continuation = next.map(|id| ContinuationPoint::events(handle.entity, id));
        Ok((events, continuation))
    }

    /// Stub kept when event support is configured out.
    #[cfg(not(feature = "events"))]
    pub fn read_events(
        &self,
        _handle: &RequestHandle,
        _continuation: Option<ContinuationPoint>,
        _max_records: u32,
        _start: Timestamp,
        _end: Timestamp,
        _select_clauses: &[crate::types::SelectClause],
    ) -> Result<(Vec<Vec<crate::types::Value>>, Option<ContinuationPoint>)> {
        Err(HistoryError::NotImplemented)
    }

    /// Batched raw history mutation with per-item results.
    pub fn update_data(
        &self,
        handle: &RequestHandle,
        mode: UpdateMode,
        samples: &[DataSample],
    ) -> Result<ItemResults> {
        Self::check_handle(handle)?;
        let record = self.lookup_variable(handle.entity)?;
        let result = record.lock().update(mode, samples);
        Ok(result)
    }

    /// Batched event history mutation with per-item results.
    #[cfg(feature = "events")]
    pub fn update_events(
        &self,
        handle: &RequestHandle,
        mode: UpdateMode,
        select_clauses: &[SelectClause],
        records: &[Vec<Value>],
    ) -> Result<ItemResults> {
        Self::check_handle(handle)?;
        let record = self.lookup_notifier(handle.entity)?;
        let result =
            record
                .lock()
                .update_events(mode, select_clauses, records, self.resolver.as_ref());
        result
    }

    /// Stub kept when event support is configured out.
    #[cfg(not(feature = "events"))]
    pub fn update_events(
        &self,
        _handle: &RequestHandle,
        _mode: UpdateMode,
        _select_clauses: &[crate::types::SelectClause],
        _records: &[Vec<crate::types::Value>],
    ) -> Result<ItemResults> {
        Err(HistoryError::NotImplemented)
    }

    /// Delete every sample in the closed time range (bounds normalized).
    pub fn delete_raw(
        &self,
        handle: &RequestHandle,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<()> {
        Self::check_handle(handle)?;
        let record = self.lookup_variable(handle.entity)?;
        record.lock().delete_range(start, end);
        Ok(())
    }

    /// Delete the events matching `event_ids`, with per-item results.
    #[cfg(feature = "events")]
    pub fn delete_events(
        &self,
        handle: &RequestHandle,
        event_ids: &[EventId],
    ) -> Result<ItemResults> {
        Self::check_handle(handle)?;
        let record = self.lookup_notifier(handle.entity)?;
        let result = record
            .lock()
            .delete_by_ids(event_ids, self.resolver.as_ref());
        result
    }

    /// Stub kept when event support is configured out.
    #[cfg(not(feature = "events"))]
    pub fn delete_events(
        &self,
        _handle: &RequestHandle,
        _event_ids: &[crate::types::EventId],
    ) -> Result<ItemResults> {
        Err(HistoryError::NotImplemented)
    }
}
