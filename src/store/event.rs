//! Per-notifier event history
//!
//! [`NotifierHistory`] buffers the event records of one historized event
//! notifier. Records arrive in notification order and are kept that way;
//! range reads filter and order by a caller-nominated time field, and
//! mutation matches on the event identifier field. Both fields reach the
//! dense record layout through the notifier's [`FieldIndexMap`], built once
//! at registration.
//!
//! Reads are tolerant by design: a record whose time or identifier field
//! cannot be read is skipped without aborting the scan, matching the
//! behavior of the monitored-item pipeline that produced the records.
//!
//! [`HistorizedNotifier`] wraps the buffer in the record's own lock and is
//! the [`EventSink`] the live event subscription delivers into.

use parking_lot::{Mutex, MutexGuard};
use std::collections::{HashMap, VecDeque};

use crate::error::{HistoryError, ItemResults, Result};
use crate::fields::{FieldIndexMap, FieldResolver, FIELD_EVENT_ID, FIELD_EVENT_TYPE, FIELD_TIME};
use crate::subscription::{EventSink, SubscriptionHandle};
use crate::types::{EntityId, EventId, SelectClause, Timestamp, UpdateMode, Value};

/// One historized event: its field values in dense local-slot order.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    fields: Vec<Value>,
}

impl EventRecord {
    /// Wrap a dense field array.
    pub fn new(fields: Vec<Value>) -> Self {
        Self { fields }
    }

    /// The value stored at a local slot, if the record is wide enough.
    pub fn field(&self, slot: usize) -> Option<&Value> {
        self.fields.get(slot)
    }
}

/// Select-clause context resolved once per update call.
struct ClauseContext {
    /// Clause index -> stored local slot (`None` when the clause is not
    /// resolvable or not stored by this notifier).
    slots: Vec<Option<usize>>,
    /// Clause index carrying the event time.
    time_index: usize,
    /// Clause index carrying the event identifier, when supplied.
    event_id_index: Option<usize>,
    /// Stored slot of the time field.
    time_slot: usize,
    /// Stored slot of the identifier field.
    id_slot: usize,
}

/// Ordered, bounded buffer of event records for one notifier
///
/// Records are kept in arrival order; the capacity bound evicts from the
/// oldest end exactly like the variable store.
#[derive(Debug)]
pub struct NotifierHistory {
    fields: FieldIndexMap,
    records: VecDeque<EventRecord>,
    capacity: usize,
    live: bool,
    subscription: Option<SubscriptionHandle>,
}

impl NotifierHistory {
    /// Create an empty history storing the fields of `fields`, bounded to
    /// `capacity` records.
    pub fn new(fields: FieldIndexMap, capacity: usize) -> Self {
        Self {
            fields,
            records: VecDeque::new(),
            capacity,
            live: false,
            subscription: None,
        }
    }

    /// The notifier's field-slot map.
    pub fn fields(&self) -> &FieldIndexMap {
        &self.fields
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether a live subscription is currently feeding this history.
    pub fn is_live(&self) -> bool {
        self.live
    }

    pub(crate) fn set_live(&mut self, handle: SubscriptionHandle) {
        self.live = true;
        self.subscription = Some(handle);
    }

    pub(crate) fn clear_live(&mut self) -> Option<SubscriptionHandle> {
        self.live = false;
        self.subscription.take()
    }

    /// Append one event from the live path
    ///
    /// `fields` must be in the notifier's dense slot layout. O(1) amortized;
    /// overflow evicts the oldest record immediately.
    pub fn append_event(&mut self, fields: Vec<Value>) {
        self.records.push_back(EventRecord::new(fields));
        if self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }

    /// Filtered, projected range read with pagination
    ///
    /// The scan walks arrival order (reversed when `start >= end`), keeps
    /// records whose time field lies in the closed range, and projects each
    /// kept record through `clauses`. `resume` skips records until the
    /// matching identifier is found, then emits from that record on; an
    /// identifier that is never found skips everything and yields an empty
    /// page with no new cursor. When `max_count` truncates the scan, the
    /// second return value carries the next unread record's identifier.
    ///
    /// Fails with `InvalidArgument` before scanning when the resolver cannot
    /// resolve the mandatory `Time` or `EventId` fields.
    pub fn read_range(
        &self,
        start: Timestamp,
        end: Timestamp,
        max_count: u32,
        clauses: &[SelectClause],
        resolver: &dyn FieldResolver,
        resume: Option<EventId>,
    ) -> Result<(Vec<Vec<Value>>, Option<EventId>)> {
        let time_id = resolver
            .resolve(&SelectClause::new(FIELD_TIME))
            .ok_or_else(|| {
                HistoryError::InvalidArgument("the Time field is not resolvable".to_string())
            })?;
        let event_id_id = resolver
            .resolve(&SelectClause::new(FIELD_EVENT_ID))
            .ok_or_else(|| {
                HistoryError::InvalidArgument("the EventId field is not resolvable".to_string())
            })?;
        let time_slot = self.fields.slot(time_id);
        let id_slot = self.fields.slot(event_id_id);

        let projection: Vec<Option<usize>> = clauses
            .iter()
            .map(|c| resolver.resolve(c).and_then(|id| self.fields.slot(id)))
            .collect();

        let max = if max_count == 0 {
            usize::MAX
        } else {
            max_count as usize
        };
        let (lo, hi) = if start <= end { (start, end) } else { (end, start) };

        let indices: Box<dyn Iterator<Item = usize>> = if start < end {
            Box::new(0..self.records.len())
        } else {
            Box::new((0..self.records.len()).rev())
        };

        let mut waiting_for = resume;
        let mut out = Vec::new();
        let mut next = None;

        for i in indices {
            let record = &self.records[i];
            let Some(id_bytes) = id_slot
                .and_then(|s| record.field(s))
                .and_then(Value::as_bytes)
            else {
                continue;
            };
            let Some(time) = time_slot
                .and_then(|s| record.field(s))
                .and_then(Value::as_time)
            else {
                continue;
            };

            if let Some(marker) = &waiting_for {
                if marker.as_bytes() == id_bytes {
                    // The marked record was never emitted: resume with it.
                    waiting_for = None;
                } else {
                    continue;
                }
            }

            if time < lo || time > hi {
                continue;
            }

            if out.len() >= max {
                next = Some(EventId::from(id_bytes));
                break;
            }

            out.push(project(record, &projection));
        }

        Ok((out, next))
    }

    /// Batched event history mutation
    ///
    /// The select clauses must include the `Time` and `EventType` fields
    /// (whole-call `InvalidArgument` otherwise). Records carrying an
    /// identifier are matched by identifier; records without one are placed
    /// at the slot of the first stored record with a strictly later time
    /// field. Inserted records without an identifier get a synthesized one.
    /// Items are independent; see [`ItemResults`].
    pub fn update_events(
        &mut self,
        mode: UpdateMode,
        clauses: &[SelectClause],
        records: &[Vec<Value>],
        resolver: &dyn FieldResolver,
    ) -> Result<ItemResults> {
        let ctx = self.clause_context(clauses, resolver)?;
        Ok(records
            .iter()
            .map(|fields| self.apply_event_update(mode, &ctx, fields))
            .collect())
    }

    fn clause_context(
        &self,
        clauses: &[SelectClause],
        resolver: &dyn FieldResolver,
    ) -> Result<ClauseContext> {
        let time_id = resolver
            .resolve(&SelectClause::new(FIELD_TIME))
            .ok_or_else(|| {
                HistoryError::InvalidArgument("the Time field is not resolvable".to_string())
            })?;
        let event_type_id = resolver
            .resolve(&SelectClause::new(FIELD_EVENT_TYPE))
            .ok_or_else(|| {
                HistoryError::InvalidArgument("the EventType field is not resolvable".to_string())
            })?;
        let event_id_id = resolver
            .resolve(&SelectClause::new(FIELD_EVENT_ID))
            .ok_or_else(|| {
                HistoryError::InvalidArgument("the EventId field is not resolvable".to_string())
            })?;
        // Registration guarantees the identifier field is stored; reaching
        // this error means the record was built outside registration.
        let id_slot = self.fields.slot(event_id_id).ok_or_else(|| {
            HistoryError::InternalError(
                "notifier does not store the event identifier field".to_string(),
            )
        })?;

        let mut slots = Vec::with_capacity(clauses.len());
        let mut time_index = None;
        let mut time_slot = None;
        let mut event_id_index = None;
        let mut has_event_type = false;

        for (j, clause) in clauses.iter().enumerate() {
            let mapped = resolver
                .resolve(clause)
                .and_then(|id| self.fields.slot(id).map(|slot| (id, slot)));
            match mapped {
                Some((id, slot)) => {
                    if id == time_id {
                        time_index = Some(j);
                        time_slot = Some(slot);
                    }
                    if id == event_type_id {
                        has_event_type = true;
                    }
                    if id == event_id_id {
                        event_id_index = Some(j);
                    }
                    slots.push(Some(slot));
                }
                None => slots.push(None),
            }
        }

        match (time_index, time_slot, has_event_type) {
            (Some(time_index), Some(time_slot), true) => Ok(ClauseContext {
                slots,
                time_index,
                event_id_index,
                time_slot,
                id_slot,
            }),
            _ => Err(HistoryError::InvalidArgument(
                "select clauses must include the Time and EventType fields".to_string(),
            )),
        }
    }

    fn apply_event_update(
        &mut self,
        mode: UpdateMode,
        ctx: &ClauseContext,
        input: &[Value],
    ) -> std::result::Result<(), HistoryError> {
        if input.len() != ctx.slots.len() {
            return Err(HistoryError::InvalidArgument(
                "event field count does not match the select clauses".to_string(),
            ));
        }
        let new_time = input[ctx.time_index].as_time().ok_or_else(|| {
            HistoryError::InvalidArgument("event time field is unreadable".to_string())
        })?;
        // An unreadable identifier is treated as absent.
        let new_id: Option<EventId> = ctx
            .event_id_index
            .and_then(|j| input[j].as_bytes().map(EventId::from));

        match mode {
            UpdateMode::Insert => {
                if let Some(id) = &new_id {
                    if self.find_by_id(ctx.id_slot, id).is_some() {
                        return Err(HistoryError::EntryExists);
                    }
                }
                let pos = self.find_time_slot(ctx.time_slot, new_time);
                let record = self.build_record(ctx, input, &new_id);
                self.insert_record(pos, record);
            }
            UpdateMode::Replace => {
                let id = new_id.as_ref().ok_or(HistoryError::NoEntryExists)?;
                let pos = self
                    .find_by_id(ctx.id_slot, id)
                    .ok_or(HistoryError::NoEntryExists)?;
                self.records[pos] = self.build_record(ctx, input, &new_id);
            }
            UpdateMode::Update => match &new_id {
                Some(id) => {
                    let pos = self
                        .find_by_id(ctx.id_slot, id)
                        .ok_or(HistoryError::NoEntryExists)?;
                    self.records[pos] = self.build_record(ctx, input, &new_id);
                }
                None => {
                    let pos = self.find_time_slot(ctx.time_slot, new_time);
                    let record = self.build_record(ctx, input, &new_id);
                    self.insert_record(pos, record);
                }
            },
        }
        Ok(())
    }

    /// First record whose identifier field matches `id`.
    fn find_by_id(&self, id_slot: usize, id: &EventId) -> Option<usize> {
        self.records.iter().position(|r| {
            r.field(id_slot)
                .and_then(Value::as_bytes)
                .is_some_and(|b| b == id.as_bytes())
        })
    }

    /// Insertion slot for a time-ordered insert: the first record whose time
    /// field reads as strictly later than `time`. Records with unreadable
    /// time fields never match.
    fn find_time_slot(&self, time_slot: usize, time: Timestamp) -> usize {
        self.records
            .iter()
            .position(|r| {
                r.field(time_slot)
                    .and_then(Value::as_time)
                    .is_some_and(|t| time < t)
            })
            .unwrap_or(self.records.len())
    }

    /// Lay the input's clause-ordered fields out in local-slot order,
    /// synthesizing an identifier when none was supplied.
    fn build_record(
        &self,
        ctx: &ClauseContext,
        input: &[Value],
        id: &Option<EventId>,
    ) -> EventRecord {
        let mut fields = vec![Value::Null; self.fields.len()];
        for (j, slot) in ctx.slots.iter().enumerate() {
            if let Some(slot) = slot {
                fields[*slot] = input[j].clone();
            }
        }
        if id.is_none() {
            fields[ctx.id_slot] = EventId::generate().to_value();
        }
        EventRecord::new(fields)
    }

    fn insert_record(&mut self, pos: usize, record: EventRecord) {
        self.records.insert(pos, record);
        if self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }

    /// Delete the records matching the requested identifiers
    ///
    /// One forward pass; the scan stops as soon as every requested id has
    /// been matched. Ids that match no record report `NoEntryExists` in
    /// their slot.
    pub fn delete_by_ids(
        &mut self,
        ids: &[EventId],
        resolver: &dyn FieldResolver,
    ) -> Result<ItemResults> {
        let event_id_id = resolver
            .resolve(&SelectClause::new(FIELD_EVENT_ID))
            .ok_or_else(|| {
                HistoryError::InvalidArgument("the EventId field is not resolvable".to_string())
            })?;
        let id_slot = self.fields.slot(event_id_id).ok_or_else(|| {
            HistoryError::InternalError(
                "notifier does not store the event identifier field".to_string(),
            )
        })?;

        let mut pending: HashMap<Vec<u8>, usize> = HashMap::new();
        for (i, id) in ids.iter().enumerate() {
            pending.entry(id.as_bytes().to_vec()).or_insert(i);
        }
        let mut results: ItemResults = vec![Err(HistoryError::NoEntryExists); ids.len()];

        let mut i = 0;
        while i < self.records.len() && !pending.is_empty() {
            let matched = self.records[i]
                .field(id_slot)
                .and_then(Value::as_bytes)
                .and_then(|bytes| pending.remove(bytes));
            match matched {
                Some(input_index) => {
                    self.records.remove(i);
                    results[input_index] = Ok(());
                }
                None => i += 1,
            }
        }

        Ok(results)
    }

    #[cfg(test)]
    fn record_at(&self, index: usize) -> &EventRecord {
        &self.records[index]
    }
}

fn project(record: &EventRecord, slots: &[Option<usize>]) -> Vec<Value> {
    slots
        .iter()
        .map(|slot| {
            slot.and_then(|s| record.field(s))
                .cloned()
                .unwrap_or(Value::Null)
        })
        .collect()
}

/// A registered event notifier record: the history buffer behind its own lock
///
/// Handed out by the registry as `Arc<HistorizedNotifier>`; the live event
/// subscription delivers through the [`EventSink`] impl, queries and
/// mutations lock the record for the duration of one operation.
pub struct HistorizedNotifier {
    entity: EntityId,
    inner: Mutex<NotifierHistory>,
}

impl HistorizedNotifier {
    /// Create the record for `entity` with its field map and capacity.
    pub fn new(entity: EntityId, fields: FieldIndexMap, capacity: usize) -> Self {
        Self {
            entity,
            inner: Mutex::new(NotifierHistory::new(fields, capacity)),
        }
    }

    /// The entity this record historizes.
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Lock the history for one operation.
    pub fn lock(&self) -> MutexGuard<'_, NotifierHistory> {
        self.inner.lock()
    }
}

impl EventSink for HistorizedNotifier {
    fn new_event(&self, fields: Vec<Value>) {
        self.inner.lock().append_event(fields);
    }
}
