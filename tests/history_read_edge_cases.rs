//! Edge case tests for raw history reads and mutation
//!
//! Covers range scanning in both directions, boundary values, the
//! continuation-point pagination protocol, timestamp masking, capacity
//! eviction, and the Insert/Replace/Update contract.

use std::sync::Arc;

use memhist::config::HistorianConfig;
use memhist::fields::FieldRegistry;
use memhist::manager::HistoryCacheManager;
use memhist::subscription::{DataSink, EventSink, SubscriptionHandle, SubscriptionProvider};
use memhist::types::{DataSample, EntityId, RequestHandle, TimestampMask, UpdateMode, Value};
use memhist::HistoryError;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Provider that records data sinks so tests can push live samples.
#[derive(Default)]
struct PushProvider {
    next_handle: AtomicU64,
    sinks: Mutex<Vec<(EntityId, Arc<dyn DataSink>)>>,
}

impl PushProvider {
    fn push(&self, entity: EntityId, sample: DataSample) {
        for (id, sink) in self.sinks.lock().iter() {
            if *id == entity {
                sink.data_change(sample.clone());
            }
        }
    }
}

impl SubscriptionProvider for PushProvider {
    fn start_data_subscription(
        &self,
        entity: EntityId,
        _sampling_interval_ms: u64,
        sink: Arc<dyn DataSink>,
    ) -> memhist::Result<SubscriptionHandle> {
        self.sinks.lock().push((entity, sink));
        Ok(SubscriptionHandle(
            self.next_handle.fetch_add(1, Ordering::Relaxed),
        ))
    }

    fn start_event_subscription(
        &self,
        _entity: EntityId,
        _sink: Arc<dyn EventSink>,
    ) -> memhist::Result<SubscriptionHandle> {
        Ok(SubscriptionHandle(
            self.next_handle.fetch_add(1, Ordering::Relaxed),
        ))
    }

    fn stop_subscription(&self, _handle: SubscriptionHandle) {}
}

fn manager_with_capacity(capacity: usize) -> (HistoryCacheManager, Arc<PushProvider>) {
    let provider = Arc::new(PushProvider::default());
    let config = HistorianConfig {
        buffer_capacity: capacity,
        ..HistorianConfig::default()
    };
    let manager = HistoryCacheManager::new(
        config,
        Arc::clone(&provider) as Arc<dyn SubscriptionProvider>,
        Arc::new(FieldRegistry::new()),
    );
    (manager, provider)
}

/// Register entity 1 and seed it with samples at the given timestamps.
fn seeded(timestamps: &[i64]) -> HistoryCacheManager {
    let (manager, _) = manager_with_capacity(2000);
    manager.register_variable(1);
    let samples: Vec<DataSample> = timestamps
        .iter()
        .map(|&ts| DataSample::good(ts, Value::Int(ts)))
        .collect();
    let results = manager
        .update_data(&RequestHandle::node(1), UpdateMode::Insert, &samples)
        .expect("seeding insert");
    assert!(results.iter().all(|r| r.is_ok()));
    manager
}

fn timestamps(samples: &[DataSample]) -> Vec<i64> {
    samples.iter().map(|s| s.source_timestamp).collect()
}

#[test]
fn forward_read_is_ascending_and_inclusive() {
    let manager = seeded(&[1, 3, 5, 7, 9]);
    let (samples, next) = manager
        .read_raw(&RequestHandle::node(1), None, TimestampMask::Both, 0, 3, 7, false)
        .unwrap();
    assert!(next.is_none());
    assert_eq!(timestamps(&samples), vec![3, 5, 7]);
}

#[test]
fn backward_read_is_descending_and_inclusive() {
    let manager = seeded(&[1, 3, 5, 7, 9]);
    let (samples, next) = manager
        .read_raw(&RequestHandle::node(1), None, TimestampMask::Both, 0, 7, 3, false)
        .unwrap();
    assert!(next.is_none());
    assert_eq!(timestamps(&samples), vec![7, 5, 3]);
}

#[test]
fn paged_reads_concatenate_to_the_unbounded_read() {
    let manager = seeded(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
    let handle = RequestHandle::node(1);

    let (all, _) = manager
        .read_raw(&handle, None, TimestampMask::Both, 0, 0, 100, false)
        .unwrap();

    let mut paged = Vec::new();
    let mut continuation = None;
    loop {
        let (page, next) = manager
            .read_raw(&handle, continuation, TimestampMask::Both, 4, 0, 100, false)
            .unwrap();
        paged.extend(page);
        if next.is_none() {
            break;
        }
        continuation = next;
    }
    assert_eq!(paged, all);
}

#[test]
fn backward_pagination_concatenates_too() {
    let manager = seeded(&[1, 2, 3, 4, 5]);
    let handle = RequestHandle::node(1);

    let (all, _) = manager
        .read_raw(&handle, None, TimestampMask::Both, 0, 100, 0, false)
        .unwrap();
    assert_eq!(timestamps(&all), vec![5, 4, 3, 2, 1]);

    let mut paged = Vec::new();
    let mut continuation = None;
    loop {
        let (page, next) = manager
            .read_raw(&handle, continuation, TimestampMask::Both, 2, 100, 0, false)
            .unwrap();
        paged.extend(page);
        if next.is_none() {
            break;
        }
        continuation = next;
    }
    assert_eq!(paged, all);
}

#[test]
fn bounding_sample_is_emitted_before_the_range() {
    let manager = seeded(&[1, 3, 5, 7, 9]);
    let (samples, _) = manager
        .read_raw(&RequestHandle::node(1), None, TimestampMask::Both, 0, 4, 8, true)
        .unwrap();
    assert_eq!(timestamps(&samples), vec![3, 5, 7]);
}

#[test]
fn no_bounding_sample_when_range_starts_at_the_buffer_edge() {
    let manager = seeded(&[1, 3, 5]);
    let (samples, _) = manager
        .read_raw(&RequestHandle::node(1), None, TimestampMask::Both, 0, 0, 4, true)
        .unwrap();
    assert_eq!(timestamps(&samples), vec![1, 3]);
}

#[test]
fn timestamp_mask_nulls_only_the_deselected_fields() {
    let manager = seeded(&[5]);
    let handle = RequestHandle::node(1);

    let (samples, _) = manager
        .read_raw(&handle, None, TimestampMask::Server, 0, 0, 10, false)
        .unwrap();
    assert_eq!(samples[0].source_timestamp, 0);
    assert_eq!(samples[0].server_timestamp, 5);

    // A second read with both timestamps shows the store was not modified.
    let (samples, _) = manager
        .read_raw(&handle, None, TimestampMask::Both, 0, 0, 10, false)
        .unwrap();
    assert_eq!(samples[0].source_timestamp, 5);
}

#[test]
fn capacity_eviction_then_pagination_scenario() {
    // Appending 1,3,5,7 into a capacity-3 buffer leaves {3,5,7}.
    let (manager, provider) = manager_with_capacity(3);
    manager.register_variable(1);
    manager.start_logging();
    for ts in [1, 3, 5, 7] {
        provider.push(1, DataSample::good(ts, Value::Int(ts)));
    }

    let handle = RequestHandle::node(1);
    let (page, next) = manager
        .read_raw(&handle, None, TimestampMask::Both, 2, 0, 10, false)
        .unwrap();
    assert_eq!(timestamps(&page), vec![3, 5]);

    let (page, next) = manager
        .read_raw(&handle, next, TimestampMask::Both, 2, 0, 10, false)
        .unwrap();
    assert_eq!(timestamps(&page), vec![7]);
    assert!(next.is_none());
}

#[test]
fn continuation_point_is_bound_to_its_entity() {
    let manager = seeded(&[1, 2, 3]);
    manager.register_variable(2);
    let (_, cursor) = manager
        .read_raw(&RequestHandle::node(1), None, TimestampMask::Both, 1, 0, 10, false)
        .unwrap();
    let cursor = cursor.expect("truncated scan issues a point");

    let err = manager
        .read_raw(&RequestHandle::node(2), Some(cursor), TimestampMask::Both, 1, 0, 10, false)
        .unwrap_err();
    assert_eq!(err, HistoryError::OperationUnsupported);

    // The entity itself is still readable with a fresh query.
    let (samples, _) = manager
        .read_raw(&RequestHandle::node(1), None, TimestampMask::Both, 0, 0, 10, false)
        .unwrap();
    assert_eq!(samples.len(), 3);
}

#[test]
fn insert_replace_insert_round_trip() {
    let (manager, _) = manager_with_capacity(2000);
    manager.register_variable(1);
    let handle = RequestHandle::node(1);

    let r = manager
        .update_data(&handle, UpdateMode::Insert, &[DataSample::good(5, Value::Text("A".into()))])
        .unwrap();
    assert_eq!(r, vec![Ok(())]);

    let r = manager
        .update_data(&handle, UpdateMode::Replace, &[DataSample::good(5, Value::Text("B".into()))])
        .unwrap();
    assert_eq!(r, vec![Ok(())]);

    let (samples, _) = manager
        .read_raw(&handle, None, TimestampMask::Both, 0, 0, 10, false)
        .unwrap();
    assert_eq!(samples[0].value, Value::Text("B".into()));

    let r = manager
        .update_data(&handle, UpdateMode::Insert, &[DataSample::good(5, Value::Text("C".into()))])
        .unwrap();
    assert_eq!(r, vec![Err(HistoryError::EntryExists)]);

    let (samples, _) = manager
        .read_raw(&handle, None, TimestampMask::Both, 0, 0, 10, false)
        .unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].value, Value::Text("B".into()));
}

#[test]
fn batch_items_fail_independently() {
    let manager = seeded(&[2, 4]);
    let r = manager
        .update_data(
            &RequestHandle::node(1),
            UpdateMode::Insert,
            &[
                DataSample::good(1, Value::Int(1)),
                DataSample::good(2, Value::Int(2)),
                DataSample::good(3, Value::Int(3)),
            ],
        )
        .unwrap();
    assert_eq!(
        r,
        vec![Ok(()), Err(HistoryError::EntryExists), Ok(())]
    );

    let (samples, _) = manager
        .read_raw(&RequestHandle::node(1), None, TimestampMask::Both, 0, 0, 10, false)
        .unwrap();
    assert_eq!(timestamps(&samples), vec![1, 2, 3, 4]);
}

#[test]
fn delete_raw_normalizes_reversed_bounds() {
    let manager = seeded(&[1, 3, 5, 7, 9]);
    let handle = RequestHandle::node(1);
    manager.delete_raw(&handle, 7, 3).unwrap();

    let (samples, _) = manager
        .read_raw(&handle, None, TimestampMask::Both, 0, 0, 10, false)
        .unwrap();
    assert_eq!(timestamps(&samples), vec![1, 9]);
}

#[test]
fn delete_raw_outside_history_removes_nothing() {
    let manager = seeded(&[1, 3]);
    let handle = RequestHandle::node(1);
    manager.delete_raw(&handle, 100, 200).unwrap();
    let (samples, _) = manager
        .read_raw(&handle, None, TimestampMask::Both, 0, 0, 10, false)
        .unwrap();
    assert_eq!(samples.len(), 2);
}

#[test]
fn unbounded_read_means_max_values_zero() {
    let manager = seeded(&[1, 2, 3, 4, 5]);
    let (samples, next) = manager
        .read_raw(&RequestHandle::node(1), None, TimestampMask::Both, 0, 0, 10, false)
        .unwrap();
    assert_eq!(samples.len(), 5);
    assert!(next.is_none());
}
