//! memhist - In-memory historian for live time-series and event data
//!
//! This library buffers live data samples and event records per monitored
//! entity and serves historical reads and mutations over those buffers:
//!
//! - Bounded per-entity ring buffers (oldest-end eviction, default 2000 entries)
//! - Bidirectional time-range reads with boundary values and pagination
//!   via single-use continuation points
//! - Batched Insert/Replace/Update history mutation with per-item results
//! - Filtered, projected event history keyed by caller-selected fields
//! - Live-ingestion orchestration against an external subscription provider
//!
//! It is a bounded, single-process history cache with range-scan semantics,
//! not a database: nothing is persisted and there is no query language.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                  HistoryCacheManager                   │
//! │  entity registry · lifecycle · request routing         │
//! ├───────────────────────────┬────────────────────────────┤
//! │   HistorizedVariable      │   HistorizedNotifier       │
//! │   sorted sample buffer    │   event records + field    │
//! │   (per-record lock)       │   slot map (per-record     │
//! │                           │   lock)                    │
//! └───────────▲───────────────┴──────────▲─────────────────┘
//!             │ DataSink                 │ EventSink
//!       SubscriptionProvider (external monitored items)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use memhist::{HistorianConfig, HistoryCacheManager};
//!
//! let manager = HistoryCacheManager::new(config, provider, resolver);
//! manager.register_variable(node_id);
//! manager.start_logging();
//!
//! // Later, from the request router:
//! let (samples, continuation) =
//!     manager.read_raw(&handle, None, mask, 100, start, end, false)?;
//! ```
//!
//! See [`manager`] for a complete, runnable example.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod cursor;
pub mod error;
pub mod fields;
pub mod manager;
pub mod store;
pub mod subscription;
pub mod types;

// Re-export main types
pub use config::HistorianConfig;
pub use cursor::{ContinuationPoint, TransactionKind};
pub use error::{HistoryError, ItemResults, Result};
pub use manager::HistoryCacheManager;
pub use types::{
    DataSample, EntityId, EventId, RequestHandle, SelectClause, StatusCode, Timestamp,
    TimestampMask, UpdateMode, Value,
};
