//! Event field resolution and per-notifier slot mapping
//!
//! Event records are stored as dense arrays of field values. Two layers of
//! indirection connect a caller's select clauses to those arrays:
//!
//! 1. A [`FieldResolver`] maps a field name (as used in filter expressions)
//!    to a stable global [`FieldId`]. [`FieldRegistry`] is the provided
//!    implementation: an explicit registry value shared by whoever needs
//!    resolution, rather than process-wide mutable state.
//! 2. A [`FieldIndexMap`] maps global ids to the dense local storage slot of
//!    one notifier. It is built once when the notifier is registered, from
//!    the select clauses registered with it, and never changes afterwards.
//!
//! # Example
//!
//! ```rust
//! use memhist::fields::{FieldIndexMap, FieldRegistry, FieldResolver, FIELD_TIME};
//! use memhist::types::SelectClause;
//!
//! let registry = FieldRegistry::new();
//! let clauses = [SelectClause::new(FIELD_TIME), SelectClause::new("Message")];
//!
//! let map = FieldIndexMap::from_clauses(&clauses, &registry);
//! assert_eq!(map.len(), 2);
//!
//! let time_id = registry.resolve(&SelectClause::new(FIELD_TIME)).unwrap();
//! assert_eq!(map.slot(time_id), Some(0));
//! ```

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::types::{FieldId, SelectClause};

/// Name of the mandatory event time field.
pub const FIELD_TIME: &str = "Time";

/// Name of the mandatory event identifier field.
pub const FIELD_EVENT_ID: &str = "EventId";

/// Name of the event type field, mandatory for event history updates.
pub const FIELD_EVENT_TYPE: &str = "EventType";

/// Further well-known fields pre-registered by [`FieldRegistry::new`].
const STANDARD_FIELDS: &[&str] = &[
    FIELD_EVENT_ID,
    FIELD_EVENT_TYPE,
    FIELD_TIME,
    "SourceNode",
    "SourceName",
    "Message",
    "Severity",
];

/// Resolves a select clause to a stable global field id
///
/// Implemented by the filter/field collaborator of the surrounding server;
/// [`FieldRegistry`] is the in-crate implementation used in production and
/// tests alike.
pub trait FieldResolver: Send + Sync {
    /// Resolve a clause. `None` means the field is unknown to this resolver.
    fn resolve(&self, clause: &SelectClause) -> Option<FieldId>;
}

/// Explicit field-name registry
///
/// Assigns each distinct field name a stable [`FieldId`]. The standard event
/// fields are pre-registered; additional fields can be added at any time.
/// Resolution never invents ids, so a name that was never registered stays
/// unresolvable.
pub struct FieldRegistry {
    ids: RwLock<HashMap<String, FieldId>>,
}

impl FieldRegistry {
    /// Create a registry with the standard event fields pre-registered.
    pub fn new() -> Self {
        let mut ids = HashMap::new();
        for (i, name) in STANDARD_FIELDS.iter().enumerate() {
            ids.insert((*name).to_string(), i as FieldId);
        }
        Self {
            ids: RwLock::new(ids),
        }
    }

    /// Register a field name, returning its id. Registering an existing name
    /// returns the id it already has.
    pub fn register(&self, name: &str) -> FieldId {
        let mut ids = self.ids.write();
        if let Some(id) = ids.get(name) {
            return *id;
        }
        let id = ids.len() as FieldId;
        ids.insert(name.to_string(), id);
        id
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldResolver for FieldRegistry {
    fn resolve(&self, clause: &SelectClause) -> Option<FieldId> {
        self.ids.read().get(clause.name.as_str()).copied()
    }
}

/// Global field id → dense local storage slot, for one notifier
///
/// Built once at registration. Clauses the resolver cannot resolve are
/// skipped; the remaining clauses are assigned slots in registration order.
#[derive(Debug, Clone, Default)]
pub struct FieldIndexMap {
    slots: HashMap<FieldId, usize>,
}

impl FieldIndexMap {
    /// Build the map from a notifier's registered select clauses.
    pub fn from_clauses(clauses: &[SelectClause], resolver: &dyn FieldResolver) -> Self {
        let mut slots = HashMap::new();
        let mut next_slot = 0usize;
        for clause in clauses {
            if let Some(id) = resolver.resolve(clause) {
                slots.entry(id).or_insert_with(|| {
                    let slot = next_slot;
                    next_slot += 1;
                    slot
                });
            }
        }
        Self { slots }
    }

    /// Local slot of a global field id, if this notifier stores the field.
    pub fn slot(&self, field: FieldId) -> Option<usize> {
        self.slots.get(&field).copied()
    }

    /// Number of stored fields (the width of each event record).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the map holds no fields at all.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_fields_resolve() {
        let registry = FieldRegistry::new();
        for name in [FIELD_TIME, FIELD_EVENT_ID, FIELD_EVENT_TYPE, "Message"] {
            assert!(
                registry.resolve(&SelectClause::new(name)).is_some(),
                "{} should resolve",
                name
            );
        }
        assert!(registry.resolve(&SelectClause::new("NoSuchField")).is_none());
    }

    #[test]
    fn register_is_idempotent() {
        let registry = FieldRegistry::new();
        let a = registry.register("Custom");
        let b = registry.register("Custom");
        assert_eq!(a, b);
        assert_eq!(
            registry.resolve(&SelectClause::new("Custom")),
            Some(a)
        );
    }

    #[test]
    fn index_map_assigns_dense_slots_in_clause_order() {
        let registry = FieldRegistry::new();
        let clauses = [
            SelectClause::new(FIELD_EVENT_ID),
            SelectClause::new(FIELD_TIME),
            SelectClause::new("Bogus"),
            SelectClause::new("Severity"),
        ];
        let map = FieldIndexMap::from_clauses(&clauses, &registry);

        // "Bogus" is unresolvable and claims no slot.
        assert_eq!(map.len(), 3);
        let id = |name: &str| registry.resolve(&SelectClause::new(name)).unwrap();
        assert_eq!(map.slot(id(FIELD_EVENT_ID)), Some(0));
        assert_eq!(map.slot(id(FIELD_TIME)), Some(1));
        assert_eq!(map.slot(id("Severity")), Some(2));
        assert_eq!(map.slot(id("Message")), None);
    }

    #[test]
    fn duplicate_clauses_share_one_slot() {
        let registry = FieldRegistry::new();
        let clauses = [
            SelectClause::new(FIELD_TIME),
            SelectClause::new(FIELD_TIME),
            SelectClause::new("Message"),
        ];
        let map = FieldIndexMap::from_clauses(&clauses, &registry);
        assert_eq!(map.len(), 2);
    }
}
