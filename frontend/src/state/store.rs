use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::watch;

use crate::api::ResourceKey;

pub type Record = Value;

/// List payloads arrive either bare or wrapped in one of these fields.
#[derive(Debug, Default, Deserialize)]
struct ListEnvelope {
    #[serde(default)]
    results: Option<Value>,
    #[serde(default)]
    data: Option<Value>,
}

impl ListEnvelope {
    fn into_records(self) -> Vec<Record> {
        match (self.results, self.data) {
            (Some(Value::Array(results)), _) => results,
            (_, Some(Value::Array(data))) => data,
            _ => Vec::new(),
        }
    }
}

/// Coerces a collection response into an ordered list of records.
pub fn normalize_records(value: Value) -> Vec<Record> {
    match value {
        Value::Array(records) => records,
        Value::Object(_) => serde_json::from_value::<ListEnvelope>(value)
            .unwrap_or_default()
            .into_records(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Default)]
struct Slot {
    records: Arc<Vec<Record>>,
    generation: u64,
}

#[derive(Debug, Default)]
struct Slots {
    entries: HashMap<ResourceKey, Slot>,
    /// Results fetched at or below this generation were started before the
    /// last teardown and are discarded.
    floor: u64,
}

/// Latest known records per resource, shared by every consumer of a
/// [`DataClient`](crate::api::DataClient).
#[derive(Debug)]
pub struct SharedStore {
    slots: RwLock<Slots>,
    changes: watch::Sender<u64>,
}

impl Default for SharedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            slots: RwLock::new(Slots::default()),
            changes,
        }
    }

    /// Records for `key`; empty until the first successful refresh.
    pub fn get(&self, key: ResourceKey) -> Arc<Vec<Record>> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots
            .entries
            .get(&key)
            .map(|slot| slot.records.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, key: ResourceKey) -> bool {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.entries.contains_key(&key)
    }

    pub fn snapshot(&self) -> HashMap<ResourceKey, Arc<Vec<Record>>> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots
            .entries
            .iter()
            .map(|(key, slot)| (*key, slot.records.clone()))
            .collect()
    }

    /// Change counter, bumped on every replacement or clear.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Replaces the whole entry for `key` unless a newer generation is
    /// already stored. Returns whether the entry changed.
    pub(crate) fn replace(
        &self,
        key: ResourceKey,
        records: Arc<Vec<Record>>,
        generation: u64,
    ) -> bool {
        {
            let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
            if generation <= slots.floor {
                return false;
            }
            let slot = slots.entries.entry(key).or_default();
            if generation <= slot.generation {
                return false;
            }
            *slot = Slot {
                records,
                generation,
            };
        }
        self.changes.send_modify(|version| *version += 1);
        true
    }

    /// Drops every entry and rejects results from fetches started at or
    /// before `floor`.
    pub(crate) fn clear(&self, floor: u64) {
        {
            let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
            slots.entries.clear();
            slots.floor = slots.floor.max(floor);
        }
        self.changes.send_modify(|version| *version += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_known_list_shapes() {
        let expected = vec![json!({ "id": 1 }), json!({ "id": 2 })];
        let items = json!([{ "id": 1 }, { "id": 2 }]);

        assert_eq!(normalize_records(items.clone()), expected);
        assert_eq!(
            normalize_records(json!({ "results": items.clone(), "count": 2 })),
            expected
        );
        assert_eq!(normalize_records(json!({ "data": items })), expected);
        assert!(normalize_records(json!({})).is_empty());
        assert!(normalize_records(json!({ "results": "nope" })).is_empty());
        assert!(normalize_records(json!("text")).is_empty());
    }

    #[test]
    fn results_field_wins_over_data_field() {
        let records = normalize_records(json!({ "results": [1], "data": [2, 3] }));
        assert_eq!(records, vec![json!(1)]);
    }

    #[test]
    fn replace_rejects_older_generations() {
        let store = SharedStore::new();
        let mut changes = store.subscribe();

        assert!(store.replace(ResourceKey::Banners, Arc::new(vec![json!(2)]), 2));
        assert!(!store.replace(ResourceKey::Banners, Arc::new(vec![json!(1)]), 1));
        assert_eq!(*store.get(ResourceKey::Banners), vec![json!(2)]);
        assert!(changes.has_changed().unwrap());
        assert_eq!(*changes.borrow_and_update(), 1);
    }

    #[test]
    fn clear_discards_entries_and_stale_generations() {
        let store = SharedStore::new();
        store.replace(ResourceKey::Faqs, Arc::new(vec![json!(1)]), 1);
        store.clear(3);

        assert!(!store.contains(ResourceKey::Faqs));
        assert!(store.get(ResourceKey::Faqs).is_empty());
        assert!(!store.replace(ResourceKey::Faqs, Arc::new(vec![json!(2)]), 3));
        assert!(store.replace(ResourceKey::Faqs, Arc::new(vec![json!(4)]), 4));
        assert_eq!(store.snapshot().len(), 1);
    }
}
