use std::collections::BTreeMap;

use super::store::PropertyStore;
use super::value::{PropKey, Value};
use crate::ids::EntityId;

/// Who is looking. Each observer has its own cursor per entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObserverId {
    /// An entity reconciling its own properties.
    Entity(EntityId),
    /// An external subscriber (UI, tests).
    Watcher(u32),
}

/// One reported difference.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub key: PropKey,
    /// Value at the previous pass, `None` the first time the key is seen.
    pub previous: Option<Value>,
    pub current: Value,
}

/// Keys whose value differs from what the observer saw last pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn contains(&self, key: &PropKey) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: &PropKey) -> Option<&Change> {
        self.changes.iter().find(|c| &c.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &PropKey> {
        self.changes.iter().map(|c| &c.key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    /// New value of `key`, if it changed.
    pub fn current(&self, key: &PropKey) -> Option<&Value> {
        self.get(key).map(|c| &c.current)
    }

    /// True when `key` went from false (or unset) to true.
    pub fn rose(&self, key: &PropKey) -> bool {
        self.get(key).is_some_and(|c| {
            c.current.as_bool() == Some(true)
                && c.previous.as_ref().and_then(Value::as_bool) != Some(true)
        })
    }
}

/// Compare-and-snapshot cursor over a [`PropertyStore`].
///
/// Comparison is by value: a property written A, then B, then back to A
/// between two passes reports nothing.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    seen: BTreeMap<(ObserverId, EntityId), BTreeMap<PropKey, Value>>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report what changed for `observer` on `entity` since its last call and
    /// advance its cursor so the same change is never reported twice.
    pub fn detect(
        &mut self,
        observer: ObserverId,
        entity: EntityId,
        store: &PropertyStore,
    ) -> ChangeSet {
        let Some(values) = store.entity_values(entity) else {
            self.seen.remove(&(observer, entity));
            return ChangeSet::default();
        };

        let seen = self.seen.entry((observer, entity)).or_default();
        let mut changes = Vec::new();
        for (key, value) in values {
            let previous = seen.get(key);
            if previous == Some(value) {
                continue;
            }
            changes.push(Change {
                key: key.clone(),
                previous: previous.cloned(),
                current: value.clone(),
            });
            seen.insert(key.clone(), value.clone());
        }
        ChangeSet { changes }
    }

    /// Drop every cursor on `entity`.
    pub fn forget_entity(&mut self, entity: EntityId) {
        self.seen.retain(|(_, e), _| *e != entity);
    }

    pub fn forget_observer(&mut self, observer: ObserverId) {
        self.seen.retain(|(o, _), _| *o != observer);
    }
}
