//! Entity registry: id, kind and group indexes over a node's `hecs::World`.
//!
//! Populated at spawn and emptied at despawn, so lookups by kind or group never
//! scan the world.

use std::collections::{BTreeMap, BTreeSet};

use crate::ids::{EntityId, EntityKind, GroupId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryEntry {
    pub handle: hecs::Entity,
    pub kind: EntityKind,
    pub group: Option<GroupId>,
}

#[derive(Debug, Default)]
pub struct EntityRegistry {
    by_id: BTreeMap<EntityId, RegistryEntry>,
    by_kind: BTreeMap<EntityKind, BTreeSet<EntityId>>,
    by_group: BTreeMap<GroupId, BTreeSet<EntityId>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false (and changes nothing) if the id is taken.
    pub fn insert(&mut self, id: EntityId, entry: RegistryEntry) -> bool {
        if self.by_id.contains_key(&id) {
            return false;
        }
        self.by_kind.entry(entry.kind).or_default().insert(id);
        if let Some(group) = entry.group {
            self.by_group.entry(group).or_default().insert(id);
        }
        self.by_id.insert(id, entry);
        true
    }

    pub fn remove(&mut self, id: EntityId) -> Option<RegistryEntry> {
        let entry = self.by_id.remove(&id)?;
        if let Some(ids) = self.by_kind.get_mut(&entry.kind) {
            ids.remove(&id);
        }
        if let Some(group) = entry.group {
            if let Some(ids) = self.by_group.get_mut(&group) {
                ids.remove(&id);
            }
        }
        Some(entry)
    }

    pub fn get(&self, id: EntityId) -> Option<&RegistryEntry> {
        self.by_id.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn kind(&self, id: EntityId) -> Option<EntityKind> {
        self.by_id.get(&id).map(|e| e.kind)
    }

    /// All ids in ascending order.
    pub fn ids(&self) -> Vec<EntityId> {
        self.by_id.keys().copied().collect()
    }

    pub fn of_kind(&self, kind: EntityKind) -> Vec<EntityId> {
        self.by_kind
            .get(&kind)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn first_of_kind(&self, kind: EntityKind) -> Option<EntityId> {
        self.by_kind.get(&kind)?.iter().next().copied()
    }

    pub fn in_group(&self, group: GroupId) -> Vec<EntityId> {
        self.by_group
            .get(&group)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
