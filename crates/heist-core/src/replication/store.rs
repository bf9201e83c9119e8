use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};

use super::value::{PropKey, Value};
use crate::error::{ReplicationError, SnapshotError};
use crate::ids::{EntityId, NodeId};

/// One authority-side write, in the order it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyUpdate {
    pub entity: EntityId,
    /// Node that performed the write.
    pub origin: NodeId,
    /// Per-entity write sequence, starting at 1.
    pub seq: u64,
    pub key: PropKey,
    pub value: Value,
}

#[derive(Debug, Clone)]
struct EntityProps {
    owner: NodeId,
    /// Last written (authority) or last applied (observer) sequence.
    seq: u64,
    values: BTreeMap<PropKey, Value>,
}

/// One node's view of every entity's replicated properties.
///
/// On the owning node this is the canonical table and [`write`](Self::write)
/// succeeds. Everywhere else it is a mirror fed through
/// [`apply_update`](Self::apply_update), and local writes are refused.
#[derive(Debug, Clone)]
pub struct PropertyStore {
    local: NodeId,
    entities: BTreeMap<EntityId, EntityProps>,
    outgoing: Vec<PropertyUpdate>,
}

impl PropertyStore {
    pub fn new(local: NodeId) -> Self {
        Self {
            local,
            entities: BTreeMap::new(),
            outgoing: Vec::new(),
        }
    }

    pub fn local_node(&self) -> NodeId {
        self.local
    }

    /// Start tracking an entity owned by `owner`.
    pub fn register(&mut self, entity: EntityId, owner: NodeId) -> Result<(), ReplicationError> {
        if self.entities.contains_key(&entity) {
            return Err(ReplicationError::DuplicateEntity(entity));
        }
        self.entities.insert(
            entity,
            EntityProps {
                owner,
                seq: 0,
                values: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Stop tracking an entity. Returns whether it was registered.
    pub fn unregister(&mut self, entity: EntityId) -> bool {
        self.outgoing.retain(|u| u.entity != entity);
        self.entities.remove(&entity).is_some()
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }

    pub fn owner(&self, entity: EntityId) -> Option<NodeId> {
        self.entities.get(&entity).map(|e| e.owner)
    }

    /// Whether this node may write the entity.
    pub fn is_authority_for(&self, entity: EntityId) -> bool {
        self.owner(entity) == Some(self.local)
    }

    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Write a property. Only the owning node may do this; anyone else gets an
    /// `AuthorityViolation` and the stored value is left untouched.
    ///
    /// Returns `Ok(true)` if the value changed, `Ok(false)` if it was already
    /// equal (no update is emitted in that case).
    pub fn write(
        &mut self,
        entity: EntityId,
        key: PropKey,
        value: Value,
    ) -> Result<bool, ReplicationError> {
        let local = self.local;
        let props = self
            .entities
            .get_mut(&entity)
            .ok_or(ReplicationError::UnknownEntity(entity))?;

        if props.owner != local {
            warn!(
                "Dropped write of `{}` on {} from {} (owner {})",
                key, entity, local, props.owner
            );
            return Err(ReplicationError::AuthorityViolation {
                entity,
                writer: local,
                owner: props.owner,
            });
        }

        if props.values.get(&key) == Some(&value) {
            return Ok(false);
        }

        props.seq += 1;
        props.values.insert(key.clone(), value.clone());
        self.outgoing.push(PropertyUpdate {
            entity,
            origin: local,
            seq: props.seq,
            key,
            value,
        });
        Ok(true)
    }

    /// Most recent value visible on this node, if the property was ever written.
    pub fn read(&self, entity: EntityId, key: &PropKey) -> Option<&Value> {
        self.entities.get(&entity)?.values.get(key)
    }

    pub fn entity_values(&self, entity: EntityId) -> Option<&BTreeMap<PropKey, Value>> {
        self.entities.get(&entity).map(|e| &e.values)
    }

    /// Last written or applied sequence for an entity.
    pub fn applied_seq(&self, entity: EntityId) -> Option<u64> {
        self.entities.get(&entity).map(|e| e.seq)
    }

    pub fn has_pending(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Take every update written since the last drain, in write order.
    pub fn drain_updates(&mut self) -> Vec<PropertyUpdate> {
        std::mem::take(&mut self.outgoing)
    }

    /// Apply an update received from the entity's owner.
    ///
    /// Updates from any other origin, or that would move an entity backwards
    /// in its write sequence, are refused so an observer never sees writes out
    /// of order.
    pub fn apply_update(&mut self, update: &PropertyUpdate) -> Result<bool, ReplicationError> {
        let props = self
            .entities
            .get_mut(&update.entity)
            .ok_or(ReplicationError::UnknownEntity(update.entity))?;

        if update.origin != props.owner {
            return Err(ReplicationError::ForeignOrigin {
                entity: update.entity,
                origin: update.origin,
                owner: props.owner,
            });
        }
        if update.seq <= props.seq {
            return Err(ReplicationError::StaleUpdate {
                entity: update.entity,
                seq: update.seq,
                applied: props.seq,
            });
        }

        props.seq = update.seq;
        let changed = props.values.get(&update.key) != Some(&update.value);
        props
            .values
            .insert(update.key.clone(), update.value.clone());
        Ok(changed)
    }

    /// Full copy of the store, for observers joining mid-session.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            entities: self
                .entities
                .iter()
                .map(|(id, props)| EntitySnapshot {
                    entity: *id,
                    owner: props.owner,
                    seq: props.seq,
                    values: props
                        .values
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                })
                .collect(),
        }
    }

    /// Adopt a snapshot. Entities already ahead of the snapshot are kept.
    pub fn restore(&mut self, snapshot: StoreSnapshot) {
        for entry in snapshot.entities {
            let props = self.entities.entry(entry.entity).or_insert(EntityProps {
                owner: entry.owner,
                seq: 0,
                values: BTreeMap::new(),
            });
            if entry.seq < props.seq {
                continue;
            }
            props.owner = entry.owner;
            props.seq = entry.seq;
            props.values = entry.values.into_iter().collect();
        }
    }
}

/// Serializable copy of a [`PropertyStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub entities: Vec<EntitySnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub entity: EntityId,
    pub owner: NodeId,
    pub seq: u64,
    pub values: Vec<(PropKey, Value)>,
}

impl StoreSnapshot {
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        bincode::serialize(self).map_err(|e| SnapshotError::Encode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        bincode::deserialize(bytes).map_err(|e| SnapshotError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replication::keys;

    const AUTH: NodeId = NodeId(0);
    const CLIENT: NodeId = NodeId(1);
    const DOOR: EntityId = EntityId(7);

    fn pair() -> (PropertyStore, PropertyStore) {
        let mut auth = PropertyStore::new(AUTH);
        let mut client = PropertyStore::new(CLIENT);
        auth.register(DOOR, AUTH).unwrap();
        client.register(DOOR, AUTH).unwrap();
        (auth, client)
    }

    #[test]
    fn test_non_owner_write_is_refused() {
        let (mut auth, mut client) = pair();
        auth.write(DOOR, keys::OPEN, false.into()).unwrap();
        for u in auth.drain_updates() {
            client.apply_update(&u).unwrap();
        }

        let err = client.write(DOOR, keys::OPEN, true.into()).unwrap_err();
        assert_eq!(
            err,
            ReplicationError::AuthorityViolation {
                entity: DOOR,
                writer: CLIENT,
                owner: AUTH
            }
        );
        assert_eq!(client.read(DOOR, &keys::OPEN), Some(&Value::Bool(false)));
        assert!(!client.has_pending());
    }

    #[test]
    fn test_equal_write_emits_nothing() {
        let (mut auth, _) = pair();
        assert!(auth.write(DOOR, keys::OPEN, true.into()).unwrap());
        assert!(!auth.write(DOOR, keys::OPEN, true.into()).unwrap());
        assert_eq!(auth.drain_updates().len(), 1);
        assert_eq!(auth.applied_seq(DOOR), Some(1));
    }

    #[test]
    fn test_updates_apply_in_order_only() {
        let (mut auth, mut client) = pair();
        auth.write(DOOR, keys::OPEN, true.into()).unwrap();
        auth.write(DOOR, keys::OPEN, false.into()).unwrap();
        let updates = auth.drain_updates();

        client.apply_update(&updates[1]).unwrap();
        let err = client.apply_update(&updates[0]).unwrap_err();
        assert!(matches!(err, ReplicationError::StaleUpdate { seq: 1, applied: 2, .. }));
        assert_eq!(client.read(DOOR, &keys::OPEN), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_foreign_origin_is_refused() {
        let (_, mut client) = pair();
        let forged = PropertyUpdate {
            entity: DOOR,
            origin: NodeId(5),
            seq: 1,
            key: keys::OPEN,
            value: true.into(),
        };
        assert!(matches!(
            client.apply_update(&forged),
            Err(ReplicationError::ForeignOrigin { .. })
        ));
        assert_eq!(client.read(DOOR, &keys::OPEN), None);
    }

    #[test]
    fn test_unknown_entity() {
        let mut auth = PropertyStore::new(AUTH);
        assert_eq!(
            auth.write(EntityId(99), keys::OPEN, true.into()),
            Err(ReplicationError::UnknownEntity(EntityId(99)))
        );
        assert!(auth.register(DOOR, AUTH).is_ok());
        assert_eq!(
            auth.register(DOOR, AUTH),
            Err(ReplicationError::DuplicateEntity(DOOR))
        );
    }

    #[test]
    fn test_snapshot_bytes_restore_late_joiner() {
        let (mut auth, _) = pair();
        auth.write(DOOR, keys::OPEN, true.into()).unwrap();
        auth.write(DOOR, keys::FEEDBACK, "accepted".into()).unwrap();

        let bytes = auth.snapshot().encode().unwrap();
        let mut late = PropertyStore::new(NodeId(3));
        late.restore(StoreSnapshot::decode(&bytes).unwrap());

        assert_eq!(late.read(DOOR, &keys::OPEN), Some(&Value::Bool(true)));
        assert_eq!(late.owner(DOOR), Some(AUTH));
        assert_eq!(late.applied_seq(DOOR), Some(2));

        // Updates already covered by the snapshot are stale for the joiner.
        let covered = auth.drain_updates();
        assert!(late.apply_update(&covered[0]).is_err());
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            StoreSnapshot::decode(&[0xff, 0xff, 0xff]),
            Err(SnapshotError::Decode(_))
        ));
    }
}
