//! Single-entity test bench: one authority store, bus endpoint and clock.

use std::sync::Arc;

use crate::channel::{Inbox, Message, MessageBus, Outbox};
use crate::config::SimConfig;
use crate::ids::{EntityId, NodeId, Role};
use crate::replication::{PropKey, PropertyStore, Value};
use crate::services::Services;
use crate::sim::{RecordingEffects, SimWorld};
use crate::timer::Clock;

use super::{ReconcileContext, StepContext};

pub struct Bench {
    pub entity: EntityId,
    pub clock: Clock,
    pub config: SimConfig,
    pub world: SimWorld,
    pub services: Services,
    pub effects: Arc<RecordingEffects>,
    pub store: PropertyStore,
    outbox: Outbox,
    inbox: Inbox,
}

impl Bench {
    pub fn new() -> Self {
        let config = SimConfig::default();
        let world = SimWorld::new();
        let (services, effects) = world.services();
        let (outbox, inbox) = MessageBus::new().connect(NodeId(0), Role::Authority);
        let entity = EntityId(1);
        let mut store = PropertyStore::new(NodeId(0));
        store.register(entity, NodeId(0)).unwrap();
        Self {
            entity,
            clock: Clock::new(config.tick_rate),
            config,
            world,
            services,
            effects,
            store,
            outbox,
            inbox,
        }
    }

    pub fn node(&self) -> NodeId {
        NodeId(0)
    }

    /// Register another authority-owned entity.
    pub fn register(&mut self, entity: EntityId) {
        self.store.register(entity, NodeId(0)).unwrap();
    }

    pub fn ctx(&mut self) -> StepContext<'_> {
        StepContext::new(
            self.entity,
            &self.clock,
            &self.config,
            &self.services,
            &mut self.store,
            &self.outbox,
        )
    }

    pub fn reconcile_ctx(&self) -> ReconcileContext<'_> {
        ReconcileContext::new(self.entity, NodeId(0), Role::Authority, &self.services, &self.store)
    }

    pub fn advance(&mut self) {
        self.clock.advance();
    }

    /// Messages the entity has sent so far.
    pub fn sent(&mut self) -> Vec<Message> {
        self.inbox.drain()
    }

    pub fn read(&self, key: &PropKey) -> Option<Value> {
        self.store.read(self.entity, key).cloned()
    }
}
