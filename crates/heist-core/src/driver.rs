//! Simulation driver - owns the clock and runs every node in lockstep
//!
//! One call to [`Simulation::tick`] is one fixed step:
//!
//! 1. Advance the clock.
//! 2. The authority handles its queued messages, then steps every active
//!    entity in id order.
//! 3. Authority writes go into each observer's replication link; updates whose
//!    delay has elapsed are applied to that observer's store.
//! 4. Observers handle their queued node-level messages.
//! 5. Every node reconciles every entity against what changed, then runs its
//!    watchers.
//!
//! All steps of a tick finish before any reconcile starts. Nothing in a tick
//! blocks; anything that waits arms a timer and checks it on a later tick.

use std::collections::BTreeMap;

use log::{debug, info};

use crate::behaviors::Behavior;
use crate::channel::MessageBus;
use crate::config::SimConfig;
use crate::error::SimulationError;
use crate::ids::{EntityId, GroupId, NodeId, Role, SessionId, Tick};
use crate::local_actor::{clear_session, new_session};
use crate::node::{Node, AUTHORITY_NODE};
use crate::replication::{ReplicationLink, StoreSnapshot};
use crate::services::Services;
use crate::timer::Clock;

/// Pristine copy of a spawned entity, cloned into nodes that join later.
struct Blueprint {
    group: Option<GroupId>,
    behavior: Box<dyn Behavior>,
}

/// A running session: one authority node plus any number of observers.
pub struct Simulation {
    config: SimConfig,
    clock: Clock,
    session: SessionId,
    bus: MessageBus,
    nodes: BTreeMap<NodeId, Node>,
    links: BTreeMap<NodeId, ReplicationLink>,
    blueprints: BTreeMap<EntityId, Blueprint>,
    next_entity: u32,
    next_node: u16,
}

impl Simulation {
    /// Start a session with only the authority node.
    pub fn new(config: SimConfig, services: Services) -> Self {
        let session = new_session();
        let bus = MessageBus::new();
        let authority = Node::new(AUTHORITY_NODE, Role::Authority, session, &bus, services);
        info!(
            "Starting session {} at {} ticks/s",
            session.0, config.tick_rate
        );
        Self {
            clock: Clock::new(config.tick_rate),
            config,
            session,
            bus,
            nodes: BTreeMap::from([(AUTHORITY_NODE, authority)]),
            links: BTreeMap::new(),
            blueprints: BTreeMap::new(),
            next_entity: 1,
            next_node: 1,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn now(&self) -> Tick {
        self.clock.now()
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn authority(&self) -> &Node {
        &self.nodes[&AUTHORITY_NODE]
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, SimulationError> {
        self.nodes.get(&id).ok_or(SimulationError::UnknownNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SimulationError> {
        self.nodes.get_mut(&id).ok_or(SimulationError::UnknownNode(id))
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn observers(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|n| !n.is_authority())
    }

    /// Join an observer. It receives a snapshot of the authority's store, the
    /// current active groups and a copy of every entity; later writes reach it
    /// `delay` ticks after they are made.
    pub fn add_observer(&mut self, services: Services, delay: Tick) -> Result<NodeId, SimulationError> {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        let mut node = Node::new(id, Role::Observer, self.session, &self.bus, services);

        for (entity, blueprint) in &self.blueprints {
            node.insert(*entity, blueprint.group, blueprint.behavior.clone_box())?;
        }
        let authority = self.node(AUTHORITY_NODE)?;
        node.set_active_groups(authority.active_groups().clone());
        let bytes = authority.store().snapshot().encode()?;
        node.store_mut().restore(StoreSnapshot::decode(&bytes)?);

        info!(
            "{} joined at tick {} with {} entities ({} bytes)",
            id,
            self.clock.now(),
            self.blueprints.len(),
            bytes.len()
        );
        self.nodes.insert(id, node);
        self.links.insert(id, ReplicationLink::new(delay));
        Ok(id)
    }

    /// Drop an observer and anything still in flight to it.
    pub fn remove_observer(&mut self, id: NodeId) -> Result<(), SimulationError> {
        if id == AUTHORITY_NODE || !self.nodes.contains_key(&id) {
            return Err(SimulationError::UnknownNode(id));
        }
        self.nodes.remove(&id);
        self.links.remove(&id);
        self.bus.disconnect(id);
        info!("{} left", id);
        Ok(())
    }

    pub fn set_link_delay(&mut self, id: NodeId, delay: Tick) -> Result<(), SimulationError> {
        let link = self.links.get_mut(&id).ok_or(SimulationError::UnknownNode(id))?;
        link.set_delay(delay);
        Ok(())
    }

    /// Spawn an entity on every node. The authority publishes its initial
    /// properties right away; they replicate on the next tick.
    pub fn spawn<B: Behavior + Clone>(
        &mut self,
        group: Option<GroupId>,
        behavior: B,
    ) -> Result<EntityId, SimulationError> {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;

        for node in self.nodes.values_mut() {
            node.insert(id, group, behavior.clone_box())?;
        }
        let Self {
            nodes, clock, config, ..
        } = self;
        nodes
            .get_mut(&AUTHORITY_NODE)
            .ok_or(SimulationError::UnknownNode(AUTHORITY_NODE))?
            .spawn_entity(id, clock, config)?;

        debug!("Spawned {:?} as {}", behavior.kind(), id);
        self.blueprints.insert(
            id,
            Blueprint {
                group,
                behavior: Box::new(behavior),
            },
        );
        Ok(id)
    }

    /// Remove an entity from every node, cancelling its timers.
    pub fn despawn(&mut self, id: EntityId) -> Result<bool, SimulationError> {
        let mut found = false;
        for node in self.nodes.values_mut() {
            found |= node.despawn(id)?;
        }
        self.blueprints.remove(&id);
        if found {
            debug!("Despawned {}", id);
        }
        Ok(found)
    }

    /// Run one fixed step. Returns the tick just completed.
    pub fn tick(&mut self) -> Result<Tick, SimulationError> {
        let now = self.clock.advance();
        let Self {
            nodes,
            links,
            clock,
            config,
            ..
        } = self;

        let updates = {
            let authority = nodes
                .get_mut(&AUTHORITY_NODE)
                .ok_or(SimulationError::UnknownNode(AUTHORITY_NODE))?;
            authority.pump(clock, config)?;
            authority.step_entities(clock, config)?;
            authority.store_mut().drain_updates()
        };

        for (id, node) in nodes.iter_mut() {
            if *id == AUTHORITY_NODE {
                continue;
            }
            let link = links.entry(*id).or_insert_with(|| ReplicationLink::new(0));
            link.push(now, &updates);
            for update in link.deliver(now) {
                node.apply_update(&update);
            }
            node.pump(clock, config)?;
        }

        for node in nodes.values_mut() {
            node.reconcile();
        }
        Ok(now)
    }

    /// Run `ticks` steps.
    pub fn run(&mut self, ticks: u64) -> Result<(), SimulationError> {
        for _ in 0..ticks {
            self.tick()?;
        }
        Ok(())
    }

    /// Run for `secs` of simulated time, rounded to whole ticks.
    pub fn run_secs(&mut self, secs: f32) -> Result<(), SimulationError> {
        let ticks = self.clock.secs_to_ticks(secs);
        self.run(ticks)
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        clear_session(self.session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviors::door::Door;
    use crate::replication::keys;
    use crate::sim::SimWorld;
    use heist_logic::geometry::Vec3;

    #[test]
    fn test_ids_are_sequential() {
        let world = SimWorld::new();
        let (services, _) = world.services();
        let mut sim = Simulation::new(SimConfig::default(), services);
        let a = sim.spawn(None, Door::new(Vec3::ZERO)).unwrap();
        let b = sim.spawn(None, Door::new(Vec3::ZERO)).unwrap();
        assert_eq!((a, b), (EntityId(1), EntityId(2)));
    }

    #[test]
    fn test_observer_sees_spawn_after_one_tick() {
        let world = SimWorld::new();
        let (services, _) = world.services();
        let mut sim = Simulation::new(SimConfig::default(), services);
        let (services, _) = world.services();
        let observer = sim.add_observer(services, 0).unwrap();
        let door = sim.spawn(None, Door::new(Vec3::ZERO)).unwrap();

        assert_eq!(sim.node(observer).unwrap().read(door, &keys::OPEN), None);
        sim.tick().unwrap();
        assert_eq!(
            sim.node(observer).unwrap().read(door, &keys::OPEN),
            sim.authority().read(door, &keys::OPEN)
        );
    }

    #[test]
    fn test_authority_cannot_be_removed() {
        let (services, _) = SimWorld::new().services();
        let mut sim = Simulation::new(SimConfig::default(), services);
        assert_eq!(
            sim.remove_observer(AUTHORITY_NODE),
            Err(SimulationError::UnknownNode(AUTHORITY_NODE))
        );
        assert!(sim.set_link_delay(NodeId(9), 1).is_err());
    }
}
