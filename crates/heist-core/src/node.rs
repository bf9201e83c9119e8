//! One participant in a session.
//!
//! Every node holds the same set of entities in its own `hecs::World`, each a
//! [`NetEntity`] id plus the [`Brain`] that runs it. Only the authority node
//! calls into a brain to spawn, step, handle messages or reset; every node
//! reconciles. Nodes share nothing but the message bus: observers learn about
//! authority writes through the updates the driver hands them.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};

use heist_logic::geometry::Vec3;
use hecs::World;
use log::{debug, info, warn};

use crate::behaviors::{Behavior, ReconcileContext, StepContext};
use crate::channel::{ActionKind, Inbox, Message, MessageBus, Outbox, Payload, Target};
use crate::config::SimConfig;
use crate::error::{BehaviorError, ReplicationError, SimulationError};
use crate::ids::{ActorId, EntityId, GroupId, NodeId, Role, RoleFilter, SessionId};
use crate::local_actor::local_actor;
use crate::registry::{EntityRegistry, RegistryEntry};
use crate::replication::{keys, ChangeDetector, ObserverId, PropKey, PropertyStore, PropertyUpdate, Value};
use crate::services::Services;
use crate::timer::Clock;

/// The node that owns every entity.
pub const AUTHORITY_NODE: NodeId = NodeId(0);

/// Network identity component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetEntity(pub EntityId);

/// Behavior component.
pub struct Brain(pub Box<dyn Behavior>);

/// Handle returned by [`Node::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatchId(u32);

pub type WatchCallback = Box<dyn FnMut(EntityId) + Send>;

struct Watcher {
    entity: EntityId,
    key: PropKey,
    callback: WatchCallback,
}

pub struct Node {
    id: NodeId,
    role: Role,
    session: SessionId,
    world: World,
    registry: EntityRegistry,
    store: PropertyStore,
    detector: ChangeDetector,
    outbox: Outbox,
    inbox: Inbox,
    services: Services,
    active_groups: BTreeSet<GroupId>,
    watchers: BTreeMap<WatchId, Watcher>,
    next_watch: u32,
    /// Missing references already warned about.
    reported: BTreeSet<(EntityId, &'static str)>,
}

impl Node {
    /// Connect a node to the bus.
    pub fn new(id: NodeId, role: Role, session: SessionId, bus: &MessageBus, services: Services) -> Self {
        let (outbox, inbox) = bus.connect(id, role);
        Self {
            id,
            role,
            session,
            world: World::new(),
            registry: EntityRegistry::new(),
            store: PropertyStore::new(id),
            detector: ChangeDetector::new(),
            outbox,
            inbox,
            services,
            active_groups: BTreeSet::new(),
            watchers: BTreeMap::new(),
            next_watch: 0,
            reported: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_authority(&self) -> bool {
        self.role == Role::Authority
    }

    pub fn store(&self) -> &PropertyStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut PropertyStore {
        &mut self.store
    }

    /// This node's view of one property.
    pub fn read(&self, entity: EntityId, key: &PropKey) -> Option<&Value> {
        self.store.read(entity, key)
    }

    /// This node's view of an entity's published state name.
    pub fn state_of(&self, entity: EntityId) -> Option<&str> {
        self.read(entity, &keys::STATE).and_then(Value::as_text)
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn active_groups(&self) -> &BTreeSet<GroupId> {
        &self.active_groups
    }

    pub(crate) fn set_active_groups(&mut self, groups: BTreeSet<GroupId>) {
        self.active_groups = groups;
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Whether the entity's group is live. Entities without a group always are.
    pub fn is_active(&self, entity: EntityId) -> bool {
        match self.registry.get(entity) {
            Some(entry) => entry.group.map_or(true, |g| self.active_groups.contains(&g)),
            None => false,
        }
    }

    /// Ask the authority to perform `action` on `entity` on behalf of `actor`.
    /// Returns whether the request was queued.
    pub fn request_action(&self, entity: EntityId, action: ActionKind, actor: ActorId) -> bool {
        let payload = Payload::Action { action, actor };
        self.send(RoleFilter::AUTHORITY, Target::Entity(entity), payload) > 0
    }

    /// Like [`request_action`](Self::request_action) for the actor bound to
    /// this node. Returns false if no actor is bound.
    pub fn request_local_action(&self, entity: EntityId, action: ActionKind) -> bool {
        match local_actor(self.session, self.id) {
            Some(actor) => self.request_action(entity, action, actor),
            None => {
                debug!("{} has no local actor, dropped {:?}", self.id, action);
                false
            }
        }
    }

    /// Send a message that comes from the node rather than an entity.
    pub fn send(&self, to: RoleFilter, target: Target, payload: Payload) -> usize {
        self.outbox.send(to, Message::new(self.id, None, target, payload))
    }

    /// Call `callback` once every time `key` on `entity` goes from false to
    /// true on this node. The current value does not count as a transition.
    pub fn subscribe(&mut self, entity: EntityId, key: PropKey, callback: WatchCallback) -> WatchId {
        let id = WatchId(self.next_watch);
        self.next_watch += 1;
        self.detector
            .detect(ObserverId::Watcher(id.0), entity, &self.store);
        self.watchers.insert(
            id,
            Watcher {
                entity,
                key,
                callback,
            },
        );
        id
    }

    pub fn unsubscribe(&mut self, id: WatchId) -> bool {
        self.detector.forget_observer(ObserverId::Watcher(id.0));
        self.watchers.remove(&id).is_some()
    }

    /// Add an entity to this node's world. Captures its initial state and
    /// registers its properties as owned by the authority.
    pub(crate) fn insert(
        &mut self,
        id: EntityId,
        group: Option<GroupId>,
        mut behavior: Box<dyn Behavior>,
    ) -> Result<(), SimulationError> {
        behavior.set_initial_state();
        let kind = behavior.kind();
        let handle = self.world.spawn((NetEntity(id), Brain(behavior)));
        if !self.registry.insert(id, RegistryEntry { handle, kind, group }) {
            let _ = self.world.despawn(handle);
            return Err(SimulationError::RegistryCorrupted { entity: id });
        }
        if let Err(e) = self.store.register(id, AUTHORITY_NODE) {
            self.registry.remove(id);
            let _ = self.world.despawn(handle);
            return Err(e.into());
        }
        Ok(())
    }

    /// Authority: publish an inserted entity's initial properties.
    pub(crate) fn spawn_entity(&mut self, id: EntityId, clock: &Clock, config: &SimConfig) -> Result<(), SimulationError> {
        self.run(id, clock, config, |brain, ctx| brain.spawn(ctx))
    }

    /// Remove an entity, cancelling anything it has scheduled.
    pub(crate) fn despawn(&mut self, id: EntityId) -> Result<bool, SimulationError> {
        let Some(entry) = self.registry.remove(id) else {
            return Ok(false);
        };
        {
            let mut brain = self
                .world
                .get::<&mut Brain>(entry.handle)
                .map_err(|_| SimulationError::RegistryCorrupted { entity: id })?;
            brain.0.cancel_timers();
        }
        self.world
            .despawn(entry.handle)
            .map_err(|_| SimulationError::RegistryCorrupted { entity: id })?;
        self.store.unregister(id);
        self.detector.forget_entity(id);
        self.reported.retain(|(e, _)| *e != id);
        Ok(true)
    }

    /// Authority: step every active entity in id order. A failing entity is
    /// logged and the rest still run.
    pub(crate) fn step_entities(&mut self, clock: &Clock, config: &SimConfig) -> Result<(), SimulationError> {
        if !self.is_authority() {
            return Ok(());
        }
        for id in self.registry.ids() {
            if self.is_active(id) {
                self.run(id, clock, config, |brain, ctx| brain.step(ctx))?;
            }
        }
        Ok(())
    }

    /// Handle every message waiting in the inbox.
    pub(crate) fn pump(&mut self, clock: &Clock, config: &SimConfig) -> Result<(), SimulationError> {
        for message in self.inbox.drain() {
            self.dispatch(&message, clock, config)?;
        }
        Ok(())
    }

    /// Observer: apply one update received from the authority.
    pub(crate) fn apply_update(&mut self, update: &PropertyUpdate) {
        match self.store.apply_update(update) {
            Ok(_) => {}
            Err(ReplicationError::StaleUpdate { entity, seq, applied }) => {
                debug!("{} skipped stale update for {} ({} <= {})", self.id, entity, seq, applied);
            }
            Err(ReplicationError::UnknownEntity(entity)) => {
                debug!("{} skipped update for unknown {}", self.id, entity);
            }
            Err(e) => warn!("{} rejected update: {}", self.id, e),
        }
    }

    /// Reconcile every entity against what changed since the last pass, then
    /// run watchers.
    pub(crate) fn reconcile(&mut self) {
        let Node {
            id,
            role,
            world,
            registry,
            store,
            detector,
            services,
            watchers,
            ..
        } = self;

        for entity in registry.ids() {
            let changes = detector.detect(ObserverId::Entity(entity), entity, store);
            if changes.is_empty() {
                continue;
            }
            let Some(entry) = registry.get(entity) else {
                continue;
            };
            match world.get::<&mut Brain>(entry.handle) {
                Ok(mut brain) => {
                    let mut ctx = ReconcileContext::new(entity, *id, *role, services, store);
                    brain.0.reconcile(&changes, &mut ctx);
                }
                Err(_) => warn!("{} has no brain for {}", id, entity),
            }
        }

        for (watch, watcher) in watchers.iter_mut() {
            let changes = detector.detect(ObserverId::Watcher(watch.0), watcher.entity, store);
            if changes.rose(&watcher.key) {
                (watcher.callback)(watcher.entity);
            }
        }
    }

    fn dispatch(&mut self, message: &Message, clock: &Clock, config: &SimConfig) -> Result<(), SimulationError> {
        match message.target {
            Target::Node => self.handle_node_message(message, clock, config),
            Target::Entity(entity) => self.deliver_to(entity, message, clock, config),
            Target::Kind(kind) => {
                for entity in self.registry.of_kind(kind) {
                    self.deliver_to(entity, message, clock, config)?;
                }
                Ok(())
            }
        }
    }

    fn deliver_to(&mut self, entity: EntityId, message: &Message, clock: &Clock, config: &SimConfig) -> Result<(), SimulationError> {
        if !self.is_authority() {
            debug!("{} ignored {:?} for {}", self.id, message.kind, entity);
            return Ok(());
        }
        if !self.registry.contains(entity) {
            self.report(entity, Err(BehaviorError::StaleMessage { entity }));
            return Ok(());
        }
        if !self.is_active(entity) {
            debug!("{} dropped {:?} for inactive {}", self.id, message.kind, entity);
            return Ok(());
        }
        self.run(entity, clock, config, |brain, ctx| brain.handle(message, ctx))
    }

    fn handle_node_message(&mut self, message: &Message, clock: &Clock, config: &SimConfig) -> Result<(), SimulationError> {
        match &message.payload {
            Payload::ResetGroup { group } => {
                if !self.is_authority() {
                    return Ok(());
                }
                info!("Resetting group {}", group.0);
                for entity in self.registry.in_group(*group) {
                    self.run(entity, clock, config, |brain, ctx| {
                        brain.cancel_timers();
                        brain.reset_to_initial_state(ctx)
                    })?;
                }
            }
            Payload::ActivateGroup { group } => {
                if self.active_groups.insert(*group) {
                    info!("{} activated group {}", self.id, group.0);
                }
            }
            Payload::DeactivateGroup { group } => {
                if self.active_groups.remove(group) {
                    info!("{} deactivated group {}", self.id, group.0);
                }
            }
            Payload::OpenExit { door } => {
                if let Some(door) = *door {
                    if self.is_authority() {
                        let open = Message::new(self.id, message.source_entity, Target::Entity(door), Payload::OpenDoor);
                        self.deliver_to(door, &open, clock, config)?;
                    }
                }
                let at = (*door)
                    .and_then(|d| self.store.read(d, &keys::POSITION))
                    .and_then(Value::as_vec3)
                    .unwrap_or(Vec3::ZERO);
                info!("{} exit opened", self.id);
                self.services.effects.play_effect("exit_open", at);
            }
            Payload::PlayEffect { name, at } => self.services.effects.play_effect(name, *at),
            other => debug!("{} ignored node message {:?}", self.id, other),
        }
        Ok(())
    }

    /// Run `f` against one entity's brain with a fresh step context, then
    /// report whatever it returned. A panic is contained to that entity.
    fn run<F>(&mut self, entity: EntityId, clock: &Clock, config: &SimConfig, f: F) -> Result<(), SimulationError>
    where
        F: FnOnce(&mut dyn Behavior, &mut StepContext<'_>) -> Result<(), BehaviorError>,
    {
        let result = {
            let Some(entry) = self.registry.get(entity) else {
                return Ok(());
            };
            let mut brain = self
                .world
                .get::<&mut Brain>(entry.handle)
                .map_err(|_| SimulationError::RegistryCorrupted { entity })?;
            let mut ctx = StepContext::new(entity, clock, config, &self.services, &mut self.store, &self.outbox);
            panic::catch_unwind(AssertUnwindSafe(|| f(brain.0.as_mut(), &mut ctx)))
        };
        match result {
            Ok(result) => self.report(entity, result),
            Err(payload) => warn!("{} panicked: {}", entity, panic_message(payload.as_ref())),
        }
        Ok(())
    }

    fn report(&mut self, entity: EntityId, result: Result<(), BehaviorError>) {
        let Err(error) = result else {
            return;
        };
        match &error {
            BehaviorError::MissingReference { what, .. } => {
                if self.reported.insert((entity, *what)) {
                    warn!("{}", error);
                }
            }
            BehaviorError::StaleMessage { .. } => debug!("{}", error),
            BehaviorError::QueryFailure { .. } => warn!("{}", error),
            BehaviorError::Replication(_) => warn!("{} failed: {}", entity, error),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text
    } else {
        "non-string panic"
    }
}
