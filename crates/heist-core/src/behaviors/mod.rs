//! Behavior state machines and the contexts they run in.
//!
//! Every gameplay object implements [`Behavior`]. The authority calls
//! [`spawn`](Behavior::spawn) once, then [`handle`](Behavior::handle) for each
//! accepted message and [`step`](Behavior::step) once per tick. All transitions
//! happen there. Every node, authority included, then calls
//! [`reconcile`](Behavior::reconcile) with whatever properties changed since
//! that node last looked, and turns those changes into effects.
//!
//! | Module | Entity |
//! |--------|--------|
//! | `alarm` | Alarm booth |
//! | `animator` | Animation state/trigger replication helper |
//! | `button` | Push button with cooldown |
//! | `door` | Door, optionally keyed |
//! | `guard` | Patrolling guard with vision |
//! | `laser` | Laser trap with mirrors |
//! | `lock` | Combination lock |
//! | `sneak` | Noise-sensitive floor zone |
//! | `task` | Hack and steal progress tasks |

pub mod alarm;
pub mod animator;
pub mod button;
pub mod door;
pub mod guard;
pub mod laser;
pub mod lock;
pub mod sneak;
pub mod task;

#[cfg(test)]
pub(crate) mod bench;

use heist_logic::geometry::Vec3;

use crate::channel::{Message, Outbox, Payload, Target};
use crate::config::SimConfig;
use crate::error::BehaviorError;
use crate::ids::{EntityId, EntityKind, NodeId, Role, RoleFilter, Tick};
use crate::replication::{keys, ChangeSet, PropKey, PropertyStore, Value};
use crate::services::Services;
use crate::timer::{Clock, Timer};

/// Object-safe cloning, so blueprints can stamp out a fresh copy per node.
pub trait BehaviorClone {
    fn clone_box(&self) -> Box<dyn Behavior>;
}

impl<T: Behavior + Clone> BehaviorClone for T {
    fn clone_box(&self) -> Box<dyn Behavior> {
        Box::new(self.clone())
    }
}

pub trait Behavior: BehaviorClone + Send + Sync + 'static {
    fn kind(&self) -> EntityKind;

    /// Record the state to return to on reset. Called once when the entity is
    /// inserted; later calls must not overwrite the first capture.
    fn set_initial_state(&mut self);

    /// Authority only: publish the initial properties.
    fn spawn(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError>;

    /// Authority only: advance timers and state by one tick.
    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError>;

    /// Authority only: react to a message addressed to this entity.
    fn handle(&mut self, message: &Message, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        let _ = (message, ctx);
        Ok(())
    }

    /// Every node: apply effects for changed properties.
    fn reconcile(&mut self, changes: &ChangeSet, ctx: &mut ReconcileContext<'_>) {
        let _ = (changes, ctx);
    }

    /// Authority only: restore the captured initial state. Calling it twice in
    /// a row leaves the same properties as calling it once.
    fn reset_to_initial_state(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError>;

    /// Clear every armed timer. Used on reset and despawn.
    fn cancel_timers(&mut self);
}

/// Capture-once holder for a reset snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialState<T>(Option<T>);

impl<T> Default for InitialState<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T: Clone> InitialState<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` unless something was captured already. Returns whether it
    /// was stored.
    pub fn capture(&mut self, value: T) -> bool {
        if self.0.is_some() {
            return false;
        }
        self.0 = Some(value);
        true
    }

    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    pub fn is_captured(&self) -> bool {
        self.0.is_some()
    }
}

/// What an authority-side behavior may touch during one call.
pub struct StepContext<'a> {
    pub entity: EntityId,
    pub node: NodeId,
    pub clock: &'a Clock,
    pub config: &'a SimConfig,
    pub services: &'a Services,
    store: &'a mut PropertyStore,
    outbox: &'a Outbox,
}

impl<'a> StepContext<'a> {
    pub fn new(
        entity: EntityId,
        clock: &'a Clock,
        config: &'a SimConfig,
        services: &'a Services,
        store: &'a mut PropertyStore,
        outbox: &'a Outbox,
    ) -> Self {
        Self {
            entity,
            node: outbox.node(),
            clock,
            config,
            services,
            store,
            outbox,
        }
    }

    pub fn now(&self) -> Tick {
        self.clock.now()
    }

    /// Seconds per tick.
    pub fn dt(&self) -> f32 {
        self.clock.dt()
    }

    pub fn arm(&self, timer: &mut Timer, secs: f32) {
        timer.arm_secs(self.clock, secs);
    }

    /// Write one of this entity's properties. Returns whether it changed.
    pub fn write(&mut self, key: PropKey, value: impl Into<Value>) -> Result<bool, BehaviorError> {
        Ok(self.store.write(self.entity, key, value.into())?)
    }

    pub fn read(&self, key: &PropKey) -> Option<&Value> {
        self.store.read(self.entity, key)
    }

    /// Read another entity's property.
    pub fn read_of(&self, entity: EntityId, key: &PropKey) -> Option<&Value> {
        self.store.read(entity, key)
    }

    pub fn send(&self, to: RoleFilter, target: Target, payload: Payload) {
        let message = Message::new(self.node, Some(self.entity), target, payload);
        self.outbox.send(to, message);
    }

    /// Ask the authority to act on `target`.
    pub fn request(&self, target: Target, payload: Payload) {
        self.send(RoleFilter::AUTHORITY, target, payload);
    }

    /// Node-level message to every node.
    pub fn broadcast(&self, payload: Payload) {
        self.send(RoleFilter::ALL, Target::Node, payload);
    }

    /// Report an action outcome. The sequence bump makes a repeat of the same
    /// text observable.
    pub fn feedback(&mut self, text: &str) -> Result<(), BehaviorError> {
        let seq = self
            .read(&keys::FEEDBACK_SEQ)
            .and_then(Value::as_int)
            .unwrap_or(0);
        self.write(keys::FEEDBACK, text)?;
        self.write(keys::FEEDBACK_SEQ, seq + 1)?;
        Ok(())
    }

    pub fn missing(&self, what: &'static str) -> BehaviorError {
        BehaviorError::MissingReference {
            entity: self.entity,
            what,
        }
    }

    pub fn query_failed(&self, reason: impl std::fmt::Display) -> BehaviorError {
        BehaviorError::QueryFailure {
            entity: self.entity,
            reason: reason.to_string(),
        }
    }
}

/// What a behavior may touch while reconciling on any node.
pub struct ReconcileContext<'a> {
    pub entity: EntityId,
    pub node: NodeId,
    pub role: Role,
    pub services: &'a Services,
    store: &'a PropertyStore,
}

impl<'a> ReconcileContext<'a> {
    pub fn new(entity: EntityId, node: NodeId, role: Role, services: &'a Services, store: &'a PropertyStore) -> Self {
        Self {
            entity,
            node,
            role,
            services,
            store,
        }
    }

    pub fn read(&self, key: &PropKey) -> Option<&Value> {
        self.store.read(self.entity, key)
    }

    /// Replicated position, or the origin if none was published.
    pub fn position(&self) -> Vec3 {
        self.read(&keys::POSITION)
            .and_then(Value::as_vec3)
            .unwrap_or(Vec3::ZERO)
    }

    pub fn play_effect(&self, name: &str) {
        self.services.effects.play_effect(name, self.position());
    }

    /// Play `feedback:<text>` when a new feedback was published.
    pub fn reconcile_feedback(&self, changes: &ChangeSet) {
        if !changes.contains(&keys::FEEDBACK_SEQ) {
            return;
        }
        if let Some(text) = self.read(&keys::FEEDBACK).and_then(Value::as_text) {
            self.play_effect(&format!("feedback:{text}"));
        }
    }
}
