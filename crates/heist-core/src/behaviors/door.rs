//! Doors. Open and locked state are authority-owned booleans; a key-locked
//! door opens only for its key, and authority messages (a solved lock, the
//! level exit) open it regardless.

use heist_logic::geometry::Vec3;

use super::{animator, Behavior, InitialState, ReconcileContext, StepContext};
use crate::channel::{ActionKind, Message, Payload};
use crate::error::BehaviorError;
use crate::ids::{EntityKind, KeyId};
use crate::replication::{keys, ChangeSet, PropKey};
use crate::timer::Timer;

pub const LOCKED: PropKey = PropKey::new("locked");

#[derive(Debug, Clone, Copy, PartialEq)]
struct DoorStart {
    open: bool,
    locked: bool,
}

#[derive(Debug, Clone)]
pub struct Door {
    position: Vec3,
    key: Option<KeyId>,
    open: bool,
    locked: bool,
    auto_close: Timer,
    initial: InitialState<DoorStart>,
}

impl Door {
    /// A closed, unlocked door.
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            key: None,
            open: false,
            locked: false,
            auto_close: Timer::new(),
            initial: InitialState::new(),
        }
    }

    /// Lock the door; only `key` unlocks it.
    pub fn locked_with(mut self, key: KeyId) -> Self {
        self.key = Some(key);
        self.locked = true;
        self
    }

    pub fn opened(mut self) -> Self {
        self.open = true;
        self
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn publish(&self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        ctx.write(keys::OPEN, self.open)?;
        ctx.write(LOCKED, self.locked)?;
        let name = if self.open { "open" } else { "closed" };
        ctx.write(keys::STATE, name)?;
        animator::set_state(ctx, name)
    }

    fn open(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        if let Some(secs) = ctx.config.door.auto_close_secs {
            ctx.arm(&mut self.auto_close, secs);
        }
        if self.open {
            return Ok(());
        }
        self.open = true;
        self.publish(ctx)
    }

    fn close(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        self.auto_close.clear();
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.publish(ctx)
    }
}

impl Behavior for Door {
    fn kind(&self) -> EntityKind {
        EntityKind::Door
    }

    fn set_initial_state(&mut self) {
        self.initial.capture(DoorStart {
            open: self.open,
            locked: self.locked,
        });
    }

    fn spawn(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        ctx.write(keys::POSITION, self.position)?;
        self.publish(ctx)
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        if self.auto_close.take_expired(ctx.now()) {
            self.close(ctx)?;
        }
        Ok(())
    }

    fn handle(&mut self, message: &Message, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        match message.payload {
            Payload::OpenDoor => self.open(ctx),
            Payload::CloseDoor => self.close(ctx),
            Payload::Action {
                action: ActionKind::Press,
                ..
            } => {
                if self.locked {
                    return ctx.feedback("locked");
                }
                if self.open {
                    self.close(ctx)
                } else {
                    self.open(ctx)
                }
            }
            Payload::Action {
                action: ActionKind::InsertKey(key),
                ..
            } => {
                if self.key != Some(key) {
                    return ctx.feedback("wrong_key");
                }
                self.locked = false;
                ctx.feedback("accepted")?;
                self.open(ctx)?;
                // Opening is a no-op on an already open door; publish the unlock.
                self.publish(ctx)
            }
            _ => Ok(()),
        }
    }

    fn reconcile(&mut self, changes: &ChangeSet, ctx: &mut ReconcileContext<'_>) {
        ctx.reconcile_feedback(changes);
        animator::reconcile(changes, ctx);
    }

    fn reset_to_initial_state(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        self.cancel_timers();
        if let Some(start) = self.initial.get().copied() {
            self.open = start.open;
            self.locked = start.locked;
        }
        self.publish(ctx)
    }

    fn cancel_timers(&mut self) {
        self.auto_close.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviors::bench::Bench;
    use crate::channel::Target;
    use crate::ids::ActorId;
    use crate::replication::Value;

    fn act(bench: &mut Bench, door: &mut Door, action: ActionKind) {
        let msg = Message::new(
            bench.node(),
            None,
            Target::Entity(bench.entity),
            Payload::Action {
                action,
                actor: ActorId(1),
            },
        );
        door.handle(&msg, &mut bench.ctx()).unwrap();
    }

    fn spawned(bench: &mut Bench, mut door: Door) -> Door {
        door.set_initial_state();
        door.spawn(&mut bench.ctx()).unwrap();
        door
    }

    #[test]
    fn test_wrong_key_is_feedback_and_stays_shut() {
        let mut bench = Bench::new();
        let mut door = spawned(&mut bench, Door::new(Vec3::ZERO).locked_with(KeyId(1)));

        act(&mut bench, &mut door, ActionKind::Press);
        assert_eq!(bench.read(&keys::FEEDBACK), Some(Value::Text("locked".into())));
        act(&mut bench, &mut door, ActionKind::InsertKey(KeyId(2)));
        act(&mut bench, &mut door, ActionKind::InsertKey(KeyId(2)));
        assert_eq!(bench.read(&keys::FEEDBACK), Some(Value::Text("wrong_key".into())));
        assert_eq!(bench.read(&keys::FEEDBACK_SEQ), Some(Value::Int(3)));
        assert!(!door.is_open());

        act(&mut bench, &mut door, ActionKind::InsertKey(KeyId(1)));
        assert!(door.is_open());
        assert_eq!(bench.read(&LOCKED), Some(Value::Bool(false)));
        assert_eq!(bench.read(&keys::STATE), Some(Value::Text("open".into())));
    }

    #[test]
    fn test_open_message_bypasses_lock() {
        let mut bench = Bench::new();
        let mut door = spawned(&mut bench, Door::new(Vec3::ZERO).locked_with(KeyId(1)));
        let msg = Message::new(bench.node(), None, Target::Entity(bench.entity), Payload::OpenDoor);
        door.handle(&msg, &mut bench.ctx()).unwrap();
        assert_eq!(bench.read(&keys::OPEN), Some(Value::Bool(true)));
        assert_eq!(bench.read(&LOCKED), Some(Value::Bool(true)));
    }

    #[test]
    fn test_auto_close() {
        let mut bench = Bench::new();
        bench.config.door.auto_close_secs = Some(0.5);
        let mut door = spawned(&mut bench, Door::new(Vec3::ZERO));
        act(&mut bench, &mut door, ActionKind::Press);
        assert!(door.is_open());

        for _ in 0..bench.clock.secs_to_ticks(0.5) {
            bench.advance();
            door.step(&mut bench.ctx()).unwrap();
        }
        assert!(!door.is_open());
        assert_eq!(bench.read(&keys::ANIM_STATE), Some(Value::Text("closed".into())));
    }

    #[test]
    fn test_reset_relocks() {
        let mut bench = Bench::new();
        let mut door = spawned(&mut bench, Door::new(Vec3::ZERO).locked_with(KeyId(1)));
        act(&mut bench, &mut door, ActionKind::InsertKey(KeyId(1)));
        door.reset_to_initial_state(&mut bench.ctx()).unwrap();
        assert!(!door.is_open());
        assert_eq!(bench.read(&LOCKED), Some(Value::Bool(true)));
    }
}
