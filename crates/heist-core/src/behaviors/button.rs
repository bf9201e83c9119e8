//! Push button gated by a cooldown.

use heist_logic::geometry::Vec3;

use super::{Behavior, InitialState, ReconcileContext, StepContext};
use crate::channel::{ActionKind, Message, Payload, Target};
use crate::error::BehaviorError;
use crate::ids::{EntityId, EntityKind};
use crate::replication::{keys, ChangeSet, PropKey, Value};
use crate::timer::Timer;

pub const PRESSED: PropKey = PropKey::new("pressed");
pub const PRESS_COUNT: PropKey = PropKey::new("press_count");

/// What an accepted press does besides counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonLink {
    OpenDoor(EntityId),
    ToggleDoor(EntityId),
    TripAlarm(EntityId),
}

#[derive(Debug, Clone)]
pub struct Button {
    position: Vec3,
    link: Option<ButtonLink>,
    presses: i64,
    cooldown: Timer,
    initial: InitialState<i64>,
}

impl Button {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            link: None,
            presses: 0,
            cooldown: Timer::new(),
            initial: InitialState::new(),
        }
    }

    pub fn linked(mut self, link: ButtonLink) -> Self {
        self.link = Some(link);
        self
    }

    fn publish(&self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        ctx.write(PRESSED, self.cooldown.is_running(ctx.now()))?;
        ctx.write(PRESS_COUNT, self.presses)?;
        Ok(())
    }

    fn press(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        self.cooldown.take_expired(ctx.now());
        if self.cooldown.is_running(ctx.now()) {
            return ctx.feedback("cooldown");
        }
        self.presses += 1;
        ctx.arm(&mut self.cooldown, ctx.config.button.cooldown_secs);

        match self.link {
            Some(ButtonLink::OpenDoor(door)) => ctx.request(Target::Entity(door), Payload::OpenDoor),
            Some(ButtonLink::ToggleDoor(door)) => {
                let open = ctx
                    .read_of(door, &keys::OPEN)
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let payload = if open { Payload::CloseDoor } else { Payload::OpenDoor };
                ctx.request(Target::Entity(door), payload);
            }
            Some(ButtonLink::TripAlarm(alarm)) => ctx.request(Target::Entity(alarm), Payload::TriggerAlarm),
            None => {}
        }
        ctx.feedback("accepted")?;
        self.publish(ctx)
    }
}

impl Behavior for Button {
    fn kind(&self) -> EntityKind {
        EntityKind::Button
    }

    fn set_initial_state(&mut self) {
        self.initial.capture(self.presses);
    }

    fn spawn(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        ctx.write(keys::POSITION, self.position)?;
        self.publish(ctx)
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        if self.cooldown.take_expired(ctx.now()) {
            self.publish(ctx)?;
        }
        Ok(())
    }

    fn handle(&mut self, message: &Message, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        match message.payload {
            Payload::Action {
                action: ActionKind::Press,
                ..
            } => self.press(ctx),
            _ => Ok(()),
        }
    }

    fn reconcile(&mut self, changes: &ChangeSet, ctx: &mut ReconcileContext<'_>) {
        ctx.reconcile_feedback(changes);
        if changes.rose(&PRESSED) {
            ctx.play_effect("button_click");
        }
    }

    fn reset_to_initial_state(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        self.cancel_timers();
        self.presses = self.initial.get().copied().unwrap_or(0);
        self.publish(ctx)
    }

    fn cancel_timers(&mut self) {
        self.cooldown.clear();
    }
}
