//! Alarm booth.
//!
//! `ringing` is the only state. The optional auto-silence timer just schedules
//! when to flip it back; nothing reads the timer to decide whether the alarm
//! is on.

use heist_logic::geometry::Vec3;

use super::{Behavior, InitialState, ReconcileContext, StepContext};
use crate::channel::{ActionKind, Message, Payload, Target};
use crate::error::BehaviorError;
use crate::ids::EntityKind;
use crate::replication::{keys, ChangeSet, PropKey};
use crate::timer::Timer;

pub const RINGING: PropKey = PropKey::new("ringing");

#[derive(Debug, Clone)]
pub struct AlarmBooth {
    position: Vec3,
    ringing: bool,
    auto_silence: Timer,
    initial: InitialState<bool>,
}

impl AlarmBooth {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            ringing: false,
            auto_silence: Timer::new(),
            initial: InitialState::new(),
        }
    }

    pub fn is_ringing(&self) -> bool {
        self.ringing
    }

    fn publish(&self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        ctx.write(RINGING, self.ringing)?;
        ctx.write(keys::STATE, if self.ringing { "ringing" } else { "idle" })?;
        Ok(())
    }

    fn ring(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        if self.ringing {
            return Ok(());
        }
        self.ringing = true;
        if let Some(secs) = ctx.config.alarm.auto_silence_secs {
            ctx.arm(&mut self.auto_silence, secs);
        }
        ctx.request(
            Target::Kind(EntityKind::Guard),
            Payload::AlarmTriggered {
                position: self.position,
            },
        );
        self.publish(ctx)
    }

    fn silence(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        self.auto_silence.clear();
        self.ringing = false;
        self.publish(ctx)
    }
}

impl Behavior for AlarmBooth {
    fn kind(&self) -> EntityKind {
        EntityKind::AlarmBooth
    }

    fn set_initial_state(&mut self) {
        self.initial.capture(self.ringing);
    }

    fn spawn(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        ctx.write(keys::POSITION, self.position)?;
        self.publish(ctx)
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        if self.auto_silence.take_expired(ctx.now()) {
            self.silence(ctx)?;
        }
        Ok(())
    }

    fn handle(&mut self, message: &Message, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        match message.payload {
            Payload::TriggerAlarm
            | Payload::Action {
                action: ActionKind::Trigger,
                ..
            } => self.ring(ctx),
            Payload::ResetAlarm => self.silence(ctx),
            _ => Ok(()),
        }
    }

    fn reconcile(&mut self, changes: &ChangeSet, ctx: &mut ReconcileContext<'_>) {
        let Some(change) = changes.get(&RINGING) else {
            return;
        };
        if changes.rose(&RINGING) {
            ctx.play_effect("alarm_siren");
        } else if change.previous.is_some() {
            ctx.play_effect("alarm_silenced");
        }
    }

    fn reset_to_initial_state(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        self.cancel_timers();
        self.ringing = self.initial.get().copied().unwrap_or(false);
        self.publish(ctx)
    }

    fn cancel_timers(&mut self) {
        self.auto_silence.clear();
    }
}
