//! Hack and steal tasks.
//!
//! A player claims the task, then progress fills each tick while that player
//! stays in range. Walking away, or the claimant no longer being a player,
//! interrupts the task and throws the progress away. Rejections and
//! interruptions are published as feedback, never raised as errors.

use heist_logic::geometry::Vec3;
use heist_logic::progress::ProgressMeter;
use log::debug;

use super::{Behavior, InitialState, ReconcileContext, StepContext};
use crate::channel::{ActionKind, Message, Payload, Target};
use crate::error::BehaviorError;
use crate::ids::{ActorId, EntityId, EntityKind};
use crate::replication::{keys, ChangeSet, PropKey};
use crate::services::ActorRole;

pub const CLAIMANT: PropKey = PropKey::new("claimant");
pub const PROGRESS: PropKey = PropKey::new("progress");
pub const COMPLETED: PropKey = PropKey::new("completed");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Hack a terminal.
    Hack,
    /// Lift a piece of loot.
    Steal,
}

/// Side effect of completing the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskReward {
    OpenDoor(EntityId),
    SilenceAlarm(EntityId),
}

#[derive(Debug, Clone)]
pub struct ProgressTask {
    kind: TaskKind,
    position: Vec3,
    reward: Option<TaskReward>,
    claimant: Option<ActorId>,
    meter: ProgressMeter,
    completed: bool,
    initial: InitialState<bool>,
}

impl ProgressTask {
    pub fn hack(position: Vec3) -> Self {
        Self::new(TaskKind::Hack, position)
    }

    pub fn steal(position: Vec3) -> Self {
        Self::new(TaskKind::Steal, position)
    }

    fn new(kind: TaskKind, position: Vec3) -> Self {
        Self {
            kind,
            position,
            reward: None,
            claimant: None,
            meter: ProgressMeter::new(),
            completed: false,
            initial: InitialState::new(),
        }
    }

    pub fn rewards(mut self, reward: TaskReward) -> Self {
        self.reward = Some(reward);
        self
    }

    pub fn progress(&self) -> f32 {
        self.meter.value()
    }

    pub fn claimant(&self) -> Option<ActorId> {
        self.claimant
    }

    fn rate(&self, ctx: &StepContext<'_>) -> f32 {
        match self.kind {
            TaskKind::Hack => ctx.config.task.hack_rate,
            TaskKind::Steal => ctx.config.task.steal_rate,
        }
    }

    fn verb(&self) -> &'static str {
        match self.kind {
            TaskKind::Hack => "hack",
            TaskKind::Steal => "steal",
        }
    }

    fn publish(&self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        ctx.write(CLAIMANT, self.claimant)?;
        ctx.write(PROGRESS, self.meter.value())?;
        ctx.write(COMPLETED, self.completed)?;
        let state = match (self.completed, self.claimant) {
            (true, _) => "completed",
            (false, Some(_)) => "in_progress",
            (false, None) => "idle",
        };
        ctx.write(keys::STATE, state)?;
        Ok(())
    }

    fn claim(&mut self, actor: ActorId, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        if self.completed {
            return ctx.feedback("already_done");
        }
        if self.claimant.is_some_and(|c| c != actor) {
            return ctx.feedback("busy");
        }
        let Some(snapshot) = ctx.services.actor(actor) else {
            return Err(BehaviorError::StaleMessage { entity: ctx.entity });
        };
        if snapshot.role != ActorRole::Player {
            return ctx.feedback("not_eligible");
        }
        if snapshot.position.distance(&self.position) > ctx.config.task.range {
            return ctx.feedback("out_of_range");
        }
        self.claimant = Some(actor);
        ctx.feedback("claimed")?;
        self.publish(ctx)
    }

    fn interrupt(&mut self, reason: &str, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        debug!("{} {} interrupted: {}", ctx.entity, self.verb(), reason);
        self.claimant = None;
        self.meter.reset();
        ctx.feedback(reason)?;
        self.publish(ctx)
    }

    fn complete(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        self.completed = true;
        self.claimant = None;
        match self.reward {
            Some(TaskReward::OpenDoor(door)) => ctx.request(Target::Entity(door), Payload::OpenDoor),
            Some(TaskReward::SilenceAlarm(alarm)) => ctx.request(Target::Entity(alarm), Payload::ResetAlarm),
            None => {}
        }
        ctx.feedback("completed")?;
        self.publish(ctx)
    }
}

impl Behavior for ProgressTask {
    fn kind(&self) -> EntityKind {
        match self.kind {
            TaskKind::Hack => EntityKind::Terminal,
            TaskKind::Steal => EntityKind::Loot,
        }
    }

    fn set_initial_state(&mut self) {
        self.initial.capture(self.completed);
    }

    fn spawn(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        ctx.write(keys::POSITION, self.position)?;
        self.publish(ctx)
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        let Some(claimant) = self.claimant else {
            return Ok(());
        };
        if self.completed {
            return Ok(());
        }
        let Some(actor) = ctx.services.actor(claimant) else {
            return self.interrupt("lost_actor", ctx);
        };
        if actor.role != ActorRole::Player {
            return self.interrupt("not_eligible", ctx);
        }
        if actor.position.distance(&self.position) > ctx.config.task.range {
            return self.interrupt("interrupted", ctx);
        }
        let rate = self.rate(ctx);
        if self.meter.advance(rate, ctx.dt()) {
            return self.complete(ctx);
        }
        self.publish(ctx)
    }

    fn handle(&mut self, message: &Message, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        match message.payload {
            Payload::Action {
                action: ActionKind::Claim,
                actor,
            } => self.claim(actor, ctx),
            Payload::Action {
                action: ActionKind::Release,
                actor,
            } if self.claimant == Some(actor) => self.interrupt("released", ctx),
            _ => Ok(()),
        }
    }

    fn reconcile(&mut self, changes: &ChangeSet, ctx: &mut ReconcileContext<'_>) {
        ctx.reconcile_feedback(changes);
        if changes.rose(&COMPLETED) {
            ctx.play_effect(&format!("{}_complete", self.verb()));
        }
    }

    fn reset_to_initial_state(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        self.claimant = None;
        self.meter.reset();
        self.completed = self.initial.get().copied().unwrap_or(false);
        self.publish(ctx)
    }

    fn cancel_timers(&mut self) {}
}
