//! Level lifecycle.
//!
//! The [`LevelManager`] walks through a fixed list of levels, each a group of
//! entities plus a target zone. When every player stands in the zone it
//! broadcasts the exit opening, waits out the exit delay, then deactivates the
//! finished group and activates the next. Each stage is its own state, gated
//! by a timer the manager owns:
//!
//! ```text
//! Playing ──all players in zone──► ExitOpening ──exit timer──► Playing (next level)
//!                                                         └──► Finished (no levels left)
//! ```
//!
//! A restart may arrive at any point. It clears the exit timer, drops the
//! transition and broadcasts a reset of the active group, so nothing scheduled
//! before the restart fires into the reset level.

use heist_logic::zone::Zone;
use log::info;

use crate::behaviors::{Behavior, InitialState, StepContext};
use crate::channel::{ActionKind, Message, Payload};
use crate::error::BehaviorError;
use crate::ids::{EntityId, EntityKind, GroupId};
use crate::replication::{keys, PropKey};
use crate::timer::Timer;

pub const ACTIVE_GROUP: PropKey = PropKey::new("active_group");
pub const TRANSITIONING: PropKey = PropKey::new("transitioning");

/// One level: its entity group, the zone players must reach, and the exit.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelPlan {
    pub group: GroupId,
    pub zone: Zone,
    pub exit_door: Option<EntityId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Playing,
    ExitOpening,
    Finished,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Playing => "playing",
            Stage::ExitOpening => "exit_opening",
            Stage::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LevelManager {
    levels: Vec<LevelPlan>,
    current: usize,
    stage: Stage,
    transitioning: bool,
    exit_timer: Timer,
    initial: InitialState<usize>,
}

impl LevelManager {
    pub fn new(levels: Vec<LevelPlan>) -> Self {
        Self {
            levels,
            current: 0,
            stage: Stage::Playing,
            transitioning: false,
            exit_timer: Timer::new(),
            initial: InitialState::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn is_transitioning(&self) -> bool {
        self.transitioning
    }

    pub fn active_group(&self) -> Option<GroupId> {
        self.levels.get(self.current).map(|l| l.group)
    }

    fn publish(&self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        let group = self.active_group().map_or(-1, |g| i64::from(g.0));
        ctx.write(ACTIVE_GROUP, group)?;
        ctx.write(TRANSITIONING, self.transitioning)?;
        ctx.write(keys::STATE, self.stage.name())?;
        Ok(())
    }

    fn level_complete(&self, level: &LevelPlan, ctx: &StepContext<'_>) -> bool {
        let policy = ctx.config.level.zone_boundary;
        level
            .zone
            .contains_all(ctx.services.players().into_iter().map(|p| p.position), policy)
    }

    /// Restart the active level. Safe in any stage.
    fn restart(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        let Some(group) = self.active_group() else {
            return Err(ctx.missing("levels"));
        };
        info!("Restarting level group {} (was {})", group.0, self.stage.name());
        self.exit_timer.clear();
        self.transitioning = false;
        self.stage = Stage::Playing;
        ctx.broadcast(Payload::ResetGroup { group });
        self.publish(ctx)
    }
}

impl Behavior for LevelManager {
    fn kind(&self) -> EntityKind {
        EntityKind::LevelManager
    }

    fn set_initial_state(&mut self) {
        self.initial.capture(self.current);
    }

    fn spawn(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        self.publish(ctx)?;
        let group = self.active_group().ok_or_else(|| ctx.missing("levels"))?;
        ctx.broadcast(Payload::ActivateGroup { group });
        Ok(())
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        match self.stage {
            Stage::Playing => {
                let Some(level) = self.levels.get(self.current) else {
                    return Err(ctx.missing("levels"));
                };
                if !self.level_complete(level, ctx) {
                    return Ok(());
                }
                info!("Level group {} complete, opening exit", level.group.0);
                ctx.broadcast(Payload::OpenExit {
                    door: level.exit_door,
                });
                ctx.arm(&mut self.exit_timer, ctx.config.level.exit_delay_secs);
                self.transitioning = true;
                self.stage = Stage::ExitOpening;
            }
            Stage::ExitOpening => {
                if !self.exit_timer.take_expired(ctx.now()) {
                    return Ok(());
                }
                if let Some(group) = self.active_group() {
                    ctx.broadcast(Payload::DeactivateGroup { group });
                }
                if self.current + 1 < self.levels.len() {
                    self.current += 1;
                    self.stage = Stage::Playing;
                    if let Some(group) = self.active_group() {
                        info!("Activating level group {}", group.0);
                        ctx.broadcast(Payload::ActivateGroup { group });
                    }
                } else {
                    info!("Final level finished");
                    self.stage = Stage::Finished;
                }
                self.transitioning = false;
            }
            Stage::Finished => return Ok(()),
        }
        self.publish(ctx)
    }

    fn handle(&mut self, message: &Message, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        match message.payload {
            Payload::Action {
                action: ActionKind::Restart,
                ..
            } => self.restart(ctx),
            _ => Ok(()),
        }
    }

    fn reset_to_initial_state(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        self.cancel_timers();
        self.current = self.initial.get().copied().unwrap_or(0);
        self.stage = Stage::Playing;
        self.transitioning = false;
        let active = self.active_group();
        for level in &self.levels {
            if Some(level.group) != active {
                ctx.broadcast(Payload::DeactivateGroup { group: level.group });
            }
        }
        if let Some(group) = active {
            ctx.broadcast(Payload::ActivateGroup { group });
        }
        self.publish(ctx)
    }

    fn cancel_timers(&mut self) {
        self.exit_timer.clear();
    }
}
