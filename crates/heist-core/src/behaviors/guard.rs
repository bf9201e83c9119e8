//! Guard AI.
//!
//! ```text
//!            spotted                 alarm (while alerted)
//!  Patrol ───────────► Alert ─────────────────────────┐
//!    ▲  ▲               │ timer, no alarm              │ timer, alarm pending
//!    │  └───────────────┘                              ▼
//!    │                                            RunToAlarm ──reach──► Rest
//!    │                                                                   │ timer
//!    └──────────────── arrive ◄─────────── Return ◄──────────────────────┘
//! ```
//!
//! An alarm heard while patrolling, returning or already running goes straight
//! to `RunToAlarm`. One heard while resting is ignored. A guard that spots a
//! player while running to an alarm resumes running once the alert is over.
//!
//! Vision runs every tick beside the state machine. Each player accumulates
//! consecutive visible ticks while inside the view cone with a clear line of
//! sight. Crossing the threshold sends the guard a `PlayerSpotted` message once;
//! the player must drop out of view before it can be spotted again.

use heist_logic::geometry::Vec3;
use heist_logic::navigation::{arrived, nearest_waypoint, next_index, step_towards};
use heist_logic::vision::{SightTracker, Sighting, ViewCone};
use log::debug;

use super::{animator, Behavior, InitialState, ReconcileContext, StepContext};
use crate::channel::{Message, Payload, Target};
use crate::error::BehaviorError;
use crate::ids::{ActorId, EntityId, EntityKind};
use crate::replication::{keys, ChangeSet, Value};
use crate::services::LayerMask;
use crate::timer::Timer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Patrol,
    Alert,
    RunToAlarm,
    Rest,
    Return,
}

impl GuardState {
    /// Name published in the `state` property.
    pub fn name(self) -> &'static str {
        match self {
            GuardState::Patrol => "patrol",
            GuardState::Alert => "alert",
            GuardState::RunToAlarm => "run_to_alarm",
            GuardState::Rest => "rest",
            GuardState::Return => "return",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "patrol" => Some(GuardState::Patrol),
            "alert" => Some(GuardState::Alert),
            "run_to_alarm" => Some(GuardState::RunToAlarm),
            "rest" => Some(GuardState::Rest),
            "return" => Some(GuardState::Return),
            _ => None,
        }
    }

    fn animation(self) -> &'static str {
        match self {
            GuardState::Patrol | GuardState::Return => "walk",
            GuardState::Alert => "look_around",
            GuardState::RunToAlarm => "run",
            GuardState::Rest => "idle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingAlarm {
    booth: Option<EntityId>,
    position: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct GuardStart {
    position: Vec3,
    facing: Vec3,
}

#[derive(Debug, Clone)]
pub struct Guard {
    waypoints: Vec<Vec3>,
    position: Vec3,
    facing: Vec3,
    state: GuardState,
    /// State to go back to when the alert ends.
    resume: GuardState,
    waypoint: usize,
    alarm: Option<PendingAlarm>,
    alert_timer: Timer,
    rest_timer: Timer,
    sight: SightTracker<ActorId>,
    initial: InitialState<GuardStart>,
}

impl Guard {
    pub fn new(position: Vec3, waypoints: Vec<Vec3>) -> Self {
        Self {
            waypoints,
            position,
            facing: Vec3::FORWARD,
            state: GuardState::Patrol,
            resume: GuardState::Patrol,
            waypoint: 0,
            alarm: None,
            alert_timer: Timer::new(),
            rest_timer: Timer::new(),
            sight: SightTracker::new(1),
            initial: InitialState::new(),
        }
    }

    pub fn facing(mut self, direction: Vec3) -> Self {
        self.facing = direction.normalize();
        self
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    fn sight_threshold(ctx: &StepContext<'_>) -> u32 {
        let ticks = ctx.clock.secs_to_ticks(ctx.config.guard.sight_threshold_secs);
        u32::try_from(ticks).unwrap_or(u32::MAX).max(1)
    }

    fn publish(&self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        ctx.write(keys::POSITION, self.position)?;
        ctx.write(keys::FACING, self.facing)?;
        ctx.write(keys::STATE, self.state.name())?;
        animator::set_state(ctx, self.state.animation())
    }

    fn walk_to(&mut self, goal: Vec3, speed: f32, dt: f32) {
        let heading = (goal - self.position).flat();
        if heading.length() > 1e-6 {
            self.facing = heading.normalize();
        }
        self.position = step_towards(self.position, goal, speed * dt);
    }

    /// Update sight accumulation for every player. A failed line-of-sight
    /// query counts as not visible; the first failure is returned once all
    /// players have been observed.
    fn look(&mut self, ctx: &StepContext<'_>) -> Result<(), BehaviorError> {
        let cfg = &ctx.config.guard;
        let cone = ViewCone::new(cfg.view_half_angle_deg, cfg.view_range);
        let eye = self.position + Vec3::UP * cfg.eye_height;
        let players = ctx.services.players();
        self.sight.retain(|id| players.iter().any(|p| p.id == *id));

        let mut failure = None;
        for player in &players {
            let head = player.position + Vec3::UP * cfg.eye_height;
            let visible = cone.contains(eye, self.facing, head)
                && match ctx.services.line_of_sight(eye, head, LayerMask::OCCLUDERS) {
                    Ok(clear) => clear,
                    Err(e) => {
                        failure.get_or_insert_with(|| {
                            ctx.query_failed(format!("sight check on {}: {}", player.id, e))
                        });
                        false
                    }
                };
            if self.sight.observe(player.id, visible) == Sighting::Spotted {
                ctx.request(
                    Target::Entity(ctx.entity),
                    Payload::PlayerSpotted { actor: player.id },
                );
            }
        }
        failure.map_or(Ok(()), Err)
    }

    fn advance(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        let now = ctx.now();
        let dt = ctx.dt();
        let cfg = ctx.config.guard.clone();

        match self.state {
            GuardState::Patrol => {
                let Some(goal) = self.waypoints.get(self.waypoint).copied() else {
                    return Err(ctx.missing("patrol waypoints"));
                };
                self.walk_to(goal, cfg.walk_speed, dt);
                if arrived(self.position, goal, cfg.arrive_distance) {
                    self.waypoint = next_index(self.waypoint, self.waypoints.len());
                }
            }
            GuardState::Alert => {
                if self.alert_timer.take_expired(now) {
                    self.state = if self.resume == GuardState::RunToAlarm && self.alarm.is_some() {
                        GuardState::RunToAlarm
                    } else {
                        GuardState::Patrol
                    };
                    self.resume = GuardState::Patrol;
                }
            }
            GuardState::RunToAlarm => {
                let Some(alarm) = self.alarm else {
                    self.state = GuardState::Patrol;
                    return Ok(());
                };
                self.walk_to(alarm.position, cfg.run_speed, dt);
                if arrived(self.position, alarm.position, cfg.alarm_reach_distance) {
                    self.state = GuardState::Rest;
                    ctx.arm(&mut self.rest_timer, cfg.rest_secs);
                }
            }
            GuardState::Rest => {
                if self.rest_timer.take_expired(now) {
                    if let Some(booth) = self.alarm.take().and_then(|a| a.booth) {
                        ctx.request(Target::Entity(booth), Payload::ResetAlarm);
                    }
                    match nearest_waypoint(self.position, &self.waypoints) {
                        Some(i) => {
                            self.waypoint = i;
                            self.state = GuardState::Return;
                        }
                        None => self.state = GuardState::Patrol,
                    }
                }
            }
            GuardState::Return => {
                let Some(goal) = self.waypoints.get(self.waypoint).copied() else {
                    self.state = GuardState::Patrol;
                    return Ok(());
                };
                self.walk_to(goal, cfg.walk_speed, dt);
                if arrived(self.position, goal, cfg.arrive_distance) {
                    self.waypoint = next_index(self.waypoint, self.waypoints.len());
                    self.state = GuardState::Patrol;
                }
            }
        }
        Ok(())
    }

    fn on_spotted(&mut self, actor: ActorId, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        if matches!(self.state, GuardState::Alert | GuardState::Rest) {
            return Ok(());
        }
        debug!("{} spotted {} while {}", ctx.entity, actor, self.state.name());
        self.resume = self.state;
        self.state = GuardState::Alert;
        ctx.arm(&mut self.alert_timer, ctx.config.guard.alert_secs);
        animator::fire_trigger(ctx, "spotted")
    }

    fn on_alarm(&mut self, alarm: PendingAlarm) {
        match self.state {
            GuardState::Rest => {}
            GuardState::Alert => {
                self.alarm = Some(alarm);
                self.resume = GuardState::RunToAlarm;
            }
            GuardState::Patrol | GuardState::Return | GuardState::RunToAlarm => {
                self.alarm = Some(alarm);
                self.state = GuardState::RunToAlarm;
            }
        }
    }
}

impl Behavior for Guard {
    fn kind(&self) -> EntityKind {
        EntityKind::Guard
    }

    fn set_initial_state(&mut self) {
        self.initial.capture(GuardStart {
            position: self.position,
            facing: self.facing,
        });
    }

    fn spawn(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        self.sight = SightTracker::new(Self::sight_threshold(ctx));
        self.publish(ctx)?;
        if self.waypoints.is_empty() {
            return Err(ctx.missing("patrol waypoints"));
        }
        Ok(())
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        let looked = self.look(ctx);
        let advanced = self.advance(ctx);
        self.publish(ctx)?;
        advanced.and(looked)
    }

    fn handle(&mut self, message: &Message, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        match message.payload {
            Payload::PlayerSpotted { actor } => self.on_spotted(actor, ctx)?,
            Payload::AlarmTriggered { position } => self.on_alarm(PendingAlarm {
                booth: message.source_entity,
                position,
            }),
            _ => return Ok(()),
        }
        self.publish(ctx)
    }

    fn reconcile(&mut self, changes: &ChangeSet, ctx: &mut ReconcileContext<'_>) {
        animator::reconcile(changes, ctx);
        if changes.current(&keys::STATE).and_then(Value::as_text) == Some(GuardState::Alert.name()) {
            ctx.play_effect("guard_alert");
        }
    }

    fn reset_to_initial_state(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        self.cancel_timers();
        if let Some(start) = self.initial.get().copied() {
            self.position = start.position;
            self.facing = start.facing;
        }
        self.state = GuardState::Patrol;
        self.resume = GuardState::Patrol;
        self.waypoint = 0;
        self.alarm = None;
        self.sight.clear();
        self.publish(ctx)
    }

    fn cancel_timers(&mut self) {
        self.alert_timer.clear();
        self.rest_timer.clear();
    }
}
