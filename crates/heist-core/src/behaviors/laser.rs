//! Laser trap: a beam bounced off mirrors that trips an alarm when it touches
//! a player.

use heist_logic::beam::{trace_beam, BeamEnd, BeamHit};
use heist_logic::geometry::Vec3;

use super::{Behavior, InitialState, ReconcileContext, StepContext};
use crate::channel::{ActionKind, Message, Payload, Target};
use crate::error::BehaviorError;
use crate::ids::{EntityId, EntityKind};
use crate::replication::{keys, ChangeSet, PropKey};
use crate::services::LayerMask;
use crate::timer::Timer;

pub const BEAM_LENGTH: PropKey = PropKey::new("beam_length");
pub const BOUNCES: PropKey = PropKey::new("bounces");
pub const TRIPPED: PropKey = PropKey::new("tripped");
pub const ARMED: PropKey = PropKey::new("armed");

#[derive(Debug, Clone)]
pub struct LaserTrap {
    origin: Vec3,
    direction: Vec3,
    alarm: Option<EntityId>,
    armed: bool,
    tripped: bool,
    cooldown: Timer,
    initial: InitialState<bool>,
}

impl LaserTrap {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
            alarm: None,
            armed: true,
            tripped: false,
            cooldown: Timer::new(),
            initial: InitialState::new(),
        }
    }

    pub fn linked_to(mut self, alarm: EntityId) -> Self {
        self.alarm = Some(alarm);
        self
    }

    pub fn disarmed(mut self) -> Self {
        self.armed = false;
        self
    }

    fn publish_flags(&self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        ctx.write(ARMED, self.armed)?;
        ctx.write(TRIPPED, self.tripped)?;
        Ok(())
    }
}

impl Behavior for LaserTrap {
    fn kind(&self) -> EntityKind {
        EntityKind::LaserTrap
    }

    fn set_initial_state(&mut self) {
        self.initial.capture(self.armed);
    }

    fn spawn(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        ctx.write(keys::POSITION, self.origin)?;
        self.publish_flags(ctx)
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        // The tick the cooldown lapses only clears the flag, so a beam that
        // stays broken shows up as a fresh rising edge on the next tick.
        let rearmed = self.cooldown.take_expired(ctx.now());
        if rearmed {
            self.tripped = false;
        }
        if !self.armed {
            return self.publish_flags(ctx);
        }

        let services = ctx.services;
        let mut failure = None;
        let trace = trace_beam(
            self.origin,
            self.direction,
            ctx.config.laser.max_distance,
            ctx.config.laser.max_reflections,
            |origin, dir, max| match services.raycast(origin, dir, max, LayerMask::ALL) {
                Ok(hit) => hit.map(|h| BeamHit {
                    distance: h.distance,
                    point: h.point,
                    normal: h.normal,
                    surface: h.surface,
                }),
                Err(e) => {
                    failure.get_or_insert_with(|| e.to_string());
                    None
                }
            },
        );
        ctx.write(BEAM_LENGTH, trace.length)?;
        ctx.write(BOUNCES, i64::from(trace.reflections))?;

        if trace.end == BeamEnd::Player && !rearmed && !self.cooldown.is_armed() {
            let alarm = self.alarm.ok_or_else(|| ctx.missing("linked alarm"))?;
            ctx.request(Target::Entity(alarm), Payload::TriggerAlarm);
            self.tripped = true;
            ctx.arm(&mut self.cooldown, ctx.config.laser.retrigger_secs);
        }
        self.publish_flags(ctx)?;
        match failure {
            Some(reason) => Err(ctx.query_failed(format!("beam trace: {reason}"))),
            None => Ok(()),
        }
    }

    fn handle(&mut self, message: &Message, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        if let Payload::Action {
            action: ActionKind::Press,
            ..
        } = message.payload
        {
            self.armed = !self.armed;
            self.publish_flags(ctx)?;
        }
        Ok(())
    }

    fn reconcile(&mut self, changes: &ChangeSet, ctx: &mut ReconcileContext<'_>) {
        if changes.rose(&TRIPPED) {
            ctx.play_effect("laser_trip");
        }
    }

    fn reset_to_initial_state(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        self.cancel_timers();
        self.tripped = false;
        self.armed = self.initial.get().copied().unwrap_or(true);
        self.publish_flags(ctx)
    }

    fn cancel_timers(&mut self) {
        self.cooldown.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviors::bench::Bench;
    use crate::ids::ActorId;
    use crate::replication::Value;
    use crate::services::ActorRole;
    use crate::sim::PLAYER_BODY_HEIGHT;

    const ALARM: EntityId = EntityId(2);

    fn trips(bench: &mut Bench) -> usize {
        bench
            .sent()
            .iter()
            .filter(|m| m.payload == Payload::TriggerAlarm)
            .count()
    }

    /// Beam along +x that a mirror at x=5 folds back toward +z.
    fn folded(bench: &mut Bench) -> LaserTrap {
        bench.world.physics.add_mirror(
            Vec3::new(5.0, 0.0, 0.0),
            Vec3::new(-1.0, 0.0, 1.0).normalize(),
        );
        let mut laser = LaserTrap::new(Vec3::new(0.0, PLAYER_BODY_HEIGHT, 0.0), Vec3::new(1.0, 0.0, 0.0))
            .linked_to(ALARM);
        laser.set_initial_state();
        laser.spawn(&mut bench.ctx()).unwrap();
        laser
    }

    #[test]
    fn test_reflected_beam_trips_alarm_with_cooldown() {
        let mut bench = Bench::new();
        let mut laser = folded(&mut bench);
        bench
            .world
            .actors
            .set(ActorId(1), Vec3::new(5.0, 0.0, 4.0), ActorRole::Player);

        bench.advance();
        laser.step(&mut bench.ctx()).unwrap();
        assert_eq!(bench.read(&BOUNCES), Some(Value::Int(1)));
        assert_eq!(bench.read(&TRIPPED), Some(Value::Bool(true)));
        assert_eq!(trips(&mut bench), 1);

        for _ in 0..10 {
            bench.advance();
            laser.step(&mut bench.ctx()).unwrap();
        }
        assert_eq!(trips(&mut bench), 0);
    }

    #[test]
    fn test_blocked_beam_trips_again_after_cooldown() {
        let mut bench = Bench::new();
        let mut laser = folded(&mut bench);
        bench
            .world
            .actors
            .set(ActorId(1), Vec3::new(5.0, 0.0, 4.0), ActorRole::Player);

        bench.advance();
        laser.step(&mut bench.ctx()).unwrap();
        assert_eq!(trips(&mut bench), 1);

        let cooldown = bench.clock.secs_to_ticks(bench.config.laser.retrigger_secs);
        for _ in 1..cooldown {
            bench.advance();
            laser.step(&mut bench.ctx()).unwrap();
            assert_eq!(bench.read(&TRIPPED), Some(Value::Bool(true)));
        }

        // The player never moved, yet the flag drops for one tick.
        bench.advance();
        laser.step(&mut bench.ctx()).unwrap();
        assert_eq!(bench.read(&TRIPPED), Some(Value::Bool(false)));
        assert_eq!(trips(&mut bench), 0);

        bench.advance();
        laser.step(&mut bench.ctx()).unwrap();
        assert_eq!(bench.read(&TRIPPED), Some(Value::Bool(true)));
        assert_eq!(trips(&mut bench), 1);
    }

    #[test]
    fn test_failed_beam_query_reports_and_stays_quiet() {
        let mut bench = Bench::new();
        let mut laser = folded(&mut bench);
        bench
            .world
            .actors
            .set(ActorId(1), Vec3::new(5.0, 0.0, 4.0), ActorRole::Player);
        bench.world.physics.set_failing(true);

        bench.advance();
        assert!(matches!(
            laser.step(&mut bench.ctx()),
            Err(BehaviorError::QueryFailure { .. })
        ));
        assert_eq!(trips(&mut bench), 0);
        assert_eq!(bench.read(&TRIPPED), Some(Value::Bool(false)));

        bench.world.physics.set_failing(false);
        bench.advance();
        laser.step(&mut bench.ctx()).unwrap();
        assert_eq!(trips(&mut bench), 1);
    }

    #[test]
    fn test_reflection_bound_is_configurable() {
        let mut bench = Bench::new();
        bench.config.laser.max_reflections = 0;
        let mut laser = folded(&mut bench);
        bench
            .world
            .actors
            .set(ActorId(1), Vec3::new(5.0, 0.0, 4.0), ActorRole::Player);

        bench.advance();
        laser.step(&mut bench.ctx()).unwrap();
        assert_eq!(bench.read(&BOUNCES), Some(Value::Int(0)));
        assert_eq!(trips(&mut bench), 0);
    }

    #[test]
    fn test_unlinked_laser_reports_missing_alarm() {
        let mut bench = Bench::new();
        let mut laser = LaserTrap::new(Vec3::new(0.0, PLAYER_BODY_HEIGHT, 0.0), Vec3::FORWARD);
        laser.set_initial_state();
        laser.spawn(&mut bench.ctx()).unwrap();
        bench
            .world
            .actors
            .set(ActorId(1), Vec3::new(0.0, 0.0, 3.0), ActorRole::Player);
        bench.advance();
        assert!(matches!(
            laser.step(&mut bench.ctx()),
            Err(BehaviorError::MissingReference { what: "linked alarm", .. })
        ));
    }
}
