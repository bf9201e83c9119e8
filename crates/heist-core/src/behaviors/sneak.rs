//! Sneak zone: a patch of floor that trips an alarm when a player moves across
//! it too fast.

use std::collections::BTreeMap;

use heist_logic::geometry::Vec3;
use heist_logic::zone::Zone;

use super::{Behavior, InitialState, ReconcileContext, StepContext};
use crate::channel::{Payload, Target};
use crate::error::BehaviorError;
use crate::ids::{ActorId, EntityId, EntityKind};
use crate::replication::{keys, ChangeSet, PropKey};
use crate::timer::Timer;

pub const OCCUPANTS: PropKey = PropKey::new("occupants");
pub const NOISY: PropKey = PropKey::new("noisy");

#[derive(Debug, Clone)]
pub struct SneakZone {
    zone: Zone,
    alarm: Option<EntityId>,
    /// Position of each player inside the zone on the previous tick.
    last_seen: BTreeMap<ActorId, Vec3>,
    noisy: bool,
    cooldown: Timer,
    initial: InitialState<()>,
}

impl SneakZone {
    pub fn new(zone: Zone) -> Self {
        Self {
            zone,
            alarm: None,
            last_seen: BTreeMap::new(),
            noisy: false,
            cooldown: Timer::new(),
            initial: InitialState::new(),
        }
    }

    pub fn linked_to(mut self, alarm: EntityId) -> Self {
        self.alarm = Some(alarm);
        self
    }

    fn publish(&self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        ctx.write(OCCUPANTS, self.last_seen.len() as i64)?;
        ctx.write(NOISY, self.noisy)?;
        Ok(())
    }
}

impl Behavior for SneakZone {
    fn kind(&self) -> EntityKind {
        EntityKind::SneakZone
    }

    fn set_initial_state(&mut self) {
        self.initial.capture(());
    }

    fn spawn(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        ctx.write(keys::POSITION, self.zone.center)?;
        self.publish(ctx)
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        if self.cooldown.take_expired(ctx.now()) {
            self.noisy = false;
        }

        let dt = ctx.dt();
        let limit = ctx.config.sneak.speed_limit;
        let policy = ctx.config.level.zone_boundary;
        let inside: BTreeMap<ActorId, Vec3> = ctx
            .services
            .players()
            .into_iter()
            .filter(|p| self.zone.contains(p.position, policy))
            .map(|p| (p.id, p.position))
            .collect();

        let too_fast = inside.iter().any(|(id, now)| {
            self.last_seen
                .get(id)
                .is_some_and(|before| before.distance(now) / dt > limit)
        });
        self.last_seen = inside;

        let mut result = Ok(());
        if too_fast && !self.cooldown.is_armed() {
            match self.alarm {
                Some(alarm) => {
                    ctx.request(Target::Entity(alarm), Payload::TriggerAlarm);
                    self.noisy = true;
                    ctx.arm(&mut self.cooldown, ctx.config.sneak.cooldown_secs);
                }
                None => result = Err(ctx.missing("linked alarm")),
            }
        }
        self.publish(ctx)?;
        result
    }

    fn reconcile(&mut self, changes: &ChangeSet, ctx: &mut ReconcileContext<'_>) {
        if changes.rose(&NOISY) {
            ctx.play_effect("floor_creak");
        }
    }

    fn reset_to_initial_state(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        self.cancel_timers();
        self.noisy = false;
        self.last_seen.clear();
        self.publish(ctx)
    }

    fn cancel_timers(&mut self) {
        self.cooldown.clear();
    }
}
