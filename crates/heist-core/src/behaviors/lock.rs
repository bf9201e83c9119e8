//! Combination lock. Each dial turns by one with wrap-around; the lock is
//! solved the moment every dial matches the code, and stays solved.

use heist_logic::combination::{is_solved, spin, DIAL_SIZE};
use heist_logic::geometry::Vec3;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Behavior, InitialState, ReconcileContext, StepContext};
use crate::channel::{ActionKind, Message, Payload, Target};
use crate::error::BehaviorError;
use crate::ids::{EntityId, EntityKind};
use crate::replication::{keys, ChangeSet, PropKey};

pub const DIGITS: PropKey = PropKey::new("digits");

#[derive(Debug, Clone)]
pub struct CombinationLock {
    position: Vec3,
    code: Vec<u8>,
    digits: Vec<u8>,
    solved: bool,
    door: Option<EntityId>,
    initial: InitialState<Vec<u8>>,
}

impl CombinationLock {
    /// A lock with every dial at zero.
    pub fn new(position: Vec3, code: Vec<u8>) -> Self {
        let code: Vec<u8> = code.into_iter().map(|d| d % DIAL_SIZE).collect();
        Self {
            position,
            digits: vec![0; code.len()],
            code,
            solved: false,
            door: None,
            initial: InitialState::new(),
        }
    }

    /// A lock with a seeded random code that is never the starting position.
    pub fn with_random_code(position: Vec3, len: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let len = len.max(1);
        let mut code: Vec<u8> = (0..len).map(|_| rng.gen_range(0..DIAL_SIZE)).collect();
        if code.iter().all(|d| *d == 0) {
            code[0] = rng.gen_range(1..DIAL_SIZE);
        }
        Self::new(position, code)
    }

    pub fn opens(mut self, door: EntityId) -> Self {
        self.door = Some(door);
        self
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn is_solved(&self) -> bool {
        self.solved
    }

    fn publish(&self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        ctx.write(DIGITS, self.digits.clone())?;
        ctx.write(keys::SOLVED, self.solved)?;
        ctx.write(keys::STATE, if self.solved { "solved" } else { "locked" })?;
        Ok(())
    }

    fn adjust(&mut self, index: u8, up: bool, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        if self.solved {
            debug!("{} ignoring dial turn, already solved", ctx.entity);
            return Ok(());
        }
        let Some(digit) = self.digits.get_mut(usize::from(index)) else {
            return ctx.feedback("invalid_dial");
        };
        *digit = spin(*digit, up, DIAL_SIZE);

        if is_solved(&self.digits, &self.code) {
            self.solved = true;
            ctx.broadcast(Payload::PlayEffect {
                name: "lock_solved".into(),
                at: self.position,
            });
            if let Some(door) = self.door {
                ctx.request(Target::Entity(door), Payload::OpenDoor);
            }
        }
        self.publish(ctx)
    }
}

impl Behavior for CombinationLock {
    fn kind(&self) -> EntityKind {
        EntityKind::CombinationLock
    }

    fn set_initial_state(&mut self) {
        self.initial.capture(self.digits.clone());
    }

    fn spawn(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        ctx.write(keys::POSITION, self.position)?;
        self.publish(ctx)
    }

    fn step(&mut self, _ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        Ok(())
    }

    fn handle(&mut self, message: &Message, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        match message.payload {
            Payload::Action {
                action: ActionKind::AdjustDigit { index, up },
                ..
            } => self.adjust(index, up, ctx),
            _ => Ok(()),
        }
    }

    fn reconcile(&mut self, changes: &ChangeSet, ctx: &mut ReconcileContext<'_>) {
        ctx.reconcile_feedback(changes);
        if changes.get(&DIGITS).is_some_and(|c| c.previous.is_some()) {
            ctx.play_effect("dial_click");
        }
        if changes.rose(&keys::SOLVED) {
            ctx.play_effect("lock_open");
        }
    }

    fn reset_to_initial_state(&mut self, ctx: &mut StepContext<'_>) -> Result<(), BehaviorError> {
        if let Some(digits) = self.initial.get() {
            self.digits = digits.clone();
        }
        self.solved = false;
        self.publish(ctx)
    }

    fn cancel_timers(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviors::bench::Bench;
    use crate::replication::Value;

    fn turn(bench: &mut Bench, lock: &mut CombinationLock, index: u8, up: bool) {
        let msg = Message::new(
            bench.node(),
            None,
            Target::Entity(bench.entity),
            Payload::Action {
                action: ActionKind::AdjustDigit { index, up },
                actor: crate::ids::ActorId(1),
            },
        );
        lock.handle(&msg, &mut bench.ctx()).unwrap();
    }

    fn solved_broadcasts(bench: &mut Bench) -> usize {
        bench
            .sent()
            .iter()
            .filter(|m| matches!(&m.payload, Payload::PlayEffect { name, .. } if name == "lock_solved"))
            .count()
    }

    #[test]
    fn test_solved_exactly_on_last_matching_turn() {
        let mut bench = Bench::new();
        let mut lock = CombinationLock::new(Vec3::ZERO, vec![1, 2, 3, 4]);
        lock.set_initial_state();
        lock.spawn(&mut bench.ctx()).unwrap();

        let plan: Vec<(u8, bool)> = [(0u8, 1usize), (1, 2), (2, 3), (3, 4)]
            .iter()
            .flat_map(|&(i, n)| std::iter::repeat((i, true)).take(n))
            .collect();
        let (last, rest) = plan.split_last().unwrap();
        for &(i, up) in rest {
            turn(&mut bench, &mut lock, i, up);
            assert!(!lock.is_solved());
        }
        turn(&mut bench, &mut lock, last.0, last.1);
        assert!(lock.is_solved());
        assert_eq!(bench.read(&keys::SOLVED), Some(Value::Bool(true)));
        assert_eq!(solved_broadcasts(&mut bench), 1);

        // Further turns change nothing and never re-announce.
        turn(&mut bench, &mut lock, 0, true);
        turn(&mut bench, &mut lock, 3, false);
        assert_eq!(bench.read(&DIGITS), Some(Value::Digits(vec![1, 2, 3, 4])));
        assert_eq!(solved_broadcasts(&mut bench), 0);
    }

    #[test]
    fn test_wraparound_reaches_code() {
        let mut bench = Bench::new();
        let mut lock = CombinationLock::new(Vec3::ZERO, vec![9]);
        lock.set_initial_state();
        lock.spawn(&mut bench.ctx()).unwrap();
        turn(&mut bench, &mut lock, 0, false);
        assert!(lock.is_solved());
    }

    #[test]
    fn test_bad_dial_is_feedback() {
        let mut bench = Bench::new();
        let mut lock = CombinationLock::new(Vec3::ZERO, vec![1]);
        lock.set_initial_state();
        lock.spawn(&mut bench.ctx()).unwrap();
        turn(&mut bench, &mut lock, 5, true);
        assert_eq!(bench.read(&keys::FEEDBACK), Some(Value::Text("invalid_dial".into())));
    }

    #[test]
    fn test_reset_twice_matches_once() {
        let mut bench = Bench::new();
        let mut lock = CombinationLock::new(Vec3::ZERO, vec![1]);
        lock.set_initial_state();
        lock.spawn(&mut bench.ctx()).unwrap();
        turn(&mut bench, &mut lock, 0, true);

        lock.reset_to_initial_state(&mut bench.ctx()).unwrap();
        let once = bench.store.entity_values(bench.entity).cloned();
        lock.reset_to_initial_state(&mut bench.ctx()).unwrap();
        assert_eq!(bench.store.entity_values(bench.entity).cloned(), once);
        assert!(!lock.is_solved());
    }

    #[test]
    fn test_random_code_is_seeded() {
        let a = CombinationLock::with_random_code(Vec3::ZERO, 4, 7);
        let b = CombinationLock::with_random_code(Vec3::ZERO, 4, 7);
        assert_eq!(a.code(), b.code());
        assert_eq!(a.code().len(), 4);
        assert!(a.code().iter().any(|d| *d != 0));
    }
}
