//! Full-session gameplay scenarios: guards, locks, lasers and level flow, as
//! seen from the authority and from observers.

mod common;

use common::Session;
use heist_core::behaviors::alarm::RINGING;
use heist_core::behaviors::button::PRESS_COUNT;
use heist_core::behaviors::laser::TRIPPED;
use heist_core::lifecycle::{ACTIVE_GROUP, TRANSITIONING};
use heist_core::prelude::*;
use heist_logic::zone::BoundaryPolicy;

// ── Helpers ────────────────────────────────────────────────────────────

const LEVEL_ONE: GroupId = GroupId(1);
const LEVEL_TWO: GroupId = GroupId(2);

fn flag(node: &Node, entity: EntityId, key: &PropKey) -> Option<bool> {
    node.read(entity, key).and_then(Value::as_bool)
}

/// Run `ticks` steps, collecting each distinct state name the first observer
/// sees for `entity`.
fn observed_states(s: &mut Session, entity: EntityId, ticks: u64) -> Vec<String> {
    let mut states: Vec<String> = Vec::new();
    for _ in 0..ticks {
        s.tick();
        if let Some(state) = s.observer(0).state_of(entity) {
            if states.last().map(String::as_str) != Some(state) {
                states.push(state.to_string());
            }
        }
    }
    states
}

struct Levels {
    exit_door: EntityId,
    button: EntityId,
    manager: EntityId,
}

/// Two levels. Level one's zone is centred on (10, 0, 0) with radius 2 and
/// its exit door opens on completion; level two holds a button.
fn two_levels(s: &mut Session) -> Levels {
    let exit_door = s
        .sim
        .spawn(Some(LEVEL_ONE), Door::new(Vec3::new(12.0, 0.0, 0.0)))
        .unwrap();
    let button = s
        .sim
        .spawn(Some(LEVEL_TWO), Button::new(Vec3::new(30.0, 0.0, 0.0)))
        .unwrap();
    let manager = s
        .sim
        .spawn(
            None,
            LevelManager::new(vec![
                LevelPlan {
                    group: LEVEL_ONE,
                    zone: Zone::new(Vec3::new(10.0, 0.0, 0.0), 2.0),
                    exit_door: Some(exit_door),
                },
                LevelPlan {
                    group: LEVEL_TWO,
                    zone: Zone::new(Vec3::new(30.0, 0.0, 0.0), 2.0),
                    exit_door: None,
                },
            ]),
        )
        .unwrap();
    Levels {
        exit_door,
        button,
        manager,
    }
}

// ── Guard ──────────────────────────────────────────────────────────────

#[test]
fn guard_answers_alarm_then_returns_to_patrol() {
    let mut s = Session::new(SimConfig::default(), &[0]);
    let booth = s.sim.spawn(None, AlarmBooth::new(Vec3::new(0.0, 0.0, 20.0))).unwrap();
    let guard = s
        .sim
        .spawn(
            None,
            Guard::new(Vec3::ZERO, vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)]),
        )
        .unwrap();
    s.tick();

    s.observer(0).request_action(booth, ActionKind::Trigger, ActorId(1));
    let states = observed_states(&mut s, guard, 1_500);
    assert_eq!(
        states,
        vec!["patrol", "run_to_alarm", "rest", "return", "patrol"]
    );
    // The guard silenced the booth on leaving it.
    assert_eq!(flag(s.observer(0), booth, &RINGING), Some(false));
    assert_eq!(s.observer_effects(0).count("alarm_siren"), 1);
    assert_eq!(s.observer_effects(0).count("alarm_silenced"), 1);
}

#[test]
fn guard_spots_player_only_after_continuous_sight() {
    let mut s = Session::new(SimConfig::default(), &[0]);
    let guard = s
        .sim
        .spawn(None, Guard::new(Vec3::ZERO, vec![Vec3::ZERO]))
        .unwrap();
    s.place_player(1, Vec3::new(0.0, 0.0, 5.0));

    // 0.8 s in view, then a pillar blocks the line of sight.
    s.run(40);
    s.world
        .physics
        .add_pillar(Vec3::new(0.0, 1.7, 2.5), 0.5);
    s.run(20);
    assert_eq!(s.observer(0).state_of(guard), Some("patrol"));

    // Accumulation starts over once the pillar is gone.
    s.world.physics.clear();
    s.run(45);
    assert_eq!(s.observer(0).state_of(guard), Some("patrol"));
    s.run(10);
    assert_eq!(s.observer(0).state_of(guard), Some("alert"));
    assert_eq!(s.observer_effects(0).count("guard_alert"), 1);
}

#[test]
fn laser_trip_sends_guard_to_alarm() {
    let mut s = Session::new(SimConfig::default(), &[0]);
    let booth = s.sim.spawn(None, AlarmBooth::new(Vec3::new(20.0, 0.0, 0.0))).unwrap();
    let laser = s
        .sim
        .spawn(
            None,
            LaserTrap::new(Vec3::new(0.0, 1.0, 0.0), Vec3::new(1.0, 0.0, 0.0)).linked_to(booth),
        )
        .unwrap();
    let guard = s
        .sim
        .spawn(
            None,
            Guard::new(Vec3::new(0.0, 0.0, -10.0), vec![Vec3::new(0.0, 0.0, -10.0)])
                .facing(Vec3::new(0.0, 0.0, -1.0)),
        )
        .unwrap();
    s.place_player(1, Vec3::new(5.0, 0.0, 0.0));

    s.tick();
    assert_eq!(flag(s.observer(0), laser, &TRIPPED), Some(true));
    s.world.actors.remove(ActorId(1));

    s.run(2);
    assert_eq!(flag(s.observer(0), booth, &RINGING), Some(true));
    assert_eq!(s.observer(0).state_of(guard), Some("run_to_alarm"));
    assert_eq!(s.observer_effects(0).count("laser_trip"), 1);
}

// ── Lock ───────────────────────────────────────────────────────────────

#[test]
fn lock_opens_door_on_last_turn() {
    let mut s = Session::new(SimConfig::default(), &[0, 2]);
    let door = s.sim.spawn(None, Door::new(Vec3::new(1.0, 0.0, 0.0))).unwrap();
    let lock = s
        .sim
        .spawn(None, CombinationLock::new(Vec3::ZERO, vec![1, 2, 3, 4]).opens(door))
        .unwrap();
    s.tick();

    let turns: Vec<u8> = [(0u8, 1), (1, 2), (2, 3), (3, 4)]
        .into_iter()
        .flat_map(|(index, n)| std::iter::repeat(index).take(n))
        .collect();
    let (last, rest) = turns.split_last().unwrap();
    for index in rest {
        s.observer(0)
            .request_action(lock, ActionKind::AdjustDigit { index: *index, up: true }, ActorId(1));
    }
    s.tick();
    assert_eq!(s.sim.authority().state_of(lock), Some("locked"));

    s.observer(1)
        .request_action(lock, ActionKind::AdjustDigit { index: *last, up: true }, ActorId(2));
    s.run(5);
    for index in 0..2 {
        let node = s.observer(index);
        assert_eq!(node.state_of(lock), Some("solved"));
        assert_eq!(flag(node, door, &keys::OPEN), Some(true));
        assert_eq!(s.observer_effects(index).count("lock_solved"), 1);
        assert_eq!(s.observer_effects(index).count("lock_open"), 1);
    }
}

// ── Level lifecycle ────────────────────────────────────────────────────

#[test]
fn level_completes_with_player_on_boundary() {
    let mut s = Session::new(SimConfig::default(), &[0]);
    let levels = two_levels(&mut s);
    s.tick();
    assert!(s.observer(0).active_groups().contains(&LEVEL_ONE));

    s.place_player(1, Vec3::new(12.0, 0.0, 0.0));
    s.place_player(2, Vec3::new(10.0, 0.0, 0.0));
    s.run(2);
    assert_eq!(flag(s.observer(0), levels.manager, &TRANSITIONING), Some(true));
    assert_eq!(flag(s.observer(0), levels.exit_door, &keys::OPEN), Some(true));
    assert_eq!(s.observer_effects(0).count("exit_open"), 1);

    let delay = s.sim.clock().secs_to_ticks(s.sim.config().level.exit_delay_secs);
    s.run(delay + 2);
    for node in [s.sim.authority(), s.observer(0)] {
        assert!(!node.active_groups().contains(&LEVEL_ONE));
        assert!(node.active_groups().contains(&LEVEL_TWO));
    }
    assert_eq!(flag(s.observer(0), levels.manager, &TRANSITIONING), Some(false));
    assert_eq!(
        s.observer(0).read(levels.manager, &ACTIVE_GROUP),
        Some(&Value::Int(2))
    );

    // Level one's entities no longer take requests; level two's do.
    s.observer(0)
        .request_action(levels.exit_door, ActionKind::Press, ActorId(1));
    s.observer(0)
        .request_action(levels.button, ActionKind::Press, ActorId(1));
    s.tick();
    assert_eq!(flag(s.observer(0), levels.exit_door, &keys::OPEN), Some(true));
    assert_eq!(
        s.observer(0).read(levels.button, &PRESS_COUNT),
        Some(&Value::Int(1))
    );
}

#[test]
fn exclusive_boundary_leaves_level_running() {
    let mut config = SimConfig::default();
    config.level.zone_boundary = BoundaryPolicy::Exclusive;
    let mut s = Session::new(config, &[0]);
    let levels = two_levels(&mut s);
    s.place_player(1, Vec3::new(12.0, 0.0, 0.0));
    s.place_player(2, Vec3::new(10.0, 0.0, 0.0));
    s.run(10);
    assert_eq!(flag(s.observer(0), levels.manager, &TRANSITIONING), Some(false));
    assert_eq!(s.observer(0).state_of(levels.manager), Some("playing"));
}

#[test]
fn restart_mid_transition_cancels_the_switch() {
    let mut s = Session::new(SimConfig::default(), &[0]);
    let levels = two_levels(&mut s);
    s.tick();
    s.place_player(1, Vec3::new(10.0, 0.0, 0.0));
    s.run(10);
    assert_eq!(flag(s.observer(0), levels.exit_door, &keys::OPEN), Some(true));
    assert_eq!(flag(s.observer(0), levels.manager, &TRANSITIONING), Some(true));

    s.place_player(1, Vec3::ZERO);
    s.observer(0)
        .request_action(levels.manager, ActionKind::Restart, ActorId(1));
    let delay = s.sim.clock().secs_to_ticks(s.sim.config().level.exit_delay_secs);
    s.run(delay * 2);

    let node = s.observer(0);
    assert_eq!(node.state_of(levels.manager), Some("playing"));
    assert_eq!(flag(node, levels.manager, &TRANSITIONING), Some(false));
    assert_eq!(flag(node, levels.exit_door, &keys::OPEN), Some(false));
    assert!(node.active_groups().contains(&LEVEL_ONE));
    assert!(!node.active_groups().contains(&LEVEL_TWO));
}

#[test]
fn resetting_a_group_twice_matches_once() {
    let mut s = Session::new(SimConfig::default(), &[0]);
    let levels = two_levels(&mut s);
    let guard = s
        .sim
        .spawn(
            Some(LEVEL_ONE),
            Guard::new(Vec3::ZERO, vec![Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0)]),
        )
        .unwrap();
    s.tick();
    s.sim
        .authority()
        .request_action(levels.exit_door, ActionKind::Press, ActorId(1));
    s.run(30);

    let reset = |s: &mut Session| {
        s.sim
            .authority()
            .send(RoleFilter::ALL, Target::Node, Payload::ResetGroup { group: LEVEL_ONE });
        s.run(2);
    };
    let group_values = |s: &Session| {
        [levels.exit_door, guard]
            .map(|e| s.observer(0).store().entity_values(e).cloned())
    };

    reset(&mut s);
    let once = group_values(&s);
    reset(&mut s);
    assert_eq!(group_values(&s), once);
    assert_eq!(flag(s.observer(0), levels.exit_door, &keys::OPEN), Some(false));
}
