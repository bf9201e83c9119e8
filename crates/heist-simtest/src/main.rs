//! Heist Headless Session Harness
//!
//! Runs scripted heists against an in-process authority and two observers
//! and checks what each node ends up seeing. No engine, no networking, no
//! rendering.
//!
//! Usage:
//!   cargo run -p heist-simtest
//!   cargo run -p heist-simtest -- --verbose

use std::sync::Arc;

use heist_core::behaviors::alarm::RINGING;
use heist_core::behaviors::laser::TRIPPED;
use heist_core::lifecycle::TRANSITIONING;
use heist_core::prelude::*;
use heist_core::sim::{RecordingEffects, SimWorld};
use heist_logic::zone::BoundaryPolicy;

// ── Session config (shipped alongside the harness) ──────────────────────
const SESSION_JSON: &str = include_str!("../data/session.json");

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(results: &mut Vec<TestResult>, name: &str, passed: bool, detail: String) {
    results.push(TestResult {
        name: name.into(),
        passed,
        detail,
    });
}

/// Authority plus two observers, one on a clean link and one 3 ticks behind.
struct Heist {
    world: SimWorld,
    sim: Simulation,
    observers: Vec<(NodeId, Arc<RecordingEffects>)>,
}

impl Heist {
    fn new(config: SimConfig) -> Result<Self, SimulationError> {
        let world = SimWorld::new();
        let (services, _) = world.services();
        let mut sim = Simulation::new(config, services);
        let mut observers = Vec::new();
        for delay in [0, 3] {
            let (services, effects) = world.services();
            observers.push((sim.add_observer(services, delay)?, effects));
        }
        Ok(Self {
            world,
            sim,
            observers,
        })
    }

    fn observer(&self, index: usize) -> Result<&Node, SimulationError> {
        self.sim.node(self.observers[index].0)
    }

    fn effects(&self, index: usize) -> &RecordingEffects {
        &self.observers[index].1
    }

    fn flag(&self, index: usize, entity: EntityId, key: &PropKey) -> Result<Option<bool>, SimulationError> {
        Ok(self.observer(index)?.read(entity, key).and_then(Value::as_bool))
    }

    /// Every node holds exactly the authority's values for `entity`.
    fn converged(&self, entity: EntityId) -> bool {
        let expected = self.sim.authority().store().entity_values(entity);
        self.sim
            .observers()
            .all(|node| node.store().entity_values(entity) == expected)
    }
}

fn section(
    title: &str,
    verbose: bool,
    f: impl FnOnce(&mut Vec<TestResult>) -> Result<(), SimulationError>,
) -> Vec<TestResult> {
    println!("--- {} ---", title);
    let mut results = Vec::new();
    if let Err(e) = f(&mut results) {
        results.push(TestResult {
            name: format!("{}_setup", title.to_lowercase().replace(' ', "_")),
            passed: false,
            detail: format!("session error: {}", e),
        });
    }
    if verbose {
        let passed = results.iter().filter(|r| r.passed).count();
        println!("    {}/{} checks passed", passed, results.len());
    }
    results
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    println!("=== Heist Session Harness ===\n");

    let config = match SimConfig::from_json_str(SESSION_JSON) {
        Ok(c) => c,
        Err(e) => {
            println!("  ✗ session_config: {}", e);
            std::process::exit(1);
        }
    };

    let mut results = Vec::new();

    // 1. Session config
    results.extend(validate_config(&config, verbose));

    // 2. Guard answering an alarm
    results.extend(validate_guard_alarm(&config, verbose));

    // 3. Guard vision
    results.extend(validate_guard_vision(&config, verbose));

    // 4. Combination lock across nodes
    results.extend(validate_lock(&config, verbose));

    // 5. Laser trip and guard response
    results.extend(validate_laser(&config, verbose));

    // 6. Level completion and restart
    results.extend(validate_levels(&config, verbose));

    // 7. Late join
    results.extend(validate_late_join(&config, verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Session Config ───────────────────────────────────────────────────

fn validate_config(config: &SimConfig, verbose: bool) -> Vec<TestResult> {
    section("Session Config", verbose, |results| {
        check(
            results,
            "config_valid",
            config.validate().is_ok(),
            format!("{} ticks/s, seed {}", config.tick_rate, config.seed),
        );

        let clock = heist_core::timer::Clock::new(config.tick_rate);
        let sight = clock.secs_to_ticks(config.guard.sight_threshold_secs);
        check(
            results,
            "config_sight_threshold_ticks",
            sight >= 1,
            format!("{} s of sight = {} ticks", config.guard.sight_threshold_secs, sight),
        );

        let mut broken = config.clone();
        broken.guard.rest_secs = -1.0;
        check(
            results,
            "config_rejects_negative_duration",
            broken.validate().is_err(),
            "negative rest_secs rejected".into(),
        );
        Ok(())
    })
}

// ── 2. Guard Alarm ──────────────────────────────────────────────────────

fn validate_guard_alarm(config: &SimConfig, verbose: bool) -> Vec<TestResult> {
    section("Guard Alarm", verbose, |results| {
        let mut h = Heist::new(config.clone())?;
        let booth = h
            .sim
            .spawn(None, AlarmBooth::new(Vec3::new(0.0, 0.0, 20.0)))?;
        let guard = h.sim.spawn(
            None,
            Guard::new(Vec3::ZERO, vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)]),
        )?;
        h.sim.tick()?;

        h.observer(0)?
            .request_action(booth, ActionKind::Trigger, ActorId(1));
        let mut seen: Vec<String> = Vec::new();
        for _ in 0..1_500 {
            h.sim.tick()?;
            if let Some(state) = h.observer(1)?.state_of(guard) {
                if seen.last().map(String::as_str) != Some(state) {
                    seen.push(state.to_string());
                }
            }
        }

        let expected = ["patrol", "run_to_alarm", "rest", "return", "patrol"];
        check(
            results,
            "guard_alarm_sequence",
            seen == expected,
            seen.join(" → "),
        );
        check(
            results,
            "guard_alarm_silenced",
            h.flag(1, booth, &RINGING)? == Some(false),
            "booth reset after rest".into(),
        );
        let sirens = h.effects(1).count("alarm_siren");
        check(
            results,
            "guard_alarm_siren_once",
            sirens == 1,
            format!("siren played {} time(s) on the slow observer", sirens),
        );
        Ok(())
    })
}

// ── 3. Guard Vision ─────────────────────────────────────────────────────

fn validate_guard_vision(config: &SimConfig, verbose: bool) -> Vec<TestResult> {
    section("Guard Vision", verbose, |results| {
        let mut h = Heist::new(config.clone())?;
        let guard = h.sim.spawn(None, Guard::new(Vec3::ZERO, vec![Vec3::ZERO]))?;
        let threshold = h
            .sim
            .clock()
            .secs_to_ticks(config.guard.sight_threshold_secs);

        // Behind the guard: never seen.
        h.world
            .actors
            .set(ActorId(1), Vec3::new(0.0, 0.0, -5.0), ActorRole::Player);
        h.sim.run(threshold * 2)?;
        check(
            results,
            "vision_ignores_player_behind",
            h.observer(0)?.state_of(guard) == Some("patrol"),
            format!("state {:?}", h.observer(0)?.state_of(guard)),
        );

        // In front but behind a pillar: never seen.
        h.world.physics.add_pillar(Vec3::new(0.0, 1.7, 2.5), 0.5);
        h.world.actors.move_to(ActorId(1), Vec3::new(0.0, 0.0, 5.0));
        h.sim.run(threshold * 2)?;
        check(
            results,
            "vision_blocked_by_pillar",
            h.observer(0)?.state_of(guard) == Some("patrol"),
            format!("state {:?}", h.observer(0)?.state_of(guard)),
        );

        // Clear line of sight: spotted once the threshold is reached.
        h.world.physics.clear();
        h.sim.run(threshold + 5)?;
        let state = h.observer(0)?.state_of(guard);
        check(
            results,
            "vision_spots_after_threshold",
            state == Some("alert"),
            format!("state {:?} after {} ticks in view", state, threshold + 5),
        );
        check(
            results,
            "vision_alert_effect_once",
            h.effects(0).count("guard_alert") == 1,
            format!("{} alert effect(s)", h.effects(0).count("guard_alert")),
        );
        Ok(())
    })
}

// ── 4. Combination Lock ─────────────────────────────────────────────────

fn validate_lock(config: &SimConfig, verbose: bool) -> Vec<TestResult> {
    section("Combination Lock", verbose, |results| {
        let mut h = Heist::new(config.clone())?;
        let door = h.sim.spawn(None, Door::new(Vec3::new(1.0, 0.0, 0.0)))?;
        let lock = h
            .sim
            .spawn(None, CombinationLock::new(Vec3::ZERO, vec![2, 1]).opens(door))?;
        h.sim.tick()?;

        // Both observers turn digits; the authority applies them in order.
        for _ in 0..2 {
            h.observer(0)?.request_action(
                lock,
                ActionKind::AdjustDigit { index: 0, up: true },
                ActorId(1),
            );
        }
        h.sim.tick()?;
        check(
            results,
            "lock_partial_stays_locked",
            h.sim.authority().state_of(lock) == Some("locked"),
            "first digit set, second not".into(),
        );

        h.observer(1)?.request_action(
            lock,
            ActionKind::AdjustDigit { index: 1, up: true },
            ActorId(2),
        );
        h.sim.run(6)?;
        for index in 0..2 {
            let node = h.observer(index)?;
            check(
                results,
                &format!("lock_solved_on_observer_{}", index),
                node.state_of(lock) == Some("solved")
                    && h.flag(index, door, &keys::OPEN)? == Some(true),
                format!(
                    "lock {:?}, door open {:?}",
                    node.state_of(lock),
                    h.flag(index, door, &keys::OPEN)?
                ),
            );
        }
        check(
            results,
            "lock_converged",
            h.converged(lock) && h.converged(door),
            "every node matches the authority".into(),
        );
        Ok(())
    })
}

// ── 5. Laser Trap ───────────────────────────────────────────────────────

fn validate_laser(config: &SimConfig, verbose: bool) -> Vec<TestResult> {
    section("Laser Trap", verbose, |results| {
        let mut h = Heist::new(config.clone())?;
        let booth = h
            .sim
            .spawn(None, AlarmBooth::new(Vec3::new(20.0, 0.0, 0.0)))?;
        // Beam folds off a mirror before crossing the corridor.
        h.world
            .physics
            .add_mirror(Vec3::new(6.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 1.0).normalize());
        let laser = h.sim.spawn(
            None,
            LaserTrap::new(Vec3::new(0.0, 1.0, 0.0), Vec3::new(1.0, 0.0, 0.0)).linked_to(booth),
        )?;
        let guard = h.sim.spawn(
            None,
            Guard::new(Vec3::new(0.0, 0.0, -10.0), vec![Vec3::new(0.0, 0.0, -10.0)])
                .facing(Vec3::new(0.0, 0.0, -1.0)),
        )?;
        h.sim.run(5)?;
        check(
            results,
            "laser_idle_without_players",
            h.flag(0, laser, &TRIPPED)? == Some(false),
            "no trip on an empty corridor".into(),
        );

        h.world
            .actors
            .set(ActorId(1), Vec3::new(6.0, 0.0, 4.0), ActorRole::Player);
        h.sim.run(3)?;
        h.world.actors.remove(ActorId(1));
        check(
            results,
            "laser_trips_on_reflected_beam",
            h.flag(0, laser, &TRIPPED)? == Some(true),
            "player crossed the folded beam".into(),
        );
        check(
            results,
            "laser_rings_booth",
            h.flag(0, booth, &RINGING)? == Some(true),
            "linked booth ringing".into(),
        );
        let state = h.observer(0)?.state_of(guard);
        check(
            results,
            "laser_guard_responds",
            state == Some("run_to_alarm"),
            format!("guard state {:?}", state),
        );
        Ok(())
    })
}

// ── 6. Level Lifecycle ──────────────────────────────────────────────────

fn validate_levels(config: &SimConfig, verbose: bool) -> Vec<TestResult> {
    section("Level Lifecycle", verbose, |results| {
        let level_one = GroupId(1);
        let level_two = GroupId(2);
        let mut h = Heist::new(config.clone())?;
        let exit = h
            .sim
            .spawn(Some(level_one), Door::new(Vec3::new(12.0, 0.0, 0.0)))?;
        let manager = h.sim.spawn(
            None,
            LevelManager::new(vec![
                LevelPlan {
                    group: level_one,
                    zone: Zone::new(Vec3::new(10.0, 0.0, 0.0), 2.0),
                    exit_door: Some(exit),
                },
                LevelPlan {
                    group: level_two,
                    zone: Zone::new(Vec3::new(30.0, 0.0, 0.0), 2.0),
                    exit_door: None,
                },
            ]),
        )?;
        h.sim.tick()?;

        // One player on the zone edge, one still outside.
        h.world
            .actors
            .set(ActorId(1), Vec3::new(12.0, 0.0, 0.0), ActorRole::Player);
        h.world
            .actors
            .set(ActorId(2), Vec3::new(0.0, 0.0, 0.0), ActorRole::Player);
        h.sim.run(5)?;
        check(
            results,
            "level_waits_for_all_players",
            h.flag(0, manager, &TRANSITIONING)? == Some(false),
            "one player outside".into(),
        );

        h.world.actors.move_to(ActorId(2), Vec3::new(10.0, 0.0, 0.0));
        h.sim.run(5)?;
        let on_edge = config.level.zone_boundary == BoundaryPolicy::Inclusive;
        check(
            results,
            "level_completes_on_boundary",
            h.flag(1, manager, &TRANSITIONING)? == Some(on_edge),
            format!("{:?} boundary", config.level.zone_boundary),
        );
        check(
            results,
            "level_exit_opened",
            h.flag(1, exit, &keys::OPEN)? == Some(on_edge),
            "exit door follows completion".into(),
        );

        // Restart before the switch lands.
        h.world.actors.move_to(ActorId(1), Vec3::ZERO);
        h.world.actors.move_to(ActorId(2), Vec3::ZERO);
        h.observer(1)?
            .request_action(manager, ActionKind::Restart, ActorId(2));
        let delay = h.sim.clock().secs_to_ticks(config.level.exit_delay_secs);
        h.sim.run(delay * 2)?;
        let node = h.observer(0)?;
        check(
            results,
            "level_restart_cancels_switch",
            node.active_groups().contains(&level_one) && !node.active_groups().contains(&level_two),
            format!("active groups {:?}", node.active_groups()),
        );
        check(
            results,
            "level_restart_closes_exit",
            h.flag(0, exit, &keys::OPEN)? == Some(false),
            "exit door reset".into(),
        );

        // Complete again and let the switch land.
        h.world.actors.move_to(ActorId(1), Vec3::new(10.0, 0.0, 0.0));
        h.world.actors.move_to(ActorId(2), Vec3::new(10.0, 0.0, 0.0));
        h.sim.run(delay + 10)?;
        let groups_match = h.sim.observers().all(|n| {
            n.active_groups().contains(&level_two) && !n.active_groups().contains(&level_one)
        });
        check(
            results,
            "level_switch_reaches_every_node",
            groups_match,
            format!("authority groups {:?}", h.sim.authority().active_groups()),
        );
        check(
            results,
            "level_exit_effect_per_completion",
            h.effects(0).count("exit_open") == 2,
            format!("{} exit effect(s) over two completions", h.effects(0).count("exit_open")),
        );
        Ok(())
    })
}

// ── 7. Late Join ────────────────────────────────────────────────────────

fn validate_late_join(config: &SimConfig, verbose: bool) -> Vec<TestResult> {
    section("Late Join", verbose, |results| {
        let mut h = Heist::new(config.clone())?;
        let door = h.sim.spawn(None, Door::new(Vec3::new(2.0, 0.0, 0.0)))?;
        let lock = h
            .sim
            .spawn(None, CombinationLock::new(Vec3::ZERO, vec![1]).opens(door))?;
        let guard = h.sim.spawn(
            None,
            Guard::new(Vec3::ZERO, vec![Vec3::ZERO, Vec3::new(6.0, 0.0, 0.0)]),
        )?;
        h.sim.authority().request_action(
            lock,
            ActionKind::AdjustDigit { index: 0, up: true },
            ActorId(1),
        );
        h.sim.run(50)?;

        let (services, effects) = h.world.services();
        let late = h.sim.add_observer(services, 1)?;
        let node = h.sim.node(late)?;
        check(
            results,
            "late_join_snapshot",
            node.state_of(lock) == Some("solved")
                && node.read(door, &keys::OPEN).and_then(Value::as_bool) == Some(true),
            format!("{} entities on join", node.registry().len()),
        );

        h.sim.run(20)?;
        // The guard moves every tick, so only its state is compared.
        let late_node = h.sim.node(late)?;
        let matched = [door, lock].iter().all(|e| h.converged(*e))
            && late_node.state_of(guard) == h.sim.authority().state_of(guard);
        check(
            results,
            "late_join_converges",
            matched,
            format!("guard {:?} after 20 ticks", late_node.state_of(guard)),
        );
        check(
            results,
            "late_join_catches_up_effects",
            effects.count("lock_open") == 1,
            format!("{} lock_open effect(s)", effects.count("lock_open")),
        );
        Ok(())
    })
}
