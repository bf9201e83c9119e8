//! Cross-node replication: single writer, delayed but ordered delivery,
//! late join, message role filters and false→true watchers.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::Session;
use heist_core::behaviors::button::PRESS_COUNT;
use heist_core::channel::Envelope;
use heist_core::prelude::*;
use heist_core::replication::PropertyStore;

// ── Helpers ────────────────────────────────────────────────────────────

fn open(node: &Node, door: EntityId) -> Option<bool> {
    node.read(door, &keys::OPEN).and_then(Value::as_bool)
}

fn turn(node: &Node, lock: EntityId, index: u8) {
    node.request_action(lock, ActionKind::AdjustDigit { index, up: true }, ActorId(1));
}

// ── Authority ──────────────────────────────────────────────────────────

#[test]
fn observer_write_is_rejected_and_ignored() {
    common::init_logging();
    let door = EntityId(1);
    let mut mirror = PropertyStore::new(NodeId(1));
    mirror.register(door, AUTHORITY_NODE).unwrap();

    let err = mirror.write(door, keys::OPEN, true.into()).unwrap_err();
    assert_eq!(
        err,
        ReplicationError::AuthorityViolation {
            entity: door,
            writer: NodeId(1),
            owner: AUTHORITY_NODE,
        }
    );
    assert_eq!(mirror.read(door, &keys::OPEN), None);
    assert!(!mirror.has_pending());
}

#[test]
fn observer_action_is_carried_out_by_authority() {
    let mut s = Session::new(SimConfig::default(), &[0]);
    let door = s.sim.spawn(None, Door::new(Vec3::ZERO)).unwrap();
    s.tick();
    assert_eq!(open(s.observer(0), door), Some(false));

    s.observer(0).request_action(door, ActionKind::Press, ActorId(1));
    s.tick();
    assert_eq!(open(s.sim.authority(), door), Some(true));
    assert_eq!(open(s.observer(0), door), Some(true));
}

// ── Delivery ───────────────────────────────────────────────────────────

#[test]
fn delayed_observer_sees_every_write_in_order() {
    let mut s = Session::new(SimConfig::default(), &[0, 3]);
    let door = s.sim.spawn(None, Door::new(Vec3::ZERO)).unwrap();
    s.run(5);

    let mut authority = Vec::new();
    let mut slow = Vec::new();
    for tick in 0..12 {
        if tick < 3 {
            s.observer(0).request_action(door, ActionKind::Press, ActorId(1));
        }
        s.tick();
        authority.push(open(s.sim.authority(), door));
        slow.push(open(s.observer(1), door));
    }

    assert_eq!(&authority[..3], &[Some(true), Some(false), Some(true)]);
    assert_eq!(&slow[..3], &[Some(false), Some(false), Some(false)]);
    for i in 0..authority.len() - 3 {
        assert_eq!(slow[i + 3], authority[i], "tick {i}");
    }
    assert_eq!(
        s.observer(1).store().applied_seq(door),
        s.sim.authority().store().applied_seq(door)
    );
}

#[test]
fn changing_delay_never_reorders() {
    let mut s = Session::new(SimConfig::default(), &[4]);
    let button = s.sim.spawn(None, Button::new(Vec3::ZERO)).unwrap();
    let door = s.sim.spawn(None, Door::new(Vec3::ZERO)).unwrap();
    s.run(5);

    let id = s.observers[0].0;
    s.sim.authority().request_action(button, ActionKind::Press, ActorId(1));
    s.tick();
    s.sim.set_link_delay(id, 0).unwrap();
    s.sim.authority().request_action(door, ActionKind::Press, ActorId(1));
    s.tick();
    // The door write may not overtake the press queued with the longer delay.
    assert_eq!(open(s.observer(0), door), Some(false));
    assert_eq!(
        s.observer(0).read(button, &PRESS_COUNT),
        Some(&Value::Int(0))
    );
    s.run(4);
    assert_eq!(open(s.observer(0), door), Some(true));
    assert_eq!(
        s.observer(0).read(button, &PRESS_COUNT),
        Some(&Value::Int(1))
    );
}

// ── Late join ──────────────────────────────────────────────────────────

#[test]
fn late_joiner_converges_from_snapshot() {
    let mut s = Session::new(SimConfig::default(), &[]);
    let door = s.sim.spawn(None, Door::new(Vec3::new(2.0, 0.0, 0.0))).unwrap();
    let lock = s
        .sim
        .spawn(None, CombinationLock::new(Vec3::ZERO, vec![1]).opens(door))
        .unwrap();
    turn(s.sim.authority(), lock, 0);
    s.run(3);
    assert_eq!(open(s.sim.authority(), door), Some(true));

    let (services, effects) = s.world.services();
    let late = s.sim.add_observer(services, 0).unwrap();
    {
        let node = s.sim.node(late).unwrap();
        assert_eq!(node.registry().len(), 2);
        assert_eq!(open(node, door), Some(true));
        assert_eq!(node.state_of(lock), Some("solved"));
    }

    s.sim.authority().request_action(door, ActionKind::Press, ActorId(1));
    let extra = s.sim.spawn(None, Door::new(Vec3::ZERO)).unwrap();
    s.run(2);

    let authority = s.sim.authority();
    let node = s.sim.node(late).unwrap();
    for entity in [door, lock, extra] {
        assert_eq!(
            node.store().entity_values(entity),
            authority.store().entity_values(entity),
            "{entity}"
        );
    }
    assert_eq!(open(node, door), Some(false));
    // The joiner catches up on effects for state it never saw change.
    assert_eq!(effects.count("lock_open"), 1);
}

// ── Messages ───────────────────────────────────────────────────────────

#[test]
fn observer_cannot_send_authority_only_messages() {
    let mut s = Session::new(SimConfig::default(), &[0]);
    let door = s.sim.spawn(None, Door::new(Vec3::ZERO)).unwrap();
    s.tick();

    let sent = s
        .observer(0)
        .send(RoleFilter::AUTHORITY, Target::Entity(door), Payload::OpenDoor);
    assert_eq!(sent, 1);
    s.run(2);
    assert_eq!(open(s.sim.authority(), door), Some(false));

    // A forged source node is dropped as well.
    let observer = s.observers[0].0;
    let forged = Envelope {
        from: observer,
        seq: 1_000,
        message: Message::new(AUTHORITY_NODE, None, Target::Entity(door), Payload::OpenDoor),
    };
    assert!(s.sim.bus().inject(AUTHORITY_NODE, forged));
    s.run(2);
    assert_eq!(open(s.sim.authority(), door), Some(false));
}

#[test]
fn duplicate_envelopes_are_handled_once() {
    let mut s = Session::new(SimConfig::default(), &[0]);
    let button = s.sim.spawn(None, Button::new(Vec3::ZERO)).unwrap();
    s.tick();

    let observer = s.observers[0].0;
    let press = Message::new(
        observer,
        None,
        Target::Entity(button),
        Payload::Action {
            action: ActionKind::Press,
            actor: ActorId(1),
        },
    );
    for _ in 0..3 {
        let envelope = Envelope {
            from: observer,
            seq: 1,
            message: press.clone(),
        };
        s.sim.bus().inject(AUTHORITY_NODE, envelope);
    }
    s.tick();
    assert_eq!(
        s.sim.authority().read(button, &PRESS_COUNT),
        Some(&Value::Int(1))
    );
}

// ── Watchers ───────────────────────────────────────────────────────────

#[test]
fn watcher_fires_once_per_rising_edge() {
    let mut s = Session::new(SimConfig::default(), &[1]);
    let lock = s
        .sim
        .spawn(None, CombinationLock::new(Vec3::ZERO, vec![1]))
        .unwrap();
    s.run(3);

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let observer = s.observers[0].0;
    s.sim.node_mut(observer).unwrap().subscribe(
        lock,
        keys::SOLVED,
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );

    turn(s.sim.authority(), lock, 0);
    s.run(5);
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    // Turning a solved lock changes nothing and fires nothing.
    turn(s.sim.authority(), lock, 0);
    s.run(5);
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    // Subscribing after the fact does not fire for the current value.
    let late = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&late);
    let id = s.sim.node_mut(observer).unwrap().subscribe(
        lock,
        keys::SOLVED,
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    s.run(3);
    assert_eq!(late.load(Ordering::SeqCst), 0);
    assert!(s.sim.node_mut(observer).unwrap().unsubscribe(id));
}
