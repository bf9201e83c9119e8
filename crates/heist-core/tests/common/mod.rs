//! Shared session setup for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use heist_core::prelude::*;
use heist_core::sim::{RecordingEffects, SimWorld};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// An authority plus observers over one scripted world.
pub struct Session {
    pub world: SimWorld,
    pub sim: Simulation,
    pub authority_effects: Arc<RecordingEffects>,
    pub observers: Vec<(NodeId, Arc<RecordingEffects>)>,
}

impl Session {
    /// One observer per entry in `delays`, joined before anything spawns.
    pub fn new(config: SimConfig, delays: &[Tick]) -> Self {
        init_logging();
        let world = SimWorld::new();
        let (services, authority_effects) = world.services();
        let mut sim = Simulation::new(config, services);
        let mut observers = Vec::new();
        for delay in delays {
            let (services, effects) = world.services();
            let id = sim.add_observer(services, *delay).unwrap();
            observers.push((id, effects));
        }
        Self {
            world,
            sim,
            authority_effects,
            observers,
        }
    }

    pub fn observer(&self, index: usize) -> &Node {
        self.sim.node(self.observers[index].0).unwrap()
    }

    pub fn observer_effects(&self, index: usize) -> &RecordingEffects {
        &self.observers[index].1
    }

    pub fn tick(&mut self) {
        self.sim.tick().unwrap();
    }

    pub fn run(&mut self, ticks: u64) {
        self.sim.run(ticks).unwrap();
    }

    pub fn place_player(&self, id: u32, at: Vec3) {
        self.world.actors.set(ActorId(id), at, ActorRole::Player);
    }
}
