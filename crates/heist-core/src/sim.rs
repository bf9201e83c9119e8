//! In-memory collaborators for headless runs and tests.
//!
//! [`SimPhysics`] answers raycasts against a handful of analytic colliders
//! plus a sphere around each scripted player. [`RecordingEffects`] remembers
//! every effect it was asked to play. [`ScriptedActors`] is an actor list the
//! caller moves around by hand.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use heist_logic::geometry::{ray_plane, ray_sphere, Surface, Vec3};
use parking_lot::{Mutex, RwLock};

use crate::error::QueryError;
use crate::ids::ActorId;
use crate::services::{
    ActorRole, ActorSnapshot, ActorSource, EffectSink, LayerMask, Physics, RayHit, Services,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Sphere { center: Vec3, radius: f32 },
    /// One-sided plane facing along `normal`.
    Plane { point: Vec3, normal: Vec3 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collider {
    pub shape: Shape,
    pub surface: Surface,
}

/// Player body used for ray hits: a sphere centred this far above the feet.
pub const PLAYER_BODY_HEIGHT: f32 = 1.0;
pub const PLAYER_BODY_RADIUS: f32 = 0.4;

#[derive(Default)]
pub struct SimPhysics {
    colliders: RwLock<Vec<Collider>>,
    players: Option<Arc<ScriptedActors>>,
    failing: AtomicBool,
}

impl SimPhysics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also report hits on player bodies taken from `actors`.
    pub fn with_players(actors: Arc<ScriptedActors>) -> Self {
        Self {
            players: Some(actors),
            ..Self::default()
        }
    }

    pub fn add(&self, shape: Shape, surface: Surface) {
        self.colliders.write().push(Collider { shape, surface });
    }

    pub fn add_wall(&self, point: Vec3, normal: Vec3) {
        self.add(Shape::Plane { point, normal }, Surface::Solid);
    }

    pub fn add_mirror(&self, point: Vec3, normal: Vec3) {
        self.add(Shape::Plane { point, normal }, Surface::Mirror);
    }

    pub fn add_pillar(&self, center: Vec3, radius: f32) {
        self.add(Shape::Sphere { center, radius }, Surface::Solid);
    }

    pub fn clear(&self) {
        self.colliders.write().clear();
    }

    /// Make every query fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

impl Physics for SimPhysics {
    fn raycast_nearest(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        layers: LayerMask,
    ) -> Result<Option<RayHit>, QueryError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(QueryError::Unavailable("physics offline".into()));
        }
        let dir = direction.normalize();
        let mut nearest: Option<RayHit> = None;
        let mut consider = |distance: f32, normal: Vec3, surface: Surface| {
            if distance > max_distance || nearest.is_some_and(|n| n.distance <= distance) {
                return;
            }
            nearest = Some(RayHit {
                distance,
                point: origin + dir * distance,
                normal,
                surface,
            });
        };

        for collider in self.colliders.read().iter() {
            if !layers.contains(collider.surface) {
                continue;
            }
            match collider.shape {
                Shape::Sphere { center, radius } => {
                    if let Some(t) = ray_sphere(origin, dir, center, radius) {
                        let normal = (origin + dir * t - center).normalize();
                        consider(t, normal, collider.surface);
                    }
                }
                Shape::Plane { point, normal } => {
                    if let Some(t) = ray_plane(origin, dir, point, normal) {
                        consider(t, normal.normalize(), collider.surface);
                    }
                }
            }
        }

        if let (Some(actors), true) = (&self.players, layers.contains(Surface::Player)) {
            for actor in actors.current_actor_positions() {
                if actor.role != ActorRole::Player {
                    continue;
                }
                let center = actor.position + Vec3::UP * PLAYER_BODY_HEIGHT;
                if let Some(t) = ray_sphere(origin, dir, center, PLAYER_BODY_RADIUS) {
                    let normal = (origin + dir * t - center).normalize();
                    consider(t, normal, Surface::Player);
                }
            }
        }

        Ok(nearest)
    }
}

/// Effect sink that keeps a log.
#[derive(Default)]
pub struct RecordingEffects {
    played: Mutex<Vec<(String, Vec3)>>,
}

impl RecordingEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<(String, Vec3)> {
        self.played.lock().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.played.lock().iter().filter(|(n, _)| n == name).count()
    }

    pub fn clear(&self) {
        self.played.lock().clear();
    }
}

impl EffectSink for RecordingEffects {
    fn play_effect(&self, name: &str, at: Vec3) {
        self.played.lock().push((name.to_string(), at));
    }
}

/// Actor list driven by the caller.
#[derive(Default)]
pub struct ScriptedActors {
    actors: RwLock<BTreeMap<ActorId, ActorSnapshot>>,
}

impl ScriptedActors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, id: ActorId, position: Vec3, role: ActorRole) {
        self.actors
            .write()
            .insert(id, ActorSnapshot { id, position, role });
    }

    /// Move an existing actor. Unknown ids are ignored.
    pub fn move_to(&self, id: ActorId, position: Vec3) {
        if let Some(actor) = self.actors.write().get_mut(&id) {
            actor.position = position;
        }
    }

    pub fn remove(&self, id: ActorId) {
        self.actors.write().remove(&id);
    }
}

impl ActorSource for ScriptedActors {
    fn current_actor_positions(&self) -> Vec<ActorSnapshot> {
        self.actors.read().values().copied().collect()
    }
}

/// One shared world: physics, actors and a per-node effect log.
#[derive(Clone)]
pub struct SimWorld {
    pub physics: Arc<SimPhysics>,
    pub actors: Arc<ScriptedActors>,
}

impl SimWorld {
    pub fn new() -> Self {
        let actors = Arc::new(ScriptedActors::new());
        let physics = Arc::new(SimPhysics::with_players(Arc::clone(&actors)));
        Self { physics, actors }
    }

    /// Services for one node, with its own effect recorder.
    pub fn services(&self) -> (Services, Arc<RecordingEffects>) {
        let effects = Arc::new(RecordingEffects::new());
        let services = Services::new(
            Arc::clone(&self.physics) as Arc<dyn Physics>,
            Arc::clone(&effects) as Arc<dyn EffectSink>,
            Arc::clone(&self.actors) as Arc<dyn ActorSource>,
        );
        (services, effects)
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}
