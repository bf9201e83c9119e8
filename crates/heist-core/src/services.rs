//! Interfaces to the collaborators the simulation does not implement.
//!
//! Physics, effect playback and the actor snapshot are passed in as a
//! [`Services`] bundle when a node is built; nothing reaches them through
//! globals.

use std::sync::Arc;

use heist_logic::geometry::{Surface, Vec3};
use log::debug;

use crate::error::QueryError;
use crate::ids::ActorId;

/// Which surfaces a ray may hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerMask(u8);

impl LayerMask {
    pub const SOLID: Self = Self(0b001);
    pub const MIRROR: Self = Self(0b010);
    pub const PLAYER: Self = Self(0b100);
    /// Everything that blocks sight.
    pub const OCCLUDERS: Self = Self(0b011);
    pub const ALL: Self = Self(0b111);

    pub fn contains(&self, surface: Surface) -> bool {
        let bit = match surface {
            Surface::Solid => Self::SOLID.0,
            Surface::Mirror => Self::MIRROR.0,
            Surface::Player => Self::PLAYER.0,
        };
        self.0 & bit != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
    pub surface: Surface,
}

impl RayHit {
    fn is_well_formed(&self) -> bool {
        self.distance.is_finite() && self.distance >= 0.0 && self.point.is_finite() && self.normal.is_finite()
    }
}

pub trait Physics: Send + Sync {
    /// Nearest hit along `direction` within `max_distance`, or `None`.
    fn raycast_nearest(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        layers: LayerMask,
    ) -> Result<Option<RayHit>, QueryError>;
}

/// Audio/visual sink. Fire and forget.
pub trait EffectSink: Send + Sync {
    fn play_effect(&self, name: &str, at: Vec3);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    Player,
    Npc,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorSnapshot {
    pub id: ActorId,
    pub position: Vec3,
    pub role: ActorRole,
}

pub trait ActorSource: Send + Sync {
    fn current_actor_positions(&self) -> Vec<ActorSnapshot>;
}

/// The collaborators one node talks to.
#[derive(Clone)]
pub struct Services {
    pub physics: Arc<dyn Physics>,
    pub effects: Arc<dyn EffectSink>,
    pub actors: Arc<dyn ActorSource>,
}

impl Services {
    pub fn new(physics: Arc<dyn Physics>, effects: Arc<dyn EffectSink>, actors: Arc<dyn ActorSource>) -> Self {
        Self {
            physics,
            effects,
            actors,
        }
    }

    /// Raycast that also rejects malformed results.
    pub fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        layers: LayerMask,
    ) -> Result<Option<RayHit>, QueryError> {
        match self.physics.raycast_nearest(origin, direction, max_distance, layers)? {
            Some(hit) if !hit.is_well_formed() => {
                debug!("Rejected malformed ray hit {:?}", hit);
                Err(QueryError::Malformed(format!("{:?}", hit)))
            }
            other => Ok(other),
        }
    }

    /// True when nothing in `layers` sits between `from` and `to`.
    pub fn line_of_sight(&self, from: Vec3, to: Vec3, layers: LayerMask) -> Result<bool, QueryError> {
        let offset = to - from;
        let distance = offset.length();
        if distance <= f32::EPSILON {
            return Ok(true);
        }
        let hit = self.raycast(from, offset.normalize(), distance, layers)?;
        Ok(hit.map_or(true, |h| h.distance >= distance))
    }

    pub fn actor(&self, id: ActorId) -> Option<ActorSnapshot> {
        self.actors
            .current_actor_positions()
            .into_iter()
            .find(|a| a.id == id)
    }

    pub fn players(&self) -> Vec<ActorSnapshot> {
        self.actors
            .current_actor_positions()
            .into_iter()
            .filter(|a| a.role == ActorRole::Player)
            .collect()
    }
}
