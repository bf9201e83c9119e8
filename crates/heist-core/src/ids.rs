//! Identifiers, roles and entity kinds shared by every layer.

use serde::{Deserialize, Serialize};

/// One fixed-rate simulation step.
pub type Tick = u64;

/// Network-wide identity of a replicated entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// A participant in the session (the authority or one observing client).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u16);

/// A player or NPC body in the world, as reported by input/world state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(pub u32);

/// A level group: the set of entities activated and reset together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u16);

/// A physical key that fits (or does not fit) a door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyId(pub u32);

/// One running session. Distinguishes process-wide bindings between sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

/// What a node is allowed to do in this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Owns canonical state; runs `step`.
    Authority,
    /// Mirrors state and reconciles side effects.
    Observer,
}

/// Set of roles, used for message source and target filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleFilter(u8);

impl RoleFilter {
    pub const NONE: Self = Self(0);
    pub const AUTHORITY: Self = Self(0b01);
    pub const OBSERVERS: Self = Self(0b10);
    pub const ALL: Self = Self(0b11);

    pub fn contains(&self, role: Role) -> bool {
        self.0 & Self::bit(role) != 0
    }

    pub fn with(self, role: Role) -> Self {
        Self(self.0 | Self::bit(role))
    }

    fn bit(role: Role) -> u8 {
        match role {
            Role::Authority => 0b01,
            Role::Observer => 0b10,
        }
    }
}

/// Closed set of gameplay object kinds. Used by the registry for lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Guard,
    AlarmBooth,
    LaserTrap,
    SneakZone,
    CombinationLock,
    Button,
    Door,
    Terminal,
    Loot,
    LevelManager,
}
