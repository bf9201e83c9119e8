//! Heist Core - authoritative replication and behavior substrate
//!
//! A cooperative escape room runs as one authority node and any number of
//! observer nodes. The authority owns every entity and is the only node that
//! changes gameplay state; observers mirror that state and turn changes into
//! local effects.
//!
//! # Architecture
//!
//! - **Replication** ([`replication`]): a single-writer property store per
//!   node, ordered updates from the authority, and a change detector that
//!   reports each change to each observer exactly once.
//! - **Messages** ([`channel`]): reliable, role-filtered requests and
//!   broadcasts between nodes.
//! - **Behaviors** ([`behaviors`], [`lifecycle`]): one state machine per
//!   gameplay object, stepped once per tick on the authority, reconciled on
//!   every node.
//! - **Driver** ([`driver`]): the fixed-step clock that ties nodes, links and
//!   behaviors together.
//!
//! # Example
//!
//! ```rust
//! use heist_core::prelude::*;
//! use heist_core::sim::SimWorld;
//!
//! let world = SimWorld::new();
//! let (services, _effects) = world.services();
//! let mut sim = Simulation::new(SimConfig::default(), services);
//!
//! let lock = sim.spawn(None, CombinationLock::new(Vec3::ZERO, vec![1])).unwrap();
//! sim.authority().request_action(
//!     lock,
//!     ActionKind::AdjustDigit { index: 0, up: true },
//!     ActorId(1),
//! );
//! sim.run(2).unwrap();
//! assert_eq!(sim.authority().state_of(lock), Some("solved"));
//! ```

pub mod behaviors;
pub mod channel;
pub mod config;
pub mod driver;
pub mod error;
pub mod ids;
pub mod lifecycle;
pub mod local_actor;
pub mod node;
pub mod registry;
pub mod replication;
pub mod services;
pub mod sim;
pub mod timer;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::behaviors::alarm::AlarmBooth;
    pub use crate::behaviors::button::{Button, ButtonLink};
    pub use crate::behaviors::door::Door;
    pub use crate::behaviors::guard::{Guard, GuardState};
    pub use crate::behaviors::laser::LaserTrap;
    pub use crate::behaviors::lock::CombinationLock;
    pub use crate::behaviors::sneak::SneakZone;
    pub use crate::behaviors::task::{ProgressTask, TaskReward};
    pub use crate::behaviors::{Behavior, InitialState, ReconcileContext, StepContext};
    pub use crate::channel::{ActionKind, Message, Payload, Target};
    pub use crate::config::SimConfig;
    pub use crate::driver::Simulation;
    pub use crate::error::{BehaviorError, ReplicationError, SimulationError};
    pub use crate::ids::{ActorId, EntityId, EntityKind, GroupId, KeyId, NodeId, Role, RoleFilter, Tick};
    pub use crate::lifecycle::{LevelManager, LevelPlan, Stage};
    pub use crate::node::{Node, AUTHORITY_NODE};
    pub use crate::replication::{keys, PropKey, Value};
    pub use crate::services::{ActorRole, Services};
    pub use heist_logic::geometry::Vec3;
    pub use heist_logic::zone::Zone;
}
