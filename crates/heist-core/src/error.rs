//! Error types.
//!
//! Gameplay failures (a wrong key, an out-of-range steal) are not errors: they
//! are written as feedback properties. The types here cover the substrate:
//! authority violations, stale references, collaborator failures and driver
//! faults.

use thiserror::Error;

use crate::ids::{EntityId, NodeId};

/// Errors raised by the Replicated Property Store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReplicationError {
    /// A node that does not own the entity tried to write to it.
    #[error("{writer} is not the authority for {entity} (owner is {owner})")]
    AuthorityViolation {
        entity: EntityId,
        writer: NodeId,
        owner: NodeId,
    },

    #[error("{0} is not registered")]
    UnknownEntity(EntityId),

    #[error("{0} is already registered")]
    DuplicateEntity(EntityId),

    /// An update arrived with a sequence at or below the last applied one.
    #[error("stale update for {entity}: seq {seq} <= applied {applied}")]
    StaleUpdate {
        entity: EntityId,
        seq: u64,
        applied: u64,
    },

    /// An update claims to come from a node that does not own the entity.
    #[error("update for {entity} from {origin}, but owner is {owner}")]
    ForeignOrigin {
        entity: EntityId,
        origin: NodeId,
        owner: NodeId,
    },
}

/// Encoding or decoding a store snapshot failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotError {
    #[error("snapshot encode failed: {0}")]
    Encode(String),
    #[error("snapshot decode failed: {0}")]
    Decode(String),
}

/// Failure reported by an external collaborator (physics, input).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("collaborator returned malformed data: {0}")]
    Malformed(String),
}

/// Errors local to one entity's `step` or message handling. Logged and
/// isolated by the driver; never fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BehaviorError {
    /// A required collaborator or configured reference is absent.
    #[error("{entity} is missing {what}")]
    MissingReference { entity: EntityId, what: &'static str },

    #[error("query failed for {entity}: {reason}")]
    QueryFailure { entity: EntityId, reason: String },

    /// A message referenced an entity or actor that is no longer registered.
    #[error("stale message for {entity}")]
    StaleMessage { entity: EntityId },

    #[error(transparent)]
    Replication(#[from] ReplicationError),
}

/// Driver-level faults. These are the only fatal errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    /// The registry and the world disagree about an entity.
    #[error("entity registry corrupted at {entity}")]
    RegistryCorrupted { entity: EntityId },

    #[error("{0} is not part of this session")]
    UnknownNode(NodeId),

    #[error(transparent)]
    Replication(#[from] ReplicationError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
