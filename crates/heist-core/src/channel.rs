//! Reliable, role-filtered messages between nodes.
//!
//! Every node connects to one [`MessageBus`] and gets an [`Outbox`] (many may
//! send concurrently) and an [`Inbox`] (drained by its node only). Delivery is
//! ordered per sender/receiver pair. Each message declares which roles may
//! send it and which may receive it; the receiver checks both against the
//! sender's *registered* role and drops mismatches with a warning. That check
//! is the only authorization there is.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use heist_logic::geometry::Vec3;
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};

use crate::ids::{ActorId, EntityId, EntityKind, GroupId, KeyId, NodeId, Role, RoleFilter};

/// What an interacting actor asks an entity to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Press,
    InsertKey(KeyId),
    /// Turn one dial of a combination lock by one step.
    AdjustDigit { index: u8, up: bool },
    /// Start a hack or steal.
    Claim,
    /// Let go of a hack or steal.
    Release,
    Trigger,
    Restart,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Interaction request from any node.
    Action { action: ActionKind, actor: ActorId },
    PlayerSpotted { actor: ActorId },
    AlarmTriggered { position: Vec3 },
    ResetAlarm,
    TriggerAlarm,
    OpenDoor,
    CloseDoor,
    /// Level completed; `door` is the exit to open, if any.
    OpenExit { door: Option<EntityId> },
    ResetGroup { group: GroupId },
    ActivateGroup { group: GroupId },
    DeactivateGroup { group: GroupId },
    PlayEffect { name: String, at: Vec3 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Action,
    PlayerSpotted,
    AlarmTriggered,
    ResetAlarm,
    TriggerAlarm,
    OpenDoor,
    CloseDoor,
    OpenExit,
    ResetGroup,
    ActivateGroup,
    DeactivateGroup,
    PlayEffect,
}

impl MessageKind {
    /// Default `(allowed sources, allowed targets)` for this kind.
    pub fn policy(self) -> (RoleFilter, RoleFilter) {
        match self {
            MessageKind::Action => (RoleFilter::ALL, RoleFilter::AUTHORITY),
            MessageKind::PlayerSpotted
            | MessageKind::AlarmTriggered
            | MessageKind::ResetAlarm
            | MessageKind::TriggerAlarm
            | MessageKind::OpenDoor
            | MessageKind::CloseDoor => (RoleFilter::AUTHORITY, RoleFilter::AUTHORITY),
            MessageKind::OpenExit
            | MessageKind::ResetGroup
            | MessageKind::ActivateGroup
            | MessageKind::DeactivateGroup
            | MessageKind::PlayEffect => (RoleFilter::AUTHORITY, RoleFilter::ALL),
        }
    }
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::Action { .. } => MessageKind::Action,
            Payload::PlayerSpotted { .. } => MessageKind::PlayerSpotted,
            Payload::AlarmTriggered { .. } => MessageKind::AlarmTriggered,
            Payload::ResetAlarm => MessageKind::ResetAlarm,
            Payload::TriggerAlarm => MessageKind::TriggerAlarm,
            Payload::OpenDoor => MessageKind::OpenDoor,
            Payload::CloseDoor => MessageKind::CloseDoor,
            Payload::OpenExit { .. } => MessageKind::OpenExit,
            Payload::ResetGroup { .. } => MessageKind::ResetGroup,
            Payload::ActivateGroup { .. } => MessageKind::ActivateGroup,
            Payload::DeactivateGroup { .. } => MessageKind::DeactivateGroup,
            Payload::PlayEffect { .. } => MessageKind::PlayEffect,
        }
    }
}

/// Who on the receiving node handles a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The node itself (group lifecycle, effects).
    Node,
    Entity(EntityId),
    /// Every registered entity of a kind.
    Kind(EntityKind),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub kind: MessageKind,
    pub source_entity: Option<EntityId>,
    pub source_node: NodeId,
    pub target: Target,
    pub payload: Payload,
    pub allowed_sources: RoleFilter,
    pub allowed_targets: RoleFilter,
}

impl Message {
    /// Build a message with its kind's default role policy.
    pub fn new(source_node: NodeId, source_entity: Option<EntityId>, target: Target, payload: Payload) -> Self {
        let kind = payload.kind();
        let (allowed_sources, allowed_targets) = kind.policy();
        Self {
            kind,
            source_entity,
            source_node,
            target,
            payload,
            allowed_sources,
            allowed_targets,
        }
    }

    pub fn with_roles(mut self, sources: RoleFilter, targets: RoleFilter) -> Self {
        self.allowed_sources = sources;
        self.allowed_targets = targets;
        self
    }
}

/// A message on the wire between one sender and one receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub from: NodeId,
    /// Per (sender, receiver) sequence, starting at 1.
    pub seq: u64,
    pub message: Message,
}

type Queue = Arc<Mutex<VecDeque<Envelope>>>;

struct Route {
    role: Role,
    queue: Queue,
}

/// Shared routing table. Cloning yields another handle to the same bus.
#[derive(Clone, Default)]
pub struct MessageBus {
    routes: Arc<RwLock<BTreeMap<NodeId, Route>>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node and hand back its endpoints. Reconnecting a node
    /// replaces its queue.
    pub fn connect(&self, node: NodeId, role: Role) -> (Outbox, Inbox) {
        let queue: Queue = Arc::default();
        self.routes.write().insert(
            node,
            Route {
                role,
                queue: Arc::clone(&queue),
            },
        );
        let outbox = Outbox {
            node,
            bus: self.clone(),
            seqs: Mutex::new(BTreeMap::new()),
        };
        let inbox = Inbox {
            node,
            role,
            bus: self.clone(),
            queue,
            last_seen: BTreeMap::new(),
        };
        (outbox, inbox)
    }

    pub fn disconnect(&self, node: NodeId) -> bool {
        self.routes.write().remove(&node).is_some()
    }

    pub fn role_of(&self, node: NodeId) -> Option<Role> {
        self.routes.read().get(&node).map(|r| r.role)
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        self.routes.read().keys().copied().collect()
    }

    /// Put an envelope straight onto a node's queue, as a retransmitting
    /// transport would. Returns false if the node is not connected.
    pub fn inject(&self, to: NodeId, envelope: Envelope) -> bool {
        match self.routes.read().get(&to) {
            Some(route) => {
                route.queue.lock().push_back(envelope);
                true
            }
            None => false,
        }
    }
}

/// Sending half of a node's connection. `send` takes `&self` and may be called
/// from several threads at once.
pub struct Outbox {
    node: NodeId,
    bus: MessageBus,
    seqs: Mutex<BTreeMap<NodeId, u64>>,
}

impl Outbox {
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Enqueue `message` for every connected node whose role is in `to`,
    /// including this node. Returns the number of receivers.
    pub fn send(&self, to: RoleFilter, message: Message) -> usize {
        let routes = self.bus.routes.read();
        let mut seqs = self.seqs.lock();
        let mut count = 0;
        for (receiver, route) in routes.iter() {
            if !to.contains(route.role) {
                continue;
            }
            let seq = seqs.entry(*receiver).or_insert(0);
            *seq += 1;
            route.queue.lock().push_back(Envelope {
                from: self.node,
                seq: *seq,
                message: message.clone(),
            });
            count += 1;
        }
        count
    }

    /// Enqueue for one specific node.
    pub fn send_to(&self, receiver: NodeId, message: Message) -> bool {
        let routes = self.bus.routes.read();
        let Some(route) = routes.get(&receiver) else {
            return false;
        };
        let mut seqs = self.seqs.lock();
        let seq = seqs.entry(receiver).or_insert(0);
        *seq += 1;
        route.queue.lock().push_back(Envelope {
            from: self.node,
            seq: *seq,
            message,
        });
        true
    }
}

/// Receiving half of a node's connection.
pub struct Inbox {
    node: NodeId,
    role: Role,
    bus: MessageBus,
    queue: Queue,
    last_seen: BTreeMap<NodeId, u64>,
}

impl Inbox {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Take every queued message that passes the duplicate and role checks,
    /// in arrival order.
    pub fn drain(&mut self) -> Vec<Message> {
        let envelopes: Vec<Envelope> = self.queue.lock().drain(..).collect();
        let mut accepted = Vec::with_capacity(envelopes.len());
        for envelope in envelopes {
            let last = self.last_seen.entry(envelope.from).or_insert(0);
            if envelope.seq <= *last {
                debug!(
                    "{} dropped duplicate {:?} #{} from {}",
                    self.node, envelope.message.kind, envelope.seq, envelope.from
                );
                continue;
            }
            *last = envelope.seq;

            let message = envelope.message;
            let Some(sender_role) = self.bus.role_of(envelope.from) else {
                debug!("{} dropped {:?} from departed {}", self.node, message.kind, envelope.from);
                continue;
            };
            if message.source_node != envelope.from {
                warn!(
                    "{} dropped {:?}: claims source {} but came from {}",
                    self.node, message.kind, message.source_node, envelope.from
                );
                continue;
            }
            if !message.allowed_sources.contains(sender_role) {
                warn!(
                    "{} dropped {:?} from {} ({:?} may not send it)",
                    self.node, message.kind, envelope.from, sender_role
                );
                continue;
            }
            if !message.allowed_targets.contains(self.role) {
                warn!(
                    "{} dropped {:?} from {} ({:?} may not receive it)",
                    self.node, message.kind, envelope.from, self.role
                );
                continue;
            }
            accepted.push(message);
        }
        accepted
    }
}
