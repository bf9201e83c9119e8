//! Process-wide "who am I playing" lookup.
//!
//! Interaction code on a client needs the actor it controls without having it
//! threaded through every call. This is the one global the crate keeps. A
//! binding is created when a session starts and removed when the returned
//! [`LocalActorBinding`] is dropped at session end.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::ids::{ActorId, NodeId, SessionId};

static LOCAL_ACTORS: RwLock<BTreeMap<(SessionId, NodeId), ActorId>> =
    parking_lot::const_rwlock(BTreeMap::new());

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Allocate a session id unique within this process.
pub fn new_session() -> SessionId {
    SessionId(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
}

/// Clears its binding when dropped.
#[must_use = "the binding is removed as soon as this guard is dropped"]
#[derive(Debug)]
pub struct LocalActorBinding {
    session: SessionId,
    node: NodeId,
}

impl LocalActorBinding {
    pub fn actor(&self) -> Option<ActorId> {
        local_actor(self.session, self.node)
    }
}

impl Drop for LocalActorBinding {
    fn drop(&mut self) {
        LOCAL_ACTORS.write().remove(&(self.session, self.node));
    }
}

/// Record `actor` as the one controlled on `node`. Rebinding replaces the
/// previous actor.
pub fn bind_local_actor(session: SessionId, node: NodeId, actor: ActorId) -> LocalActorBinding {
    LOCAL_ACTORS.write().insert((session, node), actor);
    LocalActorBinding { session, node }
}

pub fn local_actor(session: SessionId, node: NodeId) -> Option<ActorId> {
    LOCAL_ACTORS.read().get(&(session, node)).copied()
}

/// Drop every binding of a session.
pub fn clear_session(session: SessionId) {
    LOCAL_ACTORS.write().retain(|(s, _), _| *s != session);
}
