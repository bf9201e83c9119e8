use std::borrow::Cow;

use heist_logic::geometry::Vec3;
use serde::{Deserialize, Serialize};

use crate::ids::ActorId;

/// Name of a replicated field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PropKey(Cow<'static, str>);

impl PropKey {
    pub const fn new(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PropKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keys shared by several entity kinds.
pub mod keys {
    use super::PropKey;

    /// Externally visible behavior state, as a lowercase name.
    pub const STATE: PropKey = PropKey::new("state");
    pub const POSITION: PropKey = PropKey::new("position");
    pub const FACING: PropKey = PropKey::new("facing");
    pub const OPEN: PropKey = PropKey::new("open");
    pub const SOLVED: PropKey = PropKey::new("solved");
    /// Last action outcome ("accepted", "wrong_key", "cooldown", ...).
    pub const FEEDBACK: PropKey = PropKey::new("feedback");
    /// Bumped on every feedback so repeated identical outcomes are observed.
    pub const FEEDBACK_SEQ: PropKey = PropKey::new("feedback_seq");
    pub const ANIM_STATE: PropKey = PropKey::new("anim_state");
    pub const ANIM_TRIGGER: PropKey = PropKey::new("anim_trigger");
    pub const ANIM_TRIGGER_SEQ: PropKey = PropKey::new("anim_trigger_seq");
}

/// Value of a replicated field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f32),
    Vec3(Vec3),
    Text(String),
    Actor(Option<ActorId>),
    Digits(Vec<u8>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Value::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_actor(&self) -> Option<Option<ActorId>> {
        match self {
            Value::Actor(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_digits(&self) -> Option<&[u8]> {
        match self {
            Value::Digits(d) => Some(d),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<Vec3> for Value {
    fn from(v: Vec3) -> Self {
        Value::Vec3(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Option<ActorId>> for Value {
    fn from(v: Option<ActorId>) -> Self {
        Value::Actor(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Digits(v)
    }
}
