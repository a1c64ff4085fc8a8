use std::fmt;

use serde::{Deserialize, Serialize};

/// Atomic reference-counted string type used for identifiers.
pub type ArcStr = std::sync::Arc<str>;

/// A concrete scalar bound to an argument name.
///
/// Values are what the world hands to the compiler: object names, slot
/// indices, flags. They have to be hashable and comparable because they take
/// part in the canonical identity of every compiled node, which rules out
/// floats; encode continuous quantities upstream if you need them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// A boolean flag.
    Bool(bool),
    /// An integer, e.g. a slot or grid index.
    Int(i64),
    /// A string, e.g. the name of an object in the world.
    Str(ArcStr),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Str(value) => write!(f, "{value}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(ArcStr::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(ArcStr::from(value))
    }
}
