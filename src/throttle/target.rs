//! Throttling target identifiers.

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies an independent throttling scope.
///
/// Calls whose targets compare equal share one window tracker and therefore
/// one quota.
#[derive(Debug, Clone)]
pub enum ThrottleTarget {
    /// The identity of a wrapped callable. Every closure and fn item has its
    /// own type, so the `TypeId` distinguishes callables.
    Callable {
        id: TypeId,
        name: &'static str,
    },
    /// The identity of a service type. All instances of the type share it.
    Type {
        id: TypeId,
        name: &'static str,
    },
    /// An explicit key, such as a user id.
    Key(String),
}

impl ThrottleTarget {
    /// Target for the callable type `F`.
    pub fn callable<F: 'static>() -> Self {
        ThrottleTarget::Callable {
            id: TypeId::of::<F>(),
            name: type_name::<F>(),
        }
    }

    /// Target for the service type `T`.
    pub fn of_type<T: 'static>() -> Self {
        ThrottleTarget::Type {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Target for an explicit key.
    pub fn key(key: impl Into<String>) -> Self {
        ThrottleTarget::Key(key.into())
    }

    /// Convert the target to a string representation for logging.
    pub fn to_string_key(&self) -> String {
        match self {
            ThrottleTarget::Callable { name, .. } => format!("fn:{}", name),
            ThrottleTarget::Type { name, .. } => format!("type:{}", name),
            ThrottleTarget::Key(key) => format!("key:{}", key),
        }
    }
}

// Names are diagnostic only; identity is the TypeId or the key.
impl PartialEq for ThrottleTarget {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ThrottleTarget::Callable { id: a, .. }, ThrottleTarget::Callable { id: b, .. }) => {
                a == b
            }
            (ThrottleTarget::Type { id: a, .. }, ThrottleTarget::Type { id: b, .. }) => a == b,
            (ThrottleTarget::Key(a), ThrottleTarget::Key(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ThrottleTarget {}

impl Hash for ThrottleTarget {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ThrottleTarget::Callable { id, .. } | ThrottleTarget::Type { id, .. } => id.hash(state),
            ThrottleTarget::Key(key) => key.hash(state),
        }
    }
}

impl fmt::Display for ThrottleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_key())
    }
}

impl From<&str> for ThrottleTarget {
    fn from(key: &str) -> Self {
        ThrottleTarget::Key(key.to_string())
    }
}

impl From<String> for ThrottleTarget {
    fn from(key: String) -> Self {
        ThrottleTarget::Key(key)
    }
}

impl From<u64> for ThrottleTarget {
    fn from(id: u64) -> Self {
        ThrottleTarget::Key(id.to_string())
    }
}
