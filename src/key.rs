//! Binding keys and service type identifiers.

use std::any::TypeId;
use std::fmt;

/// Key for binding storage, lookup and test-scope memoization.
///
/// Keys identify bindings in the object graph, supporting both unnamed and
/// named registrations. The same key type identifies entries inside a test
/// scope, so a test-scoped binding is memoized per key.
///
/// # Examples
///
/// ```rust
/// use ferrous_testkit::{Key, key_of_type, named_key_of_type};
///
/// let plain = key_of_type::<String>();
/// let named = named_key_of_type::<String>("greeting");
///
/// assert_ne!(plain, named);
/// assert_eq!(plain.display_name(), "alloc::string::String");
/// assert_eq!(named.qualifier(), Some("greeting"));
/// ```
#[derive(Debug, Clone, Copy)]
pub enum Key {
    /// Concrete type key with TypeId and name for diagnostics
    Type(TypeId, &'static str),
    /// Named concrete type key with TypeId, type name and qualifier
    ///
    /// Used when several values of the same type need distinct bindings.
    Named(TypeId, &'static str, &'static str),
}

impl Key {
    /// Get the type name for display
    pub fn display_name(&self) -> &'static str {
        match self {
            Key::Type(_, name) => name,
            Key::Named(_, name, _) => name,
        }
    }

    /// Get the qualifier for named keys, or None for unnamed keys
    pub fn qualifier(&self) -> Option<&'static str> {
        match self {
            Key::Type(_, _) => None,
            Key::Named(_, _, qualifier) => Some(qualifier),
        }
    }
}

// TypeId-only comparison; the name is for diagnostics
impl PartialEq for Key {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Type(a, _), Key::Type(b, _)) => a == b,
            (Key::Named(a, _, qa), Key::Named(b, _, qb)) => a == b && qa == qb,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl std::hash::Hash for Key {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Key::Type(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            Key::Named(id, _, qualifier) => {
                1u8.hash(state);
                id.hash(state);
                qualifier.hash(state);
            }
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Type(_, name) => write!(f, "Key[type={}]", name),
            Key::Named(_, name, qualifier) => {
                write!(f, "Key[type={}, name={}]", name, qualifier)
            }
        }
    }
}

/// Creates the unnamed key for `T`.
#[inline]
pub fn key_of_type<T: ?Sized + 'static>() -> Key {
    Key::Type(TypeId::of::<T>(), std::any::type_name::<T>())
}

/// Creates the key for `T` qualified by `name`.
#[inline]
pub fn named_key_of_type<T: ?Sized + 'static>(name: &'static str) -> Key {
    Key::Named(TypeId::of::<T>(), std::any::type_name::<T>(), name)
}

/// Stable identifier of a testing service type.
///
/// Dependency edges between testing services are declared against
/// `ServiceType`s and resolved once, when an environment is built, against
/// every registered service whose own type (or one of its
/// [`provides`](crate::TestingService::provides) types) matches.
#[derive(Debug, Clone, Copy)]
pub struct ServiceType {
    id: TypeId,
    name: &'static str,
}

impl ServiceType {
    /// Identifier for `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Type name for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ServiceType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceType {}

impl std::hash::Hash for ServiceType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
