//! Binding registration types.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::HarnessResult;
use crate::key::Key;
use crate::lifecycle::ServiceManager;
use crate::lifetime::Lifetime;
use crate::provider::ResolverContext;

/// Type-erased Arc for storage
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Type-erased constructor. `Ok(None)` is an explicitly absent value.
pub(crate) type Ctor =
    Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> HarnessResult<Option<AnyArc>> + Send + Sync>;

/// Constructor of one member of the testing-service multi-binding.
pub(crate) type TestingCtor =
    Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> HarnessResult<ServiceManager> + Send + Sync>;

/// Binding registration with lifetime and constructor
pub(crate) struct Registration {
    pub(crate) lifetime: Lifetime,
    pub(crate) ctor: Ctor,
    /// Singleton cache; a failed construction leaves it empty
    pub(crate) singleton: Option<OnceCell<Option<AnyArc>>>,
}

impl Registration {
    pub(crate) fn new(lifetime: Lifetime, ctor: Ctor) -> Self {
        let singleton = match lifetime {
            Lifetime::Singleton => Some(OnceCell::new()),
            _ => None,
        };
        Self {
            lifetime,
            ctor,
            singleton,
        }
    }
}

/// One member of the testing-service multi-binding
pub(crate) struct TestingRegistration {
    pub(crate) type_name: &'static str,
    pub(crate) ctor: TestingCtor,
}

/// Binding registry holding all registrations
#[derive(Default)]
pub(crate) struct Registry {
    /// Single bindings; re-registering a key replaces the earlier binding
    pub(crate) one: HashMap<Key, Registration>,
    /// Testing-service multi-binding (append-only, registration order)
    pub(crate) testing: Vec<TestingRegistration>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, key: Key, registration: Registration) {
        self.one.insert(key, registration);
    }

    #[inline]
    pub(crate) fn get(&self, key: &Key) -> Option<&Registration> {
        self.one.get(key)
    }

    pub(crate) fn contains_key(&self, key: &Key) -> bool {
        self.one.contains_key(key)
    }

    pub(crate) fn push_testing(&mut self, registration: TestingRegistration) {
        self.testing.push(registration);
    }
}
