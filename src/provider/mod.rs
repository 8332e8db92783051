//! Service provider module: the realized object graph.
//!
//! This module contains the ServiceProvider type and related functionality
//! for resolving registered bindings and the testing-service multi-binding.

use std::sync::Arc;

use crate::error::{HarnessError, HarnessResult};
use crate::internal::with_circular_check;
use crate::key::Key;
use crate::lifecycle::ServiceManager;
use crate::lifetime::Lifetime;
use crate::observer::Observers;
use crate::registration::{AnyArc, Registration, Registry};
use crate::traits::ResolverCore;

pub mod context;
pub mod scope;

pub use context::ResolverContext;
pub use scope::ScopeStrategy;

/// Realized object graph of one configuration.
///
/// The `ServiceProvider` resolves bindings according to their lifetimes and
/// materializes the testing-service multi-binding. It is cheap to clone and
/// fully thread-safe: singletons are constructed at most once, even when
/// several threads request them concurrently.
///
/// Resolving directly from the provider happens outside any test scope, so
/// [`Lifetime::TestScoped`] bindings fail with
/// [`HarnessError::OutOfScope`]; inside a test use the
/// [`TestContext`](crate::TestContext) handed to the test body instead.
///
/// # Examples
///
/// ```
/// use ferrous_testkit::{ServiceCollection, Resolver, HarnessError};
///
/// struct Session;
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(42usize);
/// services.add_test_scoped_factory::<Session, _>(|_| Ok(Session));
///
/// let provider = services.build();
/// assert_eq!(*provider.get_required::<usize>(), 42);
/// assert!(matches!(provider.get::<Session>(), Err(HarnessError::OutOfScope(_))));
/// ```
#[derive(Clone)]
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
}

pub(crate) struct ProviderInner {
    pub(crate) registry: Registry,
    pub(crate) observers: Observers,
}

impl ServiceProvider {
    pub(crate) fn new(registry: Registry, observers: Observers) -> Self {
        Self {
            inner: Arc::new(ProviderInner { registry, observers }),
        }
    }

    #[inline]
    pub(crate) fn inner(&self) -> &ProviderInner {
        &self.inner
    }

    pub(crate) fn observers(&self) -> &Observers {
        &self.inner.observers
    }

    /// Number of members in the testing-service multi-binding.
    pub fn testing_service_count(&self) -> usize {
        self.inner.registry.testing.len()
    }

    /// Returns true if a single binding exists for `key`.
    pub fn contains(&self, key: &Key) -> bool {
        self.inner.registry.contains_key(key)
    }

    /// Materializes the testing-service multi-binding in registration order.
    ///
    /// Runs outside any test scope: a testing service whose construction
    /// needs a test-scoped value fails with [`HarnessError::OutOfScope`].
    pub fn testing_services(&self) -> HarnessResult<Vec<ServiceManager>> {
        let ctx = ResolverContext::new(self, None);
        self.inner
            .registry
            .testing
            .iter()
            .map(|registration| {
                tracing::trace!(service = registration.type_name, "constructing testing service");
                (registration.ctor)(&ctx)
            })
            .collect()
    }

    /// Resolves `key` under the given scope strategy.
    pub(crate) fn resolve_in(
        &self,
        key: &Key,
        scope: Option<&dyn ScopeStrategy>,
    ) -> HarnessResult<Option<AnyArc>> {
        with_circular_check(key, || self.resolve_impl(key, scope))
    }

    fn resolve_impl(&self, key: &Key, scope: Option<&dyn ScopeStrategy>) -> HarnessResult<Option<AnyArc>> {
        let reg = self
            .inner
            .registry
            .get(key)
            .ok_or(HarnessError::NotFound(key.display_name()))?;

        match reg.lifetime {
            Lifetime::Singleton => self.resolve_singleton(reg),
            Lifetime::TestScoped => {
                let scope = scope.ok_or_else(|| HarnessError::OutOfScope(key.to_string()))?;
                // Scoped factories resolve their own dependencies in the same scope
                let ctx = ResolverContext::new(self, Some(scope));
                scope.scope(key, &mut || (reg.ctor)(&ctx))
            }
            Lifetime::Transient => {
                let ctx = ResolverContext::new(self, scope);
                (reg.ctor)(&ctx)
            }
        }
    }

    fn resolve_singleton(&self, reg: &Registration) -> HarnessResult<Option<AnyArc>> {
        let Some(cell) = &reg.singleton else {
            let ctx = ResolverContext::new(self, None);
            return (reg.ctor)(&ctx);
        };

        // Fast path: already initialized
        if let Some(value) = cell.get() {
            return Ok(value.clone());
        }

        // Singletons never see the test scope, whoever triggers them first
        let ctx = ResolverContext::new(self, None);
        cell.get_or_try_init(|| (reg.ctor)(&ctx)).cloned()
    }
}

impl ResolverCore for ServiceProvider {
    fn resolve_any(&self, key: &Key) -> HarnessResult<Option<AnyArc>> {
        self.resolve_in(key, None)
    }
}
