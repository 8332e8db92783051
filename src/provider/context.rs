//! Resolver context for binding factories.
//!
//! This module contains the ResolverContext type which provides
//! the interface for factory functions to resolve dependencies.

use super::{ScopeStrategy, ServiceProvider};
use crate::error::HarnessResult;
use crate::key::Key;
use crate::registration::AnyArc;
use crate::traits::ResolverCore;

/// Context passed to factory functions for resolving dependencies.
///
/// A `ResolverContext` carries the object graph together with the scope
/// strategy of the resolution that triggered the factory, so a test-scoped
/// factory can depend on other test-scoped bindings of the same test.
///
/// # Examples
///
/// ```
/// use ferrous_testkit::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserRepository { db: Arc<Database> }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Database {
///     url: "postgres://localhost".to_string()
/// });
/// services.add_transient_factory::<UserRepository, _>(|resolver| {
///     // resolver is a ResolverContext that provides access to other bindings
///     Ok(UserRepository {
///         db: resolver.get::<Database>()?,
///     })
/// });
///
/// let provider = services.build();
/// assert_eq!(provider.get_required::<UserRepository>().db.url, "postgres://localhost");
/// ```
pub struct ResolverContext<'a> {
    provider: &'a ServiceProvider,
    scope: Option<&'a dyn ScopeStrategy>,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(provider: &'a ServiceProvider, scope: Option<&'a dyn ScopeStrategy>) -> Self {
        Self { provider, scope }
    }

    /// The object graph this factory runs against.
    pub fn provider(&self) -> &ServiceProvider {
        self.provider
    }

    /// Returns true when test-scoped bindings can be resolved from this context.
    pub fn in_scope(&self) -> bool {
        self.scope.is_some()
    }
}

impl<'a> ResolverCore for ResolverContext<'a> {
    fn resolve_any(&self, key: &Key) -> HarnessResult<Option<AnyArc>> {
        self.provider.resolve_in(key, self.scope)
    }
}
