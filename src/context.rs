//! Execution context of tests and lifecycle callbacks.

use std::fmt;
use std::thread::JoinHandle;

use crate::error::HarnessResult;
use crate::key::Key;
use crate::provider::{ScopeStrategy, ServiceProvider};
use crate::registration::AnyArc;
use crate::test_scope::{ScopeHandle, ScopeId};
use crate::traits::ResolverCore;

/// Object graph plus the test scope a piece of test code runs in.
///
/// Lifecycle callbacks and test bodies receive a `TestContext`; resolving
/// through it reaches test-scoped bindings of the running test. The context
/// is the only way the scope travels: a thread started by the test sees the
/// scope only when it is handed a [`fork`](Self::fork) of the context or is
/// started through [`spawn`](Self::spawn).
///
/// # Examples
///
/// ```rust
/// use ferrous_testkit::{Harness, ModuleSpec, Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// struct RequestId(u64);
///
/// let harness = Harness::for_module(ModuleSpec::configure(|services: &mut ServiceCollection| {
///     services.add_test_scoped_factory::<RequestId, _>(|_| Ok(RequestId(7)));
///     Ok(())
/// }));
///
/// harness
///     .run(&mut (), |_, ctx| {
///         let mine = ctx.get::<RequestId>()?;
///         let theirs = ctx.spawn(|child| child.get::<RequestId>()).join().unwrap()?;
///         assert!(Arc::ptr_eq(&mine, &theirs));
///         Ok::<_, ferrous_testkit::HarnessError>(())
///     })
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct TestContext {
    provider: ServiceProvider,
    scope: Option<ScopeHandle>,
}

impl TestContext {
    /// Creates a context over `provider`, inside `scope` if one is given.
    pub fn new(provider: ServiceProvider, scope: Option<ScopeHandle>) -> Self {
        Self { provider, scope }
    }

    /// The object graph of the running environment.
    pub fn provider(&self) -> &ServiceProvider {
        &self.provider
    }

    /// The scope this context resolves test-scoped bindings in.
    pub fn scope(&self) -> Option<&ScopeHandle> {
        self.scope.as_ref()
    }

    /// Identifier of the scope entry, if any.
    pub fn scope_id(&self) -> Option<ScopeId> {
        self.scope.as_ref().map(ScopeHandle::id)
    }

    /// A context for a child execution that shares this context's scope.
    pub fn fork(&self) -> TestContext {
        self.clone()
    }

    /// Runs `f` on a new thread with a fork of this context.
    pub fn spawn<F, R>(&self, f: F) -> JoinHandle<R>
    where
        F: FnOnce(TestContext) -> R + Send + 'static,
        R: Send + 'static,
    {
        let child = self.fork();
        std::thread::spawn(move || f(child))
    }
}

impl ResolverCore for TestContext {
    fn resolve_any(&self, key: &Key) -> HarnessResult<Option<AnyArc>> {
        let scope = self.scope.as_ref().map(|handle| handle as &dyn ScopeStrategy);
        self.provider.resolve_in(key, scope)
    }
}

impl fmt::Debug for TestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestContext")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
