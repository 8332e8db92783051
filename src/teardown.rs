//! Per-test teardown closures.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::TestContext;
use crate::error::{CallbackResult, HarnessError, HarnessResult, IntoCallbackResult};
use crate::internal::{TearDown, TearDownStack};
use crate::key::key_of_type;
use crate::lifecycle::{LifecycleHooks, TestingService};
use crate::ServiceCollection;

/// Testing service running cleanup closures registered by tests.
///
/// Closures are kept in the scope of the test that registered them and run
/// in reverse registration order in that test's after-test phase. All of them
/// run; the first failure fails the teardown. Registering after that phase
/// ran, for example from the after-test callback of a service ordered later,
/// is rejected rather than silently dropped.
///
/// # Examples
///
/// ```rust
/// use ferrous_testkit::{Harness, ModuleSpec, Resolver, ServiceCollection, TearDownService};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let cleaned = Arc::new(AtomicBool::new(false));
/// let harness = Harness::for_module(ModuleSpec::configure(|services: &mut ServiceCollection| {
///     services.add_tear_down_support();
///     Ok(())
/// }));
///
/// let flag = cleaned.clone();
/// harness
///     .run(&mut (), move |_, ctx| {
///         ctx.get::<TearDownService>()?
///             .add_tear_down(ctx, move || flag.store(true, Ordering::SeqCst))
///     })
///     .unwrap();
/// assert!(cleaned.load(Ordering::SeqCst));
/// ```
#[derive(Debug, Default)]
pub struct TearDownService {
    _private: (),
}

/// Closures of one test, stored in that test's scope so they are discarded
/// with it. `None` once the after-test phase took them.
struct ScopeTearDowns(Mutex<Option<TearDownStack>>);

impl TearDownService {
    /// Registers `tear_down` to run after the test owning `ctx`.
    ///
    /// # Errors
    ///
    /// [`HarnessError::OutOfScope`] if `ctx` is not inside a test, and
    /// [`HarnessError::IllegalState`] if the closures of that test already
    /// ran.
    pub fn add_tear_down<F, R>(&self, ctx: &TestContext, tear_down: F) -> HarnessResult<()>
    where
        F: FnOnce() -> R + Send + 'static,
        R: IntoCallbackResult,
    {
        let tear_downs = Self::tear_downs(ctx)?;
        let mut guard = tear_downs.0.lock();
        let Some(stack) = guard.as_mut() else {
            return Err(HarnessError::IllegalState(
                "tear downs of this test already ran",
            ));
        };
        let tear_down: TearDown = Box::new(move || tear_down().into_callback_result());
        stack.push(tear_down);
        Ok(())
    }

    /// Number of closures waiting for the test owning `ctx`.
    pub fn pending(&self, ctx: &TestContext) -> usize {
        Self::tear_downs(ctx)
            .ok()
            .and_then(|tear_downs| tear_downs.0.lock().as_ref().map(TearDownStack::len))
            .unwrap_or(0)
    }

    fn tear_downs(ctx: &TestContext) -> HarnessResult<Arc<ScopeTearDowns>> {
        let handle = ctx.scope().ok_or_else(|| {
            HarnessError::OutOfScope(std::any::type_name::<TearDownService>().to_string())
        })?;
        handle.get_or_create(&key_of_type::<ScopeTearDowns>(), || {
            Ok(ScopeTearDowns(Mutex::new(Some(TearDownStack::default()))))
        })
    }

    fn run_tear_downs(&self, ctx: &TestContext) -> CallbackResult {
        if ctx.scope().is_none() {
            return Ok(());
        }
        // Taken out first so closures can run without the lock; later
        // registrations see the drained state
        let stack = Self::tear_downs(ctx)?.0.lock().take();
        match stack {
            Some(mut stack) => stack.run_all_reverse(),
            None => Ok(()),
        }
    }
}

impl TestingService for TearDownService {
    fn lifecycle(hooks: &mut LifecycleHooks<Self>) {
        hooks.after_test("run_tear_downs", |service, ctx| service.run_tear_downs(ctx));
    }
}

impl ServiceCollection {
    /// Adds a [`TearDownService`] to the testing services.
    pub fn add_tear_down_support(&mut self) -> &mut Self {
        self.add_testing_service(TearDownService::default())
    }
}
