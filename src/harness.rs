//! The per-test execution envelope.
//!
//! [`Harness::wrap`] turns a test body into a [`WrappedTest`] whose
//! evaluation runs, in order: environment lookup, one-time suite setup,
//! scope entry, before-test callbacks, subject injection, the body, and then
//! unconditionally the after-test callbacks and scope exit.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::collection::{ModuleSpec, ServiceModule};
use crate::config::HarnessOptions;
use crate::context::TestContext;
use crate::environment::TestEnvironment;
use crate::error::{HarnessError, HarnessResult, IntoCallbackResult};
use crate::registry::EnvironmentRegistry;
use crate::test_scope::TestScope;

/// A test subject whose dependencies are populated before the body runs.
///
/// Injection happens after the before-test callbacks, inside the test scope,
/// so test-scoped bindings resolve to the instances of the running test.
///
/// # Examples
///
/// ```rust
/// use ferrous_testkit::{HarnessResult, Resolver, TestContext, TestSubject};
/// use std::sync::Arc;
///
/// struct Client;
///
/// #[derive(Default)]
/// struct CheckoutTest {
///     client: Option<Arc<Client>>,
/// }
///
/// impl TestSubject for CheckoutTest {
///     fn inject(&mut self, ctx: &TestContext) -> HarnessResult<()> {
///         self.client = Some(ctx.get::<Client>()?);
///         Ok(())
///     }
/// }
/// ```
pub trait TestSubject {
    /// Populates this subject from the running test's context.
    fn inject(&mut self, ctx: &TestContext) -> HarnessResult<()>;
}

impl TestSubject for () {
    fn inject(&mut self, _ctx: &TestContext) -> HarnessResult<()> {
        Ok(())
    }
}

#[derive(Clone)]
enum RegistryRef {
    Process,
    Shared(Arc<EnvironmentRegistry>),
}

impl RegistryRef {
    fn get(&self) -> &EnvironmentRegistry {
        match self {
            RegistryRef::Process => EnvironmentRegistry::process(),
            RegistryRef::Shared(registry) => registry,
        }
    }
}

/// Entry point running tests against a cached environment.
///
/// # Environment registry
///
/// Unless [`with_registry`](Self::with_registry) is called, environments are
/// cached in [`EnvironmentRegistry::process`], a process-wide registry that
/// lives until the process exits. Every harness of the same configuration
/// then shares one environment and one suite setup, which is what tests of a
/// suite normally want. Tests that need a fresh environment, or that inspect
/// the registry, pass their own:
///
/// ```rust
/// use ferrous_testkit::{EnvironmentRegistry, Harness, ModuleSpec, ServiceCollection};
/// use std::sync::Arc;
///
/// let registry = Arc::new(EnvironmentRegistry::new());
/// let harness = Harness::for_module(ModuleSpec::configure(|services: &mut ServiceCollection| {
///     services.add_singleton(42u32);
///     Ok(())
/// }))
/// .with_registry(registry.clone());
///
/// harness.run(&mut (), |_, _| {}).unwrap();
/// assert_eq!(registry.len(), 1);
/// ```
///
/// # Examples
///
/// ```rust
/// use ferrous_testkit::{
///     Harness, HarnessResult, LifecycleHooks, ServiceCollection, ServiceModule, TestingService,
/// };
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct Counter {
///     tests: AtomicUsize,
/// }
///
/// impl TestingService for Counter {
///     fn lifecycle(hooks: &mut LifecycleHooks<Self>) {
///         hooks.before_test("count", |counter, _| {
///             counter.tests.fetch_add(1, Ordering::SeqCst);
///         });
///     }
/// }
///
/// #[derive(Default)]
/// struct CounterModule;
///
/// impl ServiceModule for CounterModule {
///     fn register_services(&self, services: &mut ServiceCollection) -> HarnessResult<()> {
///         services.add_testing_service_default::<Counter>();
///         Ok(())
///     }
/// }
///
/// let harness = Harness::new::<CounterModule>();
/// harness.run(&mut (), |_, _| {}).unwrap();
/// harness.run(&mut (), |_, _| {}).unwrap();
///
/// let env = harness.environment().unwrap();
/// assert!(env.before_suite_has_run());
/// ```
#[derive(Clone)]
pub struct Harness {
    module: ModuleSpec,
    registry: RegistryRef,
    options: HarnessOptions,
}

impl Harness {
    /// Harness for module `M`, built with `M::default()`.
    ///
    /// The environment is cached in the process-wide
    /// [`EnvironmentRegistry::process`] and shared with every other harness
    /// of `M`; use [`with_registry`](Self::with_registry) to cache it
    /// elsewhere.
    pub fn new<M: ServiceModule + Default>() -> Self {
        Self::for_module(ModuleSpec::of::<M>())
    }

    /// Harness for an explicit configuration.
    ///
    /// Like [`new`](Self::new), the environment is cached in the
    /// process-wide [`EnvironmentRegistry::process`] unless
    /// [`with_registry`](Self::with_registry) is called.
    pub fn for_module(module: ModuleSpec) -> Self {
        Self {
            module,
            registry: RegistryRef::Process,
            options: HarnessOptions::default(),
        }
    }

    /// Caches environments in `registry` instead of the process-wide one.
    pub fn with_registry(mut self, registry: Arc<EnvironmentRegistry>) -> Self {
        self.registry = RegistryRef::Shared(registry);
        self
    }

    /// Options used when this harness builds the environment.
    pub fn with_options(mut self, options: HarnessOptions) -> Self {
        self.options = options;
        self
    }

    /// The configuration this harness runs against.
    pub fn module(&self) -> &ModuleSpec {
        &self.module
    }

    /// Returns the cached environment, building it on first use.
    ///
    /// Does not run the suite setup.
    pub fn environment(&self) -> HarnessResult<Arc<TestEnvironment>> {
        self.registry.get().get_or_create(&self.module, &self.options)
    }

    /// Wraps `body` for execution against `subject`.
    ///
    /// The body returns `()` or `Result<(), E>`; an error becomes
    /// [`HarnessError::TestFailed`] with the original error as its source.
    pub fn wrap<'h, S, F, R>(&'h self, subject: &'h mut S, body: F) -> WrappedTest<'h, S, F>
    where
        S: TestSubject,
        F: FnOnce(&mut S, &TestContext) -> R,
        R: IntoCallbackResult,
    {
        WrappedTest {
            harness: self,
            subject,
            body,
        }
    }

    /// Wraps and immediately evaluates `body`.
    pub fn run<S, F, R>(&self, subject: &mut S, body: F) -> HarnessResult<()>
    where
        S: TestSubject,
        F: FnOnce(&mut S, &TestContext) -> R,
        R: IntoCallbackResult,
    {
        self.wrap(subject, body).evaluate()
    }
}

impl fmt::Debug for Harness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harness")
            .field("module", &self.module.key())
            .field("options", &self.options)
            .finish()
    }
}

/// A test body bound to its harness and subject, ready to run.
pub struct WrappedTest<'h, S, F> {
    harness: &'h Harness,
    subject: &'h mut S,
    body: F,
}

impl<'h, S, F, R> WrappedTest<'h, S, F>
where
    S: TestSubject,
    F: FnOnce(&mut S, &TestContext) -> R,
    R: IntoCallbackResult,
{
    /// Runs the test.
    ///
    /// Failures of environment construction or suite setup abort before the
    /// scope is entered. Once entered, the after-test callbacks and the scope
    /// exit always run. When both the test and its teardown fail, the test's
    /// failure is returned and the teardown failure is logged. A panic in the
    /// body resumes after cleanup with its original payload.
    pub fn evaluate(self) -> HarnessResult<()> {
        let WrappedTest {
            harness,
            subject,
            body,
        } = self;

        let env = harness.environment()?;
        env.before_suite_if_not_already_run()?;

        let scope = TestScope::new();
        let handle = scope.enter()?;
        let scope_id = handle.id();
        let observers = env.provider().observers();
        observers.scope_entered(scope_id);
        tracing::trace!(module = %env.module(), scope = %scope_id, "running test");

        let ctx = env.context(Some(handle));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> HarnessResult<()> {
            env.before_test(&ctx)?;
            subject.inject(&ctx)?;
            body(subject, &ctx)
                .into_callback_result()
                .map_err(HarnessError::TestFailed)
        }));
        let teardown = panic::catch_unwind(AssertUnwindSafe(|| env.after_test(&ctx)));

        let exited = scope.exit();
        observers.scope_exited(scope_id);

        match outcome {
            Err(payload) => {
                if let Ok(Err(err)) = &teardown {
                    env.suppress(err);
                }
                panic::resume_unwind(payload)
            }
            Ok(Err(err)) => {
                match teardown {
                    Ok(Err(teardown_err)) => env.suppress(&teardown_err),
                    Err(_) => tracing::warn!(scope = %scope_id, "teardown panicked after a test failure"),
                    Ok(Ok(())) => {}
                }
                Err(err)
            }
            Ok(Ok(())) => match teardown {
                Err(payload) => panic::resume_unwind(payload),
                Ok(result) => result.and(exited),
            },
        }
    }
}
