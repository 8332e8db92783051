//! Testing services and their lifecycle callbacks.
//!
//! A testing service declares its callbacks once, in
//! [`TestingService::lifecycle`], by filling a [`LifecycleHooks`] table. The
//! table is compiled when the service is registered into an environment and
//! dispatched by a [`ServiceManager`] at every phase boundary; nothing is
//! looked up by name or signature at call time.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::context::TestContext;
use crate::dependencies::DependencyNode;
use crate::error::{CallbackResult, HarnessError, HarnessResult, IntoCallbackResult};
use crate::key::ServiceType;
use crate::registration::AnyArc;

/// Lifecycle phase a callback is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Runs once per cached environment, before its first test.
    BeforeSuite,
    /// Runs before every test, in execution order.
    BeforeTest,
    /// Runs after every test, in reverse execution order.
    AfterTest,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::BeforeSuite => "before-suite",
            Phase::BeforeTest => "before-test",
            Phase::AfterTest => "after-test",
        })
    }
}

/// A service taking part in the test lifecycle.
///
/// All items have defaults, so a plain marker implementation is a valid
/// service with no callbacks and no dependencies.
///
/// # Examples
///
/// ```
/// use ferrous_testkit::{LifecycleHooks, ServiceManager, ServiceType, TestingService};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Database {
///     migrations: AtomicUsize,
/// }
///
/// #[derive(Default)]
/// struct Fixtures;
///
/// impl Database {
///     fn migrate(&self) {
///         self.migrations.fetch_add(1, Ordering::SeqCst);
///     }
/// }
///
/// impl TestingService for Database {
///     fn lifecycle(hooks: &mut LifecycleHooks<Self>) {
///         hooks.before_suite("migrate", |db, _| db.migrate());
///     }
/// }
///
/// impl TestingService for Fixtures {
///     fn depends_on() -> Vec<ServiceType> {
///         vec![ServiceType::of::<Database>()]
///     }
/// }
///
/// let manager = ServiceManager::new(Arc::new(Database::default()));
/// assert_eq!(manager.callbacks(ferrous_testkit::Phase::BeforeSuite), vec!["migrate"]);
/// ```
pub trait TestingService: Send + Sync + 'static {
    /// Registers this service's lifecycle callbacks.
    fn lifecycle(hooks: &mut LifecycleHooks<Self>)
    where
        Self: Sized,
    {
        let _ = hooks;
    }

    /// Service types whose registered instances must run before this one.
    ///
    /// A type with no registered instance contributes no ordering constraint.
    fn depends_on() -> Vec<ServiceType>
    where
        Self: Sized,
    {
        Vec::new()
    }

    /// Additional service types this service satisfies when other services
    /// declare dependencies.
    fn provides() -> Vec<ServiceType>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

type HookFn<S> = Arc<dyn Fn(&S, &TestContext) -> CallbackResult + Send + Sync>;

struct Hook<S> {
    phase: Phase,
    name: &'static str,
    run: HookFn<S>,
}

/// Dispatch table of a testing service's lifecycle callbacks.
///
/// Callbacks take the service by reference and the [`TestContext`] of the
/// running phase, and return `()` or `Result<(), E>`. Within one phase they
/// run in registration order, followed by the callbacks included with
/// [`inherit`](Self::inherit).
pub struct LifecycleHooks<S> {
    own: Vec<Hook<S>>,
    inherited: Vec<Hook<S>>,
}

impl<S: 'static> LifecycleHooks<S> {
    pub(crate) fn new() -> Self {
        Self {
            own: Vec::new(),
            inherited: Vec::new(),
        }
    }

    /// Adds a callback run once per environment, before the first test.
    pub fn before_suite<F, R>(&mut self, name: &'static str, callback: F) -> &mut Self
    where
        F: Fn(&S, &TestContext) -> R + Send + Sync + 'static,
        R: IntoCallbackResult,
    {
        self.on(Phase::BeforeSuite, name, callback)
    }

    /// Adds a callback run before every test.
    pub fn before_test<F, R>(&mut self, name: &'static str, callback: F) -> &mut Self
    where
        F: Fn(&S, &TestContext) -> R + Send + Sync + 'static,
        R: IntoCallbackResult,
    {
        self.on(Phase::BeforeTest, name, callback)
    }

    /// Adds a callback run after every test, whatever the test's outcome.
    pub fn after_test<F, R>(&mut self, name: &'static str, callback: F) -> &mut Self
    where
        F: Fn(&S, &TestContext) -> R + Send + Sync + 'static,
        R: IntoCallbackResult,
    {
        self.on(Phase::AfterTest, name, callback)
    }

    /// Adds a callback for `phase`.
    pub fn on<F, R>(&mut self, phase: Phase, name: &'static str, callback: F) -> &mut Self
    where
        F: Fn(&S, &TestContext) -> R + Send + Sync + 'static,
        R: IntoCallbackResult,
    {
        self.own.push(Hook {
            phase,
            name,
            run: Arc::new(move |service, ctx| callback(service, ctx).into_callback_result()),
        });
        self
    }

    /// Includes the callbacks of an embedded service `B`.
    ///
    /// The embedded service's callbacks run after this service's own
    /// callbacks of the same phase, against the value returned by `project`.
    pub fn inherit<B: TestingService>(&mut self, project: fn(&S) -> &B) -> &mut Self {
        let mut base = LifecycleHooks::<B>::new();
        B::lifecycle(&mut base);
        for hook in base.into_ordered() {
            let run = hook.run;
            self.inherited.push(Hook {
                phase: hook.phase,
                name: hook.name,
                run: Arc::new(move |service: &S, ctx: &TestContext| run(project(service), ctx)),
            });
        }
        self
    }

    /// Number of registered callbacks, inherited ones included.
    pub fn len(&self) -> usize {
        self.own.len() + self.inherited.len()
    }

    /// Returns true if no callback is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn into_ordered(self) -> impl Iterator<Item = Hook<S>> {
        self.own.into_iter().chain(self.inherited)
    }
}

struct ErasedHook {
    phase: Phase,
    name: &'static str,
    run: Box<dyn Fn(&TestContext) -> CallbackResult + Send + Sync>,
}

/// Runs the lifecycle callbacks of one testing service instance.
///
/// Identity is the instance: two managers built from two instances of the
/// same type are distinct vertices in the dependency graph.
pub struct ServiceManager {
    name: &'static str,
    service_types: Vec<ServiceType>,
    dependencies: Vec<ServiceType>,
    hooks: Vec<ErasedHook>,
    instance: AnyArc,
}

impl ServiceManager {
    /// Compiles the callback table of `service`.
    pub fn new<S: TestingService>(service: Arc<S>) -> Self {
        let mut hooks = LifecycleHooks::<S>::new();
        S::lifecycle(&mut hooks);

        let mut service_types = vec![ServiceType::of::<S>()];
        service_types.extend(S::provides());

        let hooks = hooks
            .into_ordered()
            .map(|hook| {
                let service = Arc::clone(&service);
                let run = hook.run;
                ErasedHook {
                    phase: hook.phase,
                    name: hook.name,
                    run: Box::new(move |ctx: &TestContext| run(&service, ctx)),
                }
            })
            .collect();

        Self {
            name: std::any::type_name::<S>(),
            service_types,
            dependencies: S::depends_on(),
            hooks,
            instance: service,
        }
    }

    /// Type name of the managed service.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The managed instance, if it is an `S`.
    pub fn downcast<S: Any + Send + Sync>(&self) -> Option<Arc<S>> {
        Arc::clone(&self.instance).downcast::<S>().ok()
    }

    /// Names of the callbacks registered for `phase`, in invocation order.
    pub fn callbacks(&self, phase: Phase) -> Vec<&'static str> {
        self.hooks
            .iter()
            .filter(|hook| hook.phase == phase)
            .map(|hook| hook.name)
            .collect()
    }

    /// Runs all before-suite callbacks.
    pub fn before_suite(&self, ctx: &TestContext) -> HarnessResult<()> {
        self.run_phase(Phase::BeforeSuite, ctx)
    }

    /// Runs all before-test callbacks.
    pub fn before_test(&self, ctx: &TestContext) -> HarnessResult<()> {
        self.run_phase(Phase::BeforeTest, ctx)
    }

    /// Runs all after-test callbacks.
    pub fn after_test(&self, ctx: &TestContext) -> HarnessResult<()> {
        self.run_phase(Phase::AfterTest, ctx)
    }

    /// Runs the callbacks of `phase`, stopping at the first failure.
    pub fn run_phase(&self, phase: Phase, ctx: &TestContext) -> HarnessResult<()> {
        for hook in self.hooks.iter().filter(|hook| hook.phase == phase) {
            (hook.run)(ctx).map_err(|source| HarnessError::Callback {
                service: self.name,
                phase,
                callback: hook.name,
                source,
            })?;
        }
        Ok(())
    }
}

impl DependencyNode for ServiceManager {
    fn name(&self) -> &'static str {
        self.name
    }

    fn service_types(&self) -> &[ServiceType] {
        &self.service_types
    }

    fn dependencies(&self) -> &[ServiceType] {
        &self.dependencies
    }
}

impl fmt::Debug for ServiceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceManager")
            .field("name", &self.name)
            .field("service_types", &self.service_types)
            .field("dependencies", &self.dependencies)
            .field("callbacks", &self.hooks.len())
            .finish()
    }
}
