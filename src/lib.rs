//! # ferrous-testkit
//!
//! Test-lifecycle orchestration for Rust: dependency-ordered testing
//! services, one-time suite setup and per-test scoped values.
//!
//! ## Features
//!
//! - **Ordered testing services**: services declare the service types they
//!   depend on and run their callbacks in dependency order, teardown in reverse
//! - **One-time suite setup**: environments are cached per configuration and
//!   their before-suite callbacks run exactly once, also under parallel tests
//! - **Test-scoped values**: one instance per test, shared with the threads
//!   the test spawns through its context, invalid once the test ends
//! - **Guaranteed cleanup**: after-test callbacks and scope exit run whatever
//!   the outcome of the test; the test's own failure is never masked
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_testkit::{
//!     Harness, HarnessResult, LifecycleHooks, Resolver, ServiceCollection, ServiceModule,
//!     ServiceType, TestingService,
//! };
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Database {
//!     migrated: AtomicBool,
//! }
//!
//! impl TestingService for Database {
//!     fn lifecycle(hooks: &mut LifecycleHooks<Self>) {
//!         hooks.before_suite("migrate", |db, _| db.migrated.store(true, Ordering::SeqCst));
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Fixtures;
//!
//! impl TestingService for Fixtures {
//!     fn depends_on() -> Vec<ServiceType> {
//!         vec![ServiceType::of::<Database>()]
//!     }
//! }
//!
//! struct Session {
//!     user: String,
//! }
//!
//! #[derive(Default)]
//! struct AppModule;
//!
//! impl ServiceModule for AppModule {
//!     fn register_services(&self, services: &mut ServiceCollection) -> HarnessResult<()> {
//!         services
//!             .add_testing_service_default::<Fixtures>()
//!             .add_testing_service_default::<Database>()
//!             .add_test_scoped_factory::<Session, _>(|_| Ok(Session { user: "alice".into() }));
//!         Ok(())
//!     }
//! }
//!
//! let harness = Harness::new::<AppModule>();
//! harness
//!     .run(&mut (), |_, ctx| {
//!         assert!(ctx.get_required::<Database>().migrated.load(Ordering::SeqCst));
//!         let first = ctx.get_required::<Session>();
//!         let second = ctx.get_required::<Session>();
//!         assert!(Arc::ptr_eq(&first, &second));
//!         assert_eq!(first.user, "alice");
//!     })
//!     .unwrap();
//!
//! let env = harness.environment().unwrap();
//! assert_eq!(env.execution_order().len(), 2);
//! ```
//!
//! ## Environment Registries
//!
//! [`Harness::new`] and [`Harness::for_module`] cache environments in the
//! process-wide [`EnvironmentRegistry::process`]: every harness of the same
//! configuration shares one environment, and its suite setup runs once per
//! process. An environment cached there is kept until the process exits. To control the
//! cache, hand the harness an explicit registry:
//!
//! ```rust
//! use ferrous_testkit::{EnvironmentRegistry, Harness, ModuleSpec, ServiceCollection};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(EnvironmentRegistry::new());
//! let harness = Harness::for_module(ModuleSpec::configure(|_: &mut ServiceCollection| Ok(())))
//!     .with_registry(registry.clone());
//!
//! harness.run(&mut (), |_, _| {}).unwrap();
//! assert_eq!(registry.len(), 1);
//! ```
//!
//! ## Binding Lifetimes
//!
//! - **Singleton**: created once per environment
//! - **TestScoped**: created once per test
//! - **Transient**: created on every resolution
//!
//! ## Logging
//!
//! The crate emits `tracing` events: environment construction and order at
//! debug level, suite setup at info level, scope entry and exit at trace
//! level, suppressed failures at warn level. Install any `tracing`
//! subscriber to see them, or add a [`LoggingObserver`] for per-phase events.

// Module declarations
pub mod collection;
pub mod config;
pub mod context;
pub mod dependencies;
pub mod environment;
pub mod error;
pub mod harness;
pub mod key;
pub mod lifecycle;
pub mod lifetime;
pub mod observer;
pub mod provider;
pub mod registry;
pub mod resettable;
pub mod teardown;
pub mod test_scope;
pub mod traits;

// Internal modules
mod internal;
mod registration;

// Re-exports
pub use collection::{module_fn, ModuleKey, ModuleSpec, ServiceCollection, ServiceModule};
pub use config::{HarnessOptions, SuiteFailurePolicy};
pub use context::TestContext;
pub use dependencies::{in_order, DependencyNode};
pub use environment::TestEnvironment;
pub use error::{BoxError, CallbackResult, HarnessError, HarnessResult, IntoCallbackResult};
pub use harness::{Harness, TestSubject, WrappedTest};
pub use key::{key_of_type, named_key_of_type, Key, ServiceType};
pub use lifecycle::{LifecycleHooks, Phase, ServiceManager, TestingService};
pub use lifetime::Lifetime;
pub use observer::{LifecycleObserver, LoggingObserver};
pub use provider::{ResolverContext, ScopeStrategy, ServiceProvider};
pub use registration::AnyArc;
pub use registry::EnvironmentRegistry;
pub use resettable::Resettable;
pub use teardown::TearDownService;
pub use test_scope::{ScopeHandle, ScopeId, TestScope};
pub use traits::{Resolver, ResolverCore};
