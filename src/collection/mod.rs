//! Service collection module.
//!
//! This module contains the ServiceCollection type and related functionality
//! for registering bindings and testing services and building service
//! providers.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::HarnessResult;
use crate::key::{key_of_type, named_key_of_type, Key};
use crate::lifecycle::{ServiceManager, TestingService};
use crate::lifetime::Lifetime;
use crate::observer::{LifecycleObserver, Observers};
use crate::provider::{ResolverContext, ServiceProvider};
use crate::registration::{AnyArc, Ctor, Registration, Registry, TestingRegistration};

pub mod module_system;
pub use module_system::*;

/// Declarative builder of an object graph.
///
/// Registering a key twice replaces the earlier binding. Testing services
/// are collected in a separate, append-only multi-binding in registration
/// order.
pub struct ServiceCollection {
    registry: Registry,
    observers: Observers,
}

impl ServiceCollection {
    /// Creates a new empty service collection.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            observers: Observers::new(),
        }
    }

    // ----- Single bindings -----

    /// Registers a singleton instance shared by every resolution.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ferrous_testkit::ServiceCollection;
    /// struct Config {
    ///     database_url: String
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Config {
    ///     database_url: "postgres://localhost".to_string()
    /// });
    /// ```
    pub fn add_singleton<T: 'static + Send + Sync>(&mut self, value: T) -> &mut Self {
        self.add_value(key_of_type::<T>(), Arc::new(value))
    }

    /// Registers a singleton factory that creates the instance on first request.
    ///
    /// The factory runs at most once; a failed run is not cached, so the next
    /// request tries again. Singletons are always created outside any test
    /// scope, whichever resolution triggers them.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ferrous_testkit::{ServiceCollection, Resolver};
    /// # use std::sync::Arc;
    /// struct Database { url: String }
    /// struct UserService { db: Arc<Database> }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Database { url: "postgres://localhost".to_string() });
    /// services.add_singleton_factory::<UserService, _>(|resolver| {
    ///     Ok(UserService {
    ///         db: resolver.get::<Database>()?
    ///     })
    /// });
    /// ```
    pub fn add_singleton_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> HarnessResult<T> + Send + Sync + 'static,
    {
        self.add_factory(key_of_type::<T>(), Lifetime::Singleton, factory)
    }

    /// Registers a transient factory that creates a new instance on every request.
    pub fn add_transient_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> HarnessResult<T> + Send + Sync + 'static,
    {
        self.add_factory(key_of_type::<T>(), Lifetime::Transient, factory)
    }

    /// Registers a factory creating one instance per test.
    ///
    /// Within one test every resolution, from any thread sharing the test's
    /// context, returns the same instance. Resolving outside a test fails
    /// with [`HarnessError::OutOfScope`](crate::HarnessError::OutOfScope).
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ferrous_testkit::{ServiceCollection, Resolver};
    /// # use std::sync::Arc;
    /// struct Database { url: String }
    /// struct Transaction { db: Arc<Database> }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Database { url: "postgres://localhost".to_string() });
    /// services.add_test_scoped_factory::<Transaction, _>(|resolver| {
    ///     Ok(Transaction { db: resolver.get::<Database>()? })
    /// });
    /// ```
    pub fn add_test_scoped_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> HarnessResult<T> + Send + Sync + 'static,
    {
        self.add_factory(key_of_type::<T>(), Lifetime::TestScoped, factory)
    }

    /// Registers a per-test factory that may produce no value.
    ///
    /// An absent value is memoized like any other: the factory is not run
    /// again within the same test.
    pub fn add_test_scoped_optional_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> HarnessResult<Option<T>> + Send + Sync + 'static,
    {
        self.add_optional_factory(key_of_type::<T>(), Lifetime::TestScoped, factory)
    }

    // ----- Named bindings -----

    /// Registers a named singleton instance.
    pub fn add_named_singleton<T: 'static + Send + Sync>(&mut self, name: &'static str, value: T) -> &mut Self {
        self.add_value(named_key_of_type::<T>(name), Arc::new(value))
    }

    /// Registers a named singleton factory.
    pub fn add_named_singleton_factory<T, F>(&mut self, name: &'static str, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> HarnessResult<T> + Send + Sync + 'static,
    {
        self.add_factory(named_key_of_type::<T>(name), Lifetime::Singleton, factory)
    }

    /// Registers a named per-test factory.
    pub fn add_named_test_scoped_factory<T, F>(&mut self, name: &'static str, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> HarnessResult<T> + Send + Sync + 'static,
    {
        self.add_factory(named_key_of_type::<T>(name), Lifetime::TestScoped, factory)
    }

    pub(crate) fn add_value(&mut self, key: Key, value: AnyArc) -> &mut Self {
        let ctor: Ctor = Arc::new(move |_: &ResolverContext| Ok(Some(Arc::clone(&value))));
        self.registry.insert(key, Registration::new(Lifetime::Singleton, ctor));
        self
    }

    fn add_factory<T, F>(&mut self, key: Key, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> HarnessResult<T> + Send + Sync + 'static,
    {
        self.add_optional_factory(key, lifetime, move |r: &ResolverContext| factory(r).map(Some))
    }

    fn add_optional_factory<T, F>(&mut self, key: Key, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> HarnessResult<Option<T>> + Send + Sync + 'static,
    {
        let ctor: Ctor = Arc::new(move |r: &ResolverContext| {
            Ok(factory(r)?.map(|value| Arc::new(value) as AnyArc))
        });
        self.registry.insert(key, Registration::new(lifetime, ctor));
        self
    }

    // ----- Testing services -----

    /// Adds `service` to the testing services and binds it as the singleton
    /// for `S`.
    ///
    /// Every call adds a distinct member, also for the same type; the `S`
    /// binding resolves to the most recently added instance.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrous_testkit::{ServiceCollection, TestingService};
    ///
    /// struct MailServer { port: u16 }
    /// impl TestingService for MailServer {}
    ///
    /// let mut services = ServiceCollection::new();
    /// services
    ///     .add_testing_service(MailServer { port: 2525 })
    ///     .add_testing_service(MailServer { port: 2526 });
    /// assert_eq!(services.testing_service_count(), 2);
    /// ```
    pub fn add_testing_service<S: TestingService>(&mut self, service: S) -> &mut Self {
        let service = Arc::new(service);
        self.add_value(key_of_type::<S>(), Arc::clone(&service) as AnyArc);
        self.registry.push_testing(TestingRegistration {
            type_name: std::any::type_name::<S>(),
            ctor: Arc::new(move |_: &ResolverContext| Ok(ServiceManager::new(Arc::clone(&service)))),
        });
        self
    }

    /// Adds a testing service created by `factory` when the environment is
    /// built, and binds the same instance as the singleton for `S`.
    pub fn add_testing_service_factory<S, F>(&mut self, factory: F) -> &mut Self
    where
        S: TestingService,
        F: Fn(&ResolverContext) -> HarnessResult<S> + Send + Sync + 'static,
    {
        // One instance per registration, shared by the binding and the member
        let instance: Arc<OnceCell<Arc<S>>> = Arc::new(OnceCell::new());
        let factory = Arc::new(factory);

        let binding = {
            let instance = Arc::clone(&instance);
            let factory = Arc::clone(&factory);
            move |r: &ResolverContext| -> HarnessResult<Arc<S>> {
                instance.get_or_try_init(|| factory(r).map(Arc::new)).cloned()
            }
        };
        let member = binding.clone();

        let ctor: Ctor = Arc::new(move |r: &ResolverContext| Ok(Some(binding(r)? as AnyArc)));
        self.registry
            .insert(key_of_type::<S>(), Registration::new(Lifetime::Singleton, ctor));
        self.registry.push_testing(TestingRegistration {
            type_name: std::any::type_name::<S>(),
            ctor: Arc::new(move |r: &ResolverContext| Ok(ServiceManager::new(member(r)?))),
        });
        self
    }

    /// Adds a testing service created with `S::default()`.
    pub fn add_testing_service_default<S: TestingService + Default>(&mut self) -> &mut Self {
        self.add_testing_service_factory::<S, _>(|_| Ok(S::default()))
    }

    /// Number of testing services added so far.
    pub fn testing_service_count(&self) -> usize {
        self.registry.testing.len()
    }

    /// Returns true if a single binding exists for `key`.
    pub fn contains_key(&self, key: &Key) -> bool {
        self.registry.contains_key(key)
    }

    // ----- Composition -----

    /// Registers the bindings of `module` into this collection.
    pub fn install<M: ServiceModule>(&mut self, module: M) -> HarnessResult<&mut Self> {
        module.register_services(self)?;
        Ok(self)
    }

    /// Registers the bindings added by `register` into this collection.
    pub fn install_fn<F>(&mut self, register: F) -> HarnessResult<&mut Self>
    where
        F: FnOnce(&mut ServiceCollection) -> HarnessResult<()>,
    {
        register(self)?;
        Ok(self)
    }

    // ----- Observation -----

    /// Adds an observer notified of the lifecycle events of every environment
    /// built from this collection.
    pub fn add_observer(&mut self, observer: Arc<dyn LifecycleObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    /// Builds the object graph.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ferrous_testkit::{ServiceCollection, Resolver};
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(42usize);
    /// services.add_singleton("Hello".to_string());
    ///
    /// let provider = services.build();
    /// assert_eq!(*provider.get_required::<usize>(), 42);
    /// assert_eq!(&*provider.get_required::<String>(), "Hello");
    /// ```
    pub fn build(self) -> ServiceProvider {
        ServiceProvider::new(self.registry, self.observers)
    }
}

impl Default for ServiceCollection {
    fn default() -> Self {
        Self::new()
    }
}
