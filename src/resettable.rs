//! Shared values restored before every test.

use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::key::key_of_type;
use crate::lifecycle::{LifecycleHooks, TestingService};
use crate::registration::AnyArc;
use crate::ServiceCollection;

/// A singleton value that tests may change and that is restored to its
/// initial value before every test.
///
/// Register it with [`ServiceCollection::add_resettable`] or
/// [`ServiceCollection::add_resettable_with`] and resolve it as
/// `Resettable<T>`.
///
/// # Examples
///
/// ```rust
/// use ferrous_testkit::{Harness, ModuleSpec, Resettable, Resolver, ServiceCollection};
///
/// let harness = Harness::for_module(ModuleSpec::configure(|services: &mut ServiceCollection| {
///     services.add_resettable_with(|| vec!["seed".to_string()]);
///     Ok(())
/// }));
///
/// for _ in 0..2 {
///     harness
///         .run(&mut (), |_, ctx| {
///             let names = ctx.get_required::<Resettable<Vec<String>>>();
///             assert_eq!(names.read().len(), 1);
///             names.write().push("added by test".to_string());
///         })
///         .unwrap();
/// }
/// ```
pub struct Resettable<T> {
    value: RwLock<T>,
    initial: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T: Send + Sync + 'static> Resettable<T> {
    /// Creates a value initialized by `initial`, which also produces every
    /// reset value.
    pub fn new<F>(initial: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            value: RwLock::new(initial()),
            initial: Box::new(initial),
        }
    }

    /// Locks the value for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.value.read()
    }

    /// Locks the value for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.value.write()
    }

    /// Replaces the value.
    pub fn set(&self, value: T) {
        *self.value.write() = value;
    }

    /// Returns a copy of the value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.value.read().clone()
    }

    /// Restores the initial value.
    pub fn reset(&self) {
        let fresh = (self.initial)();
        *self.value.write() = fresh;
    }
}

impl<T: fmt::Debug> fmt::Debug for Resettable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resettable")
            .field("value", &*self.value.read())
            .finish()
    }
}

/// Testing service resetting one [`Resettable`] before each test.
struct ResetBeforeTest<T> {
    value: Arc<Resettable<T>>,
}

impl<T: Send + Sync + 'static> TestingService for ResetBeforeTest<T> {
    fn lifecycle(hooks: &mut LifecycleHooks<Self>) {
        hooks.before_test("reset", |service, _| service.value.reset());
    }
}

impl ServiceCollection {
    /// Registers a [`Resettable<T>`] starting from, and reset to, `T::default()`.
    pub fn add_resettable<T: Default + Send + Sync + 'static>(&mut self) -> &mut Self {
        self.add_resettable_with(T::default)
    }

    /// Registers a [`Resettable<T>`] starting from, and reset to, `initial()`.
    pub fn add_resettable_with<T, F>(&mut self, initial: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let value = Arc::new(Resettable::new(initial));
        self.add_value(key_of_type::<Resettable<T>>(), Arc::clone(&value) as AnyArc);
        self.add_testing_service(ResetBeforeTest { value })
    }
}
