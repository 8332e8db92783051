//! Configuration modules.
//!
//! A module registers bindings and testing services into a
//! [`ServiceCollection`]. Environments are cached per module type, so the
//! module type is the identity of a configuration.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use crate::error::{HarnessError, HarnessResult};
use crate::provider::ServiceProvider;
use crate::ServiceCollection;

/// A module that can register services with a ServiceCollection.
///
/// # Example
///
/// ```rust
/// use ferrous_testkit::{HarnessResult, Resolver, ServiceCollection, ServiceModule};
///
/// #[derive(Default)]
/// struct UserConfig;
///
/// struct UserService;
///
/// #[derive(Default)]
/// struct UserModule;
///
/// impl ServiceModule for UserModule {
///     fn register_services(&self, services: &mut ServiceCollection) -> HarnessResult<()> {
///         services.add_singleton(UserConfig::default());
///         services.add_test_scoped_factory::<UserService, _>(|r| {
///             r.get::<UserConfig>()?;
///             Ok(UserService)
///         });
///         Ok(())
///     }
/// }
///
/// # fn main() -> HarnessResult<()> {
/// let mut services = ServiceCollection::new();
/// services.install(UserModule)?;
/// let provider = services.build();
/// # Ok(())
/// # }
/// ```
pub trait ServiceModule: Send + Sync + 'static {
    /// Register this module's services with the ServiceCollection.
    fn register_services(&self, services: &mut ServiceCollection) -> HarnessResult<()>;
}

struct FnModule<F> {
    register: Arc<F>,
}

impl<F> ServiceModule for FnModule<F>
where
    F: Fn(&mut ServiceCollection) -> HarnessResult<()> + Send + Sync + 'static,
{
    fn register_services(&self, services: &mut ServiceCollection) -> HarnessResult<()> {
        (self.register)(services)
    }
}

/// Wraps a registration closure as a [`ServiceModule`].
pub fn module_fn<F>(register: F) -> impl ServiceModule
where
    F: Fn(&mut ServiceCollection) -> HarnessResult<()> + Send + Sync + 'static,
{
    FnModule {
        register: Arc::new(register),
    }
}

/// Identity of a configuration: the type of its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleKey {
    id: TypeId,
    name: &'static str,
}

impl ModuleKey {
    /// Key of module type `M`.
    pub fn of<M: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<M>(),
            name: std::any::type_name::<M>(),
        }
    }

    /// Type name of the module.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

type Instantiate = Arc<dyn Fn() -> HarnessResult<Box<dyn ServiceModule>> + Send + Sync>;

/// Declarative description of a configuration: how to instantiate its module
/// and under which [`ModuleKey`] its environment is cached.
///
/// # Examples
///
/// ```rust
/// use ferrous_testkit::{HarnessResult, ModuleKey, ModuleSpec, ServiceCollection, ServiceModule};
///
/// #[derive(Default)]
/// struct AppModule;
///
/// impl ServiceModule for AppModule {
///     fn register_services(&self, services: &mut ServiceCollection) -> HarnessResult<()> {
///         services.add_singleton(3u32);
///         Ok(())
///     }
/// }
///
/// let spec = ModuleSpec::of::<AppModule>();
/// assert_eq!(spec.key(), ModuleKey::of::<AppModule>());
/// ```
#[derive(Clone)]
pub struct ModuleSpec {
    key: ModuleKey,
    instantiate: Instantiate,
}

impl ModuleSpec {
    /// Configuration built from `M::default()`.
    pub fn of<M: ServiceModule + Default>() -> Self {
        Self::from_fn(|| Ok(M::default()))
    }

    /// Configuration built from a fallible module constructor.
    ///
    /// The constructor runs once per environment construction attempt; its
    /// failure is reported as [`HarnessError::Configuration`].
    pub fn from_fn<M, F>(constructor: F) -> Self
    where
        M: ServiceModule,
        F: Fn() -> HarnessResult<M> + Send + Sync + 'static,
    {
        Self {
            key: ModuleKey::of::<M>(),
            instantiate: Arc::new(move || {
                constructor().map(|module| Box::new(module) as Box<dyn ServiceModule>)
            }),
        }
    }

    /// Configuration given by a registration closure.
    ///
    /// The closure's type is the configuration identity: every call site is
    /// its own configuration, and closures created by the same call site
    /// share one.
    pub fn configure<F>(register: F) -> Self
    where
        F: Fn(&mut ServiceCollection) -> HarnessResult<()> + Send + Sync + 'static,
    {
        let register = Arc::new(register);
        Self {
            key: ModuleKey::of::<F>(),
            instantiate: Arc::new(move || {
                Ok(Box::new(FnModule {
                    register: Arc::clone(&register),
                }) as Box<dyn ServiceModule>)
            }),
        }
    }

    /// Cache identity of this configuration.
    pub fn key(&self) -> ModuleKey {
        self.key
    }

    /// Instantiates the module and realizes its object graph.
    pub(crate) fn build_provider(&self) -> HarnessResult<ServiceProvider> {
        let module = (self.instantiate)().map_err(|err| {
            HarnessError::Configuration(format!(
                "cannot instantiate module {}: {}",
                self.key, err
            ))
        })?;

        let mut services = ServiceCollection::new();
        module
            .register_services(&mut services)
            .map_err(|err| match err {
                HarnessError::Configuration(_) => err,
                other => HarnessError::Configuration(format!(
                    "module {} failed to register services: {}",
                    self.key, other
                )),
            })?;
        Ok(services.build())
    }
}

impl fmt::Debug for ModuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleSpec").field("key", &self.key).finish()
    }
}
