//! Resolver traits for binding resolution.

use std::sync::Arc;

use crate::error::{HarnessError, HarnessResult};
use crate::key::{key_of_type, named_key_of_type, Key};
use crate::registration::AnyArc;

/// Core resolver trait for object-safe binding resolution.
///
/// Implemented by [`ServiceProvider`](crate::ServiceProvider) (no test
/// scope), [`ResolverContext`](crate::ResolverContext) (inside factories) and
/// [`TestContext`](crate::TestContext) (inside tests and lifecycle callbacks).
///
/// Most users should use the [`Resolver`] trait instead, which provides typed
/// methods built on top of this trait.
pub trait ResolverCore: Send + Sync {
    /// Resolves a single binding.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(AnyArc))` - The resolved value
    /// * `Ok(None)` - The binding resolved to an explicitly absent value
    /// * `Err(HarnessError)` - Not found, out of scope, circular, factory failure
    fn resolve_any(&self, key: &Key) -> HarnessResult<Option<AnyArc>>;
}

/// High-level resolver interface with typed methods.
///
/// Blanket-implemented for every [`ResolverCore`].
///
/// # Examples
///
/// ```
/// use ferrous_testkit::{ServiceCollection, Resolver};
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton("configuration".to_string());
/// services.add_named_singleton("port", 8080u16);
///
/// let provider = services.build();
/// assert_eq!(&*provider.get::<String>().unwrap(), "configuration");
/// assert_eq!(*provider.get_named_required::<u16>("port"), 8080);
/// assert!(provider.get::<u64>().is_err());
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves `T`, failing with [`HarnessError::Absent`] if the binding
    /// resolved to no value.
    fn get<T: 'static + Send + Sync>(&self) -> HarnessResult<Arc<T>> {
        self.get_optional::<T>()?
            .ok_or(HarnessError::Absent(std::any::type_name::<T>()))
    }

    /// Resolves `T`, returning `Ok(None)` for an explicitly absent value.
    fn get_optional<T: 'static + Send + Sync>(&self) -> HarnessResult<Option<Arc<T>>> {
        downcast_optional::<T>(self.resolve_any(&key_of_type::<T>())?)
    }

    /// Resolves the binding of `T` qualified by `name`.
    fn get_named<T: 'static + Send + Sync>(&self, name: &'static str) -> HarnessResult<Arc<T>> {
        downcast_optional::<T>(self.resolve_any(&named_key_of_type::<T>(name))?)?
            .ok_or(HarnessError::Absent(std::any::type_name::<T>()))
    }

    /// Resolves `T` or panics.
    ///
    /// Intended for test bodies, where a missing binding is a test failure.
    fn get_required<T: 'static + Send + Sync>(&self) -> Arc<T> {
        match self.get::<T>() {
            Ok(value) => value,
            Err(err) => panic!("Failed to resolve {}: {}", std::any::type_name::<T>(), err),
        }
    }

    /// Resolves the named binding of `T` or panics.
    fn get_named_required<T: 'static + Send + Sync>(&self, name: &'static str) -> Arc<T> {
        match self.get_named::<T>(name) {
            Ok(value) => value,
            Err(err) => panic!(
                "Failed to resolve {} named '{}': {}",
                std::any::type_name::<T>(),
                name,
                err
            ),
        }
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}

fn downcast_optional<T: 'static + Send + Sync>(value: Option<AnyArc>) -> HarnessResult<Option<Arc<T>>> {
    value
        .map(|any| {
            any.downcast::<T>()
                .map_err(|_| HarnessError::TypeMismatch(std::any::type_name::<T>()))
        })
        .transpose()
}
