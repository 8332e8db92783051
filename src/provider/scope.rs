//! Scope extension point for custom-lifetime bindings.
//!
//! The object graph does not know how test-scoped values are stored. Every
//! resolution of a [`Lifetime::TestScoped`](crate::Lifetime::TestScoped)
//! binding is handed to the [`ScopeStrategy`] carried by the resolution
//! context, which decides whether to return a memoized value or to call the
//! unscoped constructor.

use crate::error::HarnessResult;
use crate::key::Key;
use crate::registration::AnyArc;

/// Intercepts the creation of scoped values per key.
///
/// [`ScopeHandle`](crate::ScopeHandle) is the implementation supplied by this
/// crate. The constructor passed as `unscoped` creates a fresh value and may
/// yield `Ok(None)` for an explicitly absent value; implementations must
/// memoize that outcome too.
///
/// # Examples
///
/// ```rust
/// use ferrous_testkit::{key_of_type, AnyArc, HarnessResult, Key, ScopeStrategy};
/// use std::sync::Arc;
///
/// // A strategy that never memoizes
/// struct Unscoped;
///
/// impl ScopeStrategy for Unscoped {
///     fn scope(
///         &self,
///         _key: &Key,
///         unscoped: &mut dyn FnMut() -> HarnessResult<Option<AnyArc>>,
///     ) -> HarnessResult<Option<AnyArc>> {
///         unscoped()
///     }
/// }
///
/// let value = Unscoped
///     .scope(&key_of_type::<u8>(), &mut || Ok(Some(Arc::new(1u8) as AnyArc)))
///     .unwrap();
/// assert!(value.is_some());
/// ```
pub trait ScopeStrategy: Send + Sync {
    /// Returns the scoped value for `key`, creating it with `unscoped` when
    /// this scope has none yet.
    fn scope(
        &self,
        key: &Key,
        unscoped: &mut dyn FnMut() -> HarnessResult<Option<AnyArc>>,
    ) -> HarnessResult<Option<AnyArc>>;
}
