//! Binding lifetime definitions.

/// Binding lifetimes controlling instance caching behavior
///
/// # Examples
///
/// ```rust
/// use ferrous_testkit::{ServiceCollection, Resolver, Harness, ModuleSpec};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct Session { id: u32 }
///
/// let harness = Harness::for_module(ModuleSpec::configure(|services: &mut ServiceCollection| {
///     // Singleton: one instance for the whole environment
///     services.add_singleton(Database { url: "postgres://localhost".to_string() });
///     // TestScoped: one instance per test case
///     services.add_test_scoped_factory::<Session, _>(|_| Ok(Session { id: 7 }));
///     Ok(())
/// }));
///
/// harness.run(&mut (), |_, ctx| {
///     let a = ctx.get_required::<Session>();
///     let b = ctx.get_required::<Session>();
///     assert!(Arc::ptr_eq(&a, &b)); // Same within the test
///     assert_eq!(ctx.get_required::<Database>().url, "postgres://localhost");
/// }).unwrap();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub enum Lifetime {
    /// Single instance per realized object graph, cached for the lifetime of
    /// the environment that owns it.
    Singleton,
    /// Single instance per entered test scope.
    ///
    /// Creation is intercepted by the [`ScopeStrategy`](crate::ScopeStrategy)
    /// of the resolution context; resolving outside a test scope fails with
    /// [`HarnessError::OutOfScope`](crate::HarnessError::OutOfScope).
    TestScoped,
    /// New instance per resolution, never cached
    Transient,
}
