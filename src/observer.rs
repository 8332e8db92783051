//! Lifecycle observers.
//!
//! Observers receive the orchestration events of every environment built
//! from a [`ServiceCollection`](crate::ServiceCollection) they were added to:
//! environment construction, lifecycle phases per service, scope entry and
//! exit, and failures that were logged instead of reported.

use std::sync::Arc;
use std::time::Duration;

use crate::collection::ModuleKey;
use crate::error::HarnessError;
use crate::lifecycle::Phase;
use crate::test_scope::ScopeId;

/// Observer of test lifecycle events.
///
/// Every method has an empty default, so an observer implements only what it
/// needs. Calls are made synchronously on the thread running the phase; keep
/// implementations lightweight.
///
/// # Examples
///
/// ```
/// use ferrous_testkit::{LifecycleObserver, Phase, ServiceCollection};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct FailureCounter {
///     failures: AtomicUsize,
/// }
///
/// impl LifecycleObserver for FailureCounter {
///     fn phase_failed(&self, _service: &'static str, _phase: Phase, _error: &ferrous_testkit::HarnessError) {
///         self.failures.fetch_add(1, Ordering::Relaxed);
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_observer(Arc::new(FailureCounter::default()));
/// ```
pub trait LifecycleObserver: Send + Sync {
    /// An environment was built; `order` lists its services in execution order.
    fn environment_created(&self, module: &ModuleKey, order: &[&'static str]) {
        let _ = (module, order);
    }

    /// `service` is about to run its callbacks for `phase`.
    fn phase_starting(&self, service: &'static str, phase: Phase) {
        let _ = (service, phase);
    }

    /// `service` ran all its callbacks for `phase`.
    fn phase_completed(&self, service: &'static str, phase: Phase, duration: Duration) {
        let _ = (service, phase, duration);
    }

    /// A callback of `service` failed during `phase`.
    fn phase_failed(&self, service: &'static str, phase: Phase, error: &HarnessError) {
        let _ = (service, phase, error);
    }

    /// A test scope was entered.
    fn scope_entered(&self, scope: ScopeId) {
        let _ = scope;
    }

    /// A test scope was exited.
    fn scope_exited(&self, scope: ScopeId) {
        let _ = scope;
    }

    /// A failure was logged but not reported because an earlier failure of
    /// the same test takes precedence.
    fn failure_suppressed(&self, error: &HarnessError) {
        let _ = error;
    }
}

/// Container for registered observers.
#[derive(Default)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn LifecycleObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn LifecycleObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub(crate) fn environment_created(&self, module: &ModuleKey, order: &[&'static str]) {
        for observer in &self.observers {
            observer.environment_created(module, order);
        }
    }

    pub(crate) fn phase_starting(&self, service: &'static str, phase: Phase) {
        for observer in &self.observers {
            observer.phase_starting(service, phase);
        }
    }

    pub(crate) fn phase_completed(&self, service: &'static str, phase: Phase, duration: Duration) {
        for observer in &self.observers {
            observer.phase_completed(service, phase, duration);
        }
    }

    pub(crate) fn phase_failed(&self, service: &'static str, phase: Phase, error: &HarnessError) {
        for observer in &self.observers {
            observer.phase_failed(service, phase, error);
        }
    }

    pub(crate) fn scope_entered(&self, scope: ScopeId) {
        for observer in &self.observers {
            observer.scope_entered(scope);
        }
    }

    pub(crate) fn scope_exited(&self, scope: ScopeId) {
        for observer in &self.observers {
            observer.scope_exited(scope);
        }
    }

    pub(crate) fn failure_suppressed(&self, error: &HarnessError) {
        for observer in &self.observers {
            observer.failure_suppressed(error);
        }
    }
}

/// Built-in observer that forwards events to `tracing`.
///
/// Phase progress is logged at debug level, failures at warn level.
///
/// # Examples
///
/// ```
/// use ferrous_testkit::{LoggingObserver, ServiceCollection};
/// use std::sync::Arc;
///
/// let mut services = ServiceCollection::new();
/// services.add_observer(Arc::new(LoggingObserver::with_prefix("integration")));
/// ```
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    /// Creates a logging observer with the default prefix.
    pub fn new() -> Self {
        Self {
            prefix: "ferrous-testkit".to_string(),
        }
    }

    /// Creates a logging observer with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleObserver for LoggingObserver {
    fn environment_created(&self, module: &ModuleKey, order: &[&'static str]) {
        tracing::info!(prefix = %self.prefix, module = %module, services = ?order, "environment created");
    }

    fn phase_starting(&self, service: &'static str, phase: Phase) {
        tracing::debug!(prefix = %self.prefix, service, %phase, "phase starting");
    }

    fn phase_completed(&self, service: &'static str, phase: Phase, duration: Duration) {
        tracing::debug!(prefix = %self.prefix, service, %phase, ?duration, "phase completed");
    }

    fn phase_failed(&self, service: &'static str, phase: Phase, error: &HarnessError) {
        tracing::warn!(prefix = %self.prefix, service, %phase, %error, "phase failed");
    }

    fn scope_entered(&self, scope: ScopeId) {
        tracing::debug!(prefix = %self.prefix, %scope, "scope entered");
    }

    fn scope_exited(&self, scope: ScopeId) {
        tracing::debug!(prefix = %self.prefix, %scope, "scope exited");
    }

    fn failure_suppressed(&self, error: &HarnessError) {
        tracing::warn!(prefix = %self.prefix, %error, "failure suppressed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        events: AtomicUsize,
    }

    impl LifecycleObserver for Counting {
        fn scope_entered(&self, _scope: ScopeId) {
            self.events.fetch_add(1, Ordering::SeqCst);
        }

        fn failure_suppressed(&self, _error: &HarnessError) {
            self.events.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_observers_fan_out() {
        let counting = Arc::new(Counting::default());
        let mut observers = Observers::new();
        assert!(!observers.has_observers());

        observers.add(counting.clone());
        observers.add(Arc::new(LoggingObserver::new()));
        assert!(observers.has_observers());

        let scope = crate::TestScope::new();
        let handle = scope.enter().unwrap();
        observers.scope_entered(handle.id());
        observers.failure_suppressed(&HarnessError::IllegalState("late"));
        observers.phase_starting("svc", Phase::AfterTest);

        assert_eq!(counting.events.load(Ordering::SeqCst), 2);
    }
}
