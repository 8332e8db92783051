//! Cache of test environments, one per configuration.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;

use crate::collection::{ModuleKey, ModuleSpec};
use crate::config::HarnessOptions;
use crate::environment::TestEnvironment;
use crate::error::HarnessResult;

type EnvironmentCell = Arc<OnceCell<Arc<TestEnvironment>>>;

static PROCESS_REGISTRY: Lazy<EnvironmentRegistry> = Lazy::new(EnvironmentRegistry::new);

/// Cache of [`TestEnvironment`]s keyed by [`ModuleKey`].
///
/// Every configuration is built at most once per registry, also when several
/// threads request an unseen configuration at the same time. A failed
/// construction is not cached: the next request builds again.
///
/// # Examples
///
/// ```rust
/// use ferrous_testkit::{EnvironmentRegistry, HarnessOptions, ModuleSpec, ServiceCollection};
/// use std::sync::Arc;
///
/// let registry = EnvironmentRegistry::new();
/// let spec = ModuleSpec::configure(|_: &mut ServiceCollection| Ok(()));
///
/// let first = registry.get_or_create(&spec, &HarnessOptions::default()).unwrap();
/// let second = registry.get_or_create(&spec, &HarnessOptions::default()).unwrap();
/// assert!(Arc::ptr_eq(&first, &second));
/// assert_eq!(registry.len(), 1);
/// ```
pub struct EnvironmentRegistry {
    environments: Mutex<HashMap<ModuleKey, EnvironmentCell>>,
}

impl EnvironmentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            environments: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide registry used by harnesses without an explicit one.
    ///
    /// Environments cached here live until the process exits.
    pub fn process() -> &'static EnvironmentRegistry {
        &PROCESS_REGISTRY
    }

    /// Returns the environment of `spec`, building it on first use.
    ///
    /// `options` apply only when this call builds the environment.
    pub fn get_or_create(
        &self,
        spec: &ModuleSpec,
        options: &HarnessOptions,
    ) -> HarnessResult<Arc<TestEnvironment>> {
        // The map lock only guards the per-key cell; builds of different
        // configurations run in parallel
        let cell = {
            let mut environments = self.environments.lock();
            Arc::clone(environments.entry(spec.key()).or_default())
        };

        cell.get_or_try_init(|| {
            tracing::debug!(module = %spec.key(), "building test environment");
            TestEnvironment::build(spec, options.clone()).map(Arc::new)
        })
        .cloned()
    }

    /// Returns the environment of `module` if it was built.
    pub fn get(&self, module: &ModuleKey) -> Option<Arc<TestEnvironment>> {
        self.environments
            .lock()
            .get(module)
            .and_then(|cell| cell.get().cloned())
    }

    /// Number of built environments.
    pub fn len(&self) -> usize {
        self.environments
            .lock()
            .values()
            .filter(|cell| cell.get().is_some())
            .count()
    }

    /// Returns true if no environment was built.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every cached environment.
    #[cfg(any(test, feature = "test-support"))]
    pub fn reset(&self) {
        self.environments.lock().clear();
    }
}

impl Default for EnvironmentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EnvironmentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentRegistry")
            .field("environments", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServiceCollection;

    #[test]
    fn test_reset_forgets_environments() {
        let registry = EnvironmentRegistry::new();
        let spec = ModuleSpec::configure(|_: &mut ServiceCollection| Ok(()));

        let first = registry.get_or_create(&spec, &HarnessOptions::default()).unwrap();
        assert!(registry.get(&spec.key()).is_some());

        registry.reset();
        assert!(registry.is_empty());

        let rebuilt = registry.get_or_create(&spec, &HarnessOptions::default()).unwrap();
        assert!(!Arc::ptr_eq(&first, &rebuilt));
    }
}
