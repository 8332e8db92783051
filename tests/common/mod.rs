//! Shared fixtures for the integration tests.

#![allow(dead_code, unused_macros)]

use ferrous_testkit::{EnvironmentRegistry, Harness, ModuleSpec};
use std::sync::{Arc, Mutex};

/// Append-only event log shared between services and assertions.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Entries ending with `.{suffix}`, in logging order.
    pub fn phase(&self, suffix: &str) -> Vec<String> {
        let suffix = format!(".{}", suffix);
        self.entries()
            .into_iter()
            .filter(|entry| entry.ends_with(&suffix))
            .collect()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| e.as_str() == entry).count()
    }

    pub fn position(&self, entry: &str) -> usize {
        self.entries()
            .iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("{} was not logged: {:?}", entry, self.entries()))
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Harness over its own registry, so tests never share environments.
pub fn isolated(spec: ModuleSpec) -> Harness {
    Harness::for_module(spec).with_registry(Arc::new(EnvironmentRegistry::new()))
}

/// Declares a testing service that logs `Name.phase` for every phase.
macro_rules! recording_service {
    ($name:ident $(, depends_on: [$($dep:ty),+ $(,)?])?) => {
        struct $name {
            log: $crate::common::Log,
        }

        impl $name {
            fn new(log: &$crate::common::Log) -> Self {
                Self { log: log.clone() }
            }
        }

        impl ferrous_testkit::TestingService for $name {
            fn lifecycle(hooks: &mut ferrous_testkit::LifecycleHooks<Self>) {
                hooks
                    .before_suite("before_suite", |s, _| {
                        s.log.push(concat!(stringify!($name), ".before_suite"))
                    })
                    .before_test("before_test", |s, _| {
                        s.log.push(concat!(stringify!($name), ".before_test"))
                    })
                    .after_test("after_test", |s, _| {
                        s.log.push(concat!(stringify!($name), ".after_test"))
                    });
            }

            fn depends_on() -> Vec<ferrous_testkit::ServiceType> {
                vec![$($(ferrous_testkit::ServiceType::of::<$dep>()),+)?]
            }
        }
    };
}
