/// Concurrent execution tests
///
/// These tests verify that tests running on parallel threads share one
/// environment built exactly once, run the suite setup exactly once, and
/// never see each other's test-scoped values.

mod common;

use common::isolated;
use crossbeam_utils::thread;
use ferrous_testkit::{
    EnvironmentRegistry, Harness, HarnessError, LifecycleHooks, ModuleSpec, Resolver,
    ServiceCollection, TestingService,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};

const THREADS: usize = 8;

#[derive(Default)]
struct SlowSetup {
    suite_runs: AtomicUsize,
    tests: AtomicUsize,
}

impl TestingService for SlowSetup {
    fn lifecycle(hooks: &mut LifecycleHooks<Self>) {
        hooks
            .before_suite("provision", |service, _| {
                std::thread::sleep(std::time::Duration::from_millis(20));
                service.suite_runs.fetch_add(1, Ordering::SeqCst);
            })
            .before_test("count", |service, _| {
                service.tests.fetch_add(1, Ordering::SeqCst);
            });
    }
}

struct Session {
    owner: usize,
}

#[test]
fn test_parallel_first_use_builds_once() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    let registry = Arc::new(EnvironmentRegistry::new());
    let harness = Harness::for_module(ModuleSpec::configure(move |services: &mut ServiceCollection| {
        counter.fetch_add(1, Ordering::SeqCst);
        services.add_testing_service_default::<SlowSetup>();
        Ok(())
    }))
    .with_registry(registry.clone());

    let barrier = Barrier::new(THREADS);
    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|_| {
                barrier.wait();
                harness.run(&mut (), |_, _| {}).unwrap();
            });
        }
    })
    .unwrap();

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert_eq!(registry.len(), 1);

    let setup = harness
        .environment()
        .unwrap()
        .provider()
        .get_required::<SlowSetup>();
    assert_eq!(setup.suite_runs.load(Ordering::SeqCst), 1);
    assert_eq!(setup.tests.load(Ordering::SeqCst), THREADS);
}

#[test]
fn test_parallel_tests_have_isolated_scopes() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();
    let harness = isolated(ModuleSpec::configure(move |services: &mut ServiceCollection| {
        let counter = counter.clone();
        services.add_test_scoped_factory::<Session, _>(move |_| {
            Ok(Session {
                owner: counter.fetch_add(1, Ordering::SeqCst),
            })
        });
        Ok(())
    }));

    let barrier = Barrier::new(THREADS);
    let owners = Mutex::new(HashSet::new());
    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|_| {
                harness
                    .run(&mut (), |_, ctx| -> Result<(), HarnessError> {
                        let session = ctx.get::<Session>()?;
                        // Every test holds its session while the others create theirs
                        barrier.wait();
                        let again = ctx.get::<Session>()?;
                        assert!(Arc::ptr_eq(&session, &again));
                        owners.lock().unwrap().insert(session.owner);
                        Ok(())
                    })
                    .unwrap();
            });
        }
    })
    .unwrap();

    assert_eq!(owners.lock().unwrap().len(), THREADS);
    assert_eq!(created.load(Ordering::SeqCst), THREADS);
}

#[test]
fn test_concurrent_children_create_one_value() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();
    let harness = isolated(ModuleSpec::configure(move |services: &mut ServiceCollection| {
        let counter = counter.clone();
        services.add_test_scoped_factory::<Session, _>(move |_| {
            std::thread::sleep(std::time::Duration::from_millis(5));
            Ok(Session {
                owner: counter.fetch_add(1, Ordering::SeqCst),
            })
        });
        Ok(())
    }));

    harness
        .run(&mut (), |_, ctx| -> Result<(), HarnessError> {
            let barrier = Arc::new(Barrier::new(THREADS));
            let children: Vec<_> = (0..THREADS)
                .map(|_| {
                    let barrier = barrier.clone();
                    ctx.spawn(move |child| {
                        barrier.wait();
                        child.get::<Session>().map(|session| session.owner)
                    })
                })
                .collect();

            let owners = children
                .into_iter()
                .map(|child| child.join().unwrap())
                .collect::<Result<HashSet<_>, _>>()?;
            assert_eq!(owners.len(), 1);
            assert_eq!(ctx.get::<Session>()?.owner, *owners.iter().next().unwrap());
            Ok(())
        })
        .unwrap();

    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn test_different_configurations_build_in_parallel() {
    let registry = Arc::new(EnvironmentRegistry::new());
    let left = Harness::for_module(ModuleSpec::configure(|services: &mut ServiceCollection| {
        services.add_singleton("left");
        Ok(())
    }))
    .with_registry(registry.clone());
    let right = Harness::for_module(ModuleSpec::configure(|services: &mut ServiceCollection| {
        services.add_singleton("right");
        Ok(())
    }))
    .with_registry(registry.clone());

    let barrier = Barrier::new(2 * THREADS);
    thread::scope(|s| {
        for i in 0..2 * THREADS {
            let harness = if i % 2 == 0 { &left } else { &right };
            let barrier = &barrier;
            s.spawn(move |_| {
                barrier.wait();
                harness.run(&mut (), |_, _| {}).unwrap();
            });
        }
    })
    .unwrap();

    assert_eq!(registry.len(), 2);
    assert_ne!(left.module().key(), right.module().key());
    assert_eq!(
        *left.environment().unwrap().provider().get_required::<&'static str>(),
        "left"
    );
}
