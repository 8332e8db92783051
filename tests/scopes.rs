/// Test scope tests
///
/// These tests verify the enter/exit state machine of a test scope, that
/// test-scoped bindings are shared within a test and distinct across tests,
/// that child threads inherit the scope explicitly, and that lookups after
/// the scope exited fail.

mod common;

use common::isolated;
use ferrous_testkit::{
    key_of_type, HarnessError, ModuleSpec, Resolver, ServiceCollection, TestContext, TestScope,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn test_enter_twice_is_illegal() {
    let scope = TestScope::new();
    let _handle = scope.enter().unwrap();

    assert!(matches!(scope.enter(), Err(HarnessError::IllegalState(_))));
    assert!(scope.is_entered());
}

#[test]
fn test_exit_without_enter_is_illegal() {
    let scope = TestScope::new();
    assert!(matches!(scope.exit(), Err(HarnessError::IllegalState(_))));

    scope.enter().unwrap();
    scope.exit().unwrap();
    assert!(matches!(scope.exit(), Err(HarnessError::IllegalState(_))));
    assert!(!scope.is_entered());
    assert!(scope.handle().is_none());
}

#[test]
fn test_reentry_starts_with_empty_store() {
    let scope = TestScope::new();
    let key = key_of_type::<String>();

    let first = scope.enter().unwrap();
    let value = first.get_or_create(&key, || Ok("first".to_string())).unwrap();
    assert_eq!(first.len(), 1);
    scope.exit().unwrap();

    let second = scope.enter().unwrap();
    assert!(second.is_empty());
    assert_ne!(first.id(), second.id());
    let fresh = second.get_or_create(&key, || Ok("second".to_string())).unwrap();
    assert!(!Arc::ptr_eq(&value, &fresh));
    assert_eq!(&*fresh, "second");
}

#[test]
fn test_create_runs_once_per_key() {
    let scope = TestScope::new();
    let handle = scope.enter().unwrap();
    let calls = AtomicUsize::new(0);

    for _ in 0..3 {
        handle
            .get_or_create(&key_of_type::<u32>(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7u32)
            })
            .unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failed_creation_is_not_memoized() {
    let scope = TestScope::new();
    let handle = scope.enter().unwrap();
    let key = key_of_type::<u32>();

    let failed = handle.get_or_create::<u32, _>(&key, || Err(HarnessError::Configuration("boom".into())));
    assert!(failed.is_err());

    let value = handle.get_or_create(&key, || Ok(9u32)).unwrap();
    assert_eq!(*value, 9);
}

#[derive(Debug)]
struct Session {
    serial: usize,
}

fn session_module(created: Arc<AtomicUsize>) -> ModuleSpec {
    ModuleSpec::configure(move |services: &mut ServiceCollection| {
        let created = created.clone();
        services.add_test_scoped_factory::<Session, _>(move |_| {
            Ok(Session {
                serial: created.fetch_add(1, Ordering::SeqCst),
            })
        });
        Ok(())
    })
}

#[test]
fn test_same_instance_within_a_test() {
    let created = Arc::new(AtomicUsize::new(0));
    let harness = isolated(session_module(created.clone()));

    harness
        .run(&mut (), |_, ctx| {
            let first = ctx.get_required::<Session>();
            let second = ctx.get_required::<Session>();
            assert!(Arc::ptr_eq(&first, &second));
        })
        .unwrap();

    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn test_different_instance_per_test() {
    let created = Arc::new(AtomicUsize::new(0));
    let harness = isolated(session_module(created.clone()));

    let mut serials = Vec::new();
    for _ in 0..3 {
        harness
            .run(&mut (), |_, ctx| serials.push(ctx.get_required::<Session>().serial))
            .unwrap();
    }

    assert_eq!(serials, vec![0, 1, 2]);
}

#[test]
fn test_child_thread_shares_the_scope() {
    let created = Arc::new(AtomicUsize::new(0));
    let harness = isolated(session_module(created.clone()));

    harness
        .run(&mut (), |_, ctx| -> Result<(), HarnessError> {
            let parent = ctx.get::<Session>()?;
            let child = ctx.spawn(|child| child.get::<Session>()).join().unwrap()?;
            assert!(Arc::ptr_eq(&parent, &child));
            Ok(())
        })
        .unwrap();

    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn test_child_first_lookup_is_seen_by_parent() {
    let created = Arc::new(AtomicUsize::new(0));
    let harness = isolated(session_module(created.clone()));

    harness
        .run(&mut (), |_, ctx| -> Result<(), HarnessError> {
            let from_child = ctx.spawn(|child| child.get::<Session>()).join().unwrap()?;
            let from_parent = ctx.get::<Session>()?;
            assert!(Arc::ptr_eq(&from_child, &from_parent));
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_lookup_after_exit_fails_in_child_thread() {
    let harness = isolated(session_module(Arc::new(AtomicUsize::new(0))));

    let mut leaked: Option<TestContext> = None;
    harness
        .run(&mut (), |_, ctx| leaked = Some(ctx.fork()))
        .unwrap();

    let ctx = leaked.unwrap();
    assert!(!ctx.scope().unwrap().is_active());
    let result = std::thread::spawn(move || ctx.get::<Session>().map(|_| ()))
        .join()
        .unwrap();
    assert!(matches!(result, Err(HarnessError::OutOfScope(_))));
}

#[test]
fn test_exit_during_creation_fails_the_creating_thread() {
    let scope = TestScope::new();
    let handle = scope.enter().unwrap();
    let barrier = Arc::new(std::sync::Barrier::new(2));

    let in_create = barrier.clone();
    let child = handle.spawn(move |child| {
        child
            .get_or_create(&key_of_type::<String>(), || {
                // Creation started
                in_create.wait();
                // Scope exited
                in_create.wait();
                Ok("late".to_string())
            })
            .map(|_| ())
    });

    barrier.wait();
    scope.exit().unwrap();
    barrier.wait();

    let result = child.join().unwrap();
    assert!(matches!(result, Err(HarnessError::OutOfScope(_))));
    assert!(!handle.is_active());
    assert_eq!(handle.len(), 0);
}

#[test]
fn test_resolution_outside_any_test_fails() {
    let harness = isolated(session_module(Arc::new(AtomicUsize::new(0))));
    let env = harness.environment().unwrap();

    let err = env.provider().get::<Session>().map(|_| ()).unwrap_err();
    assert!(err.is_out_of_scope());

    let unscoped = env.context(None);
    assert!(unscoped.get::<Session>().unwrap_err().is_out_of_scope());
}

#[test]
fn test_separate_scopes_are_isolated() {
    let created = Arc::new(AtomicUsize::new(0));
    let harness = isolated(session_module(created.clone()));
    let env = harness.environment().unwrap();

    let left = TestScope::new();
    let right = TestScope::new();
    let left_ctx = env.context(Some(left.enter().unwrap()));
    let right_ctx = env.context(Some(right.enter().unwrap()));

    let a = left_ctx.get_required::<Session>();
    let b = right_ctx.get_required::<Session>();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_ne!(left_ctx.scope_id(), right_ctx.scope_id());

    left.exit().unwrap();
    assert!(left_ctx.get::<Session>().unwrap_err().is_out_of_scope());
    assert!(Arc::ptr_eq(&b, &right_ctx.get_required::<Session>()));
    right.exit().unwrap();
}

struct Ambient;

#[test]
fn test_absent_value_is_memoized() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let harness = isolated(ModuleSpec::configure(move |services: &mut ServiceCollection| {
        let counter = counter.clone();
        services.add_test_scoped_optional_factory::<Ambient, _>(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        });
        Ok(())
    }));

    harness
        .run(&mut (), |_, ctx| {
            assert!(ctx.get_optional::<Ambient>().unwrap().is_none());
            assert!(ctx.get_optional::<Ambient>().unwrap().is_none());
            assert!(matches!(ctx.get::<Ambient>(), Err(HarnessError::Absent(_))));
        })
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
