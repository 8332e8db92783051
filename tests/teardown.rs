/// Teardown support tests
///
/// These tests verify per-test cleanup closures registered through
/// `TearDownService` and values restored before every test with
/// `Resettable`.

mod common;

use common::{isolated, Log};
use ferrous_testkit::{
    HarnessError, LifecycleHooks, ModuleSpec, Phase, Resettable, Resolver, ServiceCollection,
    TearDownService, TestingService,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn tear_down_module() -> ModuleSpec {
    ModuleSpec::configure(|services: &mut ServiceCollection| {
        services.add_tear_down_support();
        Ok(())
    })
}

#[test]
fn test_tear_downs_run_in_reverse_order() {
    let harness = isolated(tear_down_module());
    let log = Log::new();

    let recorded = log.clone();
    harness
        .run(&mut (), move |_, ctx| -> Result<(), HarnessError> {
            let service = ctx.get::<TearDownService>()?;
            for name in ["drop_table", "close_connection", "stop_server"] {
                let log = recorded.clone();
                service.add_tear_down(ctx, move || log.push(name))?;
            }
            assert_eq!(service.pending(ctx), 3);
            Ok(())
        })
        .unwrap();

    assert_eq!(
        log.entries(),
        vec!["stop_server", "close_connection", "drop_table"]
    );
}

#[test]
fn test_every_tear_down_runs_and_first_failure_is_reported() {
    let harness = isolated(tear_down_module());
    let log = Log::new();

    let recorded = log.clone();
    let err = harness
        .run(&mut (), move |_, ctx| -> Result<(), HarnessError> {
            let service = ctx.get::<TearDownService>()?;
            let first = recorded.clone();
            service.add_tear_down(ctx, move || first.push("first"))?;
            service.add_tear_down(ctx, || Err::<(), _>("second failed"))?;
            service.add_tear_down(ctx, || Err::<(), _>("third failed"))?;
            Ok(())
        })
        .unwrap_err();

    // Reverse order: "third" runs and fails first
    assert_eq!(
        err.user_source().map(|source| source.to_string()),
        Some("third failed".to_string())
    );
    assert_eq!(log.entries(), vec!["first"]);
}

#[test]
fn test_tear_downs_belong_to_their_test() {
    let harness = isolated(tear_down_module());
    let log = Log::new();

    for test in ["first_test", "second_test"] {
        let recorded = log.clone();
        harness
            .run(&mut (), move |_, ctx| -> Result<(), HarnessError> {
                let service = ctx.get::<TearDownService>()?;
                assert_eq!(service.pending(ctx), 0);
                service.add_tear_down(ctx, move || recorded.push(test))
            })
            .unwrap();
    }

    assert_eq!(log.entries(), vec!["first_test", "second_test"]);
}

#[test]
fn test_tear_down_outside_a_test_is_rejected() {
    let harness = isolated(tear_down_module());
    let env = harness.environment().unwrap();
    let ctx = env.context(None);

    let service = ctx.get::<TearDownService>().unwrap();
    let err = service.add_tear_down(&ctx, || {}).unwrap_err();
    assert!(err.is_out_of_scope());
}

#[derive(Default)]
struct LateRegistrar {
    late_runs: Arc<AtomicUsize>,
}

impl TestingService for LateRegistrar {
    fn lifecycle(hooks: &mut LifecycleHooks<Self>) {
        hooks.after_test("register_late", |registrar, ctx| -> Result<(), HarnessError> {
            let runs = registrar.late_runs.clone();
            ctx.get::<TearDownService>()?.add_tear_down(ctx, move || {
                runs.fetch_add(1, Ordering::SeqCst);
            })
        });
    }
}

#[test]
fn test_tear_down_after_tear_downs_ran_is_rejected() {
    let late_runs = Arc::new(AtomicUsize::new(0));
    let runs = late_runs.clone();
    let harness = isolated(ModuleSpec::configure(move |services: &mut ServiceCollection| {
        // Registered first, so its after-test callback runs after the tear downs
        services
            .add_testing_service(LateRegistrar {
                late_runs: runs.clone(),
            })
            .add_tear_down_support();
        Ok(())
    }));

    for _ in 0..2 {
        let err = harness.run(&mut (), |_, _| {}).unwrap_err();
        match &err {
            HarnessError::Callback {
                phase, callback, ..
            } => {
                assert_eq!(*phase, Phase::AfterTest);
                assert_eq!(*callback, "register_late");
            }
            other => panic!("expected the late registration to fail, got {}", other),
        }
        assert!(matches!(
            err.downcast_source::<HarnessError>(),
            Some(HarnessError::IllegalState(_))
        ));
    }

    assert_eq!(late_runs.load(Ordering::SeqCst), 0);
    let order = harness.environment().unwrap().execution_order();
    assert!(order[0].ends_with("LateRegistrar"));
}

#[test]
fn test_tear_downs_are_discarded_with_the_scope() {
    let harness = isolated(tear_down_module());
    let env = harness.environment().unwrap();
    let service = env.provider().get::<TearDownService>().unwrap();

    let scope = ferrous_testkit::TestScope::new();
    let ctx = env.context(Some(scope.enter().unwrap()));
    service.add_tear_down(&ctx, || {}).unwrap();
    assert_eq!(service.pending(&ctx), 1);
    assert_eq!(ctx.scope().unwrap().len(), 1);

    scope.exit().unwrap();
    assert_eq!(service.pending(&ctx), 0);
    assert!(service.add_tear_down(&ctx, || {}).unwrap_err().is_out_of_scope());
}

#[derive(Debug, Default, Clone, PartialEq)]
struct FeatureFlags {
    dark_mode: bool,
    beta_users: Vec<String>,
}

#[test]
fn test_resettable_is_restored_before_each_test() {
    let harness = isolated(ModuleSpec::configure(|services: &mut ServiceCollection| {
        services.add_resettable::<FeatureFlags>();
        Ok(())
    }));

    harness
        .run(&mut (), |_, ctx| {
            let flags = ctx.get_required::<Resettable<FeatureFlags>>();
            assert_eq!(flags.get(), FeatureFlags::default());
            flags.write().dark_mode = true;
            flags.write().beta_users.push("ada".to_string());
        })
        .unwrap();

    harness
        .run(&mut (), |_, ctx| {
            let flags = ctx.get_required::<Resettable<FeatureFlags>>();
            assert!(!flags.read().dark_mode);
            assert!(flags.read().beta_users.is_empty());
        })
        .unwrap();
}

#[test]
fn test_resettable_with_custom_initial_value() {
    let harness = isolated(ModuleSpec::configure(|services: &mut ServiceCollection| {
        services.add_resettable_with(|| 3usize);
        Ok(())
    }));

    for _ in 0..2 {
        harness
            .run(&mut (), |_, ctx| {
                let retries = ctx.get_required::<Resettable<usize>>();
                assert_eq!(retries.get(), 3);
                retries.set(0);
            })
            .unwrap();
    }

    let retries = harness
        .environment()
        .unwrap()
        .provider()
        .get_required::<Resettable<usize>>();
    assert_eq!(retries.get(), 0);
    retries.reset();
    assert_eq!(retries.get(), 3);
}
