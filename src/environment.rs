//! Realized test environments.
//!
//! A [`TestEnvironment`] is built once per configuration: the object graph,
//! the testing services in execution order, and the one-time suite gate.

use std::fmt;
use std::time::Instant;

use parking_lot::Mutex;

use crate::collection::{ModuleKey, ModuleSpec};
use crate::config::{HarnessOptions, SuiteFailurePolicy};
use crate::context::TestContext;
use crate::dependencies::in_order;
use crate::error::{HarnessError, HarnessResult};
use crate::lifecycle::{Phase, ServiceManager};
use crate::provider::ServiceProvider;
use crate::test_scope::ScopeHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
enum SuiteState {
    NotRun,
    Succeeded,
    Failed(String),
}

/// Object graph and ordered testing services of one configuration.
pub struct TestEnvironment {
    module: ModuleKey,
    provider: ServiceProvider,
    services: Vec<ServiceManager>,
    suite: Mutex<SuiteState>,
    options: HarnessOptions,
}

impl TestEnvironment {
    /// Realizes `spec`, constructs its testing services and orders them.
    ///
    /// # Errors
    ///
    /// [`HarnessError::Configuration`] if the module fails,
    /// [`HarnessError::DependencyCycle`] if the services' dependencies are
    /// cyclic, or the error of a failing testing-service factory.
    pub fn build(spec: &ModuleSpec, options: HarnessOptions) -> HarnessResult<Self> {
        let module = spec.key();
        let provider = spec.build_provider()?;
        let services = in_order(provider.testing_services()?)?;

        let order: Vec<&'static str> = services.iter().map(ServiceManager::name).collect();
        tracing::debug!(module = %module, order = ?order, "computed testing service order");
        provider.observers().environment_created(&module, &order);

        Ok(Self {
            module,
            provider,
            services,
            suite: Mutex::new(SuiteState::NotRun),
            options,
        })
    }

    /// Configuration this environment was built from.
    pub fn module(&self) -> ModuleKey {
        self.module
    }

    /// The realized object graph.
    pub fn provider(&self) -> &ServiceProvider {
        &self.provider
    }

    /// Testing services in execution order.
    pub fn services(&self) -> &[ServiceManager] {
        &self.services
    }

    /// Names of the testing services in execution order.
    pub fn execution_order(&self) -> Vec<&'static str> {
        self.services.iter().map(ServiceManager::name).collect()
    }

    /// Options the environment was built with.
    pub fn options(&self) -> &HarnessOptions {
        &self.options
    }

    /// A context over this environment's object graph.
    pub fn context(&self, scope: Option<ScopeHandle>) -> TestContext {
        TestContext::new(self.provider.clone(), scope)
    }

    /// Runs the before-suite callbacks of every service, in execution order,
    /// unless they already ran.
    ///
    /// Concurrent callers block until the first caller's run completes. The
    /// run is marked as attempted before it starts, so a failing or panicking
    /// setup is never repeated; what later callers see is decided by
    /// [`HarnessOptions::suite_failure`].
    pub fn before_suite_if_not_already_run(&self) -> HarnessResult<()> {
        let mut state = self.suite.lock();
        match &*state {
            SuiteState::Succeeded => return Ok(()),
            SuiteState::Failed(message) => {
                return match self.options.suite_failure {
                    SuiteFailurePolicy::Reraise => {
                        Err(HarnessError::SuiteSetupFailed(message.clone()))
                    }
                    SuiteFailurePolicy::RunOnce => Ok(()),
                };
            }
            SuiteState::NotRun => {}
        }

        *state = SuiteState::Failed("suite setup did not complete".to_string());
        tracing::info!(module = %self.module, services = self.services.len(), "running suite setup");

        let ctx = self.context(None);
        match self.run_forward(Phase::BeforeSuite, &ctx) {
            Ok(()) => {
                *state = SuiteState::Succeeded;
                Ok(())
            }
            Err(err) => {
                *state = SuiteState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Returns true once the suite setup was attempted.
    pub fn before_suite_has_run(&self) -> bool {
        *self.suite.lock() != SuiteState::NotRun
    }

    /// Failure message of the suite setup, if it failed.
    pub fn suite_failure(&self) -> Option<String> {
        match &*self.suite.lock() {
            SuiteState::Failed(message) => Some(message.clone()),
            _ => None,
        }
    }

    /// Runs the before-test callbacks of every service, in execution order,
    /// stopping at the first failing service.
    pub fn before_test(&self, ctx: &TestContext) -> HarnessResult<()> {
        self.run_forward(Phase::BeforeTest, ctx)
    }

    /// Runs the after-test callbacks of every service, in reverse execution
    /// order.
    ///
    /// With [`HarnessOptions::continue_teardown`] every service is torn down
    /// and the first failure is returned; later failures are logged.
    pub fn after_test(&self, ctx: &TestContext) -> HarnessResult<()> {
        let mut first: Option<HarnessError> = None;
        for service in self.services.iter().rev() {
            let Err(err) = self.run_service(service, Phase::AfterTest, ctx) else {
                continue;
            };
            if !self.options.continue_teardown {
                return Err(err);
            }
            if first.is_none() {
                first = Some(err);
            } else {
                self.suppress(&err);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Logs a failure that loses to an earlier failure of the same test.
    pub(crate) fn suppress(&self, err: &HarnessError) {
        tracing::warn!(module = %self.module, error = %err, "suppressed failure");
        self.provider.observers().failure_suppressed(err);
    }

    fn run_forward(&self, phase: Phase, ctx: &TestContext) -> HarnessResult<()> {
        for service in &self.services {
            self.run_service(service, phase, ctx)?;
        }
        Ok(())
    }

    fn run_service(&self, service: &ServiceManager, phase: Phase, ctx: &TestContext) -> HarnessResult<()> {
        let observers = self.provider.observers();
        observers.phase_starting(service.name(), phase);
        let started = Instant::now();
        match service.run_phase(phase, ctx) {
            Ok(()) => {
                observers.phase_completed(service.name(), phase, started.elapsed());
                Ok(())
            }
            Err(err) => {
                observers.phase_failed(service.name(), phase, &err);
                Err(err)
            }
        }
    }
}

impl fmt::Debug for TestEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestEnvironment")
            .field("module", &self.module)
            .field("services", &self.execution_order())
            .field("suite", &*self.suite.lock())
            .field("options", &self.options)
            .finish()
    }
}
