//! Harness configuration.
//!
//! Options are plain values with sensible defaults. They can be read from
//! environment variables and, with the `config` feature, from JSON.

use std::env;
use std::str::FromStr;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};

/// Environment variable selecting the [`SuiteFailurePolicy`].
pub const SUITE_FAILURE_VAR: &str = "FERROUS_TESTKIT_SUITE_FAILURE";

/// Environment variable toggling [`HarnessOptions::continue_teardown`].
pub const CONTINUE_TEARDOWN_VAR: &str = "FERROUS_TESTKIT_CONTINUE_TEARDOWN";

/// What later tests observe after the one-time suite setup of an environment
/// failed.
///
/// The setup is never re-run under either policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "kebab-case"))]
pub enum SuiteFailurePolicy {
    /// Every later test fails with [`HarnessError::SuiteSetupFailed`].
    #[default]
    Reraise,
    /// The setup counts as done; later tests proceed.
    RunOnce,
}

impl FromStr for SuiteFailurePolicy {
    type Err = HarnessError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reraise" => Ok(SuiteFailurePolicy::Reraise),
            "run-once" | "run_once" => Ok(SuiteFailurePolicy::RunOnce),
            other => Err(HarnessError::Configuration(format!(
                "unknown suite failure policy '{}', expected 'reraise' or 'run-once'",
                other
            ))),
        }
    }
}

/// Behavioural options of a [`Harness`](crate::Harness).
///
/// # Examples
///
/// ```rust
/// use ferrous_testkit::{HarnessOptions, SuiteFailurePolicy};
///
/// let options = HarnessOptions::from_lookup(|name| match name {
///     "FERROUS_TESTKIT_SUITE_FAILURE" => Some("run-once".to_string()),
///     _ => None,
/// })
/// .unwrap();
///
/// assert_eq!(options.suite_failure, SuiteFailurePolicy::RunOnce);
/// assert!(options.continue_teardown);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct HarnessOptions {
    /// Policy applied after a failed suite setup.
    pub suite_failure: SuiteFailurePolicy,
    /// Keep running after-test callbacks of the remaining services when one
    /// service's teardown fails. The first failure is still reported.
    pub continue_teardown: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            suite_failure: SuiteFailurePolicy::Reraise,
            continue_teardown: true,
        }
    }
}

impl HarnessOptions {
    /// Reads options from the process environment.
    ///
    /// Unset variables keep their defaults; malformed values are
    /// [`HarnessError::Configuration`] errors.
    pub fn from_env() -> HarnessResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads options through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> HarnessResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();
        if let Some(value) = lookup(SUITE_FAILURE_VAR) {
            options.suite_failure = value.parse()?;
        }
        if let Some(value) = lookup(CONTINUE_TEARDOWN_VAR) {
            options.continue_teardown = parse_bool(CONTINUE_TEARDOWN_VAR, &value)?;
        }
        Ok(options)
    }

    /// Parses options from a JSON document; missing fields keep their defaults.
    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> HarnessResult<Self> {
        serde_json::from_str(json)
            .map_err(|err| HarnessError::Configuration(format!("invalid harness options: {}", err)))
    }

    /// Sets the suite failure policy.
    pub fn with_suite_failure(mut self, policy: SuiteFailurePolicy) -> Self {
        self.suite_failure = policy;
        self
    }

    /// Sets whether teardown continues past a failing service.
    pub fn with_continue_teardown(mut self, enabled: bool) -> Self {
        self.continue_teardown = enabled;
        self
    }
}

fn parse_bool(name: &str, value: &str) -> HarnessResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(HarnessError::Configuration(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}
