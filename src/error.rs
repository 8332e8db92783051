//! Error types for the test harness.

use std::error::Error as StdError;

use crate::lifecycle::Phase;

/// Boxed error produced by lifecycle callbacks and test bodies.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Outcome of a lifecycle callback or a test body.
pub type CallbackResult = Result<(), BoxError>;

/// Harness errors
///
/// Represents the failure conditions that can occur while realizing a
/// configuration, ordering its testing services, running lifecycle phases,
/// resolving test-scoped values or executing a wrapped test.
///
/// Failures raised by user code (lifecycle callbacks and test bodies) are
/// carried unmodified as the `source` of [`HarnessError::Callback`] and
/// [`HarnessError::TestFailed`], so callers can recover the concrete error
/// with [`HarnessError::downcast_source`].
///
/// # Examples
///
/// ```rust
/// use ferrous_testkit::HarnessError;
///
/// let out_of_scope = HarnessError::OutOfScope("Key[type=app::Session]".to_string());
/// let cycle = HarnessError::DependencyCycle(vec!["A", "B", "C"]);
///
/// assert!(out_of_scope.is_out_of_scope());
/// assert!(cycle.to_string().contains("Cycle"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The configuration module could not be instantiated or could not
    /// register its bindings.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Binding not registered
    #[error("Service not found: {0}")]
    NotFound(&'static str),
    /// Binding resolved to an explicitly absent value
    #[error("Binding resolved to no value: {0}")]
    Absent(&'static str),
    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// Circular resolution between factories (includes path)
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<&'static str>),
    /// Maximum resolution depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// The testing-service dependency graph contains a cycle. Lists every
    /// service that could not be ordered: the members of the cycle and the
    /// services depending on them.
    #[error("Cycle exists in testing service dependencies among: {}", .0.join(", "))]
    DependencyCycle(Vec<&'static str>),
    /// A test-scoped binding was requested while no test scope was entered,
    /// or after the owning scope exited.
    #[error("Attempt to use test-scoped binding outside test: {0}")]
    OutOfScope(String),
    /// Scope enter/exit called out of sequence.
    #[error("Illegal state: {0}")]
    IllegalState(&'static str),
    /// A lifecycle callback of a testing service failed.
    #[error("{phase} callback `{callback}` of {service} failed: {source}")]
    Callback {
        service: &'static str,
        phase: Phase,
        callback: &'static str,
        #[source]
        source: BoxError,
    },
    /// The one-time suite setup of this environment failed in an earlier call.
    #[error("Suite setup previously failed: {0}")]
    SuiteSetupFailed(String),
    /// The test body returned an error.
    #[error("Test failed: {0}")]
    TestFailed(#[source] BoxError),
}

impl HarnessError {
    /// Returns the error raised by user code, if this error wraps one.
    pub fn user_source(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            HarnessError::Callback { source, .. } => Some(source.as_ref()),
            HarnessError::TestFailed(source) => Some(source.as_ref()),
            _ => None,
        }
    }

    /// Downcasts the error raised by a callback or test body to its concrete type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrous_testkit::{HarnessError, Phase};
    ///
    /// #[derive(Debug)]
    /// struct PortInUse(u16);
    /// impl std::fmt::Display for PortInUse {
    ///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    ///         write!(f, "port {} in use", self.0)
    ///     }
    /// }
    /// impl std::error::Error for PortInUse {}
    ///
    /// let err = HarnessError::Callback {
    ///     service: "Server",
    ///     phase: Phase::BeforeSuite,
    ///     callback: "start",
    ///     source: Box::new(PortInUse(8080)),
    /// };
    /// assert_eq!(err.downcast_source::<PortInUse>().map(|e| e.0), Some(8080));
    /// ```
    pub fn downcast_source<E: StdError + 'static>(&self) -> Option<&E> {
        self.user_source().and_then(|source| source.downcast_ref::<E>())
    }

    /// Returns true for [`HarnessError::OutOfScope`], also when it was raised
    /// inside a callback or test body.
    pub fn is_out_of_scope(&self) -> bool {
        match self {
            HarnessError::OutOfScope(_) => true,
            _ => self
                .downcast_source::<HarnessError>()
                .map_or(false, HarnessError::is_out_of_scope),
        }
    }
}

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Conversion of a callback's or test body's return value into a
/// [`CallbackResult`].
///
/// Implemented for `()` and for `Result<(), E>` with any `E` convertible into
/// [`BoxError`], so callbacks can be written either infallibly or with `?`.
pub trait IntoCallbackResult {
    /// Performs the conversion.
    fn into_callback_result(self) -> CallbackResult;
}

impl IntoCallbackResult for () {
    fn into_callback_result(self) -> CallbackResult {
        Ok(())
    }
}

impl<E> IntoCallbackResult for Result<(), E>
where
    E: Into<BoxError>,
{
    fn into_callback_result(self) -> CallbackResult {
        self.map_err(Into::into)
    }
}
