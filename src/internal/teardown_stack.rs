//! Internal teardown stack for managing cleanup closures.

use crate::error::CallbackResult;

/// Boxed cleanup closure.
pub(crate) type TearDown = Box<dyn FnOnce() -> CallbackResult + Send>;

/// Container for cleanup closures with LIFO execution order.
#[derive(Default)]
pub(crate) struct TearDownStack {
    entries: Vec<TearDown>,
}

impl TearDownStack {
    /// Add a cleanup closure.
    pub(crate) fn push(&mut self, f: TearDown) {
        self.entries.push(f);
    }

    /// Execute all closures in reverse order (LIFO).
    ///
    /// Every closure runs; the first failure is returned and later ones are
    /// logged.
    pub(crate) fn run_all_reverse(&mut self) -> CallbackResult {
        let mut first = None;
        while let Some(f) = self.entries.pop() {
            if let Err(err) = (f)() {
                if first.is_none() {
                    first = Some(err);
                } else {
                    tracing::warn!(error = %err, "additional tear down failure");
                }
            }
        }
        first.map_or(Ok(()), Err)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
