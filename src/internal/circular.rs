//! Circular resolution detection infrastructure.

use std::cell::RefCell;

use crate::error::{HarnessError, HarnessResult};
use crate::key::Key;

const MAX_DEPTH: usize = 1024;

// Thread-local resolution state for circular resolution detection
thread_local! {
    static RESOLUTION_TLS: RefCell<ResolutionTls> = RefCell::new(ResolutionTls::default());
}

#[derive(Default)]
struct ResolutionTls {
    stack: Vec<Key>,
}

/// Guard for managing the thread-local resolution stack
pub(crate) struct StackGuard {
    key: Key,
}

impl StackGuard {
    /// Pushes `key`, failing if it is already being resolved on this thread.
    pub(crate) fn enter(key: &Key) -> HarnessResult<Self> {
        RESOLUTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();

            // Circular detection BEFORE pushing the new key
            if tls.stack.contains(key) {
                let mut path: Vec<&'static str> =
                    tls.stack.iter().map(Key::display_name).collect();
                path.push(key.display_name());
                return Err(HarnessError::Circular(path));
            }

            if tls.stack.len() >= MAX_DEPTH {
                return Err(HarnessError::DepthExceeded(tls.stack.len()));
            }

            tls.stack.push(*key);
            Ok(())
        })?;

        Ok(Self { key: *key })
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        RESOLUTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();
            if let Some(last) = tls.stack.pop() {
                debug_assert_eq!(last, self.key);
            }
        });
    }
}

/// Execute a resolution with circular dependency detection
pub(crate) fn with_circular_check<T, F>(key: &Key, f: F) -> HarnessResult<T>
where
    F: FnOnce() -> HarnessResult<T>,
{
    let _guard = StackGuard::enter(key)?;
    f()
}
