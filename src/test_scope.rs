//! Per-test scoping of test-scoped bindings.
//!
//! A [`TestScope`] is a small state machine: entering it allocates a fresh
//! store, exiting it discards the store. Values created while the scope is
//! entered are memoized per [`Key`] and shared by every [`ScopeHandle`] of
//! that entry, including handles moved into threads spawned by the test.
//! Exiting invalidates the store for all handles at once.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::error::{HarnessError, HarnessResult};
use crate::key::Key;
use crate::provider::ScopeStrategy;
use crate::registration::AnyArc;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of one entry into a [`TestScope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    fn next() -> Self {
        ScopeId(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value of this identifier.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "test-scope-{}", self.0)
    }
}

type Slot = Arc<OnceCell<Option<AnyArc>>>;

struct ScopeStore {
    id: ScopeId,
    // None once the owning scope exited
    entries: Mutex<Option<HashMap<Key, Slot>>>,
}

impl ScopeStore {
    fn new() -> Self {
        Self {
            id: ScopeId::next(),
            entries: Mutex::new(Some(HashMap::new())),
        }
    }

    fn slot(&self, key: &Key) -> HarnessResult<Slot> {
        let mut entries = self.entries.lock();
        let map = entries
            .as_mut()
            .ok_or_else(|| HarnessError::OutOfScope(key.to_string()))?;
        Ok(Arc::clone(map.entry(*key).or_default()))
    }

    fn is_active(&self) -> bool {
        self.entries.lock().is_some()
    }

    fn len(&self) -> usize {
        self.entries.lock().as_ref().map_or(0, HashMap::len)
    }

    fn close(&self) -> usize {
        self.entries.lock().take().map_or(0, |entries| entries.len())
    }
}

/// Enter/exit state machine of the per-test scope.
///
/// # Examples
///
/// ```rust
/// use ferrous_testkit::{key_of_type, HarnessError, TestScope};
///
/// let scope = TestScope::new();
/// let handle = scope.enter().unwrap();
///
/// let first = handle.get_or_create(&key_of_type::<String>(), || Ok("value".to_string())).unwrap();
/// let again = handle.get_or_create(&key_of_type::<String>(), || Ok("other".to_string())).unwrap();
/// assert!(std::sync::Arc::ptr_eq(&first, &again));
///
/// scope.exit().unwrap();
/// let late = handle.get_or_create(&key_of_type::<String>(), || Ok(String::new()));
/// assert!(matches!(late, Err(HarnessError::OutOfScope(_))));
/// ```
pub struct TestScope {
    current: Mutex<Option<Arc<ScopeStore>>>,
}

impl TestScope {
    /// Creates a scope in the not-entered state.
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// Enters the scope with a fresh, empty store.
    ///
    /// # Errors
    ///
    /// [`HarnessError::IllegalState`] if the scope is already entered.
    pub fn enter(&self) -> HarnessResult<ScopeHandle> {
        let mut current = self.current.lock();
        if current.is_some() {
            return Err(HarnessError::IllegalState("test scope is already in progress"));
        }
        let store = Arc::new(ScopeStore::new());
        tracing::trace!(scope = %store.id, "entered test scope");
        *current = Some(Arc::clone(&store));
        Ok(ScopeHandle { store })
    }

    /// Exits the scope, discarding every value it holds.
    ///
    /// Handles still held elsewhere fail with [`HarnessError::OutOfScope`]
    /// from now on.
    ///
    /// # Errors
    ///
    /// [`HarnessError::IllegalState`] if the scope is not entered.
    pub fn exit(&self) -> HarnessResult<()> {
        let store = self
            .current
            .lock()
            .take()
            .ok_or(HarnessError::IllegalState("test scope not in progress"))?;
        let discarded = store.close();
        tracing::trace!(scope = %store.id, discarded, "exited test scope");
        Ok(())
    }

    /// Handle to the current entry, if the scope is entered.
    pub fn handle(&self) -> Option<ScopeHandle> {
        self.current
            .lock()
            .as_ref()
            .map(|store| ScopeHandle { store: Arc::clone(store) })
    }

    /// Returns true while the scope is entered.
    pub fn is_entered(&self) -> bool {
        self.current.lock().is_some()
    }
}

impl Default for TestScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestScope")
            .field("current", &self.current.lock().as_ref().map(|store| store.id))
            .finish()
    }
}

/// Shared reference to one entered scope.
///
/// Cloning a handle (or moving a clone into another thread) shares the same
/// store; that is how child executions of a test inherit its scope.
#[derive(Clone)]
pub struct ScopeHandle {
    store: Arc<ScopeStore>,
}

impl ScopeHandle {
    /// Identifier of the scope entry this handle belongs to.
    pub fn id(&self) -> ScopeId {
        self.store.id
    }

    /// Returns false once the owning scope exited.
    pub fn is_active(&self) -> bool {
        self.store.is_active()
    }

    /// Number of keys requested in this scope so far.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns true if nothing has been requested in this scope yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the memoized value for `key`, creating it with `create` the
    /// first time the key is requested in this scope.
    ///
    /// `create` runs at most once per key and scope, also when several
    /// threads request the key concurrently; an absent value (`Ok(None)`) is
    /// memoized like any other. A failed creation is not memoized. The store
    /// lock is not held while `create` runs.
    ///
    /// # Errors
    ///
    /// [`HarnessError::OutOfScope`] if the scope exited before the lookup, or
    /// while the value was being created.
    pub fn lookup_or_create(
        &self,
        key: &Key,
        create: &mut dyn FnMut() -> HarnessResult<Option<AnyArc>>,
    ) -> HarnessResult<Option<AnyArc>> {
        let slot = self.store.slot(key)?;
        let value = slot.get_or_try_init(|| create())?.clone();
        if !self.store.is_active() {
            return Err(HarnessError::OutOfScope(key.to_string()));
        }
        Ok(value)
    }

    /// Typed variant of [`lookup_or_create`](Self::lookup_or_create).
    pub fn get_or_create<T, F>(&self, key: &Key, create: F) -> HarnessResult<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> HarnessResult<T>,
    {
        let mut create = Some(create);
        let value = self.lookup_or_create(key, &mut || match create.take() {
            Some(create) => create().map(|value| Some(Arc::new(value) as AnyArc)),
            None => Ok(None),
        })?;
        value
            .ok_or(HarnessError::Absent(key.display_name()))?
            .downcast::<T>()
            .map_err(|_| HarnessError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Runs `f` on a new thread that shares this scope.
    pub fn spawn<F, R>(&self, f: F) -> JoinHandle<R>
    where
        F: FnOnce(ScopeHandle) -> R + Send + 'static,
        R: Send + 'static,
    {
        let handle = self.clone();
        std::thread::spawn(move || f(handle))
    }
}

impl ScopeStrategy for ScopeHandle {
    fn scope(
        &self,
        key: &Key,
        unscoped: &mut dyn FnMut() -> HarnessResult<Option<AnyArc>>,
    ) -> HarnessResult<Option<AnyArc>> {
        self.lookup_or_create(key, unscoped)
    }
}

impl fmt::Debug for ScopeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeHandle")
            .field("id", &self.store.id)
            .field("active", &self.is_active())
            .finish()
    }
}
